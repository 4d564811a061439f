use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Multipart field carrying the uploaded files.
pub const UPLOAD_FIELD: &str = "files";

/// Server-generated name of a stored file.
///
/// Always a single plain path component, so joining it onto the storage root
/// can never leave that directory lexically. It is never derived from the
/// uploader's file name apart from the extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoredName(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid stored name: {0:?}")]
pub struct InvalidStoredName(pub String);

impl StoredName {
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidStoredName> {
        let raw = raw.into();
        if is_plain_component(&raw) {
            Ok(Self(raw))
        } else {
            Err(InvalidStoredName(raw))
        }
    }

    /// `<unix-millis>-<random>` followed by the original extension, if any.
    /// Extensions that are not plain ASCII alphanumerics are dropped.
    pub fn generate(original_name: &str) -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix: u32 = rand::random_range(0..1_000_000_000);
        match original_extension(original_name) {
            Some(ext) => Self(format!("{millis}-{suffix}.{ext}")),
            None => Self(format!("{millis}-{suffix}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The document id: this name with its extension stripped.
    pub fn id(&self) -> DocumentId {
        let stem = Path::new(&self.0)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.0);
        DocumentId(stem.to_string())
    }
}

impl TryFrom<String> for StoredName {
    type Error = InvalidStoredName;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<StoredName> for String {
    fn from(n: StoredName) -> Self {
        n.0
    }
}

impl fmt::Display for StoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What `POST /upload` returns for each stored file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub id: DocumentId,
    pub original_name: String,
    pub stored_name: StoredName,
    pub path: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

pub fn is_plain_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

fn original_extension(original_name: &str) -> Option<String> {
    let safe = sanitize_filename::sanitize(original_name);
    Path::new(&safe)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_string)
}
