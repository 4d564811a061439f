use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file::{DocumentId, FileDescriptor, StoredName};

/// Client-side view of one uploaded document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: DocumentId,
    /// The uploader's file name, for display only.
    pub name: String,
    pub stored_name: StoredName,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl From<FileDescriptor> for DocumentRecord {
    fn from(d: FileDescriptor) -> Self {
        Self {
            id: d.id,
            name: d.original_name,
            stored_name: d.stored_name,
            size: d.size,
            uploaded_at: d.uploaded_at,
        }
    }
}
