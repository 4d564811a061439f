use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use super::UploadFile;
use crate::models::file::UPLOAD_FIELD;
use crate::models::{FileDescriptor, StoredName};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Where the registry sends its mutations.
pub trait DocumentBackend {
    fn upload(
        &self,
        files: Vec<UploadFile>,
    ) -> impl Future<Output = Result<Vec<FileDescriptor>, BackendError>> + Send;

    fn delete(&self, stored_name: &StoredName) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Talks to a running upload service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpBackend {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl DocumentBackend for HttpBackend {
    async fn upload(&self, files: Vec<UploadFile>) -> Result<Vec<FileDescriptor>, BackendError> {
        let mut form = reqwest::multipart::Form::new();
        for f in files {
            let part = reqwest::multipart::Part::bytes(f.data)
                .file_name(f.name)
                .mime_str(&f.content_type)?;
            form = form.part(UPLOAD_FIELD, part);
        }
        let resp = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    async fn delete(&self, stored_name: &StoredName) -> Result<(), BackendError> {
        let resp = self
            .client
            .delete(format!("{}/files/{}", self.base_url, stored_name))
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .json::<ErrorBody>()
        .await
        .map(|b| b.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}
