//! Client side of the upload service. The registry mirrors server state
//! through a backend; the assistant client reaches the question-answering
//! service used by the chat view.

use crate::models::DocumentId;

/// Starts a real `HttpServer` on an ephemeral port for the closure's `App`
/// and yields `(base_url, handle)`.
#[cfg(test)]
macro_rules! spawn_server {
    ($factory:expr) => {{
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = actix_web::HttpServer::new($factory)
            .workers(1)
            .listen(listener)
            .unwrap()
            .run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (format!("http://127.0.0.1:{port}"), handle)
    }};
}

pub mod assistant;
pub mod backend;
pub mod registry;
pub mod simulated;

pub use assistant::{AssistantClient, AssistantError};
pub use backend::{BackendError, DocumentBackend, HttpBackend};
pub use registry::DocumentRegistry;
pub use simulated::SimulatedBackend;

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn pdf(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(name, "application/pdf", data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("upload failed: {0}")]
    Upload(#[source] BackendError),
    #[error("failed to delete {name}: {source}")]
    Delete { name: String, source: BackendError },
    #[error("document not found: {0}")]
    NotFound(DocumentId),
}
