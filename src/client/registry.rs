use super::backend::DocumentBackend;
use super::{ClientError, UploadFile};
use crate::models::{DocumentId, DocumentRecord};

/// Local, ordered mirror of the documents the server holds.
///
/// Records are appended from upload responses and removed only after the
/// server confirms a delete. The full list is never re-fetched, so changes
/// made by other clients are not seen here.
pub struct DocumentRegistry<B> {
    backend: B,
    documents: Vec<DocumentRecord>,
}

impl<B: DocumentBackend> DocumentRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            documents: Vec::new(),
        }
    }

    /// Starts from an already known list. Later duplicates of an id are dropped.
    pub fn with_documents(backend: B, documents: Vec<DocumentRecord>) -> Self {
        let mut registry = Self::new(backend);
        registry.append(documents);
        registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn list_documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn get_document(&self, id: &DocumentId) -> Option<&DocumentRecord> {
        self.documents.iter().find(|d| &d.id == id)
    }

    /// Uploads `files` and returns the records that were added.
    pub async fn upload_documents(
        &mut self,
        files: Vec<UploadFile>,
    ) -> Result<Vec<DocumentRecord>, ClientError> {
        let count = files.len();
        let descriptors = self.backend.upload(files).await.map_err(|e| {
            log::error!("Error uploading {count} documents: {e}");
            ClientError::Upload(e)
        })?;
        let records = descriptors.into_iter().map(DocumentRecord::from).collect();
        Ok(self.append(records))
    }

    /// Deletes the document on the server, then drops the local record.
    /// Local state is untouched if the server does not confirm.
    pub async fn delete_document(&mut self, id: &DocumentId) -> Result<(), ClientError> {
        let Some(pos) = self.documents.iter().position(|d| &d.id == id) else {
            log::error!("Error deleting document: no document with id {id}");
            return Err(ClientError::NotFound(id.clone()));
        };
        let record = &self.documents[pos];
        if let Err(source) = self.backend.delete(&record.stored_name).await {
            log::error!("Error deleting document {:?}: {source}", record.name);
            return Err(ClientError::Delete {
                name: record.name.clone(),
                source,
            });
        }
        self.documents.remove(pos);
        Ok(())
    }

    fn append(&mut self, records: Vec<DocumentRecord>) -> Vec<DocumentRecord> {
        let mut added = Vec::with_capacity(records.len());
        for record in records {
            if self.get_document(&record.id).is_some() {
                log::warn!("ignoring duplicate document id {}", record.id);
                continue;
            }
            self.documents.push(record.clone());
            added.push(record);
        }
        added
    }
}
