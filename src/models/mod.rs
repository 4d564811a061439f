pub mod document;
pub mod file;

pub use document::DocumentRecord;
pub use file::{DocumentId, FileDescriptor, InvalidStoredName, StoredName};
