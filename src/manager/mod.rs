pub mod archivable;
pub mod generic;
pub mod store;

pub use archivable::ArchivableRecordManager;
pub use generic::GenericRecordManager;
pub use store::{InMemoryRecordStore, RecordStore};
