//! Everything an application needs to declare records and manage them.

pub use crate::{
    ArchivableRecordManager, DataError, DataLayerConfig, EntityMetadataCache,
    GenericRecordManager, InMemoryRecordStore, Record, RecordStore, RepositorySurface,
    SharedMetadataCache, StandardRecordBase, Value,
};
