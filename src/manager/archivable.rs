use std::ops::Deref;
use std::sync::Arc;

use tracing::{Level, event, info_span};

use super::generic::GenericRecordManager;
use super::store::RecordStore;
use crate::core::{DataError, Result, Value};
use crate::metadata::{EntityMetadataCache, Record};

/// Record manager with toggle-based soft delete.
///
/// The flag is the descriptor's archive flag field. Archiving never trusts
/// the caller's copy: the stored record is re-read by identity and only the
/// flag changes.
#[derive(Debug)]
pub struct ArchivableRecordManager<T: Record + Clone> {
    inner: GenericRecordManager<T>,
    flag: String,
}

impl<T: Record + Clone> ArchivableRecordManager<T> {
    pub fn new(cache: Arc<EntityMetadataCache>, store: Arc<dyn RecordStore<T>>) -> Result<Self> {
        let inner = GenericRecordManager::new(cache, store)?;
        let flag = match inner.descriptor().archive_flag() {
            Some(flag) => flag.to_string(),
            None => return Err(DataError::NotArchivable(inner.descriptor().type_name().to_string())),
        };
        Ok(Self { inner, flag })
    }

    pub fn flag_field(&self) -> &str {
        &self.flag
    }

    pub fn is_archived(&self, record: &T) -> Result<bool> {
        let value = self.inner.descriptor().invoke_getter(record, &self.flag)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub fn archive(&self, record: &T) -> Result<T> {
        let _guard = info_span!("archive", entity = %self.inner.descriptor().type_name()).entered();
        self.toggle_one(record, true)
    }

    pub fn de_archive(&self, record: &T) -> Result<T> {
        let _guard = info_span!("de_archive", entity = %self.inner.descriptor().type_name()).entered();
        self.toggle_one(record, false)
    }

    /// Archives the stored counterparts of `records`. Ids with no stored
    /// record are left out of the result; repeated ids are handled once.
    pub fn archive_collection(&self, records: &[T]) -> Result<Vec<T>> {
        let _guard =
            info_span!("archive_collection", entity = %self.inner.descriptor().type_name()).entered();
        self.toggle_many(records, true)
    }

    pub fn de_archive_collection(&self, records: &[T]) -> Result<Vec<T>> {
        let _guard =
            info_span!("de_archive_collection", entity = %self.inner.descriptor().type_name())
                .entered();
        self.toggle_many(records, false)
    }

    fn toggle_one(&self, record: &T, archived: bool) -> Result<T> {
        let mut stored = self.inner.require_stored(record)?;
        self.set_flag(&mut stored, archived)?;
        self.inner.save(stored)
    }

    fn toggle_many(&self, records: &[T], archived: bool) -> Result<Vec<T>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.inner.distinct_id_list(records)?;
        let mut stored = self.inner.find_all_by_id(&ids)?;
        if stored.len() < ids.len() {
            let found = self.inner.id_list(&stored)?;
            let missing: Vec<&Value> = ids.iter().filter(|id| !found.contains(id)).collect();
            event!(
                Level::WARN,
                entity = %self.inner.descriptor().type_name(),
                missing = ?missing,
                "archive requested for ids with no stored record"
            );
        }

        for record in &mut stored {
            self.set_flag(record, archived)?;
        }
        self.inner.save_all(stored)
    }

    fn set_flag(&self, record: &mut T, archived: bool) -> Result<()> {
        self.inner
            .descriptor()
            .invoke_setter(record, &self.flag, Value::Boolean(archived))
    }
}

impl<T: Record + Clone> Deref for ArchivableRecordManager<T> {
    type Target = GenericRecordManager<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataLayerConfig;
    use crate::manager::store::InMemoryRecordStore;
    use crate::metadata::{FieldSchema, TypeSchema};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Doc {
        id: i64,
        title: String,
        hidden: bool,
    }

    impl Record for Doc {
        fn schema() -> TypeSchema {
            TypeSchema::builder::<Self>("Doc")
                .entity()
                .zero_with(Self::default)
                .field(FieldSchema::of::<i64>("id").identity())
                .accessors::<i64>("id", |r| &r.id, |r| &mut r.id)
                .field(FieldSchema::of::<String>("title"))
                .accessors::<String>("title", |r| &r.title, |r| &mut r.title)
                .field(FieldSchema::of::<bool>("hidden").archive_flag())
                .accessors::<bool>("hidden", |r| &r.hidden, |r| &mut r.hidden)
                .build()
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Plain {
        id: i64,
    }

    impl Record for Plain {
        fn schema() -> TypeSchema {
            TypeSchema::builder::<Self>("Plain")
                .entity()
                .zero_with(Self::default)
                .field(FieldSchema::of::<i64>("id").identity())
                .accessors::<i64>("id", |r| &r.id, |r| &mut r.id)
                .build()
        }
    }

    fn cache() -> Arc<EntityMetadataCache> {
        Arc::new(
            EntityMetadataCache::build(
                DataLayerConfig::default(),
                vec![Doc::schema(), Plain::schema()],
            )
            .unwrap(),
        )
    }

    fn doc_manager() -> ArchivableRecordManager<Doc> {
        let cache = cache();
        let store = Arc::new(InMemoryRecordStore::<Doc>::new(
            cache.descriptor_of::<Doc>().unwrap(),
        ));
        ArchivableRecordManager::new(cache, store).unwrap()
    }

    #[test]
    fn test_uses_marked_flag_field() {
        let manager = doc_manager();
        assert_eq!(manager.flag_field(), "hidden");

        let stored = manager
            .save(Doc {
                id: 1,
                title: "stored".into(),
                hidden: false,
            })
            .unwrap();
        let stale = Doc {
            title: "caller copy".into(),
            ..stored.clone()
        };

        let archived = manager.archive(&stale).unwrap();
        assert!(archived.hidden);
        assert_eq!(archived.title, "stored");
        assert!(manager.is_archived(&archived).unwrap());
    }

    #[test]
    fn test_type_without_flag_is_rejected() {
        let cache = cache();
        let store = Arc::new(InMemoryRecordStore::<Plain>::new(
            cache.descriptor_of::<Plain>().unwrap(),
        ));
        assert!(matches!(
            ArchivableRecordManager::new(cache, store),
            Err(DataError::NotArchivable(name)) if name == "Plain"
        ));
    }

    #[test]
    fn test_empty_collection_is_a_no_op() {
        let manager = doc_manager();
        assert!(manager.archive_collection(&[]).unwrap().is_empty());
        assert!(manager.de_archive_collection(&[]).unwrap().is_empty());
    }
}
