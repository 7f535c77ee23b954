use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{Level, event};

use super::store::RecordStore;
use crate::core::{DataError, Result, Value};
use crate::metadata::{EntityDescriptor, EntityMetadataCache, Record};

/// Generic CRUD over one record type, driven by its cached descriptor.
///
/// Holds no record instances; every read and write goes through the store.
pub struct GenericRecordManager<T: Record + Clone> {
    cache: Arc<EntityMetadataCache>,
    descriptor: Arc<EntityDescriptor>,
    store: Arc<dyn RecordStore<T>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record + Clone> GenericRecordManager<T> {
    /// Fails with `UnknownEntity` when `T` is not in the cache.
    pub fn new(cache: Arc<EntityMetadataCache>, store: Arc<dyn RecordStore<T>>) -> Result<Self> {
        let descriptor = cache.descriptor_of::<T>()?;
        Ok(Self {
            cache,
            descriptor,
            store,
            _record: PhantomData,
        })
    }

    pub fn cache(&self) -> &Arc<EntityMetadataCache> {
        &self.cache
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    pub fn store(&self) -> &Arc<dyn RecordStore<T>> {
        &self.store
    }

    pub fn find_by_id(&self, id: impl Into<Value>) -> Result<Option<T>> {
        self.store.find_by_id(&id.into())
    }

    /// Stored records for `ids`, each at most once, in first-occurrence order.
    pub fn find_all_by_id(&self, ids: &[Value]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.store.find_all_by_id(&distinct_ids(ids))
    }

    pub fn save(&self, record: T) -> Result<T> {
        let saved = self.store.save(record)?;
        event!(Level::DEBUG, entity = %self.descriptor.type_name(), "record saved");
        Ok(saved)
    }

    pub fn save_all(&self, records: Vec<T>) -> Result<Vec<T>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let saved = self.store.save_all(records)?;
        event!(
            Level::DEBUG,
            entity = %self.descriptor.type_name(),
            count = saved.len(),
            "records saved"
        );
        Ok(saved)
    }

    pub fn identity_of(&self, record: &T) -> Result<Value> {
        self.descriptor.identity_of(record)
    }

    pub fn id_list(&self, records: &[T]) -> Result<Vec<Value>> {
        records.iter().map(|record| self.identity_of(record)).collect()
    }

    /// Like `id_list`, with repeated identities dropped.
    pub fn distinct_id_list(&self, records: &[T]) -> Result<Vec<Value>> {
        Ok(distinct_ids(&self.id_list(records)?))
    }

    /// A fresh copy of the type's zero instance.
    pub fn instantiate(&self) -> Result<T> {
        self.descriptor
            .zero_instance::<T>()
            .cloned()
            .ok_or_else(|| {
                DataError::TypeMismatch(format!(
                    "zero instance of {} is not a {}",
                    self.descriptor.type_name(),
                    std::any::type_name::<T>()
                ))
            })
    }

    /// Copies every cascade-updatable field of `patch` that is not null onto
    /// the stored record with the same identity, then saves it.
    pub fn cascade_update(&self, patch: &T) -> Result<T> {
        let mut stored = self.require_stored(patch)?;
        for field in self.descriptor.cascade_updatable_fields() {
            let value = self.descriptor.invoke_getter(patch, field)?;
            if value.is_null() {
                continue;
            }
            self.descriptor.invoke_setter(&mut stored, field, value)?;
        }
        self.save(stored)
    }

    /// Re-reads the stored record carrying `record`'s identity.
    pub(crate) fn require_stored(&self, record: &T) -> Result<T> {
        let id = self.identity_of(record)?;
        match self.store.find_by_id(&id)? {
            Some(stored) => Ok(stored),
            None => Err(DataError::EntityNotFound {
                entity: self.descriptor.type_name().to_string(),
                id,
            }),
        }
    }
}

fn distinct_ids(ids: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
}

impl<T: Record + Clone> fmt::Debug for GenericRecordManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericRecordManager")
            .field("entity", &self.descriptor.type_name())
            .finish()
    }
}
