use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::{Result, Value};
use crate::metadata::EntityDescriptor;

/// Storage collaborator the record managers persist through.
///
/// Records are keyed by the identity value their descriptor extracts.
pub trait RecordStore<T>: Send + Sync {
    fn find_by_id(&self, id: &Value) -> Result<Option<T>>;

    /// Records for the ids that exist; missing ids are skipped.
    fn find_all_by_id(&self, ids: &[Value]) -> Result<Vec<T>>;

    fn save(&self, record: T) -> Result<T>;

    fn save_all(&self, records: Vec<T>) -> Result<Vec<T>>;
}

/// Map-backed store, mostly useful in tests and examples.
pub struct InMemoryRecordStore<T> {
    descriptor: Arc<EntityDescriptor>,
    rows: RwLock<HashMap<Value, T>>,
}

impl<T> InMemoryRecordStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(descriptor: Arc<EntityDescriptor>) -> Self {
        Self {
            descriptor,
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.rows.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl<T> RecordStore<T> for InMemoryRecordStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn find_by_id(&self, id: &Value) -> Result<Option<T>> {
        let rows = self.rows.read()?;
        Ok(rows.get(id).cloned())
    }

    fn find_all_by_id(&self, ids: &[Value]) -> Result<Vec<T>> {
        let rows = self.rows.read()?;
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    fn save(&self, record: T) -> Result<T> {
        let id = self.descriptor.identity_of(&record)?;
        self.rows.write()?.insert(id, record.clone());
        Ok(record)
    }

    fn save_all(&self, records: Vec<T>) -> Result<Vec<T>> {
        let keyed = records
            .into_iter()
            .map(|record| Ok((self.descriptor.identity_of(&record)?, record)))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = self.rows.write()?;
        Ok(keyed
            .into_iter()
            .map(|(id, record)| {
                rows.insert(id, record.clone());
                record
            })
            .collect())
    }
}
