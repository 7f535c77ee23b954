use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Record;

/// Identity, optimistic version and bookkeeping shared by most records.
///
/// Not an entity by itself: compose it with `#[record(base)]`.
///
/// ```
/// use recordforge::{Record, StandardRecordBase};
///
/// #[derive(Record, Default, Clone)]
/// #[record(entity)]
/// struct Invoice {
///     #[record(base)]
///     base: StandardRecordBase,
///     number: String,
/// }
///
/// let schema = Invoice::schema();
/// assert_eq!(schema.supertype().unwrap().type_name(), "StandardRecordBase");
/// ```
#[derive(Record, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardRecordBase {
    #[record(id)]
    pub id: i64,
    #[record(version)]
    pub version: i64,
    #[record(non_updatable)]
    pub is_first_persist: bool,
    #[record(non_updatable)]
    pub created_at: DateTime<Utc>,
}

impl StandardRecordBase {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            is_first_persist: true,
            created_at: Utc::now(),
            ..Self::default()
        }
    }
}
