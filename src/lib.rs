// ============================================================================
// recordforge
// ============================================================================

//! Declarative lookup synthesis and cached record metadata for generic CRUD.
//!
//! Record types describe themselves through [`Record`] (usually derived).
//! [`EntityMetadataCache`] turns those descriptions into classified,
//! accessor-bound [`EntityDescriptor`]s once at startup; the query module
//! compiles resolver, field lookup and fuzzy search declarations into
//! [`QueryDefinition`]s; the managers run generic CRUD and soft delete on
//! top of a [`RecordStore`].
//!
//! ```
//! use std::sync::Arc;
//! use recordforge::prelude::*;
//!
//! #[derive(Record, Debug, Clone, Default)]
//! #[record(entity, archivable)]
//! #[record(resolver(name = "by_title", args("title")))]
//! struct Post {
//!     #[record(id)]
//!     id: i64,
//!     #[record(fuzzy_search)]
//!     title: String,
//!     is_archived: bool,
//! }
//!
//! # fn main() -> recordforge::Result<()> {
//! let cache = Arc::new(EntityMetadataCache::build(
//!     DataLayerConfig::default(),
//!     vec![Post::schema()],
//! )?);
//!
//! let surface = &cache.repository_surfaces()?[0];
//! assert_eq!(
//!     surface.definition("by_title").map(|d| d.query_string.as_str()),
//!     Some("SELECT p FROM Post p WHERE p.title = :title")
//! );
//!
//! let store = Arc::new(InMemoryRecordStore::<Post>::new(cache.descriptor_of::<Post>()?));
//! let posts = ArchivableRecordManager::<Post>::new(cache, store)?;
//! let saved = posts.save(Post { id: 1, title: "hello".into(), ..Post::default() })?;
//! assert!(posts.archive(&saved)?.is_archived);
//! # Ok(())
//! # }
//! ```

extern crate self as recordforge;

pub mod base;
pub mod config;
pub mod core;
pub mod manager;
pub mod metadata;
pub mod prelude;
pub mod query;

pub use base::StandardRecordBase;
pub use config::DataLayerConfig;
pub use crate::core::{DataError, FieldValue, Result, SpecificationError, TypeKind, TypeRef, Value};
pub use manager::{ArchivableRecordManager, GenericRecordManager, InMemoryRecordStore, RecordStore};
pub use metadata::{
    EntityDescriptor, EntityMetadataCache, FieldDescriptor, FieldSchema, Record,
    SharedMetadataCache, TypeSchema,
};
pub use query::{
    FuzzySearchSynthesizer, QueryDefinition, QueryKind, QueryParameter, QuerySpecSynthesizer,
    QuerySpecification, RepositorySurface, ReturnShape,
};

/// `#[derive(Record)]`; see the `recordforge_derive` crate for attributes.
pub use recordforge_derive::Record;

#[doc(hidden)]
pub mod __private {
    //! Support items for `#[derive(Record)]` expansions.

    use std::marker::PhantomData;

    /// Method resolution picks `ZeroViaDefault` when `T: Default` and falls
    /// back to `ZeroUnavailable` through the extra reference otherwise.
    pub struct ZeroSource<T>(PhantomData<fn() -> T>);

    impl<T> ZeroSource<T> {
        pub fn new() -> Self {
            Self(PhantomData)
        }
    }

    impl<T> Default for ZeroSource<T> {
        fn default() -> Self {
            Self::new()
        }
    }

    pub trait ZeroViaDefault<T> {
        fn zero_constructor(&self) -> Option<fn() -> T>;
    }

    impl<T: Default> ZeroViaDefault<T> for ZeroSource<T> {
        fn zero_constructor(&self) -> Option<fn() -> T> {
            Some(T::default)
        }
    }

    pub trait ZeroUnavailable<T> {
        fn zero_constructor(&self) -> Option<fn() -> T>;
    }

    impl<T> ZeroUnavailable<T> for &ZeroSource<T> {
        fn zero_constructor(&self) -> Option<fn() -> T> {
            None
        }
    }
}
