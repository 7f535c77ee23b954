use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{Level, event, info_span};

use super::entity::EntityDescriptor;
use super::schema::TypeSchema;
use crate::config::DataLayerConfig;
use crate::core::{DataError, Result};
use crate::query::RepositorySurface;

/// Registry of entity descriptors keyed by record type name.
///
/// Populated once at startup from the discovered record types, then only
/// read. Managers hold it behind an `Arc`.
#[derive(Debug)]
pub struct EntityMetadataCache {
    config: DataLayerConfig,
    entities: HashMap<String, Arc<EntityDescriptor>>,
    by_type: HashMap<TypeId, String>,
    /// Registration order, for deterministic iteration.
    order: Vec<String>,
}

impl EntityMetadataCache {
    pub fn new(config: DataLayerConfig) -> Self {
        Self {
            config,
            entities: HashMap::new(),
            by_type: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn build<I>(config: DataLayerConfig, types: I) -> Result<Self>
    where
        I: IntoIterator<Item = TypeSchema>,
    {
        let mut cache = Self::new(config);
        cache.init(types)?;
        Ok(cache)
    }

    /// Builds descriptors for every persistable type in `types`.
    ///
    /// All-or-nothing: if any descriptor fails, nothing is registered. Types
    /// already in the cache are skipped.
    pub fn init<I>(&mut self, types: I) -> Result<()>
    where
        I: IntoIterator<Item = TypeSchema>,
    {
        let span = info_span!("metadata_cache.init");
        let _guard = span.enter();

        let mut staged: Vec<EntityDescriptor> = Vec::new();
        for schema in types {
            if !schema.is_persistable() {
                event!(Level::DEBUG, record = %schema.type_name(), "skipping non-persistable type");
                continue;
            }

            let type_id = schema.type_id();
            if self.by_type.contains_key(&type_id) || staged.iter().any(|d| d.type_id() == type_id) {
                continue;
            }

            let name = schema.type_name();
            if self.entities.contains_key(name) || staged.iter().any(|d| d.type_name() == name) {
                let err = DataError::ConflictingEntityName(name.to_string());
                event!(Level::ERROR, error = %err, "metadata cache build failed");
                return Err(err);
            }

            match EntityDescriptor::build(&schema, &self.config) {
                Ok(descriptor) => staged.push(descriptor),
                Err(err) => {
                    event!(Level::ERROR, record = %name, error = %err, "metadata cache build failed");
                    return Err(err);
                }
            }
        }

        for descriptor in staged {
            let name = descriptor.type_name().to_string();
            self.by_type.insert(descriptor.type_id(), name.clone());
            self.order.push(name.clone());
            self.entities.insert(name, Arc::new(descriptor));
        }

        event!(Level::INFO, entities = self.entities.len(), "metadata cache initialised");
        Ok(())
    }

    pub fn config(&self) -> &DataLayerConfig {
        &self.config
    }

    pub fn get(&self, type_name: &str) -> Result<Arc<EntityDescriptor>> {
        self.entities
            .get(type_name)
            .cloned()
            .ok_or_else(|| DataError::UnknownEntity(type_name.to_string()))
    }

    pub fn descriptor_of<T: Any>(&self) -> Result<Arc<EntityDescriptor>> {
        match self.by_type.get(&TypeId::of::<T>()) {
            Some(name) => self.get(name),
            None => Err(DataError::UnknownEntity(
                std::any::type_name::<T>().to_string(),
            )),
        }
    }

    pub fn all_entities(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.order.iter().filter_map(|name| self.entities.get(name))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entities.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Synthesizes the repository surface of every cached entity.
    pub fn repository_surfaces(&self) -> Result<Vec<RepositorySurface>> {
        self.all_entities()
            .map(|descriptor| RepositorySurface::synthesize(descriptor, &self.config))
            .collect()
    }
}

/// First-use guarded cache for callers that may race to initialise it.
#[derive(Debug, Default)]
pub struct SharedMetadataCache {
    cell: OnceCell<Arc<EntityMetadataCache>>,
}

impl SharedMetadataCache {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Runs `discover` and builds the cache on first call; later calls (and
    /// concurrent losers) receive the same instance. A failed build leaves
    /// the cell empty.
    pub fn get_or_init<F>(&self, config: DataLayerConfig, discover: F) -> Result<Arc<EntityMetadataCache>>
    where
        F: FnOnce() -> Vec<TypeSchema>,
    {
        self.cell
            .get_or_try_init(|| EntityMetadataCache::build(config, discover()).map(Arc::new))
            .cloned()
    }

    pub fn get(&self) -> Option<Arc<EntityMetadataCache>> {
        self.cell.get().cloned()
    }
}
