//! Entity name cache
//!
//! Maps series ids to their hierarchy-qualified display titles. The map is
//! written only when the entity tree is refreshed and read by every query
//! target, so a single mutex around the whole map is sufficient.
//!
//! # Staleness policy
//!
//! A refresh that fails, or that returns no entities, keeps the previous
//! mapping. Stale titles are preferred over raw ids.

use super::flatten;
use crate::backend::Backend;
use crate::types::FlatEntity;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Thread-safe id -> display title cache
#[derive(Debug, Default)]
pub struct EntityCache {
    names: Mutex<HashMap<String, String>>,
}

impl EntityCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the mapping with `entities`
    ///
    /// The first title seen for a duplicated id wins. An empty slice leaves
    /// the current mapping untouched.
    pub fn rebuild(&self, entities: &[FlatEntity]) {
        if entities.is_empty() {
            return;
        }

        let mut names = HashMap::with_capacity(entities.len());
        for entity in entities {
            names
                .entry(entity.id.clone())
                .or_insert_with(|| entity.display_title.clone());
        }

        *self.names.lock() = names;
    }

    /// Display title of a series, if cached
    pub fn lookup(&self, id: &str) -> Option<String> {
        self.names.lock().get(id).cloned()
    }

    /// Number of cached titles
    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    /// Whether the cache holds no titles
    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }

    /// Fetch the entity tree, flatten it and rebuild the cache
    ///
    /// Returns the flattened entities. On backend failure the error is
    /// logged, the cache is left as it was and an empty list is returned.
    pub async fn refresh(&self, backend: &dyn Backend) -> Vec<FlatEntity> {
        let roots = match backend.fetch_entities().await {
            Ok(roots) => roots,
            Err(e) => {
                warn!(error = %e, "Entity refresh failed, keeping cached titles");
                return Vec::new();
            },
        };

        let entities = flatten(&roots);
        self.rebuild(&entities);
        debug!(entities = entities.len(), "Entity cache refreshed");

        entities
    }
}
