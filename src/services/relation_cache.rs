use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{Column, Relation, RelationKey};

/// Process-local cache of discovered relations.
/// Cloning shares the underlying maps.
///
/// Relations are keyed by their rendered name. A schema counts as listed
/// only once [`RelationCache::add_schema`] has been called for it; a single
/// relation inserted with [`RelationCache::insert`] does not list its schema.
#[derive(Debug, Clone, Default)]
pub struct RelationCache {
    relations: Arc<RwLock<HashMap<RelationKey, Relation>>>,
    schemas: Arc<RwLock<HashSet<String>>>,
}

impl RelationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a schema as fully listed. Its relations are served from the cache from now on.
    pub async fn add_schema(&self, schema: &str) {
        let mut schemas = self.schemas.write().await;
        if schemas.insert(schema.to_string()) {
            tracing::debug!("Cached schema {}", schema);
        }
    }

    pub async fn has_schema(&self, schema: &str) -> bool {
        self.schemas.read().await.contains(schema)
    }

    /// Insert or replace one relation without listing its schema
    pub async fn insert(&self, relation: Relation) {
        let key = relation.key();
        tracing::debug!("Caching relation {}", key);
        self.relations.write().await.insert(key, relation);
    }

    /// Insert or replace a relation from a full listing of its schema
    pub async fn add(&self, relation: Relation) {
        if let Some(schema) = relation.schema.as_deref() {
            self.add_schema(schema).await;
        }
        self.insert(relation).await;
    }

    pub async fn get(&self, key: &RelationKey) -> Option<Relation> {
        self.relations.read().await.get(key).cloned()
    }

    /// Cached entry rendering the same as `relation`
    pub async fn find(&self, relation: &Relation) -> Option<Relation> {
        self.get(&relation.key()).await
    }

    /// Relations cached under one schema, ordered by identifier
    pub async fn get_relations(&self, schema: &str) -> Vec<Relation> {
        let relations = self.relations.read().await;
        let mut found: Vec<Relation> = relations
            .values()
            .filter(|r| r.schema.as_deref() == Some(schema))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        found
    }

    /// Attach freshly discovered columns to a cached relation. Returns false
    /// when the relation is not cached.
    pub async fn update_columns(&self, key: &RelationKey, columns: Vec<Column>) -> bool {
        match self.relations.write().await.get_mut(key) {
            Some(relation) => {
                relation.columns = Some(columns);
                true
            }
            None => false,
        }
    }

    pub async fn drop(&self, key: &RelationKey) -> Option<Relation> {
        self.relations.write().await.remove(key)
    }

    pub async fn clear(&self) {
        self.relations.write().await.clear();
        self.schemas.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.relations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.relations.read().await.is_empty()
    }
}
