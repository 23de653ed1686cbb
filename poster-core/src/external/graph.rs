//! The persistence-side contracts: entity (vertex) and relation (edge)
//! services. Both are optional collaborators — Assembly and Venue degrade to
//! "nothing exists yet" when they are absent, which is what lets the core run
//! in a dry, dependency-free mode for testing.

use crate::types::Relationship;
use async_trait::async_trait;
use serde_json::Value;

/// A vertex already in the graph, as returned by [`EntityService::get_entity`].
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub id: String,
    pub entity_type: String,
    pub payload: Value,
}

/// A vertex to create. Creation is idempotent by id: a service implementation
/// must treat `create_entities` as "create if absent".
#[derive(Debug, Clone)]
pub struct EntityWrite {
    pub id: String,
    pub entity_type: String,
    pub payload: Value,
}

#[async_trait]
pub trait EntityService: Send + Sync {
    async fn get_entity(&self, id: &str) -> anyhow::Result<Option<EntityRecord>>;

    async fn create_entities(&self, entities: &[EntityWrite]) -> anyhow::Result<()>;
}

#[async_trait]
pub trait RelationService: Send + Sync {
    async fn create_relations(&self, relations: &[Relationship]) -> anyhow::Result<()>;
}
