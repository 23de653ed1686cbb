//! Local graph search: "have we seen something like this before". Consumed by
//! Type (to corroborate the classification), Venue (to dedup), and Event (to
//! sanity-check dates against other posters featuring the same artist/venue).

use crate::types::PosterType;
use async_trait::async_trait;

/// A previously ingested `Poster` entity the search judged similar.
#[derive(Debug, Clone)]
pub struct ScoredEntity {
    pub id: String,
    pub score: f64,
    pub poster_type: Option<PosterType>,
    pub observations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub entity_types: Vec<String>,
    pub limit: usize,
}

#[async_trait]
pub trait KnowledgeBaseSearch: Send + Sync {
    async fn search(&self, text: &str, options: SearchOptions) -> anyhow::Result<Vec<ScoredEntity>>;
}
