//! Venue Phase (§4.5): extracts the venue and locality, optionally resolving
//! it against an already-persisted vertex so Assembly can reuse an id instead
//! of minting a duplicate.

use crate::base_phase::{call_vision, normalize_string, parse_model_json, run_phase};
use crate::external::{EntityService, KnowledgeBaseSearch, SearchOptions};
use crate::phases::{status_from_confidence, PhaseName, PhaseResult};
use crate::prompts::get_phase_prompt;
use crate::types::{Match, PosterType};
use poster_common::config::ExtractionConfig;
use poster_common::ids;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenuePayload {
    pub venue: Option<Match>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub theater_name: Option<String>,
    pub streaming_only: bool,
    pub existing_venue_id: Option<String>,
}

pub struct VenuePhase {
    vision: Arc<dyn crate::external::VisionProvider>,
    entity_service: Option<Arc<dyn EntityService>>,
    knowledge_base: Option<Arc<dyn KnowledgeBaseSearch>>,
}

impl VenuePhase {
    pub fn new(
        vision: Arc<dyn crate::external::VisionProvider>,
        entity_service: Option<Arc<dyn EntityService>>,
        knowledge_base: Option<Arc<dyn KnowledgeBaseSearch>>,
    ) -> Self {
        Self {
            vision,
            entity_service,
            knowledge_base,
        }
    }

    pub async fn execute(&self, poster_id: &str, image_path: &Path, poster_type: PosterType, config: &ExtractionConfig) -> PhaseResult {
        let path_str = image_path.display().to_string();
        run_phase(poster_id, &path_str, PhaseName::Venue, || self.run(poster_id, image_path, poster_type, config)).await
    }

    async fn run(&self, poster_id: &str, image_path: &Path, poster_type: PosterType, config: &ExtractionConfig) -> anyhow::Result<PhaseResult> {
        let start = Instant::now();
        let path_str = image_path.display().to_string();

        let prompt = get_phase_prompt(PhaseName::Venue, poster_type);
        let response = call_vision(self.vision.as_ref(), image_path, prompt).await?;
        let (obj, warning) = parse_model_json(&response.extracted_text);
        let mut warnings: Vec<String> = warning.into_iter().collect();

        let venue_name = normalize_string(obj.get("venue").and_then(|v| v.as_str()));
        let mut payload = VenuePayload {
            venue: venue_name.clone().map(|name| Match::new(name, 1.0, "vision")),
            city: normalize_string(obj.get("city").and_then(|v| v.as_str())),
            state: normalize_string(obj.get("state").and_then(|v| v.as_str())),
            country: normalize_string(obj.get("country").and_then(|v| v.as_str())),
            address: normalize_string(obj.get("address").and_then(|v| v.as_str())),
            district: normalize_string(obj.get("district").and_then(|v| v.as_str())),
            theater_name: normalize_string(obj.get("theater_name").and_then(|v| v.as_str())),
            streaming_only: obj.get("streaming_only").and_then(|v| v.as_bool()).unwrap_or(false),
            existing_venue_id: None,
        };

        if let Some(name) = &venue_name {
            payload.existing_venue_id = self.resolve_existing(name, config, &mut warnings).await;
        }

        let confidence = 0.5 * payload.venue.is_some() as u8 as f64
            + 0.3 * payload.city.is_some() as u8 as f64
            + 0.2 * payload.existing_venue_id.is_some() as u8 as f64;

        let needs_venue = poster_type.requires_venue();
        let status = status_from_confidence(confidence, 0.5, !needs_venue || payload.venue.is_some());

        Ok(PhaseResult {
            poster_id: poster_id.to_string(),
            image_path: path_str,
            phase: PhaseName::Venue,
            status,
            confidence,
            processing_time_ms: start.elapsed().as_millis() as u64,
            warnings,
            errors: Vec::new(),
            payload: Some(crate::phases::PhasePayload::Venue(payload)),
        })
    }

    /// Venues are addressed by the same deterministic, slug-prefixed id every
    /// other vertex uses, so "does this venue already exist" is a direct
    /// lookup rather than a fuzzy name search. When only knowledge-base search
    /// is wired up (no entity service), fall back to a similarity search
    /// against it instead.
    async fn resolve_existing(&self, name: &str, config: &ExtractionConfig, warnings: &mut Vec<String>) -> Option<String> {
        if let Some(entity_service) = &self.entity_service {
            let candidate_id = ids::entity_id("venue", name);
            return match entity_service.get_entity(&candidate_id).await {
                Ok(Some(record)) => Some(record.id),
                Ok(None) => None,
                Err(error) => {
                    warnings.push(format!("venue entity lookup failed: {error}"));
                    None
                }
            };
        }

        if let Some(kb) = &self.knowledge_base {
            let hits = kb
                .search(
                    name,
                    SearchOptions {
                        entity_types: vec!["Venue".to_string()],
                        limit: 1,
                    },
                )
                .await
                .unwrap_or_else(|error| {
                    warnings.push(format!("venue knowledge-base search failed: {error}"));
                    Vec::new()
                });
            if let Some(hit) = hits.into_iter().next() {
                if hit.score >= config.venue_dedup_threshold {
                    return Some(hit.id);
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_rewards_name_city_and_resolution() {
        let payload = VenuePayload {
            venue: Some(Match::new("The Club", 1.0, "vision")),
            city: Some("Springfield".to_string()),
            existing_venue_id: Some("venue:the-club".to_string()),
            ..Default::default()
        };
        let confidence =
            0.5 * payload.venue.is_some() as u8 as f64 + 0.3 * payload.city.is_some() as u8 as f64 + 0.2 * payload.existing_venue_id.is_some() as u8 as f64;
        assert_eq!(confidence, 1.0);
    }
}
