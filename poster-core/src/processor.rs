//! Iterative Processor (§4.9): the top-level orchestrator. Wires the six
//! phases together in their fixed order, owns the `PhaseManager`, and exposes
//! the single-image and batch entry points the embedding application calls.

use crate::context::PhaseManager;
use crate::error::CoreError;
use crate::external::{ArtistAuthority, EntityService, FilmAuthority, KnowledgeBaseSearch, ReleaseAuthority, RelationService, SecondaryMusicAuthority, VisionProvider};
use crate::phases::artist_phase::{ArtistPayload, ArtistPhase};
use crate::phases::assembly::{Assembly, AssemblyPayload};
use crate::phases::enrichment::{Enrichment, EnrichmentPayload};
use crate::phases::event_phase::{EventPayload, EventPhase};
use crate::phases::type_phase::{TypePayload, TypePhase};
use crate::phases::venue_phase::{VenuePayload, VenuePhase};
use crate::phases::{PhaseName, PhasePayload, PhaseResult, PhaseStatus};
use crate::types::PosterEntity;
use poster_common::config::ExtractionConfig;
use poster_common::ids;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Every optional collaborator the processor wires into its phases. All
/// fields besides `vision` may be absent — the core then runs in a "dry"
/// mode, degrading each phase's confidence rather than failing.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub entity_service: Option<Arc<dyn EntityService>>,
    pub relation_service: Option<Arc<dyn RelationService>>,
    pub knowledge_base: Option<Arc<dyn KnowledgeBaseSearch>>,
    pub artist_authority: Option<Arc<dyn ArtistAuthority>>,
    pub release_authority: Option<Arc<dyn ReleaseAuthority>>,
    pub secondary_authority: Option<Arc<dyn SecondaryMusicAuthority>>,
    pub film_authority: Option<Arc<dyn FilmAuthority>>,
}

/// Outcome of processing one image. Always returned, never a raised error —
/// callers inspect `success`, `fields_needing_review`, and `overall_confidence`.
#[derive(Debug, Clone)]
pub struct IterativeProcessingResult {
    pub poster_id: String,
    pub image_path: String,
    pub success: bool,
    pub poster: Option<PosterEntity>,
    pub phase_results: Vec<(PhaseName, PhaseResult)>,
    pub overall_confidence: f64,
    pub fields_needing_review: Vec<String>,
    pub cause: Option<String>,
}

impl IterativeProcessingResult {
    fn image_unavailable(image_path: &Path, cause: impl Into<String>) -> Self {
        Self {
            poster_id: String::new(),
            image_path: image_path.display().to_string(),
            success: false,
            poster: None,
            phase_results: Vec::new(),
            overall_confidence: 0.0,
            fields_needing_review: Vec::new(),
            cause: Some(cause.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
    pub by_poster_type: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub results: Vec<IterativeProcessingResult>,
    pub summary: BatchSummary,
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub vision: bool,
    pub validators: HashMap<String, bool>,
}

pub struct IterativeProcessor {
    collaborators: Collaborators,
    config: ExtractionConfig,
    manager: PhaseManager,
    type_phase: TypePhase,
    artist_phase: ArtistPhase,
    venue_phase: VenuePhase,
    event_phase: EventPhase,
    assembly: Assembly,
    enrichment: Enrichment,
    vision: Arc<dyn VisionProvider>,
}

impl IterativeProcessor {
    pub fn new(vision: Arc<dyn VisionProvider>, collaborators: Collaborators, config: ExtractionConfig) -> Self {
        let type_phase = TypePhase::new(vision.clone(), collaborators.knowledge_base.clone());
        let artist_phase = ArtistPhase::new(vision.clone(), collaborators.artist_authority.clone());
        let venue_phase = VenuePhase::new(vision.clone(), collaborators.entity_service.clone(), collaborators.knowledge_base.clone());
        let event_phase = EventPhase::new(vision.clone(), collaborators.knowledge_base.clone());
        let assembly = Assembly::new(collaborators.entity_service.clone(), collaborators.relation_service.clone());
        let enrichment = Enrichment::new(
            collaborators.film_authority.clone(),
            collaborators.artist_authority.clone(),
            collaborators.release_authority.clone(),
            collaborators.secondary_authority.clone(),
        );

        Self {
            collaborators,
            config,
            manager: PhaseManager::new(),
            type_phase,
            artist_phase,
            venue_phase,
            event_phase,
            assembly,
            enrichment,
            vision,
        }
    }

    /// Reinstantiate every phase executor against a new vision provider,
    /// preserving referential purity within any session already in flight
    /// (none should be, since processing is cooperative and sequential).
    pub fn switch_vision_model(&mut self, vision: Arc<dyn VisionProvider>) {
        self.vision = vision.clone();
        self.type_phase = TypePhase::new(vision.clone(), self.collaborators.knowledge_base.clone());
        self.artist_phase = ArtistPhase::new(vision.clone(), self.collaborators.artist_authority.clone());
        self.venue_phase = VenuePhase::new(vision.clone(), self.collaborators.entity_service.clone(), self.collaborators.knowledge_base.clone());
        self.event_phase = EventPhase::new(vision, self.collaborators.knowledge_base.clone());
    }

    pub async fn health_check(&self) -> HealthStatus {
        let mut validators = HashMap::new();
        if let Some(service) = &self.collaborators.entity_service {
            validators.insert("entity_service".to_string(), service.get_entity("health:probe").await.is_ok());
        }
        if let Some(kb) = &self.collaborators.knowledge_base {
            validators.insert(
                "knowledge_base".to_string(),
                kb.search("health", crate::external::SearchOptions::default()).await.is_ok(),
            );
        }
        HealthStatus {
            vision: self.vision.health_check().await,
            validators,
        }
    }

    pub async fn process(&self, image_path: &Path, cancellation: &CancellationToken) -> IterativeProcessingResult {
        let image_bytes = match tokio::fs::read(image_path).await {
            Ok(bytes) => bytes,
            Err(error) => {
                let cause = CoreError::ImageUnavailable(error.to_string());
                return IterativeProcessingResult::image_unavailable(image_path, cause.to_string());
            }
        };
        let poster_id = ids::poster_id_from_bytes(&image_bytes);
        let session_id = self.manager.create_context(image_path.display().to_string(), poster_id.clone());

        let result = self.run_session(&session_id, &poster_id, image_path, cancellation).await;
        self.manager.remove(&session_id);
        result
    }

    async fn run_session(&self, session_id: &str, poster_id: &str, image_path: &Path, cancellation: &CancellationToken) -> IterativeProcessingResult {
        let path_str = image_path.display().to_string();
        let mut phase_results: Vec<(PhaseName, PhaseResult)> = Vec::new();

        let type_result = self.with_timeout(PhaseName::Type, poster_id, &path_str, self.type_phase.execute(poster_id, image_path, &self.config)).await;
        self.manager.store_result(session_id, PhaseName::Type, type_result.clone());
        let type_payload = payload_of::<TypePayload>(&type_result, |p| match p {
            PhasePayload::Type(t) => Some(t.clone()),
            _ => None,
        });
        phase_results.push((PhaseName::Type, type_result.clone()));

        if !type_result.status.is_successful() {
            // Type is a hard dependency: its failure short-circuits the run.
            return self.finalize(session_id, poster_id, &path_str, phase_results, None, "type phase failed".to_string());
        }
        let type_payload = type_payload.unwrap_or_default();
        self.manager.update_hints(session_id, |hints| {
            hints.primary_poster_type = Some(type_payload.poster_type);
            hints.extracted_text = Some(type_payload.extracted_text.clone());
        });

        if cancellation.is_cancelled() {
            return self.finalize(session_id, poster_id, &path_str, phase_results, None, CoreError::Cancelled.to_string());
        }

        let artist_result = self
            .with_timeout(
                PhaseName::Artist,
                poster_id,
                &path_str,
                self.artist_phase.execute(poster_id, image_path, type_payload.poster_type),
            )
            .await;
        self.manager.store_result(session_id, PhaseName::Artist, artist_result.clone());
        let artist_payload = payload_of::<ArtistPayload>(&artist_result, |p| match p {
            PhasePayload::Artist(a) => Some(a.clone()),
            _ => None,
        })
        .unwrap_or_default();
        phase_results.push((PhaseName::Artist, artist_result));

        if cancellation.is_cancelled() {
            return self.finalize(session_id, poster_id, &path_str, phase_results, None, CoreError::Cancelled.to_string());
        }

        let venue_result = self
            .with_timeout(
                PhaseName::Venue,
                poster_id,
                &path_str,
                self.venue_phase.execute(poster_id, image_path, type_payload.poster_type, &self.config),
            )
            .await;
        self.manager.store_result(session_id, PhaseName::Venue, venue_result.clone());
        let venue_payload = payload_of::<VenuePayload>(&venue_result, |p| match p {
            PhasePayload::Venue(v) => Some(v.clone()),
            _ => None,
        })
        .unwrap_or_default();
        phase_results.push((PhaseName::Venue, venue_result));

        if cancellation.is_cancelled() {
            return self.finalize(session_id, poster_id, &path_str, phase_results, None, CoreError::Cancelled.to_string());
        }

        let headliner_hint = artist_payload.headliner.as_ref().map(|m| m.display_name().to_string());
        let venue_hint = venue_payload.venue.as_ref().map(|m| m.display_name().to_string());
        let event_result = self
            .with_timeout(
                PhaseName::Event,
                poster_id,
                &path_str,
                self.event_phase.execute(
                    poster_id,
                    image_path,
                    type_payload.poster_type,
                    headliner_hint.as_deref(),
                    venue_hint.as_deref(),
                    &self.config,
                ),
            )
            .await;
        self.manager.store_result(session_id, PhaseName::Event, event_result.clone());
        let event_payload = payload_of::<EventPayload>(&event_result, |p| match p {
            PhasePayload::Event(e) => Some(e.clone()),
            _ => None,
        })
        .unwrap_or_default();
        phase_results.push((PhaseName::Event, event_result.clone()));

        let vision_model = self.vision.info().name;
        let assembly_result = self
            .assembly
            .execute(
                poster_id,
                &path_str,
                &vision_model,
                phase_results.iter().find(|(p, _)| *p == PhaseName::Type).map(|(_, r)| r).unwrap(),
                &type_payload,
                phase_results.iter().find(|(p, _)| *p == PhaseName::Artist).map(|(_, r)| r).unwrap(),
                &artist_payload,
                phase_results.iter().find(|(p, _)| *p == PhaseName::Venue).map(|(_, r)| r).unwrap(),
                &venue_payload,
                &event_result,
                &event_payload,
            )
            .await;
        self.manager.store_result(session_id, PhaseName::Assembly, assembly_result.clone());
        let assembly_payload = payload_of::<AssemblyPayload>(&assembly_result, |p| match p {
            PhasePayload::Assembly(a) => Some(a.clone()),
            _ => None,
        });
        phase_results.push((PhaseName::Assembly, assembly_result.clone()));

        let mut poster = assembly_payload.map(|a| a.poster);

        if let Some(poster_ref) = &poster {
            let enrichment_result = self.enrichment.execute(poster_id, &path_str, poster_ref, &artist_payload, &self.config).await;
            self.manager.store_result(session_id, PhaseName::Enrichment, enrichment_result.clone());
            let enrichment_payload = payload_of::<EnrichmentPayload>(&enrichment_result, |p| match p {
                PhasePayload::Enrichment(e) => Some(e.clone()),
                _ => None,
            });
            phase_results.push((PhaseName::Enrichment, enrichment_result));

            if let (Some(poster_mut), Some(enrichment)) = (&mut poster, enrichment_payload) {
                apply_enrichment(poster_mut, &enrichment);
            }
        }

        let cause = if assembly_result.status == PhaseStatus::Failed {
            Some("assembly failed".to_string())
        } else {
            None
        };

        self.finalize(session_id, poster_id, &path_str, phase_results, poster, cause.unwrap_or_default())
    }

    fn finalize(
        &self,
        session_id: &str,
        poster_id: &str,
        image_path: &str,
        phase_results: Vec<(PhaseName, PhaseResult)>,
        poster: Option<PosterEntity>,
        cause: String,
    ) -> IterativeProcessingResult {
        let overall_confidence = self.manager.overall_confidence(session_id);
        let fields_needing_review = self.manager.fields_needing_review(session_id);
        let success = poster.is_some() && phase_results.iter().all(|(p, r)| !p.is_hard_dependency() || r.status.is_successful());

        IterativeProcessingResult {
            poster_id: poster_id.to_string(),
            image_path: image_path.to_string(),
            success,
            poster,
            phase_results,
            overall_confidence,
            fields_needing_review,
            cause: if cause.is_empty() { None } else { Some(cause) },
        }
    }

    /// Wrap a phase call with its configured per-call timeout. A timed-out
    /// phase yields the same `failed` envelope a thrown error would.
    async fn with_timeout<F>(&self, phase: PhaseName, poster_id: &str, image_path: &str, future: F) -> PhaseResult
    where
        F: std::future::Future<Output = PhaseResult>,
    {
        let start = Instant::now();
        match tokio::time::timeout(Duration::from_millis(self.config.phase_timeout_ms), future).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(phase = phase.as_str(), poster_id, "phase timed out");
                PhaseResult::failed(poster_id, image_path, phase, start.elapsed().as_millis() as u64, "phase timed out")
            }
        }
    }

    pub async fn process_batch(
        &self,
        paths: &[PathBuf],
        cancellation: &CancellationToken,
        mut on_progress: Option<Box<dyn FnMut(usize, usize) + Send>>,
    ) -> BatchResult {
        let mut results = Vec::with_capacity(paths.len());
        let mut summary = BatchSummary::default();

        for (index, path) in paths.iter().enumerate() {
            let result = self.process(path, cancellation).await;
            if result.success {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
            if let Some(poster) = &result.poster {
                *summary.by_poster_type.entry(poster.poster_type.as_str().to_string()).or_insert(0) += 1;
            }
            results.push(result);

            if let Some(callback) = on_progress.as_mut() {
                callback(index + 1, paths.len());
            }

            if index + 1 < paths.len() && !cancellation.is_cancelled() {
                tokio::time::sleep(Duration::from_millis(self.config.batch_pause_ms)).await;
            }
            if cancellation.is_cancelled() {
                break;
            }
        }

        BatchResult { results, summary }
    }
}

fn payload_of<T>(result: &PhaseResult, extract: impl FnOnce(&PhasePayload) -> Option<T>) -> Option<T> {
    result.payload.as_ref().and_then(extract)
}

fn apply_enrichment(poster: &mut PosterEntity, enrichment: &EnrichmentPayload) {
    if let Some(year) = enrichment.year {
        poster.event_year = Some(year);
        poster.decade = Some((year / 10) * 10);
    }
    if let Some(event_date) = &enrichment.event_date {
        poster.event_date = Some(event_date.clone());
    }
    if let Some(label) = &enrichment.record_label {
        poster.record_label = Some(label.clone());
    }
    if let Some(director) = &enrichment.director {
        poster.observations.push(format!("Director: {} (validated)", director.display_name()));
    }
    if !enrichment.cast.is_empty() {
        poster.observations.push(format!("Cast: {}", enrichment.cast.iter().map(|m| m.display_name().to_string()).collect::<Vec<_>>().join(", ")));
    }
    if let Some(headliner) = &enrichment.headliner {
        poster.headliner = Some(headliner.display_name().to_string());
    }
    if enrichment.clear_headliner {
        poster.headliner = None;
    }
    if let Some(vote_average) = enrichment.vote_average {
        poster.observations.push(format!("vote_average:{vote_average:.1}"));
    }
    poster.observations.extend(enrichment.observations_added.iter().cloned());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_summary_starts_empty() {
        let summary = BatchSummary::default();
        assert_eq!(summary.successful, 0);
        assert_eq!(summary.failed, 0);
    }
}
