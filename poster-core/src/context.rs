//! Per-image processing session: the context that stores each phase's result
//! and the scratch hints phases pass downstream, and the manager that owns a
//! set of such contexts keyed by session id.

use crate::error::CoreError;
use crate::phases::{PhaseName, PhaseResult, PhaseStatus};
use crate::types::PosterType;
use std::collections::HashMap;
use std::sync::RwLock;

/// Scratch state a phase may read from or write to, independent of its full
/// `PhaseResult` (the primary poster type and the artist/venue a downstream
/// phase should treat as already-accepted).
#[derive(Debug, Clone, Default)]
pub struct ScratchHints {
    pub primary_poster_type: Option<PosterType>,
    pub accepted_artists: Vec<String>,
    pub accepted_venue: Option<String>,
    pub extracted_text: Option<String>,
}

/// One image's processing session: an ordered record of phase outputs plus
/// scratch hints. Created by the orchestrator before the Type phase runs,
/// removed on every exit path (success, soft failure, or cancellation).
#[derive(Debug, Clone)]
pub struct ProcessingContext {
    pub session_id: String,
    pub image_path: String,
    pub poster_id: String,
    /// Insertion-ordered; phases are looked up by name, but iteration order
    /// mirrors the order they ran in.
    results: Vec<(PhaseName, PhaseResult)>,
    pub hints: ScratchHints,
}

impl ProcessingContext {
    pub fn new(session_id: impl Into<String>, image_path: impl Into<String>, poster_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            image_path: image_path.into(),
            poster_id: poster_id.into(),
            results: Vec::new(),
            hints: ScratchHints::default(),
        }
    }

    fn set_result(&mut self, phase: PhaseName, result: PhaseResult) {
        if let Some(slot) = self.results.iter_mut().find(|(p, _)| *p == phase) {
            slot.1 = result;
        } else {
            self.results.push((phase, result));
        }
    }

    fn get_result(&self, phase: PhaseName) -> Option<&PhaseResult> {
        self.results.iter().find(|(p, _)| *p == phase).map(|(_, r)| r)
    }

    pub fn results(&self) -> impl Iterator<Item = &(PhaseName, PhaseResult)> {
        self.results.iter()
    }
}

/// Owns a set of in-flight processing contexts keyed by session id. Safe for
/// concurrent use across orchestrator instances, each of which owns a
/// distinct session.
#[derive(Default)]
pub struct PhaseManager {
    contexts: RwLock<HashMap<String, ProcessingContext>>,
}

impl PhaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_context(&self, image_path: impl Into<String>, poster_id: impl Into<String>) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        let context = ProcessingContext::new(session_id.clone(), image_path, poster_id);
        self.contexts
            .write()
            .expect("phase manager lock poisoned")
            .insert(session_id.clone(), context);
        session_id
    }

    /// Store a phase's result. Writing against an unknown session is a
    /// programmer error — the orchestrator must have created the context
    /// before any phase runs — so this fails fast rather than returning a
    /// recoverable error.
    pub fn store_result(&self, session_id: &str, phase: PhaseName, result: PhaseResult) {
        let mut contexts = self.contexts.write().expect("phase manager lock poisoned");
        let context = contexts
            .get_mut(session_id)
            .unwrap_or_else(|| panic!("store_result called for {}", CoreError::UnknownSession(session_id.to_string())));
        context.set_result(phase, result);
    }

    /// Record hints the current phase wants visible to later phases.
    pub fn update_hints(&self, session_id: &str, f: impl FnOnce(&mut ScratchHints)) {
        let mut contexts = self.contexts.write().expect("phase manager lock poisoned");
        let context = contexts
            .get_mut(session_id)
            .unwrap_or_else(|| panic!("update_hints called for {}", CoreError::UnknownSession(session_id.to_string())));
        f(&mut context.hints);
    }

    /// Reading a missing phase (or session) returns absent, not an error.
    pub fn get_result(&self, session_id: &str, phase: PhaseName) -> Option<PhaseResult> {
        self.contexts
            .read()
            .expect("phase manager lock poisoned")
            .get(session_id)
            .and_then(|ctx| ctx.get_result(phase))
            .cloned()
    }

    pub fn primary_poster_type(&self, session_id: &str) -> Option<PosterType> {
        self.contexts
            .read()
            .expect("phase manager lock poisoned")
            .get(session_id)
            .and_then(|ctx| ctx.hints.primary_poster_type)
    }

    pub fn extracted_text(&self, session_id: &str) -> Option<String> {
        self.contexts
            .read()
            .expect("phase manager lock poisoned")
            .get(session_id)
            .and_then(|ctx| ctx.hints.extracted_text.clone())
    }

    /// Arithmetic mean of confidence across every phase that actually ran
    /// (any status besides `Skipped`).
    pub fn overall_confidence(&self, session_id: &str) -> f64 {
        let contexts = self.contexts.read().expect("phase manager lock poisoned");
        let Some(context) = contexts.get(session_id) else {
            return 0.0;
        };
        let ran: Vec<f64> = context
            .results()
            .filter(|(_, r)| r.status != PhaseStatus::Skipped)
            .map(|(_, r)| r.confidence)
            .collect();
        if ran.is_empty() {
            0.0
        } else {
            ran.iter().sum::<f64>() / ran.len() as f64
        }
    }

    /// Fields flagged for review: the field owned by each of Type/Artist/
    /// Venue/Event whose result is `needs_review` or `failed`. Assembly and
    /// Enrichment own no single field, so their own status is visible only
    /// on their `PhaseResult`, not folded into this set.
    pub fn fields_needing_review(&self, session_id: &str) -> Vec<String> {
        let contexts = self.contexts.read().expect("phase manager lock poisoned");
        let Some(context) = contexts.get(session_id) else {
            return Vec::new();
        };
        context
            .results()
            .filter(|(_, r)| matches!(r.status, PhaseStatus::NeedsReview | PhaseStatus::Failed))
            .filter_map(|(phase, _)| phase.owned_field())
            .map(str::to_string)
            .collect()
    }

    /// Atomically remove a completed context. The orchestrator calls this on
    /// every exit path, including cancellation.
    pub fn remove(&self, session_id: &str) -> Option<ProcessingContext> {
        self.contexts.write().expect("phase manager lock poisoned").remove(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(confidence: f64) -> PhaseResult {
        PhaseResult {
            poster_id: "poster:x".to_string(),
            image_path: "x.jpg".to_string(),
            phase: PhaseName::Type,
            status: PhaseStatus::Completed,
            confidence,
            processing_time_ms: 1,
            warnings: vec![],
            errors: vec![],
            payload: None,
        }
    }

    #[test]
    fn overall_confidence_is_mean_of_ran_phases() {
        let manager = PhaseManager::new();
        let session = manager.create_context("x.jpg", "poster:x");
        manager.store_result(&session, PhaseName::Type, completed(0.8));
        manager.store_result(&session, PhaseName::Artist, completed(0.6));
        assert!((manager.overall_confidence(&session) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn needs_review_phase_contributes_its_owned_field() {
        let manager = PhaseManager::new();
        let session = manager.create_context("x.jpg", "poster:x");
        let mut result = completed(0.4);
        result.status = PhaseStatus::NeedsReview;
        result.phase = PhaseName::Venue;
        manager.store_result(&session, PhaseName::Venue, result);
        assert_eq!(manager.fields_needing_review(&session), vec!["venue".to_string()]);
    }

    #[test]
    #[should_panic(expected = "unknown session")]
    fn store_result_on_unknown_session_panics() {
        let manager = PhaseManager::new();
        manager.store_result("does-not-exist", PhaseName::Type, completed(0.5));
    }

    #[test]
    fn get_result_on_missing_phase_returns_none() {
        let manager = PhaseManager::new();
        let session = manager.create_context("x.jpg", "poster:x");
        assert!(manager.get_result(&session, PhaseName::Artist).is_none());
    }

    #[test]
    fn remove_is_idempotent_and_returns_context_once() {
        let manager = PhaseManager::new();
        let session = manager.create_context("x.jpg", "poster:x");
        assert!(manager.remove(&session).is_some());
        assert!(manager.remove(&session).is_none());
    }
}
