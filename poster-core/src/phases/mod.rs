//! Phase contracts: the common `PhaseResult` envelope every phase returns,
//! and the per-type extractors that produce it.

pub mod artist_phase;
pub mod assembly;
pub mod enrichment;
pub mod event_phase;
pub mod type_phase;
pub mod venue_phase;

use serde::{Deserialize, Serialize};

pub use artist_phase::{ArtistPayload, ArtistPhase};
pub use assembly::{Assembly, AssemblyPayload};
pub use enrichment::{Enrichment, EnrichmentPayload};
pub use event_phase::{EventPayload, EventPhase};
pub use type_phase::{TypePayload, TypePhase};
pub use venue_phase::{VenuePayload, VenuePhase};

/// The six pipeline stages, in the fixed order the orchestrator runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseName {
    Type,
    Artist,
    Venue,
    Event,
    Assembly,
    Enrichment,
}

impl PhaseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Type => "type",
            PhaseName::Artist => "artist",
            PhaseName::Venue => "venue",
            PhaseName::Event => "event",
            PhaseName::Assembly => "assembly",
            PhaseName::Enrichment => "enrichment",
        }
    }

    /// Whether the orchestrator treats this phase as a hard dependency — its
    /// failure short-circuits the whole run rather than degrading the result.
    pub fn is_hard_dependency(&self) -> bool {
        matches!(self, PhaseName::Type)
    }

    /// The context field this phase owns for `fieldsNeedingReview` purposes.
    pub fn owned_field(&self) -> Option<&'static str> {
        match self {
            PhaseName::Type => Some("poster_type"),
            PhaseName::Artist => Some("headliner"),
            PhaseName::Venue => Some("venue"),
            PhaseName::Event => Some("event_date"),
            PhaseName::Assembly | PhaseName::Enrichment => None,
        }
    }
}

/// Phase outcome. `NeedsReview` and `Completed` both count as a successful
/// run for the purposes of aggregate confidence; `Failed` and `Skipped` do
/// not contribute a payload downstream phases can rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    NeedsReview,
    Failed,
    Skipped,
}

impl PhaseStatus {
    pub fn is_successful(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::NeedsReview)
    }
}

/// Per-type payload produced by a phase. Each variant is defined alongside
/// its phase; this enum is just the common envelope's discriminant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PhasePayload {
    Type(TypePayload),
    Artist(ArtistPayload),
    Venue(VenuePayload),
    Event(EventPayload),
    Assembly(AssemblyPayload),
    Enrichment(EnrichmentPayload),
}

/// Common envelope every phase returns, regardless of outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub poster_id: String,
    pub image_path: String,
    pub phase: PhaseName,
    pub status: PhaseStatus,
    pub confidence: f64,
    pub processing_time_ms: u64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub payload: Option<PhasePayload>,
}

impl PhaseResult {
    /// Build the uniform "failed" envelope used by [`crate::base_phase::run_phase`]
    /// when a phase's body raises instead of returning.
    pub fn failed(
        poster_id: impl Into<String>,
        image_path: impl Into<String>,
        phase: PhaseName,
        processing_time_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            poster_id: poster_id.into(),
            image_path: image_path.into(),
            phase,
            status: PhaseStatus::Failed,
            confidence: 0.0,
            processing_time_ms,
            warnings: Vec::new(),
            errors: vec![error.into()],
            payload: None,
        }
    }

    pub fn skipped(poster_id: impl Into<String>, image_path: impl Into<String>, phase: PhaseName) -> Self {
        Self {
            poster_id: poster_id.into(),
            image_path: image_path.into(),
            phase,
            status: PhaseStatus::Skipped,
            confidence: 0.0,
            processing_time_ms: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
            payload: None,
        }
    }
}

/// Convenience used by phases to decide their own status from a confidence
/// value and threshold, the pattern every phase in §4 follows.
pub fn status_from_confidence(confidence: f64, threshold: f64, has_required_field: bool) -> PhaseStatus {
    if !has_required_field {
        PhaseStatus::NeedsReview
    } else if confidence >= threshold {
        PhaseStatus::Completed
    } else {
        PhaseStatus::NeedsReview
    }
}
