//! # poster-core
//!
//! The Iterative Extraction Core: a multi-phase pipeline that turns a poster
//! image into a confidence-scored, schema-conformant entity graph.
//!
//! Phases run in a fixed order — Type, Artist, Venue, Event, Assembly,
//! Enrichment — coordinated by [`processor::IterativeProcessor`] and sharing
//! state through a per-image [`context::ProcessingContext`]. Every external
//! collaborator besides the vision provider is optional; see [`external`].

pub mod base_phase;
pub mod context;
pub mod date;
pub mod error;
pub mod external;
pub mod phases;
pub mod processor;
pub mod prompts;
pub mod similarity;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use processor::{
    BatchResult, BatchSummary, Collaborators, HealthStatus, IterativeProcessingResult,
    IterativeProcessor,
};
pub use types::PosterType;
