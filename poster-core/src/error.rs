//! Error types for the poster-extraction core.

use thiserror::Error;

/// Errors the core itself can raise. Individual phases never propagate these —
/// see [`crate::base_phase`] — but the orchestrator and its collaborator
/// contracts do.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("image unavailable: {0}")]
    ImageUnavailable(String),

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("vision provider error: {0}")]
    VisionProvider(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Common(#[from] poster_common::Error),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
