//! The vision-language model contract. Every phase calls this at most once
//! (Type calls it a second time for refinement). Concrete providers — the
//! actual model integrations — are plugged in by the embedding application;
//! the core only depends on this trait.

use async_trait::async_trait;
use std::path::Path;

/// One vision-model response: its raw textual output (parsed by the calling
/// phase as JSON-in-text) and a human-readable model identifier for
/// provenance.
#[derive(Debug, Clone)]
pub struct VisionResponse {
    pub extracted_text: String,
    pub model: String,
}

/// Static info about the configured vision model.
#[derive(Debug, Clone)]
pub struct VisionProviderInfo {
    pub name: String,
    pub provider: String,
    pub parameters: Option<serde_json::Value>,
}

/// A vision-language model capable of answering a prompt about an image.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    async fn extract(&self, image_path: &Path, prompt: &str) -> anyhow::Result<VisionResponse>;

    fn info(&self) -> VisionProviderInfo;

    async fn health_check(&self) -> bool;
}
