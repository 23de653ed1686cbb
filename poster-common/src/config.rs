//! Ambient configuration: logging defaults and the extraction thresholds shared
//! by every phase. Resolution priority is environment variable, then TOML file,
//! then a compiled default — a missing or unreadable TOML file is never fatal,
//! it just falls back to the next tier and logs a warning.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Logging configuration, read the same way across every binary that embeds
/// the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. "info" or "poster_core=debug".
    pub level: String,
    /// Optional path to also write logs to, in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Extraction thresholds shared across phases. These are the knobs §9's open
/// questions call out as configuration rather than hard-coded constants (the
/// venue-dedup similarity threshold in particular).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub logging: LoggingConfig,
    /// Type phase: confidence below this triggers a refinement call.
    pub type_confidence_threshold: f64,
    /// Type phase: allow the second, refinement vision call.
    pub enable_type_refinement: bool,
    /// Type/Venue/Event phases: consult the knowledge-base search collaborator.
    pub enable_knowledge_base: bool,
    /// Venue phase: minimum name-similarity to treat a graph hit as "the same venue".
    pub venue_dedup_threshold: f64,
    /// Enrichment: minimum title-match confidence to accept a film/release candidate.
    pub enrichment_match_threshold: f64,
    /// Per-phase network call timeout.
    pub phase_timeout_ms: u64,
    /// Batch processing: pause between items, to avoid overwhelming the vision provider.
    pub batch_pause_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            type_confidence_threshold: 0.7,
            enable_type_refinement: true,
            enable_knowledge_base: true,
            venue_dedup_threshold: 0.85,
            enrichment_match_threshold: 0.75,
            phase_timeout_ms: 30_000,
            batch_pause_ms: 250,
        }
    }
}

impl ExtractionConfig {
    /// Resolve the effective config: compiled default, overridden by a TOML file
    /// if one is present and parses, overridden field-by-field by environment
    /// variables. Never fails — degrades to defaults and logs a warning.
    pub fn resolve(toml_path: Option<&Path>) -> Self {
        let mut config = Self::default();

        if let Some(path) = toml_path {
            match std::fs::read_to_string(path) {
                Ok(text) => match toml::from_str::<Self>(&text) {
                    Ok(parsed) => config = parsed,
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to parse extraction config, using defaults"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "extraction config not found, using defaults"),
            }
        }

        if let Ok(level) = std::env::var("POSTER_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(val) = std::env::var("POSTER_TYPE_CONFIDENCE_THRESHOLD") {
            if let Ok(parsed) = val.parse() {
                config.type_confidence_threshold = parsed;
            }
        }
        if let Ok(val) = std::env::var("POSTER_ENABLE_KNOWLEDGE_BASE") {
            config.enable_knowledge_base = val != "0" && val.to_lowercase() != "false";
        }

        config
    }

    /// Default config file location: `~/.config/poster-extract/config.toml` on
    /// Linux/macOS, the platform equivalent elsewhere.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("poster-extract").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_no_file_uses_compiled_defaults() {
        let config = ExtractionConfig::resolve(None);
        assert_eq!(config.type_confidence_threshold, 0.7);
        assert!(config.enable_type_refinement);
    }

    #[test]
    fn resolve_with_missing_file_degrades_gracefully() {
        let config = ExtractionConfig::resolve(Some(Path::new("/nonexistent/config.toml")));
        assert_eq!(config.type_confidence_threshold, 0.7);
    }

    #[test]
    fn resolve_reads_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "type_confidence_threshold = 0.5\nenable_knowledge_base = false\n").unwrap();
        let config = ExtractionConfig::resolve(Some(&path));
        assert_eq!(config.type_confidence_threshold, 0.5);
        assert!(!config.enable_knowledge_base);
    }
}
