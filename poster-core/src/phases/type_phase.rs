//! Type Phase (§4.3): classifies a poster into one of the ten closed types,
//! optionally refines a low-confidence call, blends in a keyword-pattern
//! signal, and extracts the visual cues every downstream phase and Assembly
//! rely on.

use crate::base_phase::{call_vision, normalize_confidence, normalize_string, normalize_string_array, parse_model_json, run_phase};
use crate::external::{KnowledgeBaseSearch, SearchOptions, VisionProvider};
use crate::phases::{status_from_confidence, PhaseName, PhaseResult};
use crate::prompts::{get_phase_prompt, render_refinement_prompt};
use crate::types::{PosterType, TypeInference, VisualElements, VisualStyle};
use poster_common::config::ExtractionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// The Type Phase's payload: the selected type, every candidate type with its
/// supporting evidence, and the visual cues read off the poster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypePayload {
    pub poster_type: PosterType,
    pub model_confidence: f64,
    pub pattern_confidence: f64,
    pub evidence: Vec<String>,
    pub extracted_text: String,
    pub visual: VisualElements,
    pub secondary_types: Vec<TypeInference>,
    pub refined: bool,
    pub ready_for_phase2: bool,
}

impl Default for TypePayload {
    fn default() -> Self {
        Self {
            poster_type: PosterType::Unknown,
            model_confidence: 0.0,
            pattern_confidence: 0.0,
            evidence: Vec::new(),
            extracted_text: String::new(),
            visual: VisualElements::default(),
            secondary_types: Vec::new(),
            refined: false,
            ready_for_phase2: false,
        }
    }
}

pub struct TypePhase {
    vision: Arc<dyn VisionProvider>,
    knowledge_base: Option<Arc<dyn KnowledgeBaseSearch>>,
}

impl TypePhase {
    pub fn new(vision: Arc<dyn VisionProvider>, knowledge_base: Option<Arc<dyn KnowledgeBaseSearch>>) -> Self {
        Self { vision, knowledge_base }
    }

    pub async fn execute(&self, poster_id: &str, image_path: &Path, config: &ExtractionConfig) -> PhaseResult {
        let path_str = image_path.display().to_string();
        run_phase(poster_id, &path_str, PhaseName::Type, || self.run(poster_id, image_path, config)).await
    }

    async fn run(&self, poster_id: &str, image_path: &Path, config: &ExtractionConfig) -> anyhow::Result<PhaseResult> {
        let start = Instant::now();
        let path_str = image_path.display().to_string();

        let prompt = get_phase_prompt(PhaseName::Type, PosterType::Unknown);
        let response = call_vision(self.vision.as_ref(), image_path, prompt).await?;
        let (obj, warning) = parse_model_json(&response.extracted_text);
        let mut warnings: Vec<String> = warning.into_iter().collect();

        let mut poster_type = obj
            .get("poster_type")
            .and_then(|v| v.as_str())
            .map(PosterType::normalize)
            .unwrap_or(PosterType::Unknown);
        let mut model_confidence = normalize_confidence(obj.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0));
        let mut evidence = normalize_string_array(obj.get("evidence"));
        let mut extracted_text = normalize_string(obj.get("extracted_text").and_then(|v| v.as_str())).unwrap_or_default();
        let mut visual = parse_visual(&obj);

        let mut refined = false;
        if model_confidence < config.type_confidence_threshold && config.enable_type_refinement {
            let refinement_prompt = render_refinement_prompt(poster_type, model_confidence, &evidence);
            match call_vision(self.vision.as_ref(), image_path, &refinement_prompt).await {
                Ok(refined_response) => {
                    let (refined_obj, refined_warning) = parse_model_json(&refined_response.extracted_text);
                    warnings.extend(refined_warning);
                    let refined_confidence =
                        normalize_confidence(refined_obj.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0));
                    if refined_confidence > model_confidence {
                        poster_type = refined_obj
                            .get("poster_type")
                            .and_then(|v| v.as_str())
                            .map(PosterType::normalize)
                            .unwrap_or(poster_type);
                        model_confidence = refined_confidence;
                        evidence = normalize_string_array(refined_obj.get("evidence"));
                        extracted_text =
                            normalize_string(refined_obj.get("extracted_text").and_then(|v| v.as_str())).unwrap_or(extracted_text);
                        visual = parse_visual(&refined_obj);
                        refined = true;
                    }
                }
                // Refinement failure is a no-op: the original classification stands.
                Err(error) => warnings.push(format!("refinement call failed: {error}")),
            }
        }

        let pattern_confidence = pattern_confidence_for(poster_type, &extracted_text);
        let mut confidence = 0.7 * model_confidence + 0.3 * pattern_confidence;

        if config.enable_knowledge_base {
            if let Some(kb) = &self.knowledge_base {
                let snippet: String = extracted_text.chars().take(200).collect();
                let hits = kb
                    .search(
                        &snippet,
                        SearchOptions {
                            entity_types: vec!["Poster".to_string()],
                            limit: 5,
                        },
                    )
                    .await
                    .unwrap_or_else(|error| {
                        warnings.push(format!("knowledge-base search failed: {error}"));
                        Vec::new()
                    });
                if hits.iter().any(|hit| hit.poster_type == Some(poster_type)) {
                    confidence = (confidence + 0.1).min(1.0);
                }
            }
        }

        let mut secondary_types = vec![TypeInference {
            type_key: poster_type,
            confidence,
            source: "vision".to_string(),
            evidence: evidence.clone(),
            is_primary: true,
        }];
        if poster_type == PosterType::Hybrid {
            secondary_types.push(TypeInference {
                type_key: PosterType::Album,
                confidence: 0.9 * confidence,
                source: "vision".to_string(),
                evidence: Vec::new(),
                is_primary: false,
            });
            secondary_types.push(TypeInference {
                type_key: PosterType::Concert,
                confidence: 0.85 * confidence,
                source: "vision".to_string(),
                evidence: Vec::new(),
                is_primary: false,
            });
        }

        let ready_for_phase2 = confidence >= config.type_confidence_threshold;
        if confidence < 0.7 {
            warnings.push(format!("type confidence {confidence:.2} is below the comfortable review floor"));
        }

        Ok(PhaseResult {
            poster_id: poster_id.to_string(),
            image_path: path_str,
            phase: PhaseName::Type,
            status: status_from_confidence(confidence, config.type_confidence_threshold, true),
            confidence,
            processing_time_ms: start.elapsed().as_millis() as u64,
            warnings,
            errors: Vec::new(),
            payload: Some(crate::phases::PhasePayload::Type(TypePayload {
                poster_type,
                model_confidence,
                pattern_confidence,
                evidence,
                extracted_text,
                visual,
                secondary_types,
                refined,
                ready_for_phase2,
            })),
        })
    }
}

fn parse_visual(obj: &serde_json::Map<String, serde_json::Value>) -> VisualElements {
    let Some(visual) = obj.get("visual").and_then(|v| v.as_object()) else {
        return VisualElements::default();
    };
    VisualElements {
        has_artist_photo: visual.get("has_artist_photo").and_then(|v| v.as_bool()).unwrap_or(false),
        has_album_art: visual.get("has_album_art").and_then(|v| v.as_bool()).unwrap_or(false),
        has_logo: visual.get("has_logo").and_then(|v| v.as_bool()).unwrap_or(false),
        dominant_colors: normalize_string_array(visual.get("dominant_colors")),
        style: visual.get("style").and_then(|v| v.as_str()).map(VisualStyle::parse),
    }
}

/// Type-specific keyword sets used to corroborate (or contradict) the
/// model's classification against the poster's own extracted text.
fn keywords_for(poster_type: PosterType) -> &'static [&'static str] {
    match poster_type {
        PosterType::Concert => &["tickets", "doors", "live", "tour", "opening act", "venue"],
        PosterType::Festival => &["festival", "lineup", "stages", "day pass", "weekend pass"],
        PosterType::Comedy => &["stand-up", "comedy", "comedian", "live comedy"],
        PosterType::Theater => &["theatre", "theater", "matinee", "box office", "curtain"],
        PosterType::Film => &["starring", "directed by", "rated", "in theaters", "now playing"],
        PosterType::Album => &["album", "out now", "new single", "record label", "lp"],
        PosterType::Promo => &["coming soon", "save the date", "stay tuned"],
        PosterType::Exhibition => &["gallery", "exhibit", "curator", "opening reception"],
        PosterType::Hybrid | PosterType::Unknown => &[],
    }
}

fn pattern_confidence_for(poster_type: PosterType, text: &str) -> f64 {
    let lower = text.to_lowercase();
    let own_hits = keywords_for(poster_type).iter().filter(|kw| lower.contains(*kw)).count();
    let competing_hits: usize = PosterType::ALL
        .iter()
        .filter(|&&t| t != poster_type)
        .map(|&t| keywords_for(t).iter().filter(|kw| lower.contains(*kw)).count())
        .sum();
    (own_hits as f64 * 0.15 - competing_hits as f64 * 0.05).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_confidence_rewards_own_keywords_and_penalizes_competitors() {
        let concert_text = "doors at 7, tickets $20, live tour";
        assert!(pattern_confidence_for(PosterType::Concert, concert_text) > 0.0);

        let mixed_text = "tickets and doors, but also directed by and starring a full cast";
        let concert_score = pattern_confidence_for(PosterType::Concert, mixed_text);
        let clean_score = pattern_confidence_for(PosterType::Concert, concert_text);
        assert!(concert_score < clean_score);
    }

    #[test]
    fn parse_visual_defaults_when_absent() {
        let obj = serde_json::Map::new();
        let visual = parse_visual(&obj);
        assert!(!visual.has_artist_photo);
        assert!(visual.style.is_none());
    }
}
