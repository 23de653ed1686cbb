//! Artist Phase (§4.4): extracts the performers/credits for a poster, shaped
//! differently depending on poster type (film credits vs. headliner/support
//! vs. album credits vs. exhibition artist+curator), with an optional
//! authoritative-name validation pass.

use crate::base_phase::{call_vision, looks_concatenated, looks_like_non_answer, normalize_string, normalize_string_array, parse_model_json, run_phase};
use crate::external::ArtistAuthority;
use crate::phases::{status_from_confidence, PhaseName, PhaseResult};
use crate::prompts::get_phase_prompt;
use crate::similarity::title_match_confidence;
use crate::types::{Match, PosterType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// A name-validation hit is "confident" at or above this normalized
/// similarity to the authority's top candidate.
const VALIDATION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistPayload {
    pub headliner: Option<Match>,
    pub supporting_acts: Vec<Match>,
    pub tour_name: Option<String>,
    pub record_label: Option<String>,
    pub director: Option<Match>,
    pub cast: Vec<Match>,
    pub album_title: Option<String>,
    pub featured_artists: Vec<Match>,
    pub curator: Option<Match>,
}

pub struct ArtistPhase {
    vision: Arc<dyn crate::external::VisionProvider>,
    authority: Option<Arc<dyn ArtistAuthority>>,
}

impl ArtistPhase {
    pub fn new(vision: Arc<dyn crate::external::VisionProvider>, authority: Option<Arc<dyn ArtistAuthority>>) -> Self {
        Self { vision, authority }
    }

    pub async fn execute(&self, poster_id: &str, image_path: &Path, poster_type: PosterType) -> PhaseResult {
        let path_str = image_path.display().to_string();
        run_phase(poster_id, &path_str, PhaseName::Artist, || self.run(poster_id, image_path, poster_type)).await
    }

    async fn run(&self, poster_id: &str, image_path: &Path, poster_type: PosterType) -> anyhow::Result<PhaseResult> {
        let start = Instant::now();
        let path_str = image_path.display().to_string();

        let prompt = get_phase_prompt(PhaseName::Artist, poster_type);
        let response = call_vision(self.vision.as_ref(), image_path, prompt).await?;
        let (obj, warning) = parse_model_json(&response.extracted_text);
        let mut warnings: Vec<String> = warning.into_iter().collect();

        let mut payload = project_payload(poster_type, &obj);

        if let Some(authority) = &self.authority {
            if let Some(headliner) = payload.headliner.take() {
                payload.headliner = Some(validate(authority.as_ref(), headliner, &mut warnings).await);
            }
            if let Some(director) = payload.director.take() {
                payload.director = Some(validate(authority.as_ref(), director, &mut warnings).await);
            }
            let mut validated_supporting = Vec::with_capacity(payload.supporting_acts.len());
            for act in payload.supporting_acts.drain(..) {
                validated_supporting.push(validate(authority.as_ref(), act, &mut warnings).await);
            }
            payload.supporting_acts = validated_supporting;
        }

        let headliner_present = match poster_type {
            PosterType::Film => payload.director.is_some(),
            _ => payload.headliner.is_some(),
        };
        let validator_matched = payload
            .headliner
            .as_ref()
            .or(payload.director.as_ref())
            .map(|m| m.external_id.is_some())
            .unwrap_or(false);
        let has_support = !payload.supporting_acts.is_empty()
            || !payload.cast.is_empty()
            || !payload.featured_artists.is_empty()
            || payload.album_title.is_some();

        let confidence = (0.6 * headliner_present as u8 as f64
            + 0.2 * validator_matched as u8 as f64
            + 0.2 * has_support as u8 as f64)
            .min(1.0);

        let needs_headliner = poster_type.requires_headliner();
        let status = status_from_confidence(confidence, 0.5, !needs_headliner || headliner_present);

        Ok(PhaseResult {
            poster_id: poster_id.to_string(),
            image_path: path_str,
            phase: PhaseName::Artist,
            status,
            confidence,
            processing_time_ms: start.elapsed().as_millis() as u64,
            warnings,
            errors: Vec::new(),
            payload: Some(crate::phases::PhasePayload::Artist(payload)),
        })
    }
}

fn project_payload(poster_type: PosterType, obj: &serde_json::Map<String, serde_json::Value>) -> ArtistPayload {
    let mut payload = ArtistPayload::default();
    match poster_type {
        PosterType::Film => {
            payload.director = extract_match(obj, "director", "vision");
            payload.cast = extract_match_array(obj, "cast", "vision");
        }
        PosterType::Album | PosterType::Hybrid => {
            payload.headliner = extract_match(obj, "headliner", "vision");
            payload.album_title = normalize_string(obj.get("album_title").and_then(|v| v.as_str()));
            payload.record_label = normalize_string(obj.get("record_label").and_then(|v| v.as_str()));
            payload.featured_artists = extract_match_array(obj, "featured_artists", "vision");
        }
        PosterType::Exhibition => {
            payload.headliner = extract_match(obj, "headliner", "vision");
            payload.curator = extract_match(obj, "curator", "vision");
        }
        _ => {
            payload.headliner = extract_match(obj, "headliner", "vision");
            payload.supporting_acts = extract_match_array(obj, "supporting_acts", "vision");
            payload.tour_name = normalize_string(obj.get("tour_name").and_then(|v| v.as_str()));
            payload.record_label = normalize_string(obj.get("record_label").and_then(|v| v.as_str()));
        }
    }
    payload
}

fn extract_match(obj: &serde_json::Map<String, serde_json::Value>, key: &str, source: &str) -> Option<Match> {
    let raw = normalize_string(obj.get(key).and_then(|v| v.as_str()))?;
    if looks_like_non_answer(&raw) || looks_concatenated(&raw) {
        return None;
    }
    Some(Match::new(raw, 1.0, source))
}

fn extract_match_array(obj: &serde_json::Map<String, serde_json::Value>, key: &str, source: &str) -> Vec<Match> {
    normalize_string_array(obj.get(key))
        .into_iter()
        .filter(|entry| !looks_like_non_answer(entry) && !looks_concatenated(entry))
        .map(|entry| Match::new(entry, 1.0, source))
        .collect()
}

/// Validate one extracted name against the authority, attaching its
/// canonical name and external id on a confident top-candidate match.
/// Authority failures degrade to "use the extracted value as-is" with a
/// recorded warning, never an error.
async fn validate(authority: &dyn ArtistAuthority, extracted: Match, warnings: &mut Vec<String>) -> Match {
    match authority.search_artist(&extracted.extracted).await {
        Ok(candidates) => {
            let best = candidates
                .into_iter()
                .map(|c| (title_match_confidence(&extracted.extracted, &c.name), c))
                .max_by(|a, b| a.0.total_cmp(&b.0));
            match best {
                Some((score, candidate)) if score >= VALIDATION_THRESHOLD => {
                    extracted.with_validation(candidate.name, format!("mbid:{}", candidate.id))
                }
                _ => extracted,
            }
        }
        Err(error) => {
            warnings.push(format!("artist authority lookup failed for '{}': {error}", extracted.extracted));
            extracted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projects_film_credits() {
        let obj = serde_json::json!({"director": "A. Director", "cast": ["B. Star", "C. Star"]})
            .as_object()
            .unwrap()
            .clone();
        let payload = project_payload(PosterType::Film, &obj);
        assert_eq!(payload.director.unwrap().extracted, "A. Director");
        assert_eq!(payload.cast.len(), 2);
    }

    #[test]
    fn rejects_non_answer_headliner() {
        let obj = json!({"headliner": "none"}).as_object().unwrap().clone();
        let payload = project_payload(PosterType::Concert, &obj);
        assert!(payload.headliner.is_none());
    }

    #[test]
    fn projects_album_credits() {
        let obj = json!({
            "headliner": "ARTIST",
            "album_title": "TITLE",
            "record_label": "Label Records",
            "featured_artists": ["Guest One"]
        })
        .as_object()
        .unwrap()
        .clone();
        let payload = project_payload(PosterType::Album, &obj);
        assert_eq!(payload.album_title.as_deref(), Some("TITLE"));
        assert_eq!(payload.featured_artists.len(), 1);
    }
}
