//! Event Phase (§4.6): the most intricate extractor, since one poster may
//! advertise several shows. Resolves the type-specific date field, splits and
//! parses it into one or more shows, extracts the surrounding logistics, and
//! sanity-checks plausibility against the knowledge base when available.

use crate::base_phase::{call_vision, normalize_string, normalize_string_array, parse_model_json, run_phase};
use crate::date::parse_all;
use crate::external::{KnowledgeBaseSearch, SearchOptions};
use crate::phases::{PhaseName, PhaseResult, PhaseStatus};
use crate::prompts::get_phase_prompt;
use crate::types::{DateInfo, PosterType, ShowInfo};
use poster_common::config::ExtractionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    pub shows: Vec<ShowInfo>,
    pub door_time: Option<String>,
    pub show_time: Option<String>,
    pub ticket_price: Option<String>,
    pub age_restriction: Option<String>,
    pub promoter: Option<String>,
    pub artist_valid: Option<bool>,
    pub venue_valid: Option<bool>,
    pub ready_for_assembly: bool,
}

pub struct EventPhase {
    vision: Arc<dyn crate::external::VisionProvider>,
    knowledge_base: Option<Arc<dyn KnowledgeBaseSearch>>,
}

impl EventPhase {
    pub fn new(vision: Arc<dyn crate::external::VisionProvider>, knowledge_base: Option<Arc<dyn KnowledgeBaseSearch>>) -> Self {
        Self { vision, knowledge_base }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        poster_id: &str,
        image_path: &Path,
        poster_type: PosterType,
        headliner: Option<&str>,
        venue: Option<&str>,
        config: &ExtractionConfig,
    ) -> PhaseResult {
        let path_str = image_path.display().to_string();
        run_phase(poster_id, &path_str, PhaseName::Event, || {
            self.run(poster_id, image_path, poster_type, headliner, venue, config)
        })
        .await
    }

    async fn run(
        &self,
        poster_id: &str,
        image_path: &Path,
        poster_type: PosterType,
        headliner: Option<&str>,
        venue: Option<&str>,
        config: &ExtractionConfig,
    ) -> anyhow::Result<PhaseResult> {
        let start = Instant::now();
        let path_str = image_path.display().to_string();

        let prompt = get_phase_prompt(PhaseName::Event, poster_type);
        let response = call_vision(self.vision.as_ref(), image_path, prompt).await?;
        let (obj, warning) = parse_model_json(&response.extracted_text);
        let mut warnings: Vec<String> = warning.into_iter().collect();

        let date_field = date_field_for(poster_type);
        let year_hint = obj.get("year").and_then(|v| v.as_i64()).map(|y| y as i32);

        let mut dates: Vec<DateInfo> = Vec::new();
        if let Some(shows) = obj.get("shows").and_then(|v| v.as_array()) {
            for entry in shows {
                if let Some(raw) = entry.get("event_date").and_then(|v| v.as_str()) {
                    dates.extend(parse_all(raw));
                }
            }
        }
        if dates.is_empty() {
            if let Some(raw) = obj.get(date_field).and_then(|v| v.as_str()) {
                dates.extend(parse_all(raw));
            }
        }
        if dates.is_empty() {
            if let Some(year) = year_hint {
                dates.push(DateInfo::year_only(year.to_string(), year));
            }
        }

        let door_time = normalize_string(obj.get("door_time").and_then(|v| v.as_str()));
        let show_time = normalize_show_time(obj.get("show_time"));
        let ticket_price = normalize_string(obj.get("ticket_price").and_then(|v| v.as_str()));
        let age_restriction = normalize_string(obj.get("age_restriction").and_then(|v| v.as_str()));
        let promoter = normalize_string(obj.get("promoter").and_then(|v| v.as_str()));

        let shows: Vec<ShowInfo> = dates
            .into_iter()
            .enumerate()
            .map(|(index, date)| ShowInfo {
                date,
                day_of_week: None,
                door_time: door_time.clone(),
                show_time: show_time.clone(),
                ticket_price: ticket_price.clone(),
                age_restriction: age_restriction.clone(),
                ordinal: index as u32 + 1,
            })
            .collect();

        let mut artist_valid = None;
        let mut venue_valid = None;
        let primary_year = shows.first().and_then(|s| s.date.year);

        if config.enable_knowledge_base {
            if let (Some(kb), Some(headliner), Some(year)) = (&self.knowledge_base, headliner, primary_year) {
                artist_valid = plausibility_check(kb.as_ref(), headliner, year, -5, 10, &mut warnings).await;
            }
            if let (Some(kb), Some(venue), Some(year)) = (&self.knowledge_base, venue, primary_year) {
                venue_valid = plausibility_check(kb.as_ref(), venue, year, 0, 20, &mut warnings).await;
            }
        }

        let date_optional = poster_type.date_is_optional();
        let confidence = if shows.is_empty() {
            if date_optional {
                0.5
            } else {
                0.0
            }
        } else {
            let primary = &shows[0];
            let mut c = primary.date.confidence;
            if primary.door_time.is_some() || primary.show_time.is_some() {
                c += 0.1;
            }
            if primary.date.resolved.is_some() {
                c += 0.1;
            }
            if artist_valid == Some(false) {
                c -= 0.15;
            }
            if venue_valid == Some(false) {
                c -= 0.1;
            }
            c.clamp(0.0, 1.0)
        };

        let ready_for_assembly = confidence >= config.type_confidence_threshold || date_optional;
        let status = if shows.is_empty() && !date_optional {
            PhaseStatus::NeedsReview
        } else if ready_for_assembly {
            PhaseStatus::Completed
        } else {
            PhaseStatus::NeedsReview
        };

        Ok(PhaseResult {
            poster_id: poster_id.to_string(),
            image_path: path_str,
            phase: PhaseName::Event,
            status,
            confidence,
            processing_time_ms: start.elapsed().as_millis() as u64,
            warnings,
            errors: Vec::new(),
            payload: Some(crate::phases::PhasePayload::Event(EventPayload {
                shows,
                door_time,
                show_time,
                ticket_price,
                age_restriction,
                promoter,
                artist_valid,
                venue_valid,
                ready_for_assembly,
            })),
        })
    }
}

fn date_field_for(poster_type: PosterType) -> &'static str {
    match poster_type {
        PosterType::Album | PosterType::Film => "release_date",
        PosterType::Theater | PosterType::Exhibition => "opening_date",
        PosterType::Festival => "start_date",
        _ => "event_date",
    }
}

fn normalize_show_time(value: Option<&serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::Array(_)) => {
            let joined = normalize_string_array(value).join(", ");
            if joined.is_empty() {
                None
            } else {
                Some(joined)
            }
        }
        Some(serde_json::Value::String(s)) => normalize_string(Some(s.as_str())),
        _ => None,
    }
}

/// Search the knowledge base for other posters mentioning `subject`, collect
/// `year:N` observations, and judge whether `year` plausibly falls within
/// `[min(years)+lower_slack, max(years)+upper_slack]`. No hits means "no
/// prior knowledge" — neither a bonus nor a penalty, represented as `None`.
async fn plausibility_check(
    kb: &dyn KnowledgeBaseSearch,
    subject: &str,
    year: i32,
    lower_slack: i32,
    upper_slack: i32,
    warnings: &mut Vec<String>,
) -> Option<bool> {
    let hits = match kb
        .search(
            subject,
            SearchOptions {
                entity_types: vec!["Poster".to_string()],
                limit: 10,
            },
        )
        .await
    {
        Ok(hits) => hits,
        Err(error) => {
            warnings.push(format!("plausibility check failed for '{subject}': {error}"));
            return None;
        }
    };

    let years: Vec<i32> = hits
        .iter()
        .flat_map(|hit| &hit.observations)
        .filter_map(|obs| obs.strip_prefix("year:"))
        .filter_map(|y| y.trim().parse::<i32>().ok())
        .collect();

    if years.is_empty() {
        return None;
    }

    let min_year = *years.iter().min().unwrap();
    let max_year = *years.iter().max().unwrap();
    Some(year >= min_year + lower_slack && year <= max_year + upper_slack)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_field_routes_by_poster_type() {
        assert_eq!(date_field_for(PosterType::Album), "release_date");
        assert_eq!(date_field_for(PosterType::Theater), "opening_date");
        assert_eq!(date_field_for(PosterType::Festival), "start_date");
        assert_eq!(date_field_for(PosterType::Concert), "event_date");
    }

    #[test]
    fn normalize_show_time_joins_arrays() {
        let value = serde_json::json!(["7pm", "8pm"]);
        assert_eq!(normalize_show_time(Some(&value)), Some("7pm, 8pm".to_string()));
    }
}
