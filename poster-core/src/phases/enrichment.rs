//! Enrichment (§4.8): runs after Assembly to fill fields the extractors
//! couldn't get directly, by cross-referencing authoritative external
//! catalogs. Never touches the already-persisted graph — it only returns the
//! fields it found and their sources; the orchestrator folds them into the
//! final entity returned to the caller.

use crate::base_phase::run_phase;
use crate::external::{ArtistAuthority, FilmAuthority, ReleaseAuthority, SecondaryMusicAuthority};
use crate::phases::artist_phase::ArtistPayload;
use crate::phases::{status_from_confidence, PhaseName, PhaseResult};
use crate::similarity::title_match_confidence;
use crate::types::{Match, PosterEntity, PosterType};
use chrono::NaiveDate;
use poster_common::config::ExtractionConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentPayload {
    pub headliner: Option<Match>,
    pub director: Option<Match>,
    pub cast: Vec<Match>,
    pub year: Option<i32>,
    pub event_date: Option<String>,
    pub record_label: Option<String>,
    pub vote_average: Option<f64>,
    /// Set when an artist-phase headliner leaked onto a film poster and had
    /// to be cleared in favor of the canonical title (films carry no
    /// headliner field).
    pub clear_headliner: bool,
    pub fields_enriched: Vec<String>,
    pub sources: Vec<String>,
    pub observations_added: Vec<String>,
}

pub struct Enrichment {
    film_authority: Option<Arc<dyn FilmAuthority>>,
    artist_authority: Option<Arc<dyn ArtistAuthority>>,
    release_authority: Option<Arc<dyn ReleaseAuthority>>,
    secondary_authority: Option<Arc<dyn SecondaryMusicAuthority>>,
}

impl Enrichment {
    pub fn new(
        film_authority: Option<Arc<dyn FilmAuthority>>,
        artist_authority: Option<Arc<dyn ArtistAuthority>>,
        release_authority: Option<Arc<dyn ReleaseAuthority>>,
        secondary_authority: Option<Arc<dyn SecondaryMusicAuthority>>,
    ) -> Self {
        Self {
            film_authority,
            artist_authority,
            release_authority,
            secondary_authority,
        }
    }

    pub async fn execute(
        &self,
        poster_id: &str,
        image_path: &str,
        poster: &PosterEntity,
        artist_payload: &ArtistPayload,
        config: &ExtractionConfig,
    ) -> PhaseResult {
        run_phase(poster_id, image_path, PhaseName::Enrichment, || {
            self.run(poster_id, image_path, poster, artist_payload, config)
        })
        .await
    }

    async fn run(
        &self,
        poster_id: &str,
        image_path: &str,
        poster: &PosterEntity,
        artist_payload: &ArtistPayload,
        config: &ExtractionConfig,
    ) -> anyhow::Result<PhaseResult> {
        let start = Instant::now();
        let mut payload = EnrichmentPayload::default();
        let mut warnings = Vec::new();

        match poster.poster_type {
            PosterType::Film => self.enrich_film(poster, artist_payload, config, &mut payload, &mut warnings).await,
            PosterType::Album | PosterType::Hybrid => self.enrich_album(poster, artist_payload, config, &mut payload, &mut warnings).await,
            _ => self.enrich_headliner(poster, config, &mut payload, &mut warnings).await,
        }

        let confidence = if payload.fields_enriched.is_empty() { 0.5 } else { 0.8 };

        Ok(PhaseResult {
            poster_id: poster_id.to_string(),
            image_path: image_path.to_string(),
            phase: PhaseName::Enrichment,
            status: status_from_confidence(confidence, 0.0, true),
            confidence,
            processing_time_ms: start.elapsed().as_millis() as u64,
            warnings,
            errors: Vec::new(),
            payload: Some(crate::phases::PhasePayload::Enrichment(payload)),
        })
    }

    async fn enrich_film(
        &self,
        poster: &PosterEntity,
        artist_payload: &ArtistPayload,
        config: &ExtractionConfig,
        payload: &mut EnrichmentPayload,
        warnings: &mut Vec<String>,
    ) {
        let Some(authority) = &self.film_authority else {
            return;
        };
        let query = poster
            .title
            .clone()
            .or_else(|| poster.extracted_text.as_deref().and_then(first_nonempty_line))
            .unwrap_or_default();
        if query.is_empty() {
            return;
        }

        let candidates = match authority.search_movie(&query, poster.event_year).await {
            Ok(c) => c,
            Err(error) => {
                warnings.push(format!("film authority search failed: {error}"));
                return;
            }
        };
        let Some(top) = candidates.into_iter().next() else {
            return;
        };
        if title_match_confidence(&query, &top.title) < config.enrichment_match_threshold {
            return;
        }

        payload.sources.push("film-authority".to_string());
        payload.vote_average = top.vote_average;

        if poster.event_year.is_none() {
            if let Some(year) = top.release_date.as_deref().and_then(|d| d.get(0..4)).and_then(|y| y.parse().ok()) {
                payload.year = Some(year);
                payload.fields_enriched.push("event_year".to_string());
            }
        }

        match authority.get_movie_credits(&top.id).await {
            Ok(credits) => {
                if let Some(director) = credits.crew.first() {
                    payload.director = Some(Match::new(director.name.clone(), 0.9, "film-authority").with_validation(director.name.clone(), format!("tmdb:{}", director.id)));
                    payload.fields_enriched.push("director".to_string());
                }
                let mut cast: Vec<_> = credits.cast.clone();
                cast.sort_by_key(|c| c.order);
                payload.cast = cast
                    .into_iter()
                    .take(5)
                    .map(|c| Match::new(c.name.clone(), 0.9, "film-authority").with_validation(c.name, format!("tmdb:{}", c.id)))
                    .collect();
                if !payload.cast.is_empty() {
                    payload.fields_enriched.push("cast".to_string());
                }
            }
            Err(error) => warnings.push(format!("film authority credits lookup failed: {error}")),
        }

        if let Some(headliner) = &artist_payload.headliner {
            if headliner.display_name() != top.title {
                payload.observations_added.push(format!("Originally extracted as '{}' before title resolution", headliner.display_name()));
                payload.clear_headliner = true;
            }
        }
    }

    async fn enrich_album(
        &self,
        poster: &PosterEntity,
        artist_payload: &ArtistPayload,
        config: &ExtractionConfig,
        payload: &mut EnrichmentPayload,
        warnings: &mut Vec<String>,
    ) {
        let Some(name) = artist_payload.headliner.as_ref().map(|m| m.display_name().to_string()) else {
            return;
        };

        if let Some(authority) = &self.artist_authority {
            match authority.search_artist(&name).await {
                Ok(candidates) => {
                    if let Some(best) = candidates
                        .into_iter()
                        .map(|c| (title_match_confidence(&name, &c.name), c))
                        .max_by(|a, b| a.0.total_cmp(&b.0))
                    {
                        if best.0 >= config.enrichment_match_threshold {
                            payload.headliner = Some(Match::new(name.clone(), best.0, "music-authority").with_validation(best.1.name, format!("mbid:{}", best.1.id)));
                            payload.fields_enriched.push("headliner".to_string());
                            payload.sources.push("music-authority".to_string());
                        }
                    }
                }
                Err(error) => warnings.push(format!("artist authority search failed: {error}")),
            }
        }

        let Some(album_title) = &artist_payload.album_title else {
            return;
        };

        let mut fields_from_release = 0;
        if let Some(release_authority) = &self.release_authority {
            match release_authority.search_release(album_title, &name).await {
                Ok(candidates) => {
                    if let Some(release) = candidates.into_iter().next() {
                        if let Some(date) = &release.date {
                            if let Some(formatted) = to_ddmmyyyy(date) {
                                payload.event_date = Some(formatted);
                                payload.fields_enriched.push("event_date".to_string());
                                fields_from_release += 1;
                            }
                            if let Some(year) = date.get(0..4).and_then(|y| y.parse().ok()) {
                                payload.year = Some(year);
                                payload.fields_enriched.push("event_year".to_string());
                                fields_from_release += 1;
                            }
                        }
                        if let Some(label) = release.label_info.first() {
                            payload.record_label = Some(label.name.clone());
                            payload.fields_enriched.push("record_label".to_string());
                            fields_from_release += 1;
                        }
                        payload.sources.push("release-authority".to_string());
                    }
                }
                Err(error) => warnings.push(format!("release authority search failed: {error}")),
            }
        }

        if fields_from_release <= 1 {
            if let Some(secondary) = &self.secondary_authority {
                match secondary.search_release(album_title).await {
                    Ok(candidates) => {
                        if let Some(release) = candidates.into_iter().next() {
                            if payload.year.is_none() {
                                payload.year = release.year;
                            }
                            if payload.record_label.is_none() {
                                payload.record_label = release.label.into_iter().next();
                            }
                            payload.sources.push("secondary-music-authority".to_string());
                        }
                    }
                    Err(error) => warnings.push(format!("secondary music authority search failed: {error}")),
                }
            }
        }
    }

    async fn enrich_headliner(&self, poster: &PosterEntity, config: &ExtractionConfig, payload: &mut EnrichmentPayload, warnings: &mut Vec<String>) {
        let Some(name) = &poster.headliner else {
            return;
        };
        let Some(authority) = &self.artist_authority else {
            return;
        };
        match authority.search_artist(name).await {
            Ok(candidates) => {
                if let Some(best) = candidates
                    .into_iter()
                    .map(|c| (title_match_confidence(name, &c.name), c))
                    .max_by(|a, b| a.0.total_cmp(&b.0))
                {
                    if best.0 >= config.enrichment_match_threshold {
                        payload.headliner = Some(Match::new(name.clone(), best.0, "music-authority").with_validation(best.1.name, format!("mbid:{}", best.1.id)));
                        payload.fields_enriched.push("headliner".to_string());
                        payload.sources.push("music-authority".to_string());
                    }
                }
            }
            Err(error) => warnings.push(format!("artist authority search failed: {error}")),
        }
    }
}

fn first_nonempty_line(text: &str) -> Option<String> {
    text.lines().map(str::trim).find(|l| !l.is_empty()).map(str::to_string)
}

fn to_ddmmyyyy(iso: &str) -> Option<String> {
    let parsed = NaiveDate::parse_from_str(iso, "%Y-%m-%d").ok()?;
    Some(parsed.format("%d/%m/%Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_ddmmyyyy_converts_iso_dates() {
        assert_eq!(to_ddmmyyyy("2024-03-15"), Some("15/03/2024".to_string()));
        assert_eq!(to_ddmmyyyy("not a date"), None);
    }

    #[test]
    fn first_nonempty_line_skips_blank_lines() {
        assert_eq!(first_nonempty_line("\n\n  Movie Title  \nmore text"), Some("Movie Title".to_string()));
    }
}
