//! End-to-end scenarios for the Iterative Processor, driving the full
//! Type -> Artist -> Venue -> Event -> Assembly -> Enrichment pipeline
//! against a fake vision provider and in-memory graph/authority fakes.

use async_trait::async_trait;
use poster_core::external::{
    ArtistAuthority, ArtistCandidate, EntityRecord, EntityService, EntityWrite, FilmAuthority,
    KnowledgeBaseSearch, MovieCandidate, MovieCredits, ScoredEntity, SearchOptions,
    VisionProvider, VisionProviderInfo, VisionResponse,
};
use poster_core::types::PosterType;
use poster_core::{Collaborators, IterativeProcessor};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Returns a canned JSON response keyed by the first matching substring found
/// in the prompt text. Prompts are stable per (phase, poster type) by design
/// (see `prompts.rs`), so matching on their distinguishing phrases is safe.
struct ScriptedVision {
    responses: Vec<(&'static str, &'static str)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedVision {
    fn new(responses: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            responses,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VisionProvider for ScriptedVision {
    async fn extract(&self, _image_path: &Path, prompt: &str) -> anyhow::Result<VisionResponse> {
        self.calls.lock().unwrap().push(prompt.to_string());
        for (needle, response) in &self.responses {
            if prompt.contains(needle) {
                return Ok(VisionResponse {
                    extracted_text: response.to_string(),
                    model: "fake-vision-1".to_string(),
                });
            }
        }
        Ok(VisionResponse {
            extracted_text: "{}".to_string(),
            model: "fake-vision-1".to_string(),
        })
    }

    fn info(&self) -> VisionProviderInfo {
        VisionProviderInfo {
            name: "fake-vision-1".to_string(),
            provider: "test".to_string(),
            parameters: None,
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// An in-memory, idempotent graph used to assert vertex/edge shape and to
/// exercise the "second ingest creates nothing new" invariant.
#[derive(Default)]
struct InMemoryGraph {
    entities: Mutex<HashMap<String, EntityRecord>>,
}

#[async_trait]
impl EntityService for InMemoryGraph {
    async fn get_entity(&self, id: &str) -> anyhow::Result<Option<EntityRecord>> {
        Ok(self.entities.lock().unwrap().get(id).cloned())
    }

    async fn create_entities(&self, entities: &[EntityWrite]) -> anyhow::Result<()> {
        let mut store = self.entities.lock().unwrap();
        for entity in entities {
            store.insert(
                entity.id.clone(),
                EntityRecord {
                    id: entity.id.clone(),
                    entity_type: entity.entity_type.clone(),
                    payload: entity.payload.clone(),
                },
            );
        }
        Ok(())
    }
}

struct NoopKnowledgeBase;

#[async_trait]
impl KnowledgeBaseSearch for NoopKnowledgeBase {
    async fn search(&self, _text: &str, _options: SearchOptions) -> anyhow::Result<Vec<ScoredEntity>> {
        Ok(Vec::new())
    }
}

struct FakeFilmAuthority;

#[async_trait]
impl FilmAuthority for FakeFilmAuthority {
    async fn search_movie(&self, _title: &str, _year: Option<i32>) -> anyhow::Result<Vec<MovieCandidate>> {
        Ok(vec![MovieCandidate {
            id: "603".to_string(),
            title: "REDACTED".to_string(),
            release_date: Some("2023-01-01".to_string()),
            vote_average: Some(7.8),
        }])
    }

    async fn get_movie(&self, _id: &str) -> anyhow::Result<Option<MovieCandidate>> {
        Ok(None)
    }

    async fn get_movie_credits(&self, _id: &str) -> anyhow::Result<MovieCredits> {
        use poster_core::external::CreditedPerson;
        Ok(MovieCredits {
            cast: vec![
                CreditedPerson {
                    id: "1".to_string(),
                    name: "B. Star".to_string(),
                    order: 0,
                },
                CreditedPerson {
                    id: "2".to_string(),
                    name: "C. Star".to_string(),
                    order: 1,
                },
            ],
            crew: vec![CreditedPerson {
                id: "9".to_string(),
                name: "A. Director".to_string(),
                order: 0,
            }],
        })
    }
}

struct NoopArtistAuthority;

#[async_trait]
impl ArtistAuthority for NoopArtistAuthority {
    async fn search_artist(&self, _name: &str) -> anyhow::Result<Vec<ArtistCandidate>> {
        Ok(Vec::new())
    }
}

async fn write_fixture_image(bytes: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
}

/// Scenario 1: concert poster with full logistics in one shot.
#[tokio::test]
async fn concert_poster_produces_full_vertex_and_edge_set() {
    let vision = ScriptedVision::new(vec![
        (
            "Classify it as",
            r#"{"poster_type": "concert", "confidence": 92, "evidence": ["doors", "tickets"], "extracted_text": "THE EXAMPLES at The Club, Fri 15 March 2024, Doors 7pm, Show 8pm, $20, 21+", "visual": {"has_artist_photo": true, "has_album_art": false, "has_logo": false, "dominant_colors": ["red"], "style": "photographic"}}"#,
        ),
        (
            "Identify the performers",
            r#"{"headliner": "THE EXAMPLES", "supporting_acts": [], "tour_name": null, "record_label": null}"#,
        ),
        (
            "Identify the venue",
            r#"{"venue": "The Club", "city": "Springfield", "state": null, "country": null}"#,
        ),
        (
            "Identify the event date(s)",
            r#"{"event_date": "15 March 2024", "year": 2024, "door_time": "7pm", "show_time": "8pm", "ticket_price": "$20", "age_restriction": "21+", "promoter": null}"#,
        ),
    ]);

    let graph = std::sync::Arc::new(InMemoryGraph::default());
    let collaborators = Collaborators {
        entity_service: Some(graph.clone()),
        relation_service: None,
        knowledge_base: Some(std::sync::Arc::new(NoopKnowledgeBase)),
        artist_authority: Some(std::sync::Arc::new(NoopArtistAuthority)),
        ..Default::default()
    };
    let processor = IterativeProcessor::new(std::sync::Arc::new(vision), collaborators, Default::default());

    let image = write_fixture_image(b"concert-poster-fixture").await;
    let result = processor.process(image.path(), &CancellationToken::new()).await;

    assert!(result.success, "cause: {:?}", result.cause);
    let poster = result.poster.expect("poster should be assembled");
    assert_eq!(poster.poster_type, PosterType::Concert);
    assert_eq!(poster.headliner.as_deref(), Some("THE EXAMPLES"));
    assert_eq!(poster.venue_name.as_deref(), Some("The Club"));
    assert_eq!(poster.event_year, Some(2024));
    assert_eq!(poster.door_time.as_deref(), Some("7pm"));
    assert_eq!(poster.show_time.as_deref(), Some("8pm"));
    assert_eq!(poster.ticket_price.as_deref(), Some("$20"));
    assert_eq!(poster.age_restriction.as_deref(), Some("21+"));

    let entities = graph.entities.lock().unwrap();
    assert!(entities.values().any(|e| e.entity_type == "Poster"));
    assert!(entities.values().any(|e| e.entity_type == "Artist"));
    assert!(entities.values().any(|e| e.entity_type == "Venue"));
    assert!(entities.values().any(|e| e.entity_type == "Event"));
}

/// Scenario 2: film poster with director/cast, enriched with tmdb ids.
#[tokio::test]
async fn film_poster_enriches_credits_from_film_authority() {
    let vision = ScriptedVision::new(vec![
        (
            "Classify it as",
            r#"{"poster_type": "film", "confidence": 95, "evidence": ["starring", "directed by"], "extracted_text": "REDACTED -- Directed by A. Director -- Starring B. Star, C. Star -- 2023 -- R", "visual": {"has_artist_photo": false, "has_album_art": false, "has_logo": false, "dominant_colors": [], "style": "typographic"}}"#,
        ),
        (
            "Identify the film credits",
            r#"{"director": "A. Director", "cast": ["B. Star", "C. Star"]}"#,
        ),
        (
            "Identify the venue",
            r#"{"venue": null, "city": null, "state": null, "country": null}"#,
        ),
        (
            "Identify the release date",
            r#"{"release_date": "2023", "year": 2023}"#,
        ),
    ]);

    let graph = std::sync::Arc::new(InMemoryGraph::default());
    let collaborators = Collaborators {
        entity_service: Some(graph.clone()),
        film_authority: Some(std::sync::Arc::new(FakeFilmAuthority)),
        ..Default::default()
    };
    let processor = IterativeProcessor::new(std::sync::Arc::new(vision), collaborators, Default::default());

    let image = write_fixture_image(b"film-poster-fixture").await;
    let result = processor.process(image.path(), &CancellationToken::new()).await;

    assert!(result.success, "cause: {:?}", result.cause);
    let poster = result.poster.unwrap();
    assert_eq!(poster.poster_type, PosterType::Film);
    assert!(poster.observations.iter().any(|o| o.starts_with("vote_average:")));

    let enrichment = result
        .phase_results
        .iter()
        .find(|(phase, _)| *phase == poster_core::phases::PhaseName::Enrichment)
        .map(|(_, r)| r.clone())
        .unwrap();
    assert_eq!(enrichment.status, poster_core::phases::PhaseStatus::Completed);

    let entities = graph.entities.lock().unwrap();
    let director_count = entities.values().filter(|e| e.entity_type == "Artist").count();
    assert!(director_count >= 3, "director + 2 cast members should all be written");
}

/// Scenario 3: festival poster with a two-day lineup, split from one string.
#[tokio::test]
async fn festival_poster_splits_into_two_shows() {
    let vision = ScriptedVision::new(vec![
        (
            "Classify it as",
            r#"{"poster_type": "festival", "confidence": 90, "evidence": ["festival", "lineup"], "extracted_text": "HEADLINER . BAND TWO . BAND THREE . BAND FOUR . BAND FIVE, Saturday & Sunday, 12-13 July 2025, Fair Park, Springfield", "visual": {"has_artist_photo": false, "has_album_art": false, "has_logo": true, "dominant_colors": [], "style": "mixed"}}"#,
        ),
        (
            "Identify the performers",
            r#"{"headliner": "HEADLINER", "supporting_acts": ["BAND TWO", "BAND THREE", "BAND FOUR", "BAND FIVE"], "tour_name": null, "record_label": null}"#,
        ),
        (
            "Identify the venue",
            r#"{"venue": "Fair Park", "city": "Springfield", "state": null, "country": null}"#,
        ),
        (
            "Identify the festival dates",
            r#"{"start_date": "12-13 July 2025", "year": 2025, "shows": [{"event_date": "12-13 July 2025"}]}"#,
        ),
    ]);

    let collaborators = Collaborators::default();
    let processor = IterativeProcessor::new(std::sync::Arc::new(vision), collaborators, Default::default());

    let image = write_fixture_image(b"festival-poster-fixture").await;
    let result = processor.process(image.path(), &CancellationToken::new()).await;

    assert!(result.success, "cause: {:?}", result.cause);
    let event_payload = result
        .phase_results
        .iter()
        .find_map(|(phase, r)| {
            if *phase == poster_core::phases::PhaseName::Event {
                r.payload.clone()
            } else {
                None
            }
        })
        .unwrap();
    let poster_core::phases::PhasePayload::Event(event) = event_payload else {
        panic!("expected an Event payload");
    };
    assert_eq!(event.shows.len(), 2);
    assert_eq!(event.shows[0].date.day, Some(12));
    assert_eq!(event.shows[1].date.day, Some(13));

    let poster = result.poster.unwrap();
    assert_eq!(poster.headliner.as_deref(), Some("HEADLINER"));
    assert_eq!(poster.supporting_acts.len(), 4);
    assert_eq!(poster.venue_name.as_deref(), Some("Fair Park"));
    assert_eq!(poster.city.as_deref(), Some("Springfield"));
}

/// Scenario 4: album poster assembles the album-specific entity/edge set.
#[tokio::test]
async fn album_poster_creates_album_and_label_vertices() {
    let vision = ScriptedVision::new(vec![
        (
            "Classify it as",
            r#"{"poster_type": "album", "confidence": 88, "evidence": ["new single", "out now"], "extracted_text": "ARTIST -- NEW ALBUM 'TITLE' -- Out March 2024 -- on Label Records", "visual": {"has_artist_photo": false, "has_album_art": true, "has_logo": false, "dominant_colors": [], "style": "mixed"}}"#,
        ),
        (
            "Identify the recording artist",
            r#"{"headliner": "ARTIST", "album_title": "TITLE", "record_label": "Label Records", "featured_artists": []}"#,
        ),
        (
            "Identify any venue information",
            r#"{"venue": null, "city": null, "state": null, "country": null, "streaming_only": true}"#,
        ),
        (
            "Identify the release date",
            r#"{"release_date": "March 2024", "year": 2024}"#,
        ),
    ]);

    let graph = std::sync::Arc::new(InMemoryGraph::default());
    let collaborators = Collaborators {
        entity_service: Some(graph.clone()),
        ..Default::default()
    };
    let processor = IterativeProcessor::new(std::sync::Arc::new(vision), collaborators, Default::default());

    let image = write_fixture_image(b"album-poster-fixture").await;
    let result = processor.process(image.path(), &CancellationToken::new()).await;

    assert!(result.success, "cause: {:?}", result.cause);
    let poster = result.poster.unwrap();
    assert_eq!(poster.poster_type, PosterType::Album);
    assert_eq!(poster.record_label.as_deref(), Some("Label Records"));

    let entities = graph.entities.lock().unwrap();
    assert!(entities.values().any(|e| e.entity_type == "Album"));
    assert!(entities.values().any(|e| e.entity_type == "Organization"));
}

/// Scenario 5: garbled vision output keeps the poster at `unknown`, flagged
/// for review, but still produces a Poster vertex.
#[tokio::test]
async fn unreadable_poster_falls_back_to_unknown_needing_review() {
    let vision = ScriptedVision::new(vec![
        ("Classify it as", "complete garbage, not json at all"),
        ("Your previous classification", "still garbage"),
    ]);

    let mut config = poster_common::config::ExtractionConfig::default();
    config.enable_knowledge_base = false;
    let collaborators = Collaborators::default();
    let processor = IterativeProcessor::new(std::sync::Arc::new(vision), collaborators, config);

    let image = write_fixture_image(b"garbled-poster-fixture").await;
    let result = processor.process(image.path(), &CancellationToken::new()).await;

    let poster = result.poster.expect("even an unknown poster is still persisted");
    assert_eq!(poster.poster_type, PosterType::Unknown);
    assert!(result.fields_needing_review.contains(&"poster_type".to_string()));
    assert!(result.overall_confidence <= 0.5);
    assert_eq!(poster.inferred_types.len(), 1);
    assert!(poster.inferred_types[0].is_primary);
    assert_eq!(poster.inferred_types[0].type_key, PosterType::Unknown);
}

/// Scenario 6: hybrid poster runs both the album and event assembly paths.
#[tokio::test]
async fn hybrid_poster_runs_both_album_and_event_paths() {
    let vision = ScriptedVision::new(vec![
        (
            "Classify it as",
            r#"{"poster_type": "hybrid", "confidence": 85, "evidence": ["album release party"], "extracted_text": "ARTIST album release party, live at The Club, Friday 10 May 2024", "visual": {"has_artist_photo": true, "has_album_art": true, "has_logo": false, "dominant_colors": [], "style": "mixed"}}"#,
        ),
        (
            "Identify the recording artist",
            r#"{"headliner": "ARTIST", "album_title": "NEW RECORD", "record_label": null, "featured_artists": []}"#,
        ),
        (
            "Identify the venue",
            r#"{"venue": "The Club", "city": "Springfield", "state": null, "country": null}"#,
        ),
        (
            "Identify the event date(s)",
            r#"{"event_date": "10 May 2024", "year": 2024}"#,
        ),
    ]);

    let graph = std::sync::Arc::new(InMemoryGraph::default());
    let collaborators = Collaborators {
        entity_service: Some(graph.clone()),
        ..Default::default()
    };
    let processor = IterativeProcessor::new(std::sync::Arc::new(vision), collaborators, Default::default());

    let image = write_fixture_image(b"hybrid-poster-fixture").await;
    let result = processor.process(image.path(), &CancellationToken::new()).await;

    assert!(result.success, "cause: {:?}", result.cause);
    let poster = result.poster.unwrap();
    assert_eq!(poster.poster_type, PosterType::Hybrid);
    assert_eq!(poster.inferred_types.len(), 3);
    assert!(poster.inferred_types.iter().any(|t| t.type_key == PosterType::Album && !t.is_primary));
    assert!(poster.inferred_types.iter().any(|t| t.type_key == PosterType::Concert && !t.is_primary));

    let entities = graph.entities.lock().unwrap();
    assert!(entities.values().any(|e| e.entity_type == "Album"));
    assert!(entities.values().any(|e| e.entity_type == "Event"));
}

/// Idempotence: processing the same image bytes twice yields the same
/// `poster_id` and creates no new vertices on the second run.
#[tokio::test]
async fn reprocessing_the_same_image_is_idempotent() {
    let vision = std::sync::Arc::new(ScriptedVision::new(vec![
        (
            "Classify it as",
            r#"{"poster_type": "concert", "confidence": 92, "evidence": [], "extracted_text": "THE EXAMPLES at The Club, 15 March 2024", "visual": {"has_artist_photo": false, "has_album_art": false, "has_logo": false, "dominant_colors": [], "style": "other"}}"#,
        ),
        (
            "Identify the performers",
            r#"{"headliner": "THE EXAMPLES", "supporting_acts": [], "tour_name": null, "record_label": null}"#,
        ),
        (
            "Identify the venue",
            r#"{"venue": "The Club", "city": "Springfield", "state": null, "country": null}"#,
        ),
        (
            "Identify the event date(s)",
            r#"{"event_date": "15 March 2024", "year": 2024}"#,
        ),
    ]));

    let graph = std::sync::Arc::new(InMemoryGraph::default());
    let collaborators = Collaborators {
        entity_service: Some(graph.clone()),
        ..Default::default()
    };
    let processor = IterativeProcessor::new(vision, collaborators, Default::default());

    let image = write_fixture_image(b"idempotence-fixture").await;
    let first = processor.process(image.path(), &CancellationToken::new()).await;
    let count_after_first = graph.entities.lock().unwrap().len();

    let second = processor.process(image.path(), &CancellationToken::new()).await;
    let count_after_second = graph.entities.lock().unwrap().len();

    assert_eq!(first.poster_id, second.poster_id);
    assert_eq!(count_after_first, count_after_second);
}

/// Batch processing never aborts on a single failing item, and its summary
/// accounts for every path exactly once.
#[tokio::test]
async fn batch_processing_tolerates_a_missing_image() {
    let vision = std::sync::Arc::new(ScriptedVision::new(vec![(
        "Classify it as",
        r#"{"poster_type": "promo", "confidence": 80, "evidence": [], "extracted_text": "Coming soon", "visual": {"has_artist_photo": false, "has_album_art": false, "has_logo": false, "dominant_colors": [], "style": "other"}}"#,
    )]));

    let collaborators = Collaborators::default();
    let processor = IterativeProcessor::new(vision, collaborators, Default::default());

    let good_image = write_fixture_image(b"promo-poster-fixture").await;
    let paths = vec![good_image.path().to_path_buf(), std::path::PathBuf::from("/nonexistent/does-not-exist.jpg")];

    let batch = processor.process_batch(&paths, &CancellationToken::new(), None).await;
    assert_eq!(batch.results.len(), 2);
    assert_eq!(batch.summary.successful + batch.summary.failed, 2);
    assert_eq!(batch.summary.failed, 1);
}
