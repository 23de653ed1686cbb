//! The entity/relationship data model described in the poster graph: the
//! closed poster-type enumeration, extraction primitives (`Match`, `DateInfo`,
//! `ShowInfo`), the assembled `PosterEntity`, its related vertices, and the
//! typed edges between them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed poster-type enumeration. Every phase that branches on poster type
/// matches exhaustively over this set; there is no catch-all variant besides
/// [`PosterType::Unknown`] itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosterType {
    Concert,
    Festival,
    Comedy,
    Theater,
    Film,
    Album,
    Promo,
    Exhibition,
    Hybrid,
    Unknown,
}

impl PosterType {
    pub const ALL: [PosterType; 10] = [
        PosterType::Concert,
        PosterType::Festival,
        PosterType::Comedy,
        PosterType::Theater,
        PosterType::Film,
        PosterType::Album,
        PosterType::Promo,
        PosterType::Exhibition,
        PosterType::Hybrid,
        PosterType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PosterType::Concert => "concert",
            PosterType::Festival => "festival",
            PosterType::Comedy => "comedy",
            PosterType::Theater => "theater",
            PosterType::Film => "film",
            PosterType::Album => "album",
            PosterType::Promo => "promo",
            PosterType::Exhibition => "exhibition",
            PosterType::Hybrid => "hybrid",
            PosterType::Unknown => "unknown",
        }
    }

    /// Normalize a free-form model response into the closed enumeration,
    /// mapping common synonyms the vision model tends to produce.
    pub fn normalize(raw: &str) -> PosterType {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "concert" | "show" | "gig" | "live music" => PosterType::Concert,
            "festival" | "music festival" => PosterType::Festival,
            "comedy" | "stand-up" | "standup" | "stand up" => PosterType::Comedy,
            "theater" | "theatre" | "play" | "musical" => PosterType::Theater,
            "film" | "movie" | "cinema" => PosterType::Film,
            "album" | "record" | "release" | "lp" => PosterType::Album,
            "promo" | "promotional" | "advertisement" | "advert" => PosterType::Promo,
            "exhibition" | "gallery" | "art show" | "art exhibit" => PosterType::Exhibition,
            "hybrid" | "mixed" => PosterType::Hybrid,
            _ => PosterType::Unknown,
        }
    }

    /// Whether this type's extractors require a headliner to be present to
    /// avoid `needs_review`.
    pub fn requires_headliner(&self) -> bool {
        matches!(
            self,
            PosterType::Concert
                | PosterType::Festival
                | PosterType::Comedy
                | PosterType::Theater
                | PosterType::Album
                | PosterType::Hybrid
        )
    }

    /// Whether this type's extractors require a venue to avoid `needs_review`.
    pub fn requires_venue(&self) -> bool {
        matches!(
            self,
            PosterType::Concert
                | PosterType::Festival
                | PosterType::Comedy
                | PosterType::Theater
                | PosterType::Exhibition
                | PosterType::Hybrid
        )
    }

    /// Whether a missing event date is acceptable for this type.
    pub fn date_is_optional(&self) -> bool {
        matches!(self, PosterType::Promo | PosterType::Unknown)
    }
}

impl fmt::Display for PosterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual presentation style, a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualStyle {
    Photographic,
    Illustrated,
    Typographic,
    Mixed,
    Other,
}

impl VisualStyle {
    pub fn parse(raw: &str) -> VisualStyle {
        match raw.trim().to_lowercase().as_str() {
            "photographic" | "photo" => VisualStyle::Photographic,
            "illustrated" | "illustration" | "drawn" => VisualStyle::Illustrated,
            "typographic" | "typography" | "text-only" | "text only" => VisualStyle::Typographic,
            "mixed" => VisualStyle::Mixed,
            _ => VisualStyle::Other,
        }
    }
}

/// Visual cues extracted from the poster image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualElements {
    pub has_artist_photo: bool,
    pub has_album_art: bool,
    pub has_logo: bool,
    pub dominant_colors: Vec<String>,
    pub style: Option<VisualStyle>,
}

/// An extracted string, optionally canonicalized and tagged with an external
/// id by an authoritative validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub extracted: String,
    pub validated: Option<String>,
    pub confidence: f64,
    /// Source-prefixed external id, e.g. `mbid:...`, `tmdb:...`.
    pub external_id: Option<String>,
    pub source: String,
}

impl Match {
    pub fn new(extracted: impl Into<String>, confidence: f64, source: impl Into<String>) -> Self {
        Self {
            extracted: extracted.into(),
            validated: None,
            confidence,
            external_id: None,
            source: source.into(),
        }
    }

    /// The name to display: the validator-canonicalized name if present,
    /// otherwise the raw extraction.
    pub fn display_name(&self) -> &str {
        self.validated.as_deref().unwrap_or(&self.extracted)
    }

    pub fn with_validation(mut self, canonical_name: impl Into<String>, external_id: impl Into<String>) -> Self {
        self.validated = Some(canonical_name.into());
        self.external_id = Some(external_id.into());
        self
    }
}

/// Format tag for a parsed date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    Parsed,
    YearOnly,
}

/// A date as printed on the poster, plus whatever of it the parser could
/// resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateInfo {
    pub raw: String,
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub resolved: Option<NaiveDate>,
    pub confidence: f64,
    pub format: DateFormat,
}

impl DateInfo {
    pub fn year_only(raw: impl Into<String>, year: i32) -> Self {
        Self {
            raw: raw.into(),
            day: None,
            month: None,
            year: Some(year),
            resolved: None,
            confidence: 0.6,
            format: DateFormat::YearOnly,
        }
    }
}

/// One dated performance advertised by a poster. A poster may advertise
/// several; `ordinal` is its 1-based position among them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowInfo {
    pub date: DateInfo,
    pub day_of_week: Option<String>,
    pub door_time: Option<String>,
    pub show_time: Option<String>,
    pub ticket_price: Option<String>,
    pub age_restriction: Option<String>,
    pub ordinal: u32,
}

/// One candidate poster type with its supporting evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeInference {
    pub type_key: PosterType,
    pub confidence: f64,
    pub source: String,
    pub evidence: Vec<String>,
    pub is_primary: bool,
}

/// Source-derived metadata attached to a persisted `PosterEntity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosterMetadata {
    pub source_hash: String,
    pub vision_model: String,
    pub processing_time_ms: u64,
    pub overall_confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The final, schema-conformant record written to the graph for one poster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosterEntity {
    pub id: String,
    pub entity_type: &'static str,
    pub poster_type: PosterType,
    pub inferred_types: Vec<TypeInference>,
    pub title: Option<String>,
    pub headliner: Option<String>,
    pub supporting_acts: Vec<String>,
    pub venue_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub event_date: Option<String>,
    pub event_year: Option<i32>,
    pub decade: Option<i32>,
    pub door_time: Option<String>,
    pub show_time: Option<String>,
    pub ticket_price: Option<String>,
    pub age_restriction: Option<String>,
    pub promoter: Option<String>,
    pub tour_name: Option<String>,
    pub record_label: Option<String>,
    pub extracted_text: Option<String>,
    pub visual_elements: VisualElements,
    pub observations: Vec<String>,
    pub metadata: PosterMetadata,
}

/// Related vertex: a performer, director, or cast member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistEntity {
    pub id: String,
    pub name: String,
    pub external_id: Option<String>,
}

/// Related vertex: a performance location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueEntity {
    pub id: String,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Related vertex: one dated show, bound to a venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntity {
    pub id: String,
    pub raw_date: String,
    pub resolved_date: Option<NaiveDate>,
    pub year: Option<i32>,
}

/// Related vertex: a record release advertised by an album/hybrid poster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumEntity {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
}

/// A label or promoter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationKind {
    Label,
    Promoter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationEntity {
    pub id: String,
    pub name: String,
    pub kind: OrganizationKind,
}

/// Any vertex Assembly or Enrichment may create, tagged with whether this
/// particular ingest created it (vs. found it already present).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexWrite {
    pub id: String,
    pub entity_type: String,
    pub is_new: bool,
}

/// Typed edge kinds, exactly as enumerated in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    AdvertisesEvent,
    AdvertisesVenue,
    AdvertisesAlbum,
    HeadlinedOn,
    PerformedOn,
    Headlined,
    PerformedAt,
    HeldAt,
    PromotedBy,
    CreatedBy,
    ReleasedBy,
    DirectedBy,
    Stars,
    HasType,
}

/// A directed, typed edge with optional confidence and free-form metadata
/// (billing order, feature-artist role, type-inference evidence, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub from: String,
    pub to: String,
    pub relation_type: RelationType,
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Relationship {
    pub fn new(from: impl Into<String>, to: impl Into<String>, relation_type: RelationType) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type,
            confidence: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}
