//! Authoritative external catalogs used to canonicalize names and fetch
//! credits: a music artist authority (MusicBrainz-shaped), a music release
//! authority, a secondary release catalog (Discogs-shaped), and a film
//! authority (TMDB-shaped). All four are optional; Artist, Event, and
//! Enrichment degrade to "use the extracted value as-is" when a given
//! authority isn't wired up.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ArtistCandidate {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait ArtistAuthority: Send + Sync {
    async fn search_artist(&self, name: &str) -> anyhow::Result<Vec<ArtistCandidate>>;
}

#[derive(Debug, Clone)]
pub struct LabelInfo {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ReleaseCandidate {
    pub id: String,
    pub title: String,
    pub date: Option<String>,
    pub country: Option<String>,
    pub label_info: Vec<LabelInfo>,
}

#[async_trait]
pub trait ReleaseAuthority: Send + Sync {
    async fn search_release(&self, title: &str, artist: &str) -> anyhow::Result<Vec<ReleaseCandidate>>;
}

/// A secondary music database (Discogs-shaped), consulted only when the
/// primary release authority filled at most one field.
#[derive(Debug, Clone)]
pub struct SecondaryReleaseCandidate {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub label: Vec<String>,
    pub genre: Vec<String>,
    pub style: Vec<String>,
}

#[async_trait]
pub trait SecondaryMusicAuthority: Send + Sync {
    async fn search_release(&self, query: &str) -> anyhow::Result<Vec<SecondaryReleaseCandidate>>;
}

#[derive(Debug, Clone)]
pub struct MovieCandidate {
    pub id: String,
    pub title: String,
    pub release_date: Option<String>,
    pub vote_average: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CreditedPerson {
    pub id: String,
    pub name: String,
    /// Billing / cast order, 0-based as most film catalogs report it.
    pub order: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MovieCredits {
    pub cast: Vec<CreditedPerson>,
    pub crew: Vec<CreditedPerson>,
}

#[async_trait]
pub trait FilmAuthority: Send + Sync {
    async fn search_movie(&self, title: &str, year: Option<i32>) -> anyhow::Result<Vec<MovieCandidate>>;

    async fn get_movie(&self, id: &str) -> anyhow::Result<Option<MovieCandidate>>;

    async fn get_movie_credits(&self, id: &str) -> anyhow::Result<MovieCredits>;
}
