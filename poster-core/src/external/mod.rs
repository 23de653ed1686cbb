//! Contracts with the four external collaborator families: the vision
//! provider, the graph/entity persistence layer, local knowledge-base search,
//! and the authoritative validators. All but the vision provider are
//! optional; every phase that consumes one checks for its presence and
//! degrades gracefully when it's absent.

pub mod authorities;
pub mod graph;
pub mod knowledge_base;
pub mod vision;

pub use authorities::{
    ArtistAuthority, ArtistCandidate, CreditedPerson, FilmAuthority, LabelInfo, MovieCandidate,
    MovieCredits, ReleaseAuthority, ReleaseCandidate, SecondaryMusicAuthority,
    SecondaryReleaseCandidate,
};
pub use graph::{EntityRecord, EntityService, EntityWrite, RelationService};
pub use knowledge_base::{KnowledgeBaseSearch, ScoredEntity, SearchOptions};
pub use vision::{VisionProvider, VisionProviderInfo, VisionResponse};
