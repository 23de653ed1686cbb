//! Assembly (§4.7): merges the four extractor phases' outputs into one
//! `PosterEntity` plus whatever related vertices and typed edges the poster's
//! type calls for, writing through the optional entity/relation services with
//! idempotent, create-if-absent semantics.

use crate::external::{EntityService, EntityWrite, RelationService};
use crate::phases::artist_phase::ArtistPayload;
use crate::phases::event_phase::EventPayload;
use crate::phases::type_phase::TypePayload;
use crate::phases::venue_phase::VenuePayload;
use crate::phases::{status_from_confidence, PhaseName, PhaseResult, PhaseStatus};
use crate::types::{
    AlbumEntity, ArtistEntity, EventEntity, OrganizationEntity, OrganizationKind, PosterEntity, PosterMetadata,
    PosterType, Relationship, VenueEntity, VertexWrite,
};
use chrono::Utc;
use poster_common::ids;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyPayload {
    pub poster: PosterEntity,
    pub vertices: Vec<VertexWrite>,
    pub relationships: Vec<Relationship>,
}

pub struct Assembly {
    entity_service: Option<Arc<dyn EntityService>>,
    relation_service: Option<Arc<dyn RelationService>>,
}

impl Assembly {
    pub fn new(entity_service: Option<Arc<dyn EntityService>>, relation_service: Option<Arc<dyn RelationService>>) -> Self {
        Self {
            entity_service,
            relation_service,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        poster_id: &str,
        image_path: &str,
        vision_model: &str,
        type_result: &PhaseResult,
        type_payload: &TypePayload,
        artist_result: &PhaseResult,
        artist_payload: &ArtistPayload,
        venue_result: &PhaseResult,
        venue_payload: &VenuePayload,
        event_result: &PhaseResult,
        event_payload: &EventPayload,
    ) -> PhaseResult {
        let start = Instant::now();
        match self
            .run(
                poster_id,
                image_path,
                vision_model,
                type_result,
                type_payload,
                artist_result,
                artist_payload,
                venue_result,
                venue_payload,
                event_result,
                event_payload,
            )
            .await
        {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(phase = "assembly", poster_id, error = %error, "assembly failed");
                PhaseResult::failed(poster_id, image_path, PhaseName::Assembly, start.elapsed().as_millis() as u64, error.to_string())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        poster_id: &str,
        image_path: &str,
        vision_model: &str,
        type_result: &PhaseResult,
        type_payload: &TypePayload,
        artist_result: &PhaseResult,
        artist_payload: &ArtistPayload,
        venue_result: &PhaseResult,
        venue_payload: &VenuePayload,
        event_result: &PhaseResult,
        event_payload: &EventPayload,
    ) -> anyhow::Result<PhaseResult> {
        let start = Instant::now();
        let poster_type = type_payload.poster_type;

        let mut vertices: Vec<VertexWrite> = Vec::new();
        let mut relationships: Vec<Relationship> = Vec::new();

        let observations = build_observations(type_payload, artist_payload, venue_payload, event_payload);

        let headliner_name = artist_payload.headliner.as_ref().map(|m| m.display_name().to_string());
        let first_show = event_payload.shows.first();

        let poster = PosterEntity {
            id: poster_id.to_string(),
            entity_type: "Poster",
            poster_type,
            inferred_types: type_payload.secondary_types.clone(),
            title: headliner_name.clone().or_else(|| artist_payload.album_title.clone()),
            headliner: headliner_name.clone(),
            supporting_acts: artist_payload.supporting_acts.iter().map(|m| m.display_name().to_string()).collect(),
            venue_name: venue_payload.venue.as_ref().map(|m| m.display_name().to_string()),
            city: venue_payload.city.clone(),
            state: venue_payload.state.clone(),
            country: venue_payload.country.clone(),
            event_date: first_show.map(|s| s.date.raw.clone()),
            event_year: first_show.and_then(|s| s.date.year),
            decade: first_show.and_then(|s| s.date.year).map(|y| (y / 10) * 10),
            door_time: event_payload.door_time.clone(),
            show_time: event_payload.show_time.clone(),
            ticket_price: event_payload.ticket_price.clone(),
            age_restriction: event_payload.age_restriction.clone(),
            promoter: event_payload.promoter.clone(),
            tour_name: artist_payload.tour_name.clone(),
            record_label: artist_payload.record_label.clone(),
            extracted_text: Some(type_payload.extracted_text.clone()),
            visual_elements: type_payload.visual.clone(),
            observations,
            metadata: PosterMetadata {
                source_hash: poster_id.to_string(),
                vision_model: vision_model.to_string(),
                processing_time_ms: type_result.processing_time_ms
                    + artist_result.processing_time_ms
                    + venue_result.processing_time_ms
                    + event_result.processing_time_ms,
                overall_confidence: mean_confidence(&[type_result, artist_result, venue_result, event_result]),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        };

        // The Poster vertex is the whole record; its write failure fails the
        // phase. Everything after this point degrades to a warning/error list
        // instead, because a partial graph is still useful.
        let poster_write = create_if_absent(&self.entity_service, &poster.id, "Poster", serde_json::to_value(&poster)?).await?;
        vertices.push(poster_write);

        let mut errors = Vec::new();

        let artist_vertex = if let Some(name) = &headliner_name {
            match create_if_absent(&self.entity_service, &ids::entity_id("artist", name), "Artist", artist_json(name)).await {
                Ok(v) => Some(v),
                Err(e) => {
                    errors.push(format!("failed to write artist vertex: {e}"));
                    None
                }
            }
        } else {
            None
        };

        match poster_type {
            PosterType::Album | PosterType::Hybrid => {
                self.assemble_album_path(&poster, artist_payload, artist_vertex.as_ref(), &mut vertices, &mut relationships, &mut errors)
                    .await;
                if poster_type == PosterType::Hybrid {
                    self.assemble_event_path(
                        &poster,
                        venue_payload,
                        event_payload,
                        artist_vertex.as_ref(),
                        artist_payload,
                        &mut vertices,
                        &mut relationships,
                        &mut errors,
                    )
                    .await;
                }
            }
            PosterType::Film => {
                self.assemble_film_path(&poster, artist_payload, &mut vertices, &mut relationships, &mut errors).await;
            }
            PosterType::Concert | PosterType::Festival | PosterType::Comedy | PosterType::Theater => {
                self.assemble_event_path(
                    &poster,
                    venue_payload,
                    event_payload,
                    artist_vertex.as_ref(),
                    artist_payload,
                    &mut vertices,
                    &mut relationships,
                    &mut errors,
                )
                .await;
            }
            PosterType::Promo | PosterType::Exhibition | PosterType::Unknown => {
                if let Some(artist_vertex) = &artist_vertex {
                    relationships.push(Relationship::new(artist_vertex.id.clone(), poster.id.clone(), crate::types::RelationType::HeadlinedOn));
                }
                if let Some(venue) = &venue_payload.venue {
                    let venue_id = venue_payload.existing_venue_id.clone().unwrap_or_else(|| ids::entity_id("venue", venue.display_name()));
                    match create_if_absent(&self.entity_service, &venue_id, "Venue", venue_json(&venue_id, venue_payload)).await {
                        Ok(v) => {
                            vertices.push(v);
                            relationships.push(Relationship::new(poster.id.clone(), venue_id, crate::types::RelationType::AdvertisesVenue));
                        }
                        Err(e) => errors.push(format!("failed to write venue vertex: {e}")),
                    }
                }
            }
        }

        for inferred in &type_payload.secondary_types {
            let type_vertex_id = format!("type:{}", inferred.type_key.as_str());
            match create_if_absent(&self.entity_service, &type_vertex_id, "PosterType", serde_json::json!({"key": inferred.type_key})).await {
                Ok(v) => vertices.push(v),
                Err(e) => errors.push(format!("failed to write poster-type vertex: {e}")),
            }
            let mut edge = Relationship::new(poster.id.clone(), type_vertex_id, crate::types::RelationType::HasType)
                .with_confidence(inferred.confidence)
                .with_meta("source", inferred.source.clone())
                .with_meta("is_primary", inferred.is_primary);
            if !inferred.evidence.is_empty() {
                edge = edge.with_meta("evidence", inferred.evidence.join(", "));
            }
            relationships.push(edge);
        }

        if let Some(relation_service) = &self.relation_service {
            if let Err(e) = relation_service.create_relations(&relationships).await {
                errors.push(format!("failed to write relationships: {e}"));
            }
        }

        let all_completed = [type_result, artist_result, venue_result, event_result]
            .iter()
            .all(|r| r.status == PhaseStatus::Completed);
        let confidence = mean_confidence(&[type_result, artist_result, venue_result, event_result]);

        Ok(PhaseResult {
            poster_id: poster_id.to_string(),
            image_path: image_path.to_string(),
            phase: PhaseName::Assembly,
            status: status_from_confidence(confidence, 0.0, all_completed),
            confidence,
            processing_time_ms: start.elapsed().as_millis() as u64,
            warnings: Vec::new(),
            errors,
            payload: Some(crate::phases::PhasePayload::Assembly(AssemblyPayload {
                poster,
                vertices,
                relationships,
            })),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn assemble_album_path(
        &self,
        poster: &PosterEntity,
        artist_payload: &ArtistPayload,
        artist_vertex: Option<&VertexWrite>,
        vertices: &mut Vec<VertexWrite>,
        relationships: &mut Vec<Relationship>,
        errors: &mut Vec<String>,
    ) {
        let Some(album_title) = &artist_payload.album_title else {
            return;
        };
        let album_id = ids::entity_id("album", album_title);
        let album = AlbumEntity {
            id: album_id.clone(),
            title: album_title.clone(),
            year: poster.event_year,
        };
        match create_if_absent(&self.entity_service, &album_id, "Album", serde_json::json!(album)).await {
            Ok(v) => vertices.push(v),
            Err(e) => {
                errors.push(format!("failed to write album vertex: {e}"));
                return;
            }
        }
        relationships.push(Relationship::new(poster.id.clone(), album_id.clone(), crate::types::RelationType::AdvertisesAlbum));

        if let Some(artist_vertex) = artist_vertex {
            relationships.push(
                Relationship::new(album_id.clone(), artist_vertex.id.clone(), crate::types::RelationType::CreatedBy)
                    .with_meta("role", "primary"),
            );
            relationships.push(Relationship::new(artist_vertex.id.clone(), poster.id.clone(), crate::types::RelationType::HeadlinedOn));
        }

        for featured in &artist_payload.featured_artists {
            let featured_id = ids::entity_id("artist", featured.display_name());
            match create_if_absent(&self.entity_service, &featured_id, "Artist", artist_json(featured.display_name())).await {
                Ok(v) => {
                    vertices.push(v);
                    relationships
                        .push(Relationship::new(album_id.clone(), featured_id, crate::types::RelationType::CreatedBy).with_meta("role", "featured"));
                }
                Err(e) => errors.push(format!("failed to write featured artist vertex: {e}")),
            }
        }

        if let Some(label) = &artist_payload.record_label {
            let label_id = ids::entity_id("org", label);
            let organization = OrganizationEntity {
                id: label_id.clone(),
                name: label.clone(),
                kind: OrganizationKind::Label,
            };
            match create_if_absent(&self.entity_service, &label_id, "Organization", serde_json::json!(organization)).await {
                Ok(v) => {
                    vertices.push(v);
                    relationships.push(Relationship::new(album_id, label_id, crate::types::RelationType::ReleasedBy));
                }
                Err(e) => errors.push(format!("failed to write label vertex: {e}")),
            }
        }
    }

    async fn assemble_film_path(
        &self,
        poster: &PosterEntity,
        artist_payload: &ArtistPayload,
        vertices: &mut Vec<VertexWrite>,
        relationships: &mut Vec<Relationship>,
        errors: &mut Vec<String>,
    ) {
        if let Some(director) = &artist_payload.director {
            let director_id = ids::entity_id("artist", director.display_name());
            match create_if_absent(&self.entity_service, &director_id, "Artist", artist_json(director.display_name())).await {
                Ok(v) => {
                    vertices.push(v);
                    relationships.push(Relationship::new(poster.id.clone(), director_id, crate::types::RelationType::DirectedBy));
                }
                Err(e) => errors.push(format!("failed to write director vertex: {e}")),
            }
        }

        let cast: Vec<crate::types::Match> = if artist_payload.cast.is_empty() {
            artist_payload.headliner.clone().into_iter().collect()
        } else {
            artist_payload.cast.clone()
        };

        for (index, member) in cast.iter().enumerate() {
            let member_id = ids::entity_id("artist", member.display_name());
            match create_if_absent(&self.entity_service, &member_id, "Artist", artist_json(member.display_name())).await {
                Ok(v) => {
                    vertices.push(v);
                    relationships.push(
                        Relationship::new(poster.id.clone(), member_id, crate::types::RelationType::Stars)
                            .with_meta("billing_order", (index as u64) + 1),
                    );
                }
                Err(e) => errors.push(format!("failed to write cast vertex: {e}")),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn assemble_event_path(
        &self,
        poster: &PosterEntity,
        venue_payload: &VenuePayload,
        event_payload: &EventPayload,
        artist_vertex: Option<&VertexWrite>,
        artist_payload: &ArtistPayload,
        vertices: &mut Vec<VertexWrite>,
        relationships: &mut Vec<Relationship>,
        errors: &mut Vec<String>,
    ) {
        let venue_id = match &venue_payload.venue {
            Some(venue) => {
                let venue_id = venue_payload.existing_venue_id.clone().unwrap_or_else(|| ids::entity_id("venue", venue.display_name()));
                match create_if_absent(&self.entity_service, &venue_id, "Venue", venue_json(&venue_id, venue_payload)).await {
                    Ok(v) => {
                        vertices.push(v);
                        relationships.push(Relationship::new(poster.id.clone(), venue_id.clone(), crate::types::RelationType::AdvertisesVenue));
                        Some(venue_id)
                    }
                    Err(e) => {
                        errors.push(format!("failed to write venue vertex: {e}"));
                        None
                    }
                }
            }
            None => None,
        };

        let organization_id = if let Some(promoter) = &event_payload.promoter {
            let org_id = ids::entity_id("org", promoter);
            let organization = OrganizationEntity {
                id: org_id.clone(),
                name: promoter.clone(),
                kind: OrganizationKind::Promoter,
            };
            match create_if_absent(&self.entity_service, &org_id, "Organization", serde_json::json!(organization)).await {
                Ok(v) => {
                    vertices.push(v);
                    Some(org_id)
                }
                Err(e) => {
                    errors.push(format!("failed to write promoter vertex: {e}"));
                    None
                }
            }
        } else {
            None
        };

        for show in &event_payload.shows {
            let event_id = ids::entity_id("event", &format!("{}-{}-{}", poster.id, show.ordinal, show.date.raw));
            let event = EventEntity {
                id: event_id.clone(),
                raw_date: show.date.raw.clone(),
                resolved_date: show.date.resolved,
                year: show.date.year,
            };
            match create_if_absent(&self.entity_service, &event_id, "Event", serde_json::json!(event)).await {
                Ok(v) => vertices.push(v),
                Err(e) => {
                    errors.push(format!("failed to write event vertex: {e}"));
                    continue;
                }
            }
            relationships.push(Relationship::new(poster.id.clone(), event_id.clone(), crate::types::RelationType::AdvertisesEvent));

            if let Some(venue_id) = &venue_id {
                relationships.push(Relationship::new(event_id.clone(), venue_id.clone(), crate::types::RelationType::HeldAt));
            }
            if let Some(org_id) = &organization_id {
                relationships.push(Relationship::new(event_id.clone(), org_id.clone(), crate::types::RelationType::PromotedBy));
            }
            if let Some(artist_vertex) = artist_vertex {
                relationships.push(Relationship::new(artist_vertex.id.clone(), poster.id.clone(), crate::types::RelationType::HeadlinedOn));
                relationships.push(Relationship::new(artist_vertex.id.clone(), event_id.clone(), crate::types::RelationType::Headlined));
            }
            for act in &artist_payload.supporting_acts {
                let act_id = ids::entity_id("artist", act.display_name());
                match create_if_absent(&self.entity_service, &act_id, "Artist", artist_json(act.display_name())).await {
                    Ok(v) => {
                        vertices.push(v);
                        relationships.push(Relationship::new(act_id.clone(), poster.id.clone(), crate::types::RelationType::PerformedOn));
                        relationships.push(Relationship::new(act_id, event_id.clone(), crate::types::RelationType::PerformedAt));
                    }
                    Err(e) => errors.push(format!("failed to write supporting-act vertex: {e}")),
                }
            }
        }
    }
}

fn artist_json(name: &str) -> serde_json::Value {
    serde_json::json!(ArtistEntity {
        id: ids::entity_id("artist", name),
        name: name.to_string(),
        external_id: None,
    })
}

fn venue_json(id: &str, payload: &VenuePayload) -> serde_json::Value {
    serde_json::json!(VenueEntity {
        id: id.to_string(),
        name: payload.venue.as_ref().map(|m| m.display_name().to_string()).unwrap_or_default(),
        city: payload.city.clone(),
        state: payload.state.clone(),
        country: payload.country.clone(),
    })
}

/// Look the vertex up first and only write when absent, so repeated ingests
/// of the same poster never duplicate a vertex.
async fn create_if_absent(
    entity_service: &Option<Arc<dyn EntityService>>,
    id: &str,
    entity_type: &str,
    payload: serde_json::Value,
) -> anyhow::Result<VertexWrite> {
    let Some(service) = entity_service else {
        return Ok(VertexWrite {
            id: id.to_string(),
            entity_type: entity_type.to_string(),
            is_new: true,
        });
    };

    if service.get_entity(id).await?.is_some() {
        return Ok(VertexWrite {
            id: id.to_string(),
            entity_type: entity_type.to_string(),
            is_new: false,
        });
    }

    service
        .create_entities(&[EntityWrite {
            id: id.to_string(),
            entity_type: entity_type.to_string(),
            payload,
        }])
        .await?;

    Ok(VertexWrite {
        id: id.to_string(),
        entity_type: entity_type.to_string(),
        is_new: true,
    })
}

fn mean_confidence(results: &[&PhaseResult]) -> f64 {
    let ran: Vec<f64> = results.iter().filter(|r| r.status != PhaseStatus::Skipped).map(|r| r.confidence).collect();
    if ran.is_empty() {
        0.0
    } else {
        ran.iter().sum::<f64>() / ran.len() as f64
    }
}

fn build_observations(type_payload: &TypePayload, artist_payload: &ArtistPayload, venue_payload: &VenuePayload, event_payload: &EventPayload) -> Vec<String> {
    let mut lines = vec![format!("Classified as {} ({:.0}% confidence)", type_payload.poster_type, type_payload.model_confidence * 100.0)];

    if let Some(headliner) = &artist_payload.headliner {
        lines.push(format!("Headliner: {}", headliner.display_name()));
    }
    if let Some(director) = &artist_payload.director {
        lines.push(format!("Director: {}", director.display_name()));
    }
    if !artist_payload.supporting_acts.is_empty() {
        lines.push(format!(
            "Supporting acts: {}",
            artist_payload.supporting_acts.iter().map(|m| m.display_name().to_string()).collect::<Vec<_>>().join(", ")
        ));
    }
    if let Some(venue) = &venue_payload.venue {
        let locality = [venue_payload.city.as_deref(), venue_payload.country.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        if locality.is_empty() {
            lines.push(format!("Venue: {}", venue.display_name()));
        } else {
            lines.push(format!("Venue: {}, {locality}", venue.display_name()));
        }
    }
    if let Some(show) = event_payload.shows.first() {
        lines.push(format!("year:{}", show.date.year.map(|y| y.to_string()).unwrap_or_else(|| "unknown".to_string())));
        lines.push(format!("Event date: {}", show.date.raw));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_confidence_ignores_skipped_phases() {
        let completed = PhaseResult {
            poster_id: "poster:x".to_string(),
            image_path: "x.jpg".to_string(),
            phase: PhaseName::Type,
            status: PhaseStatus::Completed,
            confidence: 0.8,
            processing_time_ms: 0,
            warnings: vec![],
            errors: vec![],
            payload: None,
        };
        let skipped = PhaseResult::skipped("poster:x", "x.jpg", PhaseName::Venue);
        assert_eq!(mean_confidence(&[&completed, &skipped]), 0.8);
    }
}
