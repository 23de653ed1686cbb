//! The prompt catalog: an immutable, per-type mapping from (phase, poster
//! type) to the exact template sent to the vision provider. Bit-stable by
//! design — auditing which prompt produced a given extraction means diffing
//! this file, not reverse-engineering a runtime string builder.

use crate::phases::PhaseName;
use crate::types::PosterType;

/// Look up the exact prompt template for a phase/poster-type pair. Every
/// phase routes through this single entry point rather than building its own
/// prompt text inline.
pub fn get_phase_prompt(phase: PhaseName, poster_type: PosterType) -> &'static str {
    match phase {
        PhaseName::Type => TYPE_CLASSIFICATION_PROMPT,
        PhaseName::Artist => artist_prompt(poster_type),
        PhaseName::Venue => venue_prompt(poster_type),
        PhaseName::Event => event_prompt(poster_type),
        PhaseName::Assembly | PhaseName::Enrichment => "",
    }
}

pub const TYPE_CLASSIFICATION_PROMPT: &str = "\
Look at this poster image. Classify it as exactly one of: concert, festival, \
comedy, theater, film, album, promo, exhibition, hybrid, unknown. Return JSON: \
{\"poster_type\": <type>, \"confidence\": <0-100>, \"evidence\": [<short phrases \
that support this classification>], \"extracted_text\": <all legible text on the \
poster>, \"visual\": {\"has_artist_photo\": <bool>, \"has_album_art\": <bool>, \
\"has_logo\": <bool>, \"dominant_colors\": [<color names>], \"style\": \
<photographic|illustrated|typographic|mixed|other>}}.";

/// Refinement template. Placeholders are substituted, never concatenated
/// piecemeal, so the prompt text itself stays auditable.
pub const TYPE_REFINEMENT_TEMPLATE: &str = "\
Your previous classification of this poster was {{previous_type}} at \
{{previous_confidence}}% confidence, citing: {{previous_evidence}}. Look again \
and either confirm or correct this classification. Return the same JSON shape \
as before: {\"poster_type\": <type>, \"confidence\": <0-100>, \"evidence\": \
[<phrases>], \"extracted_text\": <all legible text>, \"visual\": {...}}.";

/// Substitute the refinement template's placeholders.
pub fn render_refinement_prompt(previous_type: PosterType, previous_confidence: f64, previous_evidence: &[String]) -> String {
    TYPE_REFINEMENT_TEMPLATE
        .replace("{{previous_type}}", previous_type.as_str())
        .replace(
            "{{previous_confidence}}",
            &format!("{}", (previous_confidence * 100.0).round() as i64),
        )
        .replace("{{previous_evidence}}", &previous_evidence.join(", "))
}

fn artist_prompt(poster_type: PosterType) -> &'static str {
    match poster_type {
        PosterType::Film => "\
Identify the film credits on this poster. Return JSON: {\"director\": <name or \
null>, \"cast\": [<names, in billing order>]}. List each cast member as a \
separate array entry; do not combine multiple names into one string.",
        PosterType::Album | PosterType::Hybrid => "\
Identify the recording artist and release on this poster. Return JSON: \
{\"headliner\": <artist name>, \"album_title\": <release title or null>, \
\"record_label\": <label name or null>, \"featured_artists\": [<names>]}. List \
each featured artist as a separate array entry.",
        PosterType::Exhibition => "\
Identify the exhibiting artist on this poster. Return JSON: {\"headliner\": \
<exhibiting artist name>, \"curator\": <curator name or null>}.",
        _ => "\
Identify the performers on this poster. Return JSON: {\"headliner\": <primary \
performer/act>, \"supporting_acts\": [<other acts, billed below the \
headliner>], \"tour_name\": <tour name or null>, \"record_label\": <label name \
or null>}. List each supporting act as a separate array entry; distinguish the \
headliner from supporting acts by billing size/position, not just list order.",
    }
}

fn venue_prompt(poster_type: PosterType) -> &'static str {
    match poster_type {
        PosterType::Album => "\
Identify any venue information on this poster, if present (albums are usually \
venue-less). Return JSON: {\"venue\": <venue name or null>, \"city\": <city or \
null>, \"state\": <state/region or null>, \"country\": <country or null>, \
\"streaming_only\": <bool, true if this is a streaming/digital release with no \
physical venue>}.",
        _ => "\
Identify the venue on this poster. Return JSON: {\"venue\": <venue name>, \
\"city\": <city>, \"state\": <state/region or null>, \"country\": <country or \
null>, \"address\": <street address or null>, \"district\": <neighborhood or \
null>, \"theater_name\": <theater/room name within a larger venue, or null>}.",
    }
}

fn event_prompt(poster_type: PosterType) -> &'static str {
    match poster_type {
        PosterType::Album | PosterType::Film => "\
Identify the release date on this poster. Return JSON: {\"release_date\": <date \
string as printed, or null>, \"year\": <year if known, else null>}.",
        PosterType::Theater | PosterType::Exhibition => "\
Identify the opening date and run details on this poster. Return JSON: \
{\"opening_date\": <date string as printed>, \"year\": <year if known>, \
\"door_time\": <null>, \"show_time\": <string or array of showtimes>, \
\"ticket_price\": <string or null>, \"age_restriction\": <string or null>, \
\"promoter\": <string or null>}.",
        PosterType::Festival => "\
Identify the festival dates on this poster. Return JSON: {\"start_date\": <date \
string as printed, may describe a range or multiple dates>, \"year\": <year if \
known>, \"shows\": [{\"event_date\": <date string>}], \"door_time\": <string or \
null>, \"show_time\": <string or null>, \"ticket_price\": <string or null>, \
\"age_restriction\": <string or null>, \"promoter\": <string or null>}.",
        _ => "\
Identify the event date(s) and details on this poster. Return JSON: \
{\"event_date\": <date string as printed, may describe multiple dates>, \
\"year\": <year if known, else null>, \"shows\": [{\"event_date\": <date \
string>}], \"door_time\": <string or null>, \"show_time\": <string or array of \
showtimes>, \"ticket_price\": <string or null>, \"age_restriction\": <string or \
null>, \"promoter\": <string or null>}.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_prompt_is_stable_regardless_of_poster_type() {
        assert_eq!(
            get_phase_prompt(PhaseName::Type, PosterType::Film),
            get_phase_prompt(PhaseName::Type, PosterType::Concert)
        );
    }

    #[test]
    fn artist_prompt_differs_by_poster_type() {
        assert_ne!(
            get_phase_prompt(PhaseName::Artist, PosterType::Film),
            get_phase_prompt(PhaseName::Artist, PosterType::Concert)
        );
    }

    #[test]
    fn refinement_prompt_substitutes_all_placeholders() {
        let rendered = render_refinement_prompt(
            PosterType::Concert,
            0.55,
            &["guitar silhouette".to_string(), "band name banner".to_string()],
        );
        assert!(!rendered.contains("{{"));
        assert!(rendered.contains("concert"));
        assert!(rendered.contains("55%"));
        assert!(rendered.contains("guitar silhouette, band name banner"));
    }
}
