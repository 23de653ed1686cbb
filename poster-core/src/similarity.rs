//! Title-match confidence used by Enrichment to decide whether an external
//! catalog's top hit is actually the same work/artist, not just a fuzzy
//! shelf neighbor.

use strsim::normalized_levenshtein;

/// Lowercase and strip everything but letters/digits, so punctuation and
/// casing differences between a poster's extraction and a catalog's title
/// never drive the score.
fn normalize(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).flat_map(|c| c.to_lowercase()).collect()
}

/// Score how likely `candidate` is the same title/name as `extracted`:
/// exact match (after normalizing) scores 1.0, one containing the other
/// scores 0.9, otherwise falls back to normalized Levenshtein similarity.
pub fn title_match_confidence(extracted: &str, candidate: &str) -> f64 {
    let a = normalize(extracted);
    let b = normalize(candidate);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.9;
    }
    normalized_levenshtein(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_after_normalizing_scores_one() {
        assert_eq!(title_match_confidence("The Examples!", "the examples"), 1.0);
    }

    #[test]
    fn containment_scores_point_nine() {
        assert_eq!(title_match_confidence("Title", "The Title (Deluxe Edition)"), 0.9);
    }

    #[test]
    fn unrelated_strings_score_low() {
        assert!(title_match_confidence("Radiohead", "The Examples") < 0.5);
    }
}
