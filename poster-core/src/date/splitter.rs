//! Multi-date splitter: a poster advertising several shows usually packs them
//! into one string ("Fri 27 & Sat 28 April 2005", "17th - 18th September,
//! 2005"). This turns such a string into one segment per show, each carrying
//! enough context (a shared month/year distributed back onto it) for
//! [`super::parser::parse_date`] to resolve independently.

use once_cell::sync::Lazy;
use regex::Regex;

const MAX_RANGE_DAYS: i64 = 14;

static TRAILING_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i),?\s*(\d{4})\s*$").unwrap());

static TRAILING_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s*$",
    )
    .unwrap()
});

static DAY_OF_WEEK_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?\s+").unwrap()
});

static RANGE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d{1,2})(?:st|nd|rd|th)?\s*(?:-|–|to)\s*(\d{1,2})(?:st|nd|rd|th)?\s*$").unwrap());

static NUMERIC_DATE_WHOLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}$").unwrap());

/// Split a raw multi-date string into segments, each a standalone date
/// string suitable for [`super::parser::parse_date`].
pub fn split_dates(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    // A bare "DD/MM/YYYY"-style numeric date is not a multi-date string —
    // its trailing digit group is a year field, not a shared-year suffix.
    if NUMERIC_DATE_WHOLE.is_match(trimmed) {
        return vec![trimmed.to_string()];
    }

    let (body, shared_year) = strip_trailing_year(trimmed);
    let (body, shared_month) = strip_trailing_month(&body);

    if let Some(range) = try_expand_range(&body, shared_month.as_deref(), shared_year.as_deref()) {
        return range;
    }

    let segments = split_on_separators(&body);
    if segments.len() <= 1 && shared_month.is_none() && shared_year.is_none() {
        return vec![peel_day_of_week(trimmed).to_string()];
    }

    segments
        .into_iter()
        .map(|segment| distribute_shared(&segment, shared_month.as_deref(), shared_year.as_deref()))
        .collect()
}

fn strip_trailing_year(text: &str) -> (String, Option<String>) {
    if let Some(caps) = TRAILING_YEAR.captures(text) {
        let year = caps[1].to_string();
        let end = caps.get(0).unwrap().start();
        (text[..end].trim_end().trim_end_matches(',').to_string(), Some(year))
    } else {
        (text.to_string(), None)
    }
}

fn strip_trailing_month(text: &str) -> (String, Option<String>) {
    if let Some(caps) = TRAILING_MONTH.captures(text) {
        let month = caps[1].to_string();
        let end = caps.get(0).unwrap().start();
        (text[..end].trim_end().to_string(), Some(month))
    } else {
        (text.to_string(), None)
    }
}

/// A range like "17th - 18th" with both endpoints bare day numbers and a
/// shared month/year available expands to one segment per day, inclusive,
/// capped at [`MAX_RANGE_DAYS`] to reject nonsense ranges.
fn try_expand_range(body: &str, month: Option<&str>, year: Option<&str>) -> Option<Vec<String>> {
    let month = month?;
    let caps = RANGE_SEPARATOR.captures(body.trim())?;
    let start: i64 = caps[1].parse().ok()?;
    let end: i64 = caps[2].parse().ok()?;
    if end < start || end - start + 1 > MAX_RANGE_DAYS {
        return None;
    }
    let suffix = match year {
        Some(y) => format!(" {month} {y}"),
        None => format!(" {month}"),
    };
    Some((start..=end).map(|day| format!("{day}{suffix}")).collect())
}

fn split_on_separators(body: &str) -> Vec<String> {
    let normalized = Regex::new(r"(?i)\s+and\s+|\s*&\s*|\s*,\s*")
        .unwrap()
        .replace_all(body, "\u{1}")
        .to_string();

    let parts: Vec<&str> = normalized.split('\u{1}').map(str::trim).filter(|s| !s.is_empty()).collect();

    // `/` only separates distinct word-like segments ("Fri 27 April / Sat 28
    // April"), never a DD/MM/YYYY numeric date.
    let mut result = Vec::new();
    for part in parts {
        if part.contains('/') && part.chars().any(|c| c.is_alphabetic()) {
            result.extend(part.split('/').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string));
        } else {
            result.push(part.to_string());
        }
    }
    result
}

fn distribute_shared(segment: &str, month: Option<&str>, year: Option<&str>) -> String {
    let peeled = peel_day_of_week(segment);
    let has_month = TRAILING_MONTH.is_match(peeled) || month.is_none();
    let has_year = TRAILING_YEAR.is_match(peeled) || year.is_none();

    let mut out = peeled.to_string();
    if !has_month {
        if let Some(m) = month {
            out = format!("{out} {m}");
        }
    }
    if !has_year {
        if let Some(y) = year {
            out = format!("{out} {y}");
        }
    }
    out
}

fn peel_day_of_week(segment: &str) -> &str {
    match DAY_OF_WEEK_PREFIX.find(segment) {
        Some(m) => &segment[m.end()..],
        None => segment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_separator_returns_single_segment_stripping_day_of_week() {
        assert_eq!(split_dates("Fri 27 April 2005"), vec!["27 April 2005".to_string()]);
    }

    #[test]
    fn ampersand_and_and_yield_two_segments_each_carrying_month_and_year() {
        let segments = split_dates("17th & 18th September, 2005");
        assert_eq!(segments.len(), 2);
        for segment in &segments {
            assert!(segment.contains("September"));
            assert!(segment.contains("2005"));
        }

        let segments = split_dates("27 and 28 April, 2005");
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn range_with_bare_day_endpoints_expands_inclusively() {
        let segments = split_dates("17th – 18th September 2005");
        assert_eq!(segments.len(), 2);
        assert!(segments[0].contains("17"));
        assert!(segments[1].contains("18"));
    }

    #[test]
    fn range_longer_than_cap_is_not_expanded() {
        let segments = split_dates("1st - 20th September 2005");
        // 20 days exceeds the cap: falls back to treating it as a single,
        // non-expanded string rather than emitting twenty segments.
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn slash_separates_word_like_segments_but_not_numeric_dates() {
        let segments = split_dates("Fri 27 April / Sat 28 April");
        assert_eq!(segments.len(), 2);

        let segments = split_dates("27/04/2005");
        assert_eq!(segments, vec!["27/04/2005".to_string()]);
    }
}
