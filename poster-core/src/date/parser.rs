//! Parses a single date string (already isolated by the splitter) into a
//! [`DateInfo`]. Tries a fixed list of patterns in order; the first that
//! matches and yields a plausible day/month/year wins.

use crate::types::{DateFormat, DateInfo};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/\-](\d{1,2})[/\-](\d{2,4})$").unwrap());

static MONTH_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([A-Za-z]+)\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})$").unwrap()
});

static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?:st|nd|rd|th)?\s+([A-Za-z]+)\.?,?\s+(\d{4})$").unwrap()
});

static YEAR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").unwrap());

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let month = match lower.as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Two-digit years: `<= 30` maps to `20xx`, `> 30` maps to `19xx`.
fn expand_two_digit_year(year: i32) -> i32 {
    if year <= 30 {
        2000 + year
    } else {
        1900 + year
    }
}

fn build_date_info(raw: &str, day: u32, month: u32, year_raw: i32) -> DateInfo {
    let year = if year_raw < 100 {
        expand_two_digit_year(year_raw)
    } else {
        year_raw
    };
    let resolved = NaiveDate::from_ymd_opt(year, month, day);
    DateInfo {
        raw: raw.to_string(),
        day: Some(day),
        month: Some(month),
        year: Some(year),
        resolved,
        confidence: if resolved.is_some() { 0.9 } else { 0.4 },
        format: DateFormat::Parsed,
    }
}

/// Parse one date segment. Returns `None` if no pattern matches at all —
/// the caller (the splitter/event phase) decides what to do with an
/// unparseable segment, e.g. falling back to a bare year.
pub fn parse_date(raw: &str) -> Option<DateInfo> {
    let trimmed = raw.trim().trim_end_matches(|c: char| c == '.' || c == ',');

    if let Some(caps) = NUMERIC_DATE.captures(trimmed) {
        let a: u32 = caps[1].parse().ok()?;
        let b: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        // DD/MM/YYYY is the format this system expects (posters are not US-formatted).
        return Some(build_date_info(trimmed, a, b, year));
    }

    if let Some(caps) = MONTH_FIRST.captures(trimmed) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return Some(build_date_info(trimmed, day, month, year));
    }

    if let Some(caps) = DAY_FIRST.captures(trimmed) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        return Some(build_date_info(trimmed, day, month, year));
    }

    if let Some(caps) = YEAR_ONLY.captures(trimmed) {
        let year: i32 = caps[1].parse().ok()?;
        return Some(DateInfo::year_only(trimmed, year));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_dd_mm_yyyy() {
        let info = parse_date("27/04/2005").unwrap();
        assert_eq!(info.resolved, NaiveDate::from_ymd_opt(2005, 4, 27));
        assert_eq!(info.confidence, 0.9);
    }

    #[test]
    fn parses_numeric_with_dashes() {
        let info = parse_date("15-03-2024").unwrap();
        assert_eq!(info.resolved, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn parses_month_first() {
        let info = parse_date("April 27, 2005").unwrap();
        assert_eq!(info.resolved, NaiveDate::from_ymd_opt(2005, 4, 27));
    }

    #[test]
    fn parses_day_first_with_ordinal() {
        let info = parse_date("27th April 2005").unwrap();
        assert_eq!(info.resolved, NaiveDate::from_ymd_opt(2005, 4, 27));
        let info2 = parse_date("15 March 2024").unwrap();
        assert_eq!(info2.resolved, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn parses_year_only() {
        let info = parse_date("2005").unwrap();
        assert!(info.resolved.is_none());
        assert_eq!(info.year, Some(2005));
        assert_eq!(info.confidence, 0.6);
        assert_eq!(info.format, DateFormat::YearOnly);
    }

    #[test]
    fn two_digit_years_split_at_30() {
        let low = parse_date("27/04/05").unwrap();
        assert_eq!(low.year, Some(2005));
        let high = parse_date("27/04/95").unwrap();
        assert_eq!(high.year, Some(1995));
    }

    #[test]
    fn unparseable_text_returns_none() {
        assert!(parse_date("sometime next spring").is_none());
    }
}
