//! Date segmentation: splitting one recognized text block into per-day spans.
//!
//! Handwritten journal pages often carry several days under one photograph.
//! This module scans extracted text for calendar-date markers anchored at
//! line starts, parses them against a fixed format priority list, and splits
//! the text into one span per detected day.
//!
//! The recognition is heuristic by design: ambiguous numeric dates such as
//! `5-11-23` resolve month-first (the first format in the priority list that
//! parses wins), and no locale disambiguation is attempted.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

use crate::defaults::{DATE_DEDUP_WINDOW, DATE_SPAN_MARGIN, MIN_DATE_YEAR};

/// A calendar date recognized in source text, with the byte span where the
/// marker (including any weekday prefix) was matched. Transient: consumed by
/// [`segment`] and never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedDate {
    pub date: NaiveDate,
    pub start: usize,
    pub end: usize,
}

/// One per-day unit of segmented text, later turned 1:1 into a journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitEntry {
    /// The detected date, or `None` when the text carried no recognizable
    /// marker (the caller supplies a fallback, typically "now").
    pub date: Option<NaiveDate>,
    pub content: String,
    /// Byte span of this unit in the source text.
    pub span: Range<usize>,
}

/// Optional weekday prefix, e.g. `Monday, ` or `Tue. `.
const WEEKDAY_PREFIX: &str = r"(?:(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday|Mon|Tue|Tues|Wed|Thu|Thurs|Fri|Sat|Sun)\.?,?[ \t]+)?";

/// Date-marker patterns, each anchored at a line start so dates embedded
/// mid-sentence are not treated as day boundaries.
static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    let bodies = [
        // Full month name: January 5, 2024 / January 5th 2024
        r"(?:January|February|March|April|May|June|July|August|September|October|November|December)[ \t]+\d{1,2}(?:st|nd|rd|th)?,?[ \t]+\d{4}",
        // Abbreviated month name: Jan 5, 2024 / Sep. 5 2024
        r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)\.?[ \t]+\d{1,2}(?:st|nd|rd|th)?,?[ \t]+\d{4}",
        // ISO: 2024-01-05
        r"\d{4}-\d{2}-\d{2}",
        // Numeric slash: 1/5/24, 01/05/2024
        r"\d{1,2}/\d{1,2}/\d{2,4}",
        // Numeric dash: 1-5-24, 01-05-2024
        r"\d{1,2}-\d{1,2}-\d{2,4}",
    ];

    bodies
        .iter()
        .map(|body| {
            Regex::new(&format!(r"(?im)^{}({})", WEEKDAY_PREFIX, body))
                .expect("date pattern must compile")
        })
        .collect()
});

/// Ordinal suffixes after a day number: `5th` → `5`.
static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)(?:st|nd|rd|th)\b").expect("ordinal pattern must compile"));

/// Format priority list tried against every raw match, regardless of which
/// pattern produced it. First successful parse wins.
const DATE_FORMATS: &[&str] = &[
    "%B %d %Y", // january 5 2024
    "%b %d %Y", // jan 5 2024
    "%m/%d/%Y",
    "%m/%d/%y",
    "%m-%d-%Y",
    "%m-%d-%y",
    "%Y-%m-%d",
];

/// Last-resort formats for shapes the anchored patterns do not emit but a
/// generic parse can still rescue.
const FALLBACK_FORMATS: &[&str] = &["%d %B %Y", "%d %b %Y"];

/// Parse a raw matched date string against every known format.
///
/// Returns `None` for anything that does not resolve to a valid calendar
/// date after [`MIN_DATE_YEAR`] — the year guard keeps arbitrary small
/// numbers (phone fragments, list markers) from becoming day boundaries.
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let cleaned = ORDINAL_SUFFIX.replace_all(raw, "$1");
    let cleaned = cleaned
        .replace([',', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .replace("sept ", "sep ");

    // The year guard applies per format: "1/5/24" parses under %Y as the
    // year 24, which must fall through to the two-digit %y form instead of
    // poisoning the whole match.
    DATE_FORMATS
        .iter()
        .chain(FALLBACK_FORMATS.iter())
        .find_map(|fmt| {
            NaiveDate::parse_from_str(&cleaned, fmt)
                .ok()
                .filter(|d| d.year() > MIN_DATE_YEAR)
        })
}

/// Scan text for date markers, returning them sorted by position with
/// near-duplicate markers collapsed.
///
/// Matches within [`DATE_DEDUP_WINDOW`] bytes of each other that resolve to
/// the same calendar day are one marker, not two (several patterns can fire
/// on the same header line).
pub fn detect_dates(text: &str) -> Vec<DetectedDate> {
    let mut found: Vec<DetectedDate> = Vec::new();

    for pattern in DATE_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let whole = caps.get(0).expect("match group 0 always present");
            let body = caps.get(1).expect("date body group always present");
            if let Some(date) = parse_date_text(body.as_str()) {
                found.push(DetectedDate {
                    date,
                    start: whole.start(),
                    end: whole.end(),
                });
            }
        }
    }

    found.sort_by_key(|d| (d.start, d.end));

    let mut deduped: Vec<DetectedDate> = Vec::new();
    for candidate in found {
        match deduped.last() {
            Some(prev)
                if candidate.start.saturating_sub(prev.start) <= DATE_DEDUP_WINDOW
                    && candidate.date == prev.date => {}
            _ => deduped.push(candidate),
        }
    }
    deduped
}

/// Split one block of recognized text into per-day entries.
///
/// Zero or one detected date yields a single span covering the whole text,
/// dated by the found date if any. Two or more dates yield one span per
/// marker, each running from its own start to the start of the next marker
/// (or end of text). Spans whose content is no longer than the matched date
/// text plus a small margin are dropped rather than becoming near-empty
/// entries; if every span is dropped the whole text falls back to one
/// undated entry.
pub fn segment(text: &str) -> Vec<SplitEntry> {
    let dates = detect_dates(text);

    if dates.len() <= 1 {
        return vec![SplitEntry {
            date: dates.first().map(|d| d.date),
            content: text.trim().to_string(),
            span: 0..text.len(),
        }];
    }

    let mut entries = Vec::with_capacity(dates.len());
    for (i, marker) in dates.iter().enumerate() {
        let span_end = dates.get(i + 1).map_or(text.len(), |next| next.start);
        let span = marker.start..span_end;
        let marker_len = marker.end - marker.start;

        if span.len() <= marker_len + DATE_SPAN_MARGIN {
            tracing::debug!(
                date = %marker.date,
                span_len = span.len(),
                "Dropping near-empty date span"
            );
            continue;
        }

        entries.push(SplitEntry {
            date: Some(marker.date),
            content: text[span.clone()].trim().to_string(),
            span,
        });
    }

    if entries.is_empty() {
        return vec![SplitEntry {
            date: None,
            content: text.trim().to_string(),
            span: 0..text.len(),
        }];
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_two_day_page_splits_cleanly() {
        let text = "January 5, 2024\nWoke up early and went for a long run.\nJanuary 6, 2024\nSlept in and read all morning.";
        let entries = segment(text);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].date, Some(ymd(2024, 1, 5)));
        assert!(entries[0].content.contains("Woke up early"));
        assert!(!entries[0].content.contains("Slept in"));
        assert_eq!(entries[1].date, Some(ymd(2024, 1, 6)));
        assert!(entries[1].content.contains("Slept in"));
        assert!(!entries[1].content.contains("Woke up early"));
    }

    #[test]
    fn test_single_date_header_spans_whole_text() {
        let text = "June 11, 2025\n\nToday the extraction pipeline finally worked end to end.";
        let entries = segment(text);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, Some(ymd(2025, 6, 11)));
        assert_eq!(entries[0].span, 0..text.len());
    }

    #[test]
    fn test_no_date_yields_single_undated_entry() {
        let text = "Just some thoughts with no header at all.";
        let entries = segment(text);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, None);
        assert_eq!(entries[0].content, text);
    }

    #[test]
    fn test_ambiguous_numeric_date_parses_month_first() {
        let text = "5-11-23 Went to the park";
        let entries = segment(text);

        assert_eq!(entries.len(), 1);
        // Known limitation: day/month order is not disambiguated.
        assert_eq!(entries[0].date, Some(ymd(2023, 5, 11)));
    }

    #[test]
    fn test_iso_and_slash_formats() {
        assert_eq!(parse_date_text("2024-01-05"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date_text("1/5/24"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date_text("01/05/2024"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date_text("12-31-99"), Some(ymd(1999, 12, 31)));
    }

    #[test]
    fn test_abbreviated_and_ordinal_forms() {
        assert_eq!(parse_date_text("Jan 5, 2024"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date_text("Sep. 3 2024"), Some(ymd(2024, 9, 3)));
        assert_eq!(parse_date_text("Sept 3, 2024"), Some(ymd(2024, 9, 3)));
        assert_eq!(parse_date_text("June 3rd, 2025"), Some(ymd(2025, 6, 3)));
        assert_eq!(parse_date_text("March 1st 2022"), Some(ymd(2022, 3, 1)));
    }

    #[test]
    fn test_generic_fallback_day_first() {
        assert_eq!(parse_date_text("5 January 2024"), Some(ymd(2024, 1, 5)));
    }

    #[test]
    fn test_invalid_and_ancient_dates_rejected() {
        assert_eq!(parse_date_text("13/45/2024"), None);
        assert_eq!(parse_date_text("2-30-2024"), None);
        assert_eq!(parse_date_text("January 5, 1899"), None);
        assert_eq!(parse_date_text("not a date"), None);
    }

    #[test]
    fn test_mid_sentence_dates_are_not_boundaries() {
        let text =
            "March 2, 2024\nWe booked flights for July 10, 2024 and talked about the trip.";
        let dates = detect_dates(text);

        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].date, ymd(2024, 3, 2));
    }

    #[test]
    fn test_weekday_prefixed_header() {
        let text = "Monday, January 8, 2024\nBack to work after the long weekend.";
        let dates = detect_dates(text);

        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].date, ymd(2024, 1, 8));
        assert_eq!(dates[0].start, 0);
    }

    #[test]
    fn test_overlapping_pattern_matches_deduplicate() {
        // "May 5, 2024" satisfies both the full and abbreviated month
        // patterns; it must still count as one marker.
        let text = "May 5, 2024\nA single entry for the day.";
        let dates = detect_dates(text);
        assert_eq!(dates.len(), 1);
    }

    #[test]
    fn test_near_empty_span_is_dropped() {
        let text = "January 5, 2024\nJanuary 6, 2024\nSlept in and read all morning, then cooked.";
        let entries = segment(text);

        // The first marker has no content of its own.
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, Some(ymd(2024, 1, 6)));
    }

    #[test]
    fn test_spans_are_ordered_and_contiguous() {
        let text = "2024-01-05\nfirst day text goes here\n2024-01-06\nsecond day text goes here\n2024-01-07\nthird day text goes here";
        let entries = segment(text);

        assert_eq!(entries.len(), 3);
        for pair in entries.windows(2) {
            assert!(pair[0].span.start < pair[1].span.start);
            assert_eq!(pair[0].span.end, pair[1].span.start);
        }
        assert_eq!(entries[2].span.end, text.len());
    }

    #[test]
    fn test_empty_text() {
        let entries = segment("");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, None);
        assert!(entries[0].content.is_empty());
    }
}
