//! ICS feed parsing.
//!
//! Upstream booking feeds are unreliable: UIDs go missing, amended
//! duplicates appear later in the same document, and date ranges are
//! occasionally inverted. The parser salvages what it can instead of
//! failing on the first bad event; a whole-feed `ParseError` is reserved
//! for content that is not an iCalendar document at all.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::{SyncError, SyncResult};
use crate::event::ParsedEvent;

/// Result of parsing one feed.
pub struct ParseOutcome {
    /// Events in document order, duplicates collapsed (last occurrence wins).
    pub events: Vec<ParsedEvent>,
    /// Events rejected individually (missing dates, end before start).
    pub skipped: usize,
}

/// Parse raw iCalendar text into booking events.
///
/// `uid_scope` is mixed into fallback identifiers for events without a
/// usable UID, so identical anonymous events in different sources never
/// collide. Re-parsing byte-identical content always yields the same
/// identifiers.
pub fn parse_feed(content: &str, uid_scope: &str) -> SyncResult<ParseOutcome> {
    if !content.contains("BEGIN:VCALENDAR") {
        return Err(SyncError::Parse(
            "not an iCalendar document (missing BEGIN:VCALENDAR)".into(),
        ));
    }

    let mut events: Vec<ParsedEvent> = Vec::new();
    let mut index_by_uid: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0;

    let mut current: Option<RawEvent> = None;

    for line in unfold(content) {
        match line.as_str() {
            "BEGIN:VEVENT" => {
                current = Some(RawEvent::default());
            }
            "END:VEVENT" => {
                let raw = match current.take() {
                    Some(raw) => raw,
                    // Stray END without BEGIN; ignore.
                    None => continue,
                };
                match raw.finish(uid_scope) {
                    Some(event) => match index_by_uid.get(&event.uid) {
                        // Amended duplicate later in the document wins.
                        Some(&idx) => events[idx] = event,
                        None => {
                            index_by_uid.insert(event.uid.clone(), events.len());
                            events.push(event);
                        }
                    },
                    None => skipped += 1,
                }
            }
            _ => {
                if let Some(raw) = current.as_mut() {
                    if let Some((key, params, value)) = split_property(&line) {
                        raw.absorb(&key, &params, &value);
                    }
                }
            }
        }
    }

    Ok(ParseOutcome { events, skipped })
}

/// Undo RFC 5545 line folding: a line starting with a space or tab
/// continues the previous line, minus the continuation indicator.
fn unfold(content: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in content.lines() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if raw.starts_with(' ') || raw.starts_with('\t') {
            if let Some(last) = lines.last_mut() {
                last.push_str(&raw[1..]);
            }
            continue;
        }
        lines.push(raw.to_string());
    }
    lines
}

/// Properties collected for one VEVENT before validation.
#[derive(Default)]
struct RawEvent {
    uid: Option<String>,
    summary: Option<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl RawEvent {
    fn absorb(&mut self, key: &str, params: &str, value: &str) {
        match key {
            "UID" => {
                if !value.trim().is_empty() {
                    self.uid = Some(value.trim().to_string());
                }
            }
            "SUMMARY" => self.summary = Some(value.to_string()),
            "DTSTART" => self.start = parse_date(value, params),
            "DTEND" => self.end = parse_date(value, params),
            _ => {}
        }
    }

    /// Validate into a `ParsedEvent`, or None if the event must be skipped.
    fn finish(self, uid_scope: &str) -> Option<ParsedEvent> {
        let start = self.start?;
        let end = self.end?;
        if end <= start {
            return None;
        }

        let summary = self.summary.unwrap_or_default();
        let uid = self
            .uid
            .unwrap_or_else(|| fallback_uid(uid_scope, start, end, &summary));

        Some(ParsedEvent {
            uid,
            start,
            end,
            summary,
        })
    }
}

/// Split one unfolded content line into (key, params, unescaped value).
fn split_property(line: &str) -> Option<(String, String, String)> {
    let colon = line.find(':')?;
    let key_part = &line[..colon];
    let value = &line[colon + 1..];

    let mut parts = key_part.splitn(2, ';');
    let key = parts.next()?.to_string();
    let params = parts.next().unwrap_or("").to_string();

    Some((key, params, unescape_value(value)))
}

/// Reverse RFC 5545 value escaping: \, \; \\ and \n (or \N).
fn unescape_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some(',') => result.push(','),
            Some(';') => result.push(';'),
            Some('\\') => result.push('\\'),
            Some('n') | Some('N') => result.push('\n'),
            // Unrecognized escape: keep both characters.
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

/// Normalize a DTSTART/DTEND value to a calendar date.
///
/// Handles VALUE=DATE (YYYYMMDD), floating and UTC datetimes
/// (YYYYMMDDTHHMMSS[Z]). The time-of-day is discarded either way, since
/// bookings are date-ranged.
fn parse_date(value: &str, _params: &str) -> Option<NaiveDate> {
    let digits = value.get(0..8)?;
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if value.len() > 8 && !value[8..].starts_with('T') {
        return None;
    }

    let y = digits[0..4].parse().ok()?;
    let m = digits[4..6].parse().ok()?;
    let d = digits[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Deterministic identifier for events whose feed carries no usable UID.
///
/// Derived from the source scope plus the event's content, so re-parsing
/// the same feed yields the same identifier across process runs.
fn fallback_uid(scope: &str, start: NaiveDate, end: NaiveDate, summary: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update(b"\0");
    hasher.update(start.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(end.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(summary.as_bytes());

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(26);
    for byte in &digest[..13] {
        hex.push_str(&format!("{:02x}", byte));
    }
    format!("synthetic-{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(body: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\n{body}END:VCALENDAR\r\n")
    }

    fn event_block(uid: &str, start: &str, end: &str, summary: &str) -> String {
        format!(
            "BEGIN:VEVENT\r\nUID:{uid}\r\nDTSTART;VALUE=DATE:{start}\r\nDTEND;VALUE=DATE:{end}\r\nSUMMARY:{summary}\r\nEND:VEVENT\r\n"
        )
    }

    #[test]
    fn test_parse_basic_feed() {
        let content = feed(&event_block("abc-1", "20250601", "20250605", "Reserved"));
        let outcome = parse_feed(&content, "s1").unwrap();

        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.skipped, 0);

        let event = &outcome.events[0];
        assert_eq!(event.uid, "abc-1");
        assert_eq!(event.start, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(event.end, NaiveDate::from_ymd_opt(2025, 6, 5).unwrap());
        assert_eq!(event.summary, "Reserved");
    }

    #[test]
    fn test_non_calendar_content_is_a_parse_error() {
        let result = parse_feed("<html>503 Service Unavailable</html>", "s1");
        assert!(matches!(result, Err(SyncError::Parse(_))));
    }

    #[test]
    fn test_empty_calendar_parses_to_zero_events() {
        let outcome = parse_feed(&feed(""), "s1").unwrap();
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn test_datetime_values_normalize_to_dates() {
        let content = feed(
            "BEGIN:VEVENT\r\nUID:dt-1\r\nDTSTART:20250601T140000Z\r\nDTEND:20250605T100000\r\nSUMMARY:Reserved\r\nEND:VEVENT\r\n",
        );
        let outcome = parse_feed(&content, "s1").unwrap();

        let event = &outcome.events[0];
        assert_eq!(event.start, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(event.end, NaiveDate::from_ymd_opt(2025, 6, 5).unwrap());
    }

    #[test]
    fn test_inverted_range_is_skipped_but_siblings_survive() {
        let body = format!(
            "{}{}",
            event_block("bad", "20250610", "20250605", "Inverted"),
            event_block("good", "20250601", "20250603", "Reserved"),
        );
        let outcome = parse_feed(&feed(&body), "s1").unwrap();

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].uid, "good");
    }

    #[test]
    fn test_zero_night_event_is_skipped() {
        let content = feed(&event_block("same", "20250601", "20250601", "Reserved"));
        let outcome = parse_feed(&content, "s1").unwrap();
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn test_duplicate_uid_last_occurrence_wins() {
        let body = format!(
            "{}{}",
            event_block("dup", "20250601", "20250605", "First"),
            event_block("dup", "20250602", "20250606", "Amended"),
        );
        let outcome = parse_feed(&feed(&body), "s1").unwrap();

        assert_eq!(outcome.events.len(), 1);
        let event = &outcome.events[0];
        assert_eq!(event.summary, "Amended");
        assert_eq!(event.start, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
    }

    #[test]
    fn test_missing_uid_gets_stable_fallback() {
        let body = "BEGIN:VEVENT\r\nDTSTART;VALUE=DATE:20250601\r\nDTEND;VALUE=DATE:20250605\r\nSUMMARY:Reserved\r\nEND:VEVENT\r\n";
        let first = parse_feed(&feed(body), "s1").unwrap();
        let second = parse_feed(&feed(body), "s1").unwrap();

        assert_eq!(first.events.len(), 1);
        assert!(first.events[0].uid.starts_with("synthetic-"));
        assert_eq!(
            first.events[0].uid, second.events[0].uid,
            "re-parsing identical content must yield the same identifier"
        );
    }

    #[test]
    fn test_fallback_uid_is_scoped_per_source() {
        let body = "BEGIN:VEVENT\r\nDTSTART;VALUE=DATE:20250601\r\nDTEND;VALUE=DATE:20250605\r\nSUMMARY:Reserved\r\nEND:VEVENT\r\n";
        let a = parse_feed(&feed(body), "source-a").unwrap();
        let b = parse_feed(&feed(body), "source-b").unwrap();

        assert_ne!(
            a.events[0].uid, b.events[0].uid,
            "equal events in different sources must not collide"
        );
    }

    #[test]
    fn test_line_folding_and_escapes_in_summary() {
        let content = feed(
            "BEGIN:VEVENT\r\nUID:fold-1\r\nDTSTART;VALUE=DATE:20250601\r\nDTEND;VALUE=DATE:20250605\r\nSUMMARY:Reserved by\r\n  Smith\\, Alex\r\nEND:VEVENT\r\n",
        );
        let outcome = parse_feed(&content, "s1").unwrap();
        assert_eq!(outcome.events[0].summary, "Reserved by Smith, Alex");
    }

    #[test]
    fn test_event_missing_dates_is_skipped() {
        let content = feed("BEGIN:VEVENT\r\nUID:no-dates\r\nSUMMARY:Reserved\r\nEND:VEVENT\r\n");
        let outcome = parse_feed(&content, "s1").unwrap();
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.events.is_empty());
    }
}
