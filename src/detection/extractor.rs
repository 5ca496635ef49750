//! Parsing of raw log lines into failed-login events.

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::models::FailedLoginEvent;

const IPV4_LITERAL: &str = r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b";

/// Extracts failed-login events from raw log text.
///
/// A line yields an event when it matches the configured pattern and
/// contains an IPv4 literal; the first such literal is taken as the
/// source address. Lines without an extractable address are discarded.
/// Repeated lines yield repeated events; counting happens downstream.
pub struct EventExtractor {
    pattern: Regex,
    ipv4: Regex,
}

impl EventExtractor {
    /// Default failed-login pattern, matched case-sensitively.
    pub const DEFAULT_PATTERN: &'static str = "Failed|Failure|Invalid";

    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(EventExtractor {
            pattern: Regex::new(pattern)?,
            ipv4: Regex::new(IPV4_LITERAL)?,
        })
    }

    /// Extract all events from the given log text.
    pub fn extract(&self, text: &str) -> Vec<FailedLoginEvent> {
        text.lines()
            .filter_map(|line| self.extract_line(line))
            .collect()
    }

    fn extract_line(&self, line: &str) -> Option<FailedLoginEvent> {
        if !self.pattern.is_match(line) {
            return None;
        }
        let address = self.ipv4.find(line)?.as_str().to_string();
        Some(FailedLoginEvent {
            timestamp: parse_syslog_timestamp(line),
            source_address: address,
        })
    }
}

/// Parse the leading syslog timestamp ("Jan  1 12:00:00").
///
/// Syslog lines carry no year; the current one is assumed. Lines in any
/// other format simply produce `None`, which strict-window mode treats
/// as "cannot prove stale".
fn parse_syslog_timestamp(line: &str) -> Option<DateTime<Utc>> {
    if line.len() < 15 || !line.is_char_boundary(15) {
        return None;
    }
    let stamped = format!("{} {}", Utc::now().year(), &line[..15]);
    NaiveDateTime::parse_from_str(&stamped, "%Y %b %e %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
