//! Per-address aggregation of failed-login events.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::models::{AddressCount, FailedLoginEvent};

/// Counts failed-login events per source address.
///
/// The default mode reproduces the historical monitor's behavior: every
/// extracted event in the log counts toward this pass, regardless of its
/// embedded timestamp. The window start is logged for the operator but
/// not enforced, so on an unrotated log the same old attempts re-trigger
/// on every pass. Strict mode filters by the parsed line timestamps
/// instead; events whose timestamp could not be parsed are kept, since
/// they cannot be proven stale.
pub struct WindowAggregator {
    window_minutes: i64,
    strict: bool,
}

impl WindowAggregator {
    pub fn new(window_minutes: i64, strict: bool) -> Self {
        WindowAggregator {
            window_minutes,
            strict,
        }
    }

    /// Aggregate events into one count per distinct address, sorted by
    /// count descending with ties broken by address ascending.
    pub fn aggregate(
        &self,
        events: &[FailedLoginEvent],
        now: DateTime<Utc>,
    ) -> Vec<AddressCount> {
        let window_start = now - Duration::minutes(self.window_minutes);
        log::info!(
            "Counting failed attempts since {} ({} minute window{})",
            window_start.format("%Y-%m-%d %H:%M:%S"),
            self.window_minutes,
            if self.strict { ", strict" } else { "" }
        );

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for event in events {
            if self.strict {
                if let Some(ts) = event.timestamp {
                    if ts < window_start {
                        continue;
                    }
                }
            }
            *counts.entry(event.source_address.as_str()).or_insert(0) += 1;
        }

        let mut aggregated: Vec<AddressCount> = counts
            .into_iter()
            .map(|(address, count)| AddressCount {
                address: address.to_string(),
                count,
            })
            .collect();
        aggregated.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.address.cmp(&b.address))
        });
        aggregated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(address: &str, age_minutes: i64, now: DateTime<Utc>) -> FailedLoginEvent {
        FailedLoginEvent {
            timestamp: Some(now - Duration::minutes(age_minutes)),
            source_address: address.to_string(),
        }
    }

    #[test]
    fn test_counts_per_address() {
        let now = Utc::now();
        let events = vec![
            event("10.0.0.5", 1, now),
            event("10.0.0.5", 2, now),
            event("192.168.1.1", 3, now),
        ];

        let counts = WindowAggregator::new(60, false).aggregate(&events, now);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].address, "10.0.0.5");
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].count, 1);
    }

    #[test]
    fn test_compat_mode_counts_events_outside_window() {
        let now = Utc::now();
        // Ten hours old, a one-hour window: still counted in compat mode.
        let events = vec![event("10.0.0.5", 600, now), event("10.0.0.5", 600, now)];

        let counts = WindowAggregator::new(60, false).aggregate(&events, now);
        assert_eq!(counts[0].count, 2);
    }

    #[test]
    fn test_strict_mode_drops_stale_events() {
        let now = Utc::now();
        let events = vec![
            event("10.0.0.5", 600, now),
            event("10.0.0.5", 5, now),
            event("10.0.0.5", 10, now),
        ];

        let counts = WindowAggregator::new(60, true).aggregate(&events, now);
        assert_eq!(counts[0].count, 2);
    }

    #[test]
    fn test_strict_mode_keeps_events_without_timestamps() {
        let now = Utc::now();
        let events = vec![FailedLoginEvent {
            timestamp: None,
            source_address: "10.0.0.5".to_string(),
        }];

        let counts = WindowAggregator::new(60, true).aggregate(&events, now);
        assert_eq!(counts[0].count, 1);
    }

    #[test]
    fn test_sort_is_deterministic_on_ties() {
        let now = Utc::now();
        let events = vec![
            event("10.0.0.9", 1, now),
            event("10.0.0.1", 1, now),
            event("10.0.0.5", 1, now),
            event("10.0.0.5", 1, now),
        ];

        let counts = WindowAggregator::new(60, false).aggregate(&events, now);
        assert_eq!(counts[0].address, "10.0.0.5");
        assert_eq!(counts[1].address, "10.0.0.1");
        assert_eq!(counts[2].address, "10.0.0.9");
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let counts = WindowAggregator::new(60, false).aggregate(&[], Utc::now());
        assert!(counts.is_empty());
    }
}
