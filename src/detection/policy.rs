//! Threshold decisions over the aggregated counts.

use crate::models::AddressCount;
use crate::persistence::{BlockedSet, Whitelist};

/// Outcome of evaluating one pass's aggregated counts.
#[derive(Debug, Default)]
pub struct PassDecision {
    /// One summary line per alert-worthy address.
    pub body: String,
    /// Addresses that crossed the block threshold and are not yet blocked.
    pub block_candidates: Vec<String>,
    /// Whether any address crossed the alert threshold.
    pub high_attempts: bool,
}

/// Decides which addresses are alert-worthy and which are block-worthy.
///
/// Pure decision function: no side effects, operating on a snapshot of
/// the whitelist and the current blocked set.
pub struct AlertPolicy {
    alert_threshold: usize,
    block_threshold: usize,
    blocking_enabled: bool,
}

impl AlertPolicy {
    pub fn new(alert_threshold: usize, block_threshold: usize, blocking_enabled: bool) -> Self {
        AlertPolicy {
            alert_threshold,
            block_threshold,
            blocking_enabled,
        }
    }

    pub fn evaluate(
        &self,
        counts: &[AddressCount],
        whitelist: &Whitelist,
        blocked: &BlockedSet,
    ) -> PassDecision {
        let mut decision = PassDecision::default();

        for entry in counts {
            if whitelist.contains(&entry.address) {
                log::debug!("Skipping whitelisted address {}", entry.address);
                continue;
            }

            if entry.count >= self.alert_threshold {
                decision.high_attempts = true;
                decision.body.push_str(&format!(
                    "{} failed attempts from IP: {}\n",
                    entry.count, entry.address
                ));
            }

            if self.blocking_enabled
                && entry.count >= self.block_threshold
                && !blocked.contains(&entry.address)
            {
                decision.block_candidates.push(entry.address.clone());
            }
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(address: &str, count: usize) -> AddressCount {
        AddressCount {
            address: address.to_string(),
            count,
        }
    }

    fn whitelist_of(addresses: &[&str]) -> Whitelist {
        Whitelist::from_addresses(addresses.iter().map(|a| a.to_string()))
    }

    #[test]
    fn test_below_alert_threshold_is_silent() {
        let policy = AlertPolicy::new(5, 10, false);
        let decision = policy.evaluate(
            &[count("192.168.1.1", 3)],
            &Whitelist::default(),
            &BlockedSet::default(),
        );

        assert!(!decision.high_attempts);
        assert!(decision.body.is_empty());
        assert!(decision.block_candidates.is_empty());
    }

    #[test]
    fn test_alert_threshold_crossed_appears_exactly_once() {
        let policy = AlertPolicy::new(5, 10, false);
        let decision = policy.evaluate(
            &[count("10.0.0.5", 12)],
            &Whitelist::default(),
            &BlockedSet::default(),
        );

        assert!(decision.high_attempts);
        assert_eq!(
            decision.body.matches("failed attempts from IP: 10.0.0.5").count(),
            1
        );
        assert!(decision.body.contains("12 failed attempts from IP: 10.0.0.5"));
        // Blocking disabled: never a candidate, no matter the count.
        assert!(decision.block_candidates.is_empty());
    }

    #[test]
    fn test_block_candidate_when_enabled() {
        let policy = AlertPolicy::new(5, 10, true);
        let decision = policy.evaluate(
            &[count("10.0.0.5", 12)],
            &Whitelist::default(),
            &BlockedSet::default(),
        );

        assert_eq!(decision.block_candidates, vec!["10.0.0.5".to_string()]);
    }

    #[test]
    fn test_already_blocked_address_is_not_a_candidate() {
        let policy = AlertPolicy::new(5, 10, true);
        let mut blocked = BlockedSet::default();
        blocked.insert("10.0.0.5".to_string());

        let decision = policy.evaluate(&[count("10.0.0.5", 50)], &Whitelist::default(), &blocked);
        assert!(decision.block_candidates.is_empty());
        // Still alert-worthy even when already blocked.
        assert!(decision.high_attempts);
    }

    #[test]
    fn test_whitelisted_address_is_fully_exempt() {
        let policy = AlertPolicy::new(5, 10, true);
        let decision = policy.evaluate(
            &[count("10.0.0.5", 1000)],
            &whitelist_of(&["10.0.0.5"]),
            &BlockedSet::default(),
        );

        assert!(!decision.high_attempts);
        assert!(decision.body.is_empty());
        assert!(decision.block_candidates.is_empty());
    }

    #[test]
    fn test_alert_without_block_between_thresholds() {
        let policy = AlertPolicy::new(5, 10, true);
        let decision = policy.evaluate(
            &[count("172.16.0.3", 7)],
            &Whitelist::default(),
            &BlockedSet::default(),
        );

        assert!(decision.high_attempts);
        assert!(decision.block_candidates.is_empty());
    }

    #[test]
    fn test_mixed_addresses() {
        let policy = AlertPolicy::new(5, 10, true);
        let counts = vec![
            count("10.0.0.5", 12),
            count("172.16.0.3", 7),
            count("192.168.1.1", 3),
            count("10.9.9.9", 40),
        ];
        let decision = policy.evaluate(
            &counts,
            &whitelist_of(&["10.9.9.9"]),
            &BlockedSet::default(),
        );

        assert!(decision.body.contains("10.0.0.5"));
        assert!(decision.body.contains("172.16.0.3"));
        assert!(!decision.body.contains("192.168.1.1"));
        assert!(!decision.body.contains("10.9.9.9"));
        assert_eq!(decision.block_candidates, vec!["10.0.0.5".to_string()]);
    }
}
