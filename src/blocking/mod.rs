//! Idempotent firewall blocking.

pub mod firewall;

pub use firewall::{BlockError, Firewall, FirewalldBackend, IptablesBackend};

use std::path::PathBuf;

use crate::persistence::{BlockedSet, PersistenceError};

/// Applies firewall blocks and keeps the durable blocked set in step
/// with what has actually been applied.
pub struct Blocker {
    backend: Box<dyn Firewall>,
    store_path: PathBuf,
}

impl Blocker {
    pub fn new(backend: Box<dyn Firewall>, store_path: PathBuf) -> Self {
        Blocker {
            backend,
            store_path,
        }
    }

    /// Block every address not already in the set.
    ///
    /// A per-address failure is logged and skipped; the address stays out
    /// of the set and is retried on a later pass if it still qualifies.
    /// The set is saved once per batch when anything changed. Returns the
    /// addresses newly blocked.
    pub fn block_all(
        &self,
        addresses: &[String],
        blocked: &mut BlockedSet,
    ) -> Result<Vec<String>, PersistenceError> {
        let mut newly_blocked = Vec::new();

        for address in addresses {
            if blocked.contains(address) {
                log::debug!("{} already blocked, skipping", address);
                continue;
            }
            match self.backend.block(address) {
                Ok(()) => {
                    log::warn!("Blocked {} via {}", address, self.backend.name());
                    blocked.insert(address.clone());
                    newly_blocked.push(address.clone());
                }
                Err(e) => log::error!("Failed to block {}: {}", address, e),
            }
        }

        if !newly_blocked.is_empty() {
            blocked.save(&self.store_path)?;
        }
        Ok(newly_blocked)
    }
}
