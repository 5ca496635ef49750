use chrono::{DateTime, Utc};

/// A single failed-login occurrence extracted from the log.
#[derive(Debug, Clone)]
pub struct FailedLoginEvent {
    /// Timestamp parsed from the log line, when the line carried one.
    /// Consulted only in strict-window mode.
    pub timestamp: Option<DateTime<Utc>>,
    /// Source address in textual form.
    pub source_address: String,
}

/// Per-address failed-attempt count for one pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressCount {
    pub address: String,
    pub count: usize,
}
