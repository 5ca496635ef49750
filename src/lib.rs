pub mod alerting;
pub mod blocking;
pub mod config;
pub mod daemon;
pub mod detection;
pub mod input;
pub mod models;
pub mod output;
pub mod persistence;

// Re-export commonly used types
pub use alerting::AlertDispatcher;
pub use blocking::{Blocker, Firewall};
pub use config::Config;
pub use daemon::{DaemonState, MonitorState};
pub use detection::{AlertPolicy, EventExtractor, PassDecision, WindowAggregator};
pub use input::LogSource;
pub use models::{AddressCount, FailedLoginEvent};
pub use output::ReportWriter;
pub use persistence::{BlockedSet, Whitelist};
