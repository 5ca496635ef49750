use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating the configuration.
///
/// All of these are fatal: the process reports the message and exits
/// nonzero before any monitoring begins.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid match pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Process-wide configuration, immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log monitoring settings
    pub monitor: MonitorConfig,
    /// Firewall blocking settings
    pub blocking: BlockingConfig,
    /// Notification channels (each independently optional)
    pub channels: ChannelConfig,
    /// Report, PID marker and run-mode settings
    pub output: OutputConfig,
}

/// Log monitoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Authentication log to scan; auto-detected when unset
    pub log_file: Option<PathBuf>,
    /// Line pattern marking a failed login (case-sensitive regex)
    pub pattern: String,
    /// Failed attempts per address before an alert is raised
    pub alert_threshold: usize,
    /// Trailing window in minutes
    pub window_minutes: i64,
    /// Seconds between daemon passes
    pub poll_interval_secs: u64,
    /// Enforce the window against parsed line timestamps
    pub strict_window: bool,
    /// Whitelist file, one address per line
    pub whitelist_file: Option<PathBuf>,
}

/// Firewall blocking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingConfig {
    /// Whether to block addresses at the firewall
    pub enabled: bool,
    /// Failed attempts per address before the address is blocked
    pub block_threshold: usize,
    /// Durable store of already-blocked addresses
    pub blocked_file: PathBuf,
}

/// Notification channel credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub mail: Option<MailConfig>,
    pub slack: Option<SlackConfig>,
    pub telegram: Option<TelegramConfig>,
    pub webhook: Option<WebhookConfig>,
}

/// Mail channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Recipient addresses, comma separated
    pub recipients: String,
    /// Sender address (default: authwatch@localhost)
    pub from: Option<String>,
    /// SMTP relay host; unset means an unauthenticated localhost relay
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
}

/// Slack-compatible incoming-webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
}

/// Telegram bot configuration; both fields are required to activate the channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Generic JSON webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
}

/// Report, PID marker and run-mode settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Report destination, overwritten each pass; unset skips the report
    pub report_file: Option<PathBuf>,
    /// PID marker written in daemon mode
    pub pid_file: PathBuf,
    /// Run as a daemon instead of a single pass
    pub daemon: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            monitor: MonitorConfig {
                log_file: None,
                pattern: crate::detection::EventExtractor::DEFAULT_PATTERN.to_string(),
                alert_threshold: 5,
                window_minutes: 60,
                poll_interval_secs: 300,
                strict_window: false,
                whitelist_file: None,
            },
            blocking: BlockingConfig {
                enabled: false,
                block_threshold: 10,
                blocked_file: PathBuf::from("/var/lib/authwatch/blocked.list"),
            },
            channels: ChannelConfig::default(),
            output: OutputConfig {
                report_file: None,
                pid_file: PathBuf::from("/var/run/authwatch.pid"),
                daemon: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })
    }

    /// Reject settings that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.alert_threshold == 0 {
            return Err(ConfigError::Invalid(
                "alert-threshold must be at least 1".to_string(),
            ));
        }
        if self.blocking.block_threshold < self.monitor.alert_threshold {
            return Err(ConfigError::Invalid(format!(
                "block-threshold ({}) must be >= alert-threshold ({})",
                self.blocking.block_threshold, self.monitor.alert_threshold
            )));
        }
        if self.monitor.window_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "window must be at least 1 minute".to_string(),
            ));
        }
        if self.output.daemon && self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll interval must be at least 1 second in daemon mode".to_string(),
            ));
        }
        Regex::new(&self.monitor.pattern).map_err(|source| ConfigError::Pattern {
            pattern: self.monitor.pattern.clone(),
            source,
        })?;
        Ok(())
    }
}
