//! Daemon loop driving periodic pipeline passes.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::runtime::Runtime;

use crate::alerting::AlertDispatcher;
use crate::blocking::{firewall, Blocker};
use crate::config::{Config, ConfigError};
use crate::detection::{AlertPolicy, EventExtractor, WindowAggregator};
use crate::input::{InputError, LogSource};
use crate::output::ReportWriter;
use crate::persistence::{BlockedSet, PersistenceError, Whitelist};

/// Errors that can stop the daemon or a one-shot run
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("failed to write PID file {path}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Lifecycle of the monitoring daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Stopped,
    Running,
    Stopping,
}

/// Everything one pipeline pass needs. Owned by the loop and threaded
/// through each pass by parameter; the blocked set itself is loaded from
/// disk at the start of every pass and saved after updates.
pub struct MonitorState {
    config: Config,
    source: LogSource,
    extractor: EventExtractor,
    aggregator: WindowAggregator,
    policy: AlertPolicy,
    whitelist: Whitelist,
    blocker: Option<Blocker>,
    dispatcher: AlertDispatcher,
    report: Option<ReportWriter>,
    runtime: Runtime,
}

impl MonitorState {
    /// Wire up the pipeline from a validated configuration.
    ///
    /// Fatal errors here (missing log, bad pattern, unreadable whitelist)
    /// abort startup; a missing firewall mechanism only disables blocking.
    pub fn new(config: Config) -> Result<Self, DaemonError> {
        let source = LogSource::resolve(config.monitor.log_file.as_deref())?;
        log::info!("Monitoring log file: {:?}", source.path());

        let extractor =
            EventExtractor::new(&config.monitor.pattern).map_err(|source| {
                ConfigError::Pattern {
                    pattern: config.monitor.pattern.clone(),
                    source,
                }
            })?;
        let aggregator =
            WindowAggregator::new(config.monitor.window_minutes, config.monitor.strict_window);
        let policy = AlertPolicy::new(
            config.monitor.alert_threshold,
            config.blocking.block_threshold,
            config.blocking.enabled,
        );

        let whitelist = match config.monitor.whitelist_file {
            Some(ref path) => {
                let whitelist = Whitelist::load(path)?;
                log::info!("Loaded {} whitelisted address(es)", whitelist.len());
                whitelist
            }
            None => Whitelist::default(),
        };

        let blocker = if config.blocking.enabled {
            match firewall::detect() {
                Some(backend) => Some(Blocker::new(backend, config.blocking.blocked_file.clone())),
                None => {
                    log::warn!(
                        "Blocking requested but no firewall mechanism is available; \
                         blocking disabled for this run"
                    );
                    None
                }
            }
        } else {
            None
        };

        let dispatcher = AlertDispatcher::new(config.channels.clone());
        if !dispatcher.has_channels() {
            log::info!("No notification channels configured; alerts will only be logged");
        }

        let report = config.output.report_file.clone().map(ReportWriter::new);
        let runtime = Runtime::new().map_err(DaemonError::Runtime)?;

        Ok(MonitorState {
            config,
            source,
            extractor,
            aggregator,
            policy,
            whitelist,
            blocker,
            dispatcher,
            report,
            runtime,
        })
    }

    /// Execute one full pipeline pass:
    /// read → extract → aggregate → decide → {block, notify, report}.
    pub fn run_pass(&mut self) -> Result<(), DaemonError> {
        let text = self.source.read_all()?;
        let events = self.extractor.extract(&text);
        log::debug!("Extracted {} failed-login event(s)", events.len());

        let counts = self.aggregator.aggregate(&events, Utc::now());
        let mut blocked = BlockedSet::load(&self.config.blocking.blocked_file)?;
        let decision = self.policy.evaluate(&counts, &self.whitelist, &blocked);

        let mut newly_blocked = Vec::new();
        if let Some(ref blocker) = self.blocker {
            if !decision.block_candidates.is_empty() {
                newly_blocked = blocker.block_all(&decision.block_candidates, &mut blocked)?;
            }
        }

        if decision.high_attempts {
            let message = build_alert_message(&decision.body, &newly_blocked);
            log::warn!("ALERT:\n{}", message.trim_end());

            let failures = self.runtime.block_on(self.dispatcher.dispatch(&message));
            if failures > 0 {
                log::warn!("{} notification channel(s) failed this pass", failures);
            }

            if let Some(ref report) = self.report {
                if let Err(e) = report.write(&message, &blocked) {
                    log::error!("{}", e);
                }
            }
        } else {
            log::info!("No addresses crossed the alert threshold");
        }

        Ok(())
    }
}

/// Compose the message sent to the notification channels and the report.
fn build_alert_message(body: &str, newly_blocked: &[String]) -> String {
    let mut message = String::from("Failed login activity detected:\n\n");
    message.push_str(body);
    if !newly_blocked.is_empty() {
        message.push_str("\nNewly blocked addresses:\n");
        for address in newly_blocked {
            message.push_str(address);
            message.push('\n');
        }
    }
    message
}

/// Run the daemon until a termination signal arrives.
///
/// Lifecycle: write the PID marker, enter Running, loop passes with the
/// poll interval between them, transition to Stopping on SIGINT/SIGTERM,
/// remove the PID marker and stop. The interval sleep is sliced so a
/// signal is honored promptly; an in-flight pass is finished, not
/// interrupted.
pub fn run(mut monitor: MonitorState) -> Result<(), DaemonError> {
    let pid_path = monitor.config.output.pid_file.clone();
    let poll_interval = monitor.config.monitor.poll_interval_secs;

    fs::write(&pid_path, format!("{}\n", std::process::id())).map_err(|source| {
        DaemonError::PidFile {
            path: pid_path.clone(),
            source,
        }
    })?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal, stopping after current pass");
        r.store(false, Ordering::SeqCst);
    })?;

    log::info!(
        "Daemon running (pid {}), polling every {}s",
        std::process::id(),
        poll_interval
    );

    let mut state = DaemonState::Running;
    loop {
        match state {
            DaemonState::Running => {
                if let Err(e) = monitor.run_pass() {
                    log::error!("Pipeline pass failed: {}", e);
                }
                sleep_interruptible(poll_interval, &running);
                if !running.load(Ordering::SeqCst) {
                    state = DaemonState::Stopping;
                }
            }
            DaemonState::Stopping => {
                if let Err(e) = fs::remove_file(&pid_path) {
                    log::warn!("Failed to remove PID file {:?}: {}", pid_path, e);
                }
                state = DaemonState::Stopped;
            }
            DaemonState::Stopped => break,
        }
    }

    log::info!("Daemon stopped");
    Ok(())
}

/// Sleep in short slices so a shutdown signal cuts the wait short.
fn sleep_interruptible(seconds: u64, running: &AtomicBool) {
    let mut remaining_ms = seconds.saturating_mul(1000);
    while remaining_ms > 0 && running.load(Ordering::SeqCst) {
        let slice = remaining_ms.min(200);
        std::thread::sleep(Duration::from_millis(slice));
        remaining_ms -= slice;
    }
}
