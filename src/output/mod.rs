//! Point-in-time report snapshots.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use thiserror::Error;

use crate::persistence::BlockedSet;

/// Errors that can occur while writing a report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes a timestamped snapshot of the current alert and block list.
///
/// The destination is overwritten on every invocation; this is a
/// point-in-time report, not an append log.
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: PathBuf) -> Self {
        ReportWriter { path }
    }

    pub fn write(&self, alert_body: &str, blocked: &BlockedSet) -> Result<(), ReportError> {
        let mut report = format!(
            "Intrusion report generated at {}\n\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );

        if alert_body.is_empty() {
            report.push_str("No alert-worthy addresses in this pass.\n");
        } else {
            report.push_str(alert_body);
        }

        report.push_str("\nCurrently blocked addresses:\n");
        if blocked.is_empty() {
            report.push_str("(none)\n");
        } else {
            for address in blocked.iter() {
                report.push_str(address);
                report.push('\n');
            }
        }

        fs::write(&self.path, report).map_err(|source| ReportError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
