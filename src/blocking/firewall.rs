//! Host firewall integration.
//!
//! Two mechanisms are supported: firewalld rich rules (preferred when the
//! firewalld daemon is responding) and plain iptables DROP rules. Exactly
//! one backend is selected at startup and used for every block call in
//! the run; if neither probe succeeds, blocking is disabled for the run.

use std::process::Command;
use thiserror::Error;

/// Errors that can occur while applying a firewall rule
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} rejected rule for {address}: {stderr}")]
    Rejected {
        command: &'static str,
        address: String,
        stderr: String,
    },
}

/// One host firewall mechanism.
pub trait Firewall: Send {
    fn name(&self) -> &'static str;

    /// Deny further traffic from the address. Must be safe to call with
    /// an address that already has a rule, but callers are expected to
    /// consult the blocked set first.
    fn block(&self, address: &str) -> Result<(), BlockError>;
}

/// firewalld rich-rule reject. Rules are added permanently and the
/// daemon reloaded so a block survives a firewalld restart.
pub struct FirewalldBackend;

impl Firewall for FirewalldBackend {
    fn name(&self) -> &'static str {
        "firewalld"
    }

    fn block(&self, address: &str) -> Result<(), BlockError> {
        let rule = format!("rule family='ipv4' source address='{}' reject", address);
        run_checked(
            "firewall-cmd",
            &["--permanent", &format!("--add-rich-rule={}", rule)],
            address,
        )?;
        run_checked("firewall-cmd", &["--reload"], address)
    }
}

/// Plain iptables DROP rule fallback.
pub struct IptablesBackend;

impl Firewall for IptablesBackend {
    fn name(&self) -> &'static str {
        "iptables"
    }

    fn block(&self, address: &str) -> Result<(), BlockError> {
        run_checked("iptables", &["-I", "INPUT", "-s", address, "-j", "DROP"], address)
    }
}

fn run_checked(command: &'static str, args: &[&str], address: &str) -> Result<(), BlockError> {
    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|source| BlockError::Spawn { command, source })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(BlockError::Rejected {
            command,
            address: address.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Probe for an available firewall mechanism.
///
/// Requires elevated privilege in practice; a probe that fails for any
/// reason (missing binary, daemon down, permission denied) simply rules
/// that backend out.
pub fn detect() -> Option<Box<dyn Firewall>> {
    if probe("firewall-cmd", &["--state"]) {
        log::info!("Using firewalld rich rules for blocking");
        return Some(Box::new(FirewalldBackend));
    }
    if probe("iptables", &["--version"]) {
        log::info!("Using iptables DROP rules for blocking");
        return Some(Box::new(IptablesBackend));
    }
    None
}

fn probe(command: &str, args: &[&str]) -> bool {
    Command::new(command)
        .args(args)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
