use std::path::PathBuf;
use structopt::StructOpt;

use authwatch::config::{
    Config, ConfigError, MailConfig, SlackConfig, TelegramConfig, WebhookConfig,
};
use authwatch::daemon::{self, MonitorState};

/// Failed-login intrusion monitor
#[derive(StructOpt, Debug)]
#[structopt(
    name = "authwatch",
    about = "Monitors an authentication log for failed logins, alerts and optionally blocks offenders"
)]
struct Opt {
    /// Path to a TOML configuration file; flags override its values
    #[structopt(short, long)]
    config: Option<PathBuf>,

    /// Authentication log to monitor (auto-detected when omitted)
    #[structopt(short, long)]
    log_file: Option<PathBuf>,

    /// Line pattern marking a failed login (case-sensitive regex)
    #[structopt(short, long)]
    pattern: Option<String>,

    /// Failed attempts per address before an alert is raised
    #[structopt(short, long)]
    alert_threshold: Option<usize>,

    /// Failed attempts per address before the address is blocked
    #[structopt(short, long)]
    block_threshold: Option<usize>,

    /// Block offending addresses at the firewall
    #[structopt(long)]
    block: bool,

    /// Trailing window in minutes
    #[structopt(short, long)]
    window: Option<i64>,

    /// Seconds between daemon passes
    #[structopt(short, long)]
    interval: Option<u64>,

    /// Enforce the window against parsed line timestamps
    #[structopt(long)]
    strict_window: bool,

    /// Whitelist file, one address per line
    #[structopt(long)]
    whitelist: Option<PathBuf>,

    /// Durable store of already-blocked addresses
    #[structopt(long)]
    blocked_file: Option<PathBuf>,

    /// Report destination, overwritten each alerting pass
    #[structopt(short, long)]
    report: Option<PathBuf>,

    /// PID marker path used in daemon mode
    #[structopt(long)]
    pid_file: Option<PathBuf>,

    /// Run as a daemon, polling at the configured interval
    #[structopt(short, long)]
    daemon: bool,

    /// Verbose logging
    #[structopt(long)]
    debug: bool,

    /// Mail recipients, comma separated
    #[structopt(long)]
    mail_to: Option<String>,

    /// Mail sender address
    #[structopt(long)]
    mail_from: Option<String>,

    /// SMTP relay host (default: local MTA)
    #[structopt(long)]
    smtp_host: Option<String>,

    /// SMTP relay port
    #[structopt(long)]
    smtp_port: Option<u16>,

    /// SMTP username
    #[structopt(long)]
    smtp_user: Option<String>,

    /// SMTP password
    #[structopt(long)]
    smtp_pass: Option<String>,

    /// Slack-compatible incoming-webhook URL
    #[structopt(long)]
    slack_webhook: Option<String>,

    /// Telegram bot token (requires --telegram-chat)
    #[structopt(long)]
    telegram_token: Option<String>,

    /// Telegram chat id (requires --telegram-token)
    #[structopt(long)]
    telegram_chat: Option<String>,

    /// Generic JSON webhook URL
    #[structopt(long)]
    webhook_url: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[structopt(long)]
    print_config: bool,
}

fn main() {
    let opt = Opt::from_args();

    env_logger::Builder::from_default_env()
        .filter_level(if opt.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if let Err(e) = run(opt) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&opt)?;
    config.validate()?;

    if opt.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let daemon_mode = config.output.daemon;
    let mut monitor = MonitorState::new(config)?;

    if daemon_mode {
        daemon::run(monitor)?;
    } else {
        monitor.run_pass()?;
    }
    Ok(())
}

/// Merge CLI flags over the config file (or the defaults).
fn build_config(opt: &Opt) -> Result<Config, ConfigError> {
    let mut config = match opt.config {
        Some(ref path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(ref path) = opt.log_file {
        config.monitor.log_file = Some(path.clone());
    }
    if let Some(ref pattern) = opt.pattern {
        config.monitor.pattern = pattern.clone();
    }
    if let Some(threshold) = opt.alert_threshold {
        config.monitor.alert_threshold = threshold;
    }
    if let Some(threshold) = opt.block_threshold {
        config.blocking.block_threshold = threshold;
    }
    if let Some(window) = opt.window {
        config.monitor.window_minutes = window;
    }
    if let Some(interval) = opt.interval {
        config.monitor.poll_interval_secs = interval;
    }
    if let Some(ref path) = opt.whitelist {
        config.monitor.whitelist_file = Some(path.clone());
    }
    if let Some(ref path) = opt.blocked_file {
        config.blocking.blocked_file = path.clone();
    }
    if let Some(ref path) = opt.report {
        config.output.report_file = Some(path.clone());
    }
    if let Some(ref path) = opt.pid_file {
        config.output.pid_file = path.clone();
    }
    if opt.block {
        config.blocking.enabled = true;
    }
    if opt.strict_window {
        config.monitor.strict_window = true;
    }
    if opt.daemon {
        config.output.daemon = true;
    }

    if let Some(ref recipients) = opt.mail_to {
        config.channels.mail = Some(MailConfig {
            recipients: recipients.clone(),
            from: opt.mail_from.clone(),
            smtp_host: opt.smtp_host.clone(),
            smtp_port: opt.smtp_port,
            smtp_user: opt.smtp_user.clone(),
            smtp_pass: opt.smtp_pass.clone(),
        });
    }
    if let Some(ref url) = opt.slack_webhook {
        config.channels.slack = Some(SlackConfig {
            webhook_url: url.clone(),
        });
    }
    match (&opt.telegram_token, &opt.telegram_chat) {
        (Some(token), Some(chat)) => {
            config.channels.telegram = Some(TelegramConfig {
                bot_token: token.clone(),
                chat_id: chat.clone(),
            });
        }
        (Some(_), None) | (None, Some(_)) => {
            return Err(ConfigError::Invalid(
                "telegram channel requires both --telegram-token and --telegram-chat".to_string(),
            ));
        }
        (None, None) => {}
    }
    if let Some(ref url) = opt.webhook_url {
        config.channels.webhook = Some(WebhookConfig { url: url.clone() });
    }

    Ok(config)
}
