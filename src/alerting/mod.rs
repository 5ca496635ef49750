//! Alerting module for multi-channel notifications
//!
//! Fans one alert message out to every configured channel: mail, a
//! Slack-compatible webhook, a Telegram bot, and a generic JSON webhook.
//! Channels fail independently; one channel's error never prevents the
//! others from being attempted, and nothing is retried within a pass.

use crate::config::{ChannelConfig, MailConfig, SlackConfig, TelegramConfig, WebhookConfig};
use chrono::Utc;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Client;
use thiserror::Error;

/// Errors that can occur during alert dispatch
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("mail build error: {0}")]
    Mail(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid mail address '{0}'")]
    Address(String),
}

/// Fans an alert message out to the configured notification channels.
pub struct AlertDispatcher {
    config: ChannelConfig,
    client: Client,
}

impl AlertDispatcher {
    pub fn new(config: ChannelConfig) -> Self {
        AlertDispatcher {
            config,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Whether any channel is configured. Detection and blocking proceed
    /// either way; this only gates the "no channels" startup notice.
    pub fn has_channels(&self) -> bool {
        self.config.mail.is_some()
            || self.config.slack.is_some()
            || self.config.telegram.is_some()
            || self.config.webhook.is_some()
    }

    /// Send the message to every configured channel.
    ///
    /// Each channel is attempted exactly once and its outcome logged
    /// individually. Returns the number of channels that failed, which
    /// is informational only.
    pub async fn dispatch(&self, message: &str) -> usize {
        let mut failures = 0;

        if let Some(ref mail) = self.config.mail {
            match self.send_mail(mail, message).await {
                Ok(sent) => log::info!("Mail alert sent to {} recipient(s)", sent),
                Err(e) => {
                    log::error!("Mail alert failed: {}", e);
                    failures += 1;
                }
            }
        }

        if let Some(ref slack) = self.config.slack {
            match self.send_slack(slack, message).await {
                Ok(()) => log::info!("Slack alert sent"),
                Err(e) => {
                    log::error!("Slack alert failed: {}", e);
                    failures += 1;
                }
            }
        }

        if let Some(ref telegram) = self.config.telegram {
            match self.send_telegram(telegram, message).await {
                Ok(()) => log::info!("Telegram alert sent"),
                Err(e) => {
                    log::error!("Telegram alert failed: {}", e);
                    failures += 1;
                }
            }
        }

        if let Some(ref webhook) = self.config.webhook {
            match self.send_webhook(webhook, message).await {
                Ok(()) => log::info!("Webhook alert sent"),
                Err(e) => {
                    log::error!("Webhook alert failed: {}", e);
                    failures += 1;
                }
            }
        }

        failures
    }

    /// One send per configured recipient. Recipients fail independently:
    /// a bad address or a failed send is logged and the remaining
    /// recipients are still attempted. The channel as a whole counts as
    /// failed only when no recipient could be delivered to.
    async fn send_mail(&self, config: &MailConfig, body: &str) -> Result<usize, AlertError> {
        let transport = smtp_transport(config)?;
        let from: Mailbox = config
            .from
            .as_deref()
            .unwrap_or("authwatch@localhost")
            .parse()
            .map_err(|_| {
                AlertError::Address(config.from.clone().unwrap_or_default())
            })?;
        let subject = format!("Intrusion alert on {}", local_hostname());

        let mut sent = 0;
        let mut last_error = None;
        for recipient in parse_recipients(&config.recipients) {
            match send_to_recipient(&transport, &from, &subject, body, recipient).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    log::error!("Mail to {} failed: {}", recipient, e);
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if sent == 0 => Err(e),
            _ => Ok(sent),
        }
    }

    async fn send_slack(&self, config: &SlackConfig, message: &str) -> Result<(), AlertError> {
        let payload = serde_json::json!({ "text": message });

        let response = self
            .client
            .post(&config.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AlertError::Status(response.status()));
        }
        Ok(())
    }

    async fn send_telegram(
        &self,
        config: &TelegramConfig,
        message: &str,
    ) -> Result<(), AlertError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", config.bot_token);
        let payload = serde_json::json!({
            "chat_id": config.chat_id,
            "text": format!("*Intrusion alert*\n```\n{}\n```", message),
            "parse_mode": "Markdown",
        });

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(AlertError::Status(response.status()));
        }
        Ok(())
    }

    async fn send_webhook(&self, config: &WebhookConfig, message: &str) -> Result<(), AlertError> {
        let payload = serde_json::json!({
            "hostname": local_hostname(),
            "message": message,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let response = self.client.post(&config.url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(AlertError::Status(response.status()));
        }
        Ok(())
    }
}

async fn send_to_recipient(
    transport: &AsyncSmtpTransport<Tokio1Executor>,
    from: &Mailbox,
    subject: &str,
    body: &str,
    recipient: &str,
) -> Result<(), AlertError> {
    let to: Mailbox = recipient
        .parse()
        .map_err(|_| AlertError::Address(recipient.to_string()))?;
    let email = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject.to_string())
        .body(body.to_string())?;
    transport.send(email).await?;
    Ok(())
}

fn smtp_transport(config: &MailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, AlertError> {
    match config.smtp_host {
        Some(ref host) => {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)?;
            if let Some(port) = config.smtp_port {
                builder = builder.port(port);
            }
            if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_pass) {
                builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
            }
            Ok(builder.build())
        }
        // No relay configured: hand off to a local MTA. The port stays
        // overridable so unprivileged setups can point at a local spool.
        None => {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("localhost");
            if let Some(port) = config.smtp_port {
                builder = builder.port(port);
            }
            Ok(builder.build())
        }
    }
}

fn parse_recipients(recipients: &str) -> Vec<&str> {
    recipients
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .collect()
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Minimal HTTP responder: accepts one connection, consumes the
    /// request, answers 200 with an empty body.
    fn spawn_ok_server() -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = stream.read(&mut chunk).unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if let Some(header_end) = find_header_end(&buf) {
                        let headers = String::from_utf8_lossy(&buf[..header_end]);
                        let content_length = headers
                            .lines()
                            .find_map(|l| {
                                l.to_ascii_lowercase()
                                    .strip_prefix("content-length:")
                                    .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                            })
                            .unwrap_or(0);
                        if buf.len() >= header_end + 4 + content_length {
                            break;
                        }
                    }
                }
                let _ = stream.write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                );
            }
        });
        (url, handle)
    }

    fn find_header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|w| w == b"\r\n\r\n")
    }

    /// Plaintext SMTP stand-in: accepts one session, answers every
    /// command affirmatively, records whether a message body arrived.
    fn spawn_smtp_server() -> (u16, Arc<AtomicBool>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let delivered = Arc::new(AtomicBool::new(false));
        let flag = delivered.clone();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut reader = std::io::BufReader::new(stream.try_clone().unwrap());
                let _ = stream.write_all(b"220 localhost ESMTP\r\n");
                let mut line = String::new();
                loop {
                    line.clear();
                    if std::io::BufRead::read_line(&mut reader, &mut line).unwrap_or(0) == 0 {
                        break;
                    }
                    let command = line.to_ascii_uppercase();
                    if command.starts_with("DATA") {
                        let _ = stream.write_all(b"354 go ahead\r\n");
                        loop {
                            line.clear();
                            if std::io::BufRead::read_line(&mut reader, &mut line).unwrap_or(0)
                                == 0
                                || line.trim_end() == "."
                            {
                                break;
                            }
                        }
                        flag.store(true, Ordering::SeqCst);
                        let _ = stream.write_all(b"250 ok\r\n");
                    } else if command.starts_with("QUIT") {
                        let _ = stream.write_all(b"221 bye\r\n");
                        break;
                    } else {
                        let _ = stream.write_all(b"250 localhost\r\n");
                    }
                }
            }
        });
        (port, delivered)
    }

    #[tokio::test]
    async fn test_mail_bad_recipient_does_not_block_others() {
        let (port, delivered) = spawn_smtp_server();

        // First recipient cannot parse; the second must still get its send.
        let config = ChannelConfig {
            mail: Some(MailConfig {
                recipients: "not a mailbox, ops@example.com".to_string(),
                from: None,
                smtp_host: None,
                smtp_port: Some(port),
                smtp_user: None,
                smtp_pass: None,
            }),
            slack: None,
            telegram: None,
            webhook: None,
        };

        let dispatcher = AlertDispatcher::new(config);
        let failures = dispatcher.dispatch("12 failed attempts from IP: 10.0.0.5").await;

        // One recipient delivered: the channel did not fail.
        assert_eq!(failures, 0);
        assert!(delivered.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_mail_all_recipients_invalid_fails_channel() {
        // Nothing parseable: the channel counts as failed, without any
        // network activity.
        let config = ChannelConfig {
            mail: Some(MailConfig {
                recipients: "first bad, second bad".to_string(),
                from: None,
                smtp_host: None,
                smtp_port: None,
                smtp_user: None,
                smtp_pass: None,
            }),
            slack: None,
            telegram: None,
            webhook: None,
        };

        let dispatcher = AlertDispatcher::new(config);
        let failures = dispatcher.dispatch("alert").await;
        assert_eq!(failures, 1);
    }

    #[test]
    fn test_parse_recipients() {
        assert_eq!(
            parse_recipients("ops@example.com, sec@example.com ,,"),
            vec!["ops@example.com", "sec@example.com"]
        );
        assert!(parse_recipients("").is_empty());
    }

    #[test]
    fn test_no_channels_configured() {
        let dispatcher = AlertDispatcher::new(ChannelConfig::default());
        assert!(!dispatcher.has_channels());

        // Dispatch with nothing configured is a no-op with zero failures.
        let failures = tokio_test::block_on(dispatcher.dispatch("test message"));
        assert_eq!(failures, 0);
    }

    #[tokio::test]
    async fn test_channel_failure_is_isolated() {
        let (good_url, handle) = spawn_ok_server();

        // Slack points at a closed port and fails fast; the generic
        // webhook must still receive the message.
        let config = ChannelConfig {
            mail: None,
            slack: Some(SlackConfig {
                webhook_url: "http://127.0.0.1:1/bad".to_string(),
            }),
            telegram: None,
            webhook: Some(WebhookConfig { url: good_url }),
        };

        let dispatcher = AlertDispatcher::new(config);
        let failures = dispatcher.dispatch("12 failed attempts from IP: 10.0.0.5").await;

        assert_eq!(failures, 1);
        // The responder thread only finishes if the webhook was delivered.
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_webhook_delivery() {
        let (url, handle) = spawn_ok_server();
        let config = ChannelConfig {
            mail: None,
            slack: None,
            telegram: None,
            webhook: Some(WebhookConfig { url }),
        };

        let dispatcher = AlertDispatcher::new(config);
        let failures = dispatcher.dispatch("7 failed attempts from IP: 172.16.0.3").await;
        assert_eq!(failures, 0);
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_counts_as_failure() {
        // Telegram token with an unroutable host is replaced here by a
        // local listener returning 404.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut chunk = [0u8; 4096];
                let _ = stream.read(&mut chunk);
                let _ = stream.write_all(
                    b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                );
            }
        });

        let config = ChannelConfig {
            mail: None,
            slack: Some(SlackConfig { webhook_url: url }),
            telegram: None,
            webhook: None,
        };
        let dispatcher = AlertDispatcher::new(config);
        let failures = dispatcher.dispatch("alert").await;
        assert_eq!(failures, 1);
        handle.join().unwrap();
    }
}
