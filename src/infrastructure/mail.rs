pub mod local;
pub mod message;
pub mod smtp;
pub mod template;
pub mod tls;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sysinfo::System;

use crate::{constants::MAILER_ID, entities::email::EmailMessage, settings::AppConfig};
use local::{EmailLog, LocalDelivery};
use message::{dot_stuff, format_message};
use smtp::{Credentials, Envelope, SmtpClient, SmtpError};
use tls::RustlsUpgrade;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the SMTP relay or the local MTA.
    Sent,
    /// Not delivered, but written to the email log.
    Logged,
    Failed,
}

impl DeliveryOutcome {
    /// `Logged` counts as success towards the visitor.
    pub fn is_success(self) -> bool {
        !matches!(self, DeliveryOutcome::Failed)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, email: &EmailMessage) -> DeliveryOutcome;

    fn transport_name(&self) -> &'static str;
}

enum Transport {
    Smtp(SmtpClient),
    Local(LocalDelivery),
}

pub struct ContactMailer {
    transport: Transport,
    log: EmailLog,
}

impl ContactMailer {
    pub fn from_config(config: &AppConfig) -> Result<Self, SmtpError> {
        let log = EmailLog::new(&config.email_log_dir);

        if !config.uses_smtp() {
            tracing::info!(
                command = config.sendmail_command.as_deref().unwrap_or("sendmail"),
                log_dir = %config.email_log_dir.display(),
                "SMTP not configured, using local delivery"
            );
            let local = LocalDelivery::new(config.sendmail_command.as_deref());
            return Ok(Self { transport: Transport::Local(local), log });
        }

        let helo_name = config
            .smtp_helo_name
            .clone()
            .or_else(System::host_name)
            .unwrap_or_else(|| "localhost".to_string());

        let client = SmtpClient::new(
            &config.smtp_host,
            config.smtp_port,
            config.smtp_secure,
            config.smtp_timeout(),
            helo_name,
            Credentials::new(&config.smtp_user, &config.smtp_password),
            Arc::new(RustlsUpgrade::new(&config.smtp_host)?),
        );
        tracing::info!(
            relay = %client.address(),
            security = ?client.security(),
            "Using SMTP relay"
        );

        Ok(Self { transport: Transport::Smtp(client), log })
    }

    async fn log_fallback(&self, email: &EmailMessage) -> DeliveryOutcome {
        match self.log.write(email, Utc::now()).await {
            Ok(path) => {
                tracing::warn!(path = %path.display(), "Message saved to email log instead of being sent");
                DeliveryOutcome::Logged
            }
            Err(e) => {
                tracing::error!(dir = %self.log.dir().display(), error = %e, "Failed to write email log");
                DeliveryOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl Mailer for ContactMailer {
    async fn deliver(&self, email: &EmailMessage) -> DeliveryOutcome {
        let raw = format_message(email, Utc::now(), MAILER_ID);

        match &self.transport {
            Transport::Smtp(client) => {
                let data = dot_stuff(&raw);
                let envelope = Envelope {
                    sender: &email.from.address,
                    recipient: &email.to.address,
                    message: &data,
                };

                match client.send(&envelope).await {
                    Ok(()) => {
                        tracing::info!(relay = %client.address(), "Contact email sent via SMTP");
                        DeliveryOutcome::Sent
                    }
                    Err(e) => {
                        tracing::error!(relay = %client.address(), error = %e, "SMTP delivery failed");
                        DeliveryOutcome::Failed
                    }
                }
            }
            Transport::Local(local) => match local.send(email, &raw).await {
                Ok(()) => {
                    tracing::info!(command = local.command(), "Contact email handed to sendmail");
                    DeliveryOutcome::Sent
                }
                Err(e) => {
                    tracing::warn!(command = local.command(), error = %e, "Local delivery failed");
                    self.log_fallback(email).await
                }
            },
        }
    }

    fn transport_name(&self) -> &'static str {
        match self.transport {
            Transport::Smtp(_) => "smtp",
            Transport::Local(_) => "sendmail",
        }
    }
}
