use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lettre::{
    address::Envelope, Address, AsyncSendmailTransport, AsyncTransport, Tokio1Executor,
};
use uuid::Uuid;

use crate::entities::email::EmailMessage;

/// Hands a formatted message to the local MTA through `sendmail`.
pub struct LocalDelivery {
    transport: AsyncSendmailTransport<Tokio1Executor>,
    command: String,
}

impl LocalDelivery {
    pub fn new(command: Option<&str>) -> Self {
        match command {
            Some(command) => Self {
                transport: AsyncSendmailTransport::new_with_command(command),
                command: command.to_string(),
            },
            None => Self {
                transport: AsyncSendmailTransport::new(),
                command: "sendmail".to_string(),
            },
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub async fn send(&self, email: &EmailMessage, raw: &str) -> anyhow::Result<()> {
        let from: Address = email.from.address.parse()?;
        let to: Address = email.to.address.parse()?;
        let envelope = Envelope::new(Some(from), vec![to])?;

        self.transport.send_raw(&envelope, raw.as_bytes()).await?;
        Ok(())
    }
}

/// Writes undeliverable messages to disk, one HTML file per message.
#[derive(Debug, Clone)]
pub struct EmailLog {
    dir: PathBuf,
}

impl EmailLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write(&self, email: &EmailMessage, now: DateTime<Utc>) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!(
            "{}_{}.html",
            now.format("%Y-%m-%d_%H-%M-%S"),
            Uuid::new_v4().simple()
        );
        let path = self.dir.join(file_name);

        tokio::fs::write(&path, render_log_entry(email, now)).await?;
        Ok(path)
    }
}

pub fn render_log_entry(email: &EmailMessage, now: DateTime<Utc>) -> String {
    format!(
        "TO: {}\nFROM: {}\nREPLY-TO: {}\nSUBJECT: {}\nDATE: {}\n---\n\n{}",
        email.to,
        email.from,
        email.reply_to,
        email.subject,
        now.format("%Y-%m-%d %H:%M:%S"),
        email.html_body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::email::Mailbox;
    use chrono::TimeZone;

    fn email() -> EmailMessage {
        EmailMessage {
            from: Mailbox::new("Mesa Hermética", "noreply@example.com"),
            to: Mailbox::address_only("contato@example.com"),
            reply_to: Mailbox::new("Maria", "maria@example.com"),
            subject: "[Mesa Hermética] Feedback — Maria".into(),
            html_body: "<p>oi</p>".into(),
        }
    }

    #[test]
    fn log_entry_layout() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap();
        assert_eq!(
            render_log_entry(&email(), now),
            "TO: contato@example.com\n\
             FROM: Mesa Hermética <noreply@example.com>\n\
             REPLY-TO: Maria <maria@example.com>\n\
             SUBJECT: [Mesa Hermética] Feedback — Maria\n\
             DATE: 2024-05-01 09:30:05\n\
             ---\n\n<p>oi</p>"
        );
    }

    #[tokio::test]
    async fn log_files_are_timestamped_and_unique() {
        let dir = std::env::temp_dir().join(format!("contact-email-log-{}", Uuid::new_v4()));
        let log = EmailLog::new(&dir);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap();

        let first = log.write(&email(), now).await.unwrap();
        let second = log.write(&email(), now).await.unwrap();

        assert_ne!(first, second);
        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("2024-05-01_09-30-05_"));
        assert!(name.ends_with(".html"));
        assert!(std::fs::read_to_string(&first).unwrap().ends_with("<p>oi</p>"));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn missing_sendmail_binary_is_an_error() {
        let local = LocalDelivery::new(Some("/nonexistent/contact-backend-sendmail"));
        let raw = "Subject: test\r\n\r\nbody";
        assert!(local.send(&email(), raw).await.is_err());
    }
}
