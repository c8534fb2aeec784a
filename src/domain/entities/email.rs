use std::fmt;

/// A display name plus address, e.g. `Mesa Hermética <noreply@example.com>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: Option<String>,
    pub address: String,
}

impl Mailbox {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        let name = strip_line_breaks(&name.into());
        Mailbox {
            name: (!name.is_empty()).then_some(name),
            address: strip_line_breaks(&address.into()),
        }
    }

    pub fn address_only(address: impl Into<String>) -> Self {
        Mailbox {
            name: None,
            address: strip_line_breaks(&address.into()),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// Sender identity and destination for contact messages.
#[derive(Debug, Clone)]
pub struct MailIdentity {
    pub to: Mailbox,
    pub from: Mailbox,
    pub site_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: Mailbox,
    pub to: Mailbox,
    pub reply_to: Mailbox,
    pub subject: String,
    pub html_body: String,
}

/// Header values must stay on a single line.
pub fn strip_line_breaks(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailbox_display() {
        assert_eq!(
            Mailbox::new("Mesa Hermética", "noreply@example.com").to_string(),
            "Mesa Hermética <noreply@example.com>"
        );
        assert_eq!(Mailbox::new("", "a@example.com").to_string(), "a@example.com");
    }

    #[test]
    fn line_breaks_cannot_inject_headers() {
        let mailbox = Mailbox::new("Eve\r\nBcc: victim@example.com", "eve@example.com");
        assert_eq!(mailbox.name.as_deref(), Some("EveBcc: victim@example.com"));
    }
}
