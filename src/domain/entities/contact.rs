use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    domain::validation::{
        sanitize_email, validate_email_address, validate_message, validate_name,
        validate_subject,
    },
    errors::AppError,
};

/// Raw contact form fields as posted by the browser.
///
/// Missing fields deserialize to empty strings so that every rule reports
/// its own "required" message instead of the whole body being rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    /// Honeypot, hidden from humans.
    #[serde(default)]
    pub website: String,
}

impl ContactForm {
    pub fn is_bot(&self) -> bool {
        !self.website.is_empty()
    }

    /// Assigns a field by its form name. Unknown names are ignored.
    pub fn set_field(&mut self, field: &str, value: String) {
        match field {
            "name" => self.name = value,
            "email" => self.email = value,
            "phone" => self.phone = value,
            "subject" => self.subject = value,
            "message" => self.message = value,
            "website" => self.website = value,
            _ => {}
        }
    }

    pub fn normalized(&self) -> NormalizedContactForm {
        NormalizedContactForm {
            name: self.name.trim().to_string(),
            email: sanitize_email(&self.email),
            phone: self.phone.trim().to_string(),
            subject: self.subject.trim().to_string(),
            message: self.message.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct NormalizedContactForm {
    #[validate(custom(function = "validate_name"))]
    pub name: String,

    #[validate(custom(function = "validate_email_address"))]
    pub email: String,

    pub phone: String,

    #[validate(custom(function = "validate_subject"))]
    pub subject: String,

    #[validate(custom(function = "validate_message"))]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Duvida,
    Agendamento,
    Feedback,
    Outro,
}

impl Subject {
    pub const ALL: [Subject; 4] = [
        Subject::Duvida,
        Subject::Agendamento,
        Subject::Feedback,
        Subject::Outro,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Duvida => "duvida",
            Subject::Agendamento => "agendamento",
            Subject::Feedback => "feedback",
            Subject::Outro => "outro",
        }
    }

    /// Human readable label used in the e-mail subject and body.
    pub fn label(self) -> &'static str {
        match self {
            Subject::Duvida => "Dúvida sobre a Mesa Radiônica",
            Subject::Agendamento => "Agendamento de sessão",
            Subject::Feedback => "Feedback / Depoimento",
            Subject::Outro => "Outro assunto",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSubject(pub String);

impl fmt::Display for UnknownSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown subject: {}", self.0)
    }
}

impl std::error::Error for UnknownSubject {}

impl FromStr for Subject {
    type Err = UnknownSubject;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subject::ALL
            .into_iter()
            .find(|subject| subject.as_str() == s)
            .ok_or_else(|| UnknownSubject(s.to_string()))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated submission. Values are trimmed but not escaped; escaping
/// happens when they are rendered into HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub subject: Subject,
    pub message: String,
}

impl TryFrom<NormalizedContactForm> for Submission {
    type Error = AppError;

    fn try_from(form: NormalizedContactForm) -> Result<Self, Self::Error> {
        form.validate()?;

        let subject = form
            .subject
            .parse::<Subject>()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Submission {
            name: form.name,
            email: form.email,
            phone: form.phone,
            subject,
            message: form.message,
        })
    }
}

impl TryFrom<&ContactForm> for Submission {
    type Error = AppError;

    fn try_from(form: &ContactForm) -> Result<Self, Self::Error> {
        form.normalized().try_into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
}
