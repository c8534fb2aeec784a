use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{ValidateEmail, ValidationError};

use crate::entities::contact::Subject;

pub const NAME_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 100;
pub const MESSAGE_MIN_CHARS: usize = 10;
pub const MESSAGE_MAX_CHARS: usize = 2000;

/// Everything outside the characters allowed in an e-mail address.
static ILLEGAL_EMAIL_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^A-Za-z0-9!#$%&'*+\-=?^_`{|}~@.\[\]]").expect("valid e-mail character class")
});

/// Removes characters that can never appear in an e-mail address.
pub fn sanitize_email(raw: &str) -> String {
    ILLEGAL_EMAIL_CHARS.replace_all(raw.trim(), "").into_owned()
}

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    match char_len(name) {
        0 => Err(rule_error("required", "Por favor, informe seu nome.")),
        n if n < NAME_MIN_CHARS => Err(rule_error(
            "too_short",
            "O nome deve ter pelo menos 3 caracteres.",
        )),
        n if n > NAME_MAX_CHARS => Err(rule_error(
            "too_long",
            "O nome deve ter no máximo 100 caracteres.",
        )),
        _ => Ok(()),
    }
}

pub fn validate_email_address(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(rule_error("required", "Por favor, informe seu e-mail."));
    }
    if !email.to_owned().validate_email() || !has_dotted_domain(email) {
        return Err(rule_error("invalid", "Informe um e-mail válido."));
    }
    Ok(())
}

/// `a@b` passes `ValidateEmail`; the domain also needs a dot between
/// non-empty labels.
fn has_dotted_domain(email: &str) -> bool {
    email.rsplit_once('@').is_some_and(|(_, domain)| {
        domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
    })
}

pub fn validate_subject(subject: &str) -> Result<(), ValidationError> {
    let subject = subject.trim();
    if subject.is_empty() {
        return Err(rule_error("required", "Selecione um assunto."));
    }
    subject
        .parse::<Subject>()
        .map(|_| ())
        .map_err(|_| rule_error("invalid", "Assunto inválido."))
}

pub fn validate_message(message: &str) -> Result<(), ValidationError> {
    match char_len(message) {
        0 => Err(rule_error("required", "Escreva sua mensagem.")),
        n if n < MESSAGE_MIN_CHARS => Err(rule_error(
            "too_short",
            "A mensagem deve ter pelo menos 10 caracteres.",
        )),
        n if n > MESSAGE_MAX_CHARS => Err(rule_error(
            "too_long",
            "A mensagem deve ter no máximo 2000 caracteres.",
        )),
        _ => Ok(()),
    }
}

/// Runs the rule for a named form field, returning its message on failure.
///
/// Fields without rules (`phone`, `website`, unknown names) always pass.
pub fn field_error(field: &str, value: &str) -> Option<String> {
    let result = match field {
        "name" => validate_name(value),
        "email" => validate_email_address(&sanitize_email(value)),
        "subject" => validate_subject(value),
        "message" => validate_message(value),
        _ => Ok(()),
    };

    result
        .err()
        .and_then(|e| e.message.map(|m| m.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_of(result: Result<(), ValidationError>) -> String {
        result.unwrap_err().message.unwrap().into_owned()
    }

    #[test]
    fn name_bounds_count_characters_after_trimming() {
        assert_eq!(message_of(validate_name("   ")), "Por favor, informe seu nome.");
        assert_eq!(message_of(validate_name("Jo")), "O nome deve ter pelo menos 3 caracteres.");
        assert!(validate_name(" Zé ").is_err());
        assert!(validate_name("Zoé").is_ok());
        assert!(validate_name(&"a".repeat(100)).is_ok());
        assert_eq!(
            message_of(validate_name(&"a".repeat(101))),
            "O nome deve ter no máximo 100 caracteres."
        );
    }

    #[test]
    fn message_bounds() {
        assert_eq!(message_of(validate_message("")), "Escreva sua mensagem.");
        assert!(validate_message("curta").is_err());
        assert!(validate_message("0123456789").is_ok());
        assert!(validate_message(&"x".repeat(2000)).is_ok());
        assert!(validate_message(&"x".repeat(2001)).is_err());
    }

    #[test]
    fn subject_must_be_known_value() {
        assert_eq!(message_of(validate_subject("")), "Selecione um assunto.");
        assert_eq!(message_of(validate_subject("spam")), "Assunto inválido.");
        for subject in ["duvida", "agendamento", "feedback", "outro"] {
            assert!(validate_subject(subject).is_ok(), "{subject} should be accepted");
        }
    }

    #[test]
    fn email_is_sanitized_then_checked() {
        assert_eq!(sanitize_email(" maria (at)<x>@example.com "), "mariaatx@example.com");
        assert_eq!(sanitize_email("joão@example.com"), "joo@example.com");
        assert_eq!(message_of(validate_email_address("")), "Por favor, informe seu e-mail.");
        assert_eq!(message_of(validate_email_address("maria.example.com")), "Informe um e-mail válido.");
        assert!(validate_email_address("maria@example.com").is_ok());
    }

    #[test]
    fn email_domain_needs_a_dot() {
        for email in ["a@b", "maria@localhost", "maria@example.", "maria@.com"] {
            assert_eq!(message_of(validate_email_address(email)), "Informe um e-mail válido.", "{email}");
        }
        assert!(validate_email_address("maria@mail.example.com.br").is_ok());
        assert_eq!(field_error("email", "a@b"), Some("Informe um e-mail válido.".to_string()));
    }

    #[test]
    fn field_error_ignores_unvalidated_fields() {
        assert_eq!(field_error("phone", ""), None);
        assert_eq!(field_error("website", "anything"), None);
        assert_eq!(
            field_error("email", "   "),
            Some("Por favor, informe seu e-mail.".to_string())
        );
    }
}
