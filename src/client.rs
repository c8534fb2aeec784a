//! Headless model of the browser contact form.
//!
//! Mirrors the server rules so a front end can give feedback before any
//! request is made. Rendering is left to the caller: the controller only
//! tracks values, per-field error slots and the submit status.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use url::form_urlencoded;

use crate::validation::field_error;

pub const PHONE_MAX_DIGITS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Name,
    Email,
    Phone,
    Subject,
    Message,
    /// Honeypot; hidden from people, filled in by bots.
    Website,
}

impl FormField {
    pub const ALL: [FormField; 6] = [
        FormField::Name,
        FormField::Email,
        FormField::Phone,
        FormField::Subject,
        FormField::Message,
        FormField::Website,
    ];

    /// Fields with rules, in the order they appear on the page.
    pub const VALIDATED: [FormField; 4] = [
        FormField::Name,
        FormField::Email,
        FormField::Subject,
        FormField::Message,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FormField::Name => "name",
            FormField::Email => "email",
            FormField::Phone => "phone",
            FormField::Subject => "subject",
            FormField::Message => "message",
            FormField::Website => "website",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    fn is_validated(self) -> bool {
        Self::VALIDATED.contains(&self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Validity {
    #[default]
    Neutral,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldState {
    pub value: String,
    pub error: Option<String>,
    pub validity: Validity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitStatus {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAction {
    /// Honeypot filled: pretend nothing happened, send nothing.
    Suppressed,
    /// A request is already in flight.
    InFlight,
    /// Client-side validation failed; focus `first_invalid`.
    Blocked { first_invalid: FormField },
    /// POST this `application/x-www-form-urlencoded` body.
    Send(String),
}

/// JSON body returned by the contact endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
}

impl ApiResponse {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

#[derive(Debug, Clone)]
pub struct FormController {
    fields: HashMap<FormField, FieldState>,
    char_count: usize,
    status: SubmitStatus,
}

impl Default for FormController {
    fn default() -> Self {
        Self::new()
    }
}

impl FormController {
    pub fn new() -> Self {
        Self {
            fields: FormField::ALL
                .into_iter()
                .map(|field| (field, FieldState::default()))
                .collect(),
            char_count: 0,
            status: SubmitStatus::Idle,
        }
    }

    pub fn field(&self, field: FormField) -> &FieldState {
        &self.fields[&field]
    }

    fn field_mut(&mut self, field: FormField) -> &mut FieldState {
        self.fields.entry(field).or_default()
    }

    pub fn value(&self, field: FormField) -> &str {
        &self.field(field).value
    }

    pub fn error(&self, field: FormField) -> Option<&str> {
        self.field(field).error.as_deref()
    }

    pub fn char_count(&self) -> usize {
        self.char_count
    }

    pub fn status(&self) -> SubmitStatus {
        self.status
    }

    /// Input event. Returns the value as it should now be displayed.
    pub fn set_value(&mut self, field: FormField, value: &str) -> &str {
        let value = match field {
            FormField::Phone => mask_phone(value),
            _ => value.to_string(),
        };
        if field == FormField::Message {
            self.char_count = value.chars().count();
        }

        let was_invalid = self.field(field).validity == Validity::Invalid;
        self.field_mut(field).value = value;
        if was_invalid {
            self.blur(field);
        }

        self.value(field)
    }

    /// Blur event: validates one field. Returns whether it passed.
    pub fn blur(&mut self, field: FormField) -> bool {
        if !field.is_validated() {
            return true;
        }

        let value = self.value(field).trim().to_string();
        let error = field_error(field.name(), &value);
        let state = self.field_mut(field);

        match error {
            Some(message) => {
                state.error = Some(message);
                state.validity = Validity::Invalid;
                false
            }
            None => {
                state.error = None;
                state.validity = if value.is_empty() {
                    Validity::Neutral
                } else {
                    Validity::Valid
                };
                true
            }
        }
    }

    /// Validates every field, even after the first failure, so all error
    /// slots are filled at once.
    pub fn validate_all(&mut self) -> Result<(), FormField> {
        let mut first_invalid = None;
        for field in FormField::VALIDATED {
            if !self.blur(field) && first_invalid.is_none() {
                first_invalid = Some(field);
            }
        }
        first_invalid.map_or(Ok(()), Err)
    }

    pub fn submit(&mut self) -> SubmitAction {
        if !self.value(FormField::Website).is_empty() {
            return SubmitAction::Suppressed;
        }
        if self.status == SubmitStatus::Submitting {
            return SubmitAction::InFlight;
        }
        if let Err(first_invalid) = self.validate_all() {
            return SubmitAction::Blocked { first_invalid };
        }

        self.status = SubmitStatus::Submitting;
        SubmitAction::Send(self.encoded_body())
    }

    pub fn encoded_body(&self) -> String {
        let mut body = form_urlencoded::Serializer::new(String::new());
        for field in FormField::ALL {
            body.append_pair(field.name(), self.value(field));
        }
        body.finish()
    }

    pub fn apply_response(&mut self, response: ApiResponse) {
        if response.success {
            self.reset();
            self.status = SubmitStatus::Succeeded;
            return;
        }

        self.status = SubmitStatus::Failed;
        for (name, message) in response.errors {
            let Some(field) = FormField::from_name(&name).filter(|f| f.is_validated()) else {
                continue;
            };
            let state = self.field_mut(field);
            state.error = Some(message);
            state.validity = Validity::Invalid;
        }
    }

    /// Network error or a body that was not JSON.
    pub fn transport_failed(&mut self) {
        self.status = SubmitStatus::Failed;
    }

    pub fn reset(&mut self) {
        for state in self.fields.values_mut() {
            *state = FieldState::default();
        }
        self.char_count = 0;
        self.status = SubmitStatus::Idle;
    }
}

/// Brazilian phone display mask, `(DD) DDDDD-DDDD`, at most 11 digits.
pub fn mask_phone(input: &str) -> String {
    let digits: String = input
        .chars()
        .filter(char::is_ascii_digit)
        .take(PHONE_MAX_DIGITS)
        .collect();

    match digits.len() {
        0 => String::new(),
        1..=2 => format!("({digits}"),
        3..=6 => format!("({}) {}", &digits[..2], &digits[2..]),
        _ => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
    }
}
