use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

pub const CONTACT_PATH: &str = "/api/contact";

pub const SUCCESS_MESSAGE: &str = "Mensagem enviada com sucesso!";
pub const DELIVERY_FAILED_MESSAGE: &str = "Erro ao enviar a mensagem. Tente novamente.";
pub const RATE_LIMITED_MESSAGE: &str = "Muitas tentativas. Tente novamente em uma hora.";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Método não permitido.";
pub const BAD_REQUEST_MESSAGE: &str = "Requisição inválida.";

/// Identifier sent in the `X-Mailer` header.
pub const MAILER_ID: &str = concat!("ContactBackend/", env!("CARGO_PKG_VERSION"));
