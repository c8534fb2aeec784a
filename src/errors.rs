use std::collections::BTreeMap;

use actix_multipart::MultipartError;
use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use derive_more::Display;
use serde::Serialize;
use validator::ValidationErrors;

use crate::constants::{
    BAD_REQUEST_MESSAGE, DELIVERY_FAILED_MESSAGE, METHOD_NOT_ALLOWED_MESSAGE,
    RATE_LIMITED_MESSAGE,
};

#[derive(Debug, Display)]
pub enum AppError {
    #[display("validation failed on {} field(s)", _0.len())]
    Validation(Vec<FieldError>),

    #[display("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[display("method not allowed")]
    MethodNotAllowed,

    #[display("bad request: {_0}")]
    BadRequest(String),

    #[display("message delivery failed")]
    Delivery,

    #[display("internal server error: {_0}")]
    Internal(String),
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());

        let body = match self {
            AppError::Validation(errors) => {
                let errors: BTreeMap<&str, &str> = errors
                    .iter()
                    .map(|e| (e.field.as_str(), e.message.as_str()))
                    .collect();
                serde_json::json!({ "success": false, "errors": errors })
            }
            AppError::RateLimited { retry_after } => {
                builder.insert_header((header::RETRY_AFTER, retry_after.to_string()));
                serde_json::json!({ "success": false, "message": RATE_LIMITED_MESSAGE })
            }
            AppError::MethodNotAllowed => {
                builder.insert_header((header::ALLOW, "POST, OPTIONS"));
                serde_json::json!({ "success": false, "message": METHOD_NOT_ALLOWED_MESSAGE })
            }
            AppError::BadRequest(_) => {
                serde_json::json!({ "success": false, "message": BAD_REQUEST_MESSAGE })
            }
            AppError::Delivery | AppError::Internal(_) => {
                serde_json::json!({ "success": false, "message": DELIVERY_FAILED_MESSAGE })
            }
        };

        builder.json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Delivery => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut field_errors: Vec<FieldError> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().take(1).map(|e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "Valor inválido.".to_string()),
                })
            })
            .collect();
        field_errors.sort_by(|a, b| a.field.cmp(&b.field));

        AppError::Validation(field_errors)
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl AppError {
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            AppError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value, Option<String>) {
        let response = err.error_response();
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap(), retry_after)
    }

    #[actix_rt::test]
    async fn validation_errors_render_as_field_map() {
        let err = AppError::Validation(vec![FieldError {
            field: "name".into(),
            message: "O nome deve ter pelo menos 3 caracteres.".into(),
        }]);

        let (status, body, _) = body_json(err).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"]["name"], "O nome deve ter pelo menos 3 caracteres.");
        assert!(body.get("message").is_none());
    }

    #[actix_rt::test]
    async fn rate_limited_sets_retry_after() {
        let (status, body, retry_after) = body_json(AppError::RateLimited { retry_after: 42 }).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["message"], RATE_LIMITED_MESSAGE);
        assert_eq!(retry_after.as_deref(), Some("42"));
    }

    #[actix_rt::test]
    async fn delivery_failure_is_internal_error() {
        let (status, body, _) = body_json(AppError::Delivery).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], DELIVERY_FAILED_MESSAGE);
    }
}
