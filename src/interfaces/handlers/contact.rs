use actix_multipart::Multipart;
use actix_web::{web, Either, HttpRequest, HttpResponse};
use chrono::Utc;
use futures_util::TryStreamExt;

use crate::{
    entities::contact::ContactForm,
    errors::AppError,
    limiter::rate_limiter::client_key,
    utils::get_client_ip::get_client_ip,
    AppState,
};

/// Upper bound for a whole form body, urlencoded or multipart.
pub const FORM_LIMIT: usize = 64 * 1024;

pub async fn submit_contact(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: Either<web::Form<ContactForm>, Multipart>,
) -> Result<HttpResponse, AppError> {
    let form = match body {
        Either::Left(form) => form.into_inner(),
        Either::Right(multipart) => read_multipart(multipart).await?,
    };

    let client_ip = get_client_ip(&req, state.trust_forwarded_for);
    let key = client_key(&client_ip);

    let response = state
        .contact_handler
        .submit(form, &key, Utc::now().timestamp())
        .await?;

    Ok(HttpResponse::Ok().json(response))
}

/// CORS preflight; the middleware adds the headers.
pub async fn preflight() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

pub async fn method_not_allowed() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed)
}

async fn read_multipart(mut payload: Multipart) -> Result<ContactForm, AppError> {
    let mut form = ContactForm::default();
    let mut total = 0usize;

    while let Some(mut field) = payload.try_next().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        let mut value = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            total += chunk.len();
            if total > FORM_LIMIT {
                return Err(AppError::BadRequest("form body too large".into()));
            }
            value.extend_from_slice(&chunk);
        }

        let value = String::from_utf8(value)
            .map_err(|_| AppError::BadRequest(format!("field {name} is not valid UTF-8")))?;
        form.set_field(&name, value);
    }

    Ok(form)
}
