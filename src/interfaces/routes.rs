use actix_web::{http::Method, web};

use crate::{
    constants::CONTACT_PATH,
    errors::AppError,
    handlers::{contact, system},
};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::FormConfig::default()
            .limit(contact::FORM_LIMIT)
            .error_handler(|err, _req| {
                tracing::debug!(error = %err, "Rejected contact form body");
                AppError::BadRequest(err.to_string()).into()
            }),
    );

    cfg.service(
        web::resource(CONTACT_PATH)
            .route(web::post().to(contact::submit_contact))
            .route(web::method(Method::OPTIONS).to(contact::preflight))
            .default_service(web::to(contact::method_not_allowed)),
    );

    cfg.service(system::health_check);
}
