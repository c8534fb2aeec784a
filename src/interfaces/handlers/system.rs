use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use humantime::format_duration;
use serde::Serialize;
use std::time::Duration;
use sysinfo::System;

use crate::{constants::START_TIME, limiter::rate_limiter::RateLimitStore, mail::Mailer, AppState};

#[derive(Serialize)]
struct HealthCheckResponse {
    status: &'static str,
    uptime: String,
    started_at: String,
    version: &'static str,
    hostname: String,
    rate_limit_store: &'static str,
    mail_transport: &'static str,
}

#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let uptime = Utc::now().signed_duration_since(*START_TIME);
    let uptime = Duration::from_secs(uptime.num_seconds().max(0) as u64);

    HttpResponse::Ok().json(HealthCheckResponse {
        status: "healthy",
        uptime: format_duration(uptime).to_string(),
        started_at: START_TIME.to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        rate_limit_store: state.contact_handler.rate_store.kind(),
        mail_transport: state.contact_handler.mailer.transport_name(),
    })
}
