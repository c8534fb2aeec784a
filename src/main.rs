use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use contact_backend::{
    background_task::{start_purge_task, PURGE_INTERVAL},
    graceful_shutdown::stop_on_signal,
    middlewares::cors::CorsHeaders,
    routes::configure_routes,
    settings::AppConfig,
    AppState,
};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::new();
    init_tracing(config.as_ref().is_ok_and(AppConfig::is_production));

    let config = match config {
        Ok(cfg) => {
            tracing::info!("Loaded configuration: {:?}", cfg);
            cfg
        }
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = web::Data::new(AppState::new(&config)?);
    let purge_store = app_state.rate_store();
    let origins = config.cors_origins();

    let server_addr = format!("{}:{}", config.host, config.port);

    tracing::info!(
        "🚀 Starting contact backend v{} on {}",
        env!("CARGO_PKG_VERSION"),
        server_addr
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(NormalizePath::trim())
            .wrap(CorsHeaders::new(origins.clone()))
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .workers(config.worker_count)
    .disable_signals()
    .bind(server_addr)?
    .run();

    tokio::spawn(start_purge_task(purge_store, PURGE_INTERVAL));
    tokio::spawn(stop_on_signal(server.handle()));

    server.await?;
    Ok(())
}
