use std::sync::Arc;

mod domain;
mod interfaces;
mod infrastructure;
pub mod client;
pub mod errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;

pub use domain::{entities, use_cases, validation};
pub use interfaces::{handlers, middlewares, routes};
pub use infrastructure::{limiter, mail, utils};

use entities::email::{MailIdentity, Mailbox};
use limiter::rate_limiter::RateLimitStore;
use mail::ContactMailer;
use use_cases::contact::ContactHandler;

pub struct AppState {
    pub contact_handler: AppContactHandler,
    pub trust_forwarded_for: bool,
}

pub type AppContactHandler = ContactHandler<Arc<dyn RateLimitStore>, ContactMailer>;

impl AppState {
    pub fn new(config: &settings::AppConfig) -> anyhow::Result<Self> {
        let rate_store = limiter::store_from_config(config)?;
        let mailer = ContactMailer::from_config(config)?;

        let identity = MailIdentity {
            to: Mailbox::address_only(&config.mail_to),
            from: Mailbox::new(&config.mail_from_name, &config.mail_from_email),
            site_name: config.site_name.clone(),
        };

        Ok(AppState {
            contact_handler: ContactHandler::new(rate_store, mailer, identity),
            trust_forwarded_for: config.trust_forwarded_for,
        })
    }

    pub fn rate_store(&self) -> Arc<dyn RateLimitStore> {
        Arc::clone(&self.contact_handler.rate_store)
    }
}
