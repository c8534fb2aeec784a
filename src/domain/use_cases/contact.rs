use crate::{
    constants::SUCCESS_MESSAGE,
    entities::{
        contact::{ContactForm, ContactResponse, Submission},
        email::{EmailMessage, MailIdentity, Mailbox},
    },
    errors::AppError,
    limiter::rate_limiter::{Admission, RateLimitStore},
    mail::{
        template::{render_contact_email, subject_line},
        DeliveryOutcome, Mailer,
    },
};

pub struct ContactHandler<R, M>
where
    R: RateLimitStore,
    M: Mailer,
{
    pub rate_store: R,
    pub mailer: M,
    pub identity: MailIdentity,
}

impl<R, M> ContactHandler<R, M>
where
    R: RateLimitStore,
    M: Mailer,
{
    pub fn new(rate_store: R, mailer: M, identity: MailIdentity) -> Self {
        ContactHandler {
            rate_store,
            mailer,
            identity,
        }
    }

    /// Processes one contact form post from the client identified by `key`.
    ///
    /// Order matters: honeypot, rate check, validation, attempt record,
    /// delivery. A bot gets the regular success body and leaves no trace.
    pub async fn submit(
        &self,
        form: ContactForm,
        key: &str,
        now: i64,
    ) -> Result<ContactResponse, AppError> {
        if form.is_bot() {
            tracing::info!(client = %key, "Honeypot field filled, discarding submission");
            return Ok(success());
        }

        self.admit(self.rate_store.check(key, now).await, key)?;

        let submission = Submission::try_from(&form)?;

        self.admit(self.rate_store.try_record(key, now).await, key)?;

        let email = self.compose(&submission);
        match self.mailer.deliver(&email).await {
            DeliveryOutcome::Sent => Ok(success()),
            DeliveryOutcome::Logged => {
                tracing::warn!(client = %key, "Contact message logged, not delivered");
                Ok(success())
            }
            DeliveryOutcome::Failed => Err(AppError::Delivery),
        }
    }

    /// Store failures let the request through rather than lock everyone out.
    fn admit<E: std::fmt::Display>(&self, admission: Result<Admission, E>, key: &str) -> Result<(), AppError> {
        match admission {
            Ok(Admission::Allowed { .. }) => Ok(()),
            Ok(Admission::Limited { retry_after }) => {
                tracing::info!(client = %key, retry_after, "Contact rate limit reached");
                Err(AppError::RateLimited { retry_after })
            }
            Err(e) => {
                tracing::warn!(client = %key, error = %e, "Rate limit store unavailable, allowing request");
                Ok(())
            }
        }
    }

    pub fn compose(&self, submission: &Submission) -> EmailMessage {
        let site = &self.identity.site_name;
        EmailMessage {
            from: self.identity.from.clone(),
            to: self.identity.to.clone(),
            reply_to: Mailbox::new(&submission.name, &submission.email),
            subject: subject_line(site, submission),
            html_body: render_contact_email(site, submission),
        }
    }
}

fn success() -> ContactResponse {
    ContactResponse {
        success: true,
        message: SUCCESS_MESSAGE.to_string(),
    }
}
