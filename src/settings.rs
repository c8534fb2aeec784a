use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use dotenv::dotenv;
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};
use validator::ValidateEmail;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
    Testing,
}

impl FromStr for AppEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(AppEnvironment::Development),
            "production" => Ok(AppEnvironment::Production),
            "testing" => Ok(AppEnvironment::Testing),
            _ => Err(ConfigError::Message(format!("Invalid environment: {}", s))),
        }
    }
}

/// Where sliding-window attempt records are kept.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RateStoreKind {
    File,
    Memory,
}

/// How the SMTP connection is secured.
///
/// `tls` upgrades a plaintext connection with STARTTLS, `ssl` connects with
/// implicit TLS, `none` never encrypts.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    Tls,
    Ssl,
    None,
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default = "default_env")]
    pub env: AppEnvironment,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default)]
    pub trust_forwarded_for: bool,

    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,

    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: i64,

    #[serde(default = "default_rate_store")]
    pub rate_limit_store: RateStoreKind,

    #[serde(default)]
    pub rate_limit_dir: Option<PathBuf>,

    #[serde(default = "default_mail_to")]
    pub mail_to: String,

    #[serde(default = "default_mail_from_name")]
    pub mail_from_name: String,

    #[serde(default = "default_mail_from_email")]
    pub mail_from_email: String,

    #[serde(default = "default_site_name")]
    pub site_name: String,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_user: String,

    #[serde(default)]
    pub smtp_password: String,

    #[serde(default = "default_smtp_secure")]
    pub smtp_secure: SmtpSecurity,

    #[serde(default = "default_smtp_timeout")]
    pub smtp_timeout_secs: u64,

    #[serde(default)]
    pub smtp_helo_name: Option<String>,

    #[serde(default)]
    pub sendmail_command: Option<String>,

    #[serde(default = "default_email_log_dir")]
    pub email_log_dir: PathBuf,
}

fn default_env() -> AppEnvironment {
    AppEnvironment::Development
}
fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_worker_count() -> usize {
    num_cpus::get()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost".to_string()]
}
fn default_rate_limit() -> usize {
    5
}
fn default_rate_limit_window() -> i64 {
    3600
}
fn default_rate_store() -> RateStoreKind {
    RateStoreKind::File
}
fn default_mail_to() -> String {
    "contato@mesahermetica.com.br".to_string()
}
fn default_mail_from_name() -> String {
    "Mesa Hermética".to_string()
}
fn default_mail_from_email() -> String {
    "noreply@mesahermetica.com.br".to_string()
}
fn default_site_name() -> String {
    "Mesa Hermética".to_string()
}
fn default_smtp_host() -> String {
    "localhost".to_string()
}
fn default_smtp_port() -> u16 {
    1025
}
fn default_smtp_secure() -> SmtpSecurity {
    SmtpSecurity::Tls
}
fn default_smtp_timeout() -> u64 {
    10
}
fn default_email_log_dir() -> PathBuf {
    PathBuf::from("storage/emails")
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            env: default_env(),
            port: default_port(),
            host: default_host(),
            worker_count: default_worker_count(),
            allowed_origins: default_allowed_origins(),
            trust_forwarded_for: false,
            rate_limit: default_rate_limit(),
            rate_limit_window_secs: default_rate_limit_window(),
            rate_limit_store: default_rate_store(),
            rate_limit_dir: None,
            mail_to: default_mail_to(),
            mail_from_name: default_mail_from_name(),
            mail_from_email: default_mail_from_email(),
            site_name: default_site_name(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_user: String::new(),
            smtp_password: String::new(),
            smtp_secure: default_smtp_secure(),
            smtp_timeout_secs: default_smtp_timeout(),
            smtp_helo_name: None,
            sendmail_command: None,
            email_log_dir: default_email_log_dir(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();

        let raw_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let env_name = AppEnvironment::from_str(&raw_env)
            .map_err(|_| ConfigError::Message(format!("Invalid APP_ENV value: {}", raw_env)))?;

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("allowed_origins")
                    .try_parsing(true)
                    .ignore_empty(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.env = env_name;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.port == 0 && !self.is_testing() {
            errors.push("PORT cannot be 0");
        }
        if self.rate_limit == 0 {
            errors.push("RATE_LIMIT must be at least 1");
        }
        if self.rate_limit_window_secs <= 0 {
            errors.push("RATE_LIMIT_WINDOW_SECS must be positive");
        }
        if !self.mail_to.validate_email() {
            errors.push("MAIL_TO must be a valid e-mail address");
        }
        if !self.mail_from_email.validate_email() {
            errors.push("MAIL_FROM_EMAIL must be a valid e-mail address");
        }
        if self.smtp_port == 0 {
            errors.push("SMTP_PORT cannot be 0");
        }
        if self.smtp_timeout_secs == 0 {
            errors.push("SMTP_TIMEOUT_SECS must be at least 1");
        }
        if self.is_production() && self.cors_origins().iter().any(|o| o == "*") {
            errors.push("Wildcard origin (*) is not allowed in production");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(errors.join(", ")))
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == AppEnvironment::Production
    }

    pub fn is_testing(&self) -> bool {
        self.env == AppEnvironment::Testing
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.allowed_origins
            .iter()
            .flat_map(|origin| origin.split(','))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Authenticated delivery is only attempted against a real relay.
    pub fn uses_smtp(&self) -> bool {
        !self.smtp_user.is_empty() && !self.smtp_password.is_empty() && self.smtp_host != "localhost"
    }

    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout_secs)
    }

    pub fn rate_limit_dir(&self) -> PathBuf {
        self.rate_limit_dir.clone().unwrap_or_else(env::temp_dir)
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

trait Redact {
    fn redact(&self) -> &str;
}

impl Redact for str {
    fn redact(&self) -> &str {
        if self.is_empty() {
            "[MISSING]"
        } else {
            "[REDACTED]"
        }
    }
}

impl Redact for String {
    fn redact(&self) -> &str {
        self.as_str().redact()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("worker_count", &self.worker_count)
            .field("allowed_origins", &self.allowed_origins)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("rate_limit", &self.rate_limit)
            .field("rate_limit_window_secs", &self.rate_limit_window_secs)
            .field("rate_limit_store", &self.rate_limit_store)
            .field("rate_limit_dir", &self.rate_limit_dir)
            .field("mail_to", &self.mail_to)
            .field("mail_from_name", &self.mail_from_name)
            .field("mail_from_email", &self.mail_from_email)
            .field("site_name", &self.site_name)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_password", &self.smtp_password.redact())
            .field("smtp_secure", &self.smtp_secure)
            .field("smtp_timeout_secs", &self.smtp_timeout_secs)
            .field("smtp_helo_name", &self.smtp_helo_name)
            .field("sendmail_command", &self.sendmail_command)
            .field("email_log_dir", &self.email_log_dir)
            .finish()
    }
}
