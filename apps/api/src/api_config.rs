use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use tablegate_core::AppError;
use tablegate_domain::DEFAULT_GRANT_LIFETIME_DAYS;
use tracing_subscriber::EnvFilter;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(AppError::Validation(format!(
                "LOG_FORMAT must be either 'compact' or 'json', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub database_max_connections: u32,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub sso_fallback_email_domain: String,
    pub grant_lifetime_days: u64,
    pub log_format: LogFormat,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(10);
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let sso_fallback_email_domain = env::var("SSO_FALLBACK_EMAIL_DOMAIN")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "example.com".to_owned());

        let grant_lifetime_days = match env::var("DEFAULT_GRANT_LIFETIME_DAYS") {
            Ok(value) => parse_lifetime_days(value.as_str())?,
            Err(_) => DEFAULT_GRANT_LIFETIME_DAYS,
        };

        let log_format = LogFormat::parse(env::var("LOG_FORMAT").unwrap_or_default().as_str())?;

        Ok(Self {
            migrate_only,
            database_url,
            database_max_connections,
            frontend_url,
            api_host,
            api_port,
            sso_fallback_email_domain,
            grant_lifetime_days,
            log_format,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing(log_format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init(),
    }
}

fn parse_lifetime_days(value: &str) -> Result<u64, AppError> {
    let days = value.trim().parse::<u64>().map_err(|error| {
        AppError::Validation(format!("invalid DEFAULT_GRANT_LIFETIME_DAYS: {error}"))
    })?;

    if days == 0 {
        return Err(AppError::Validation(
            "DEFAULT_GRANT_LIFETIME_DAYS must be at least 1".to_owned(),
        ));
    }

    Ok(days)
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}
