use std::time::Duration;

/// Minimum accepted length of `JWT_SECRET`.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least {MIN_SECRET_LEN} characters long")]
    WeakSecret,
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { name, value: v }),
    }
}

pub(crate) fn flag(name: &str, default: bool) -> bool {
    var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(default)
}

/// Token lifetimes. Read on every issuance so tests can tweak them via env.
#[derive(Debug, Clone, Copy)]
pub struct TokenConfig {
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
}

impl TokenConfig {
    pub fn from_env() -> Self {
        let minutes = var("ACCESS_TOKEN_TTL_MINUTES").and_then(|v| v.parse().ok()).unwrap_or(60);
        let days = var("REFRESH_TOKEN_TTL_DAYS").and_then(|v| v.parse().ok()).unwrap_or(7);
        Self {
            access_ttl: chrono::Duration::minutes(minutes),
            refresh_ttl: chrono::Duration::days(days),
        }
    }
}

/// Sliding-window limits for the credential endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub enabled: bool,
    pub limit: usize,
    pub window: Duration,
}

impl ThrottleConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: flag("AUTH_RL_ENABLED", true),
            limit: var("AUTH_RL_LIMIT").and_then(|v| v.parse().ok()).unwrap_or(10),
            window: Duration::from_secs(var("AUTH_RL_WINDOW").and_then(|v| v.parse().ok()).unwrap_or(60)),
        }
    }
}

/// Process-level settings read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub run_migrations: bool,
    pub frontend_url: Option<String>,
    pub enable_hsts: bool,
    pub throttle: ThrottleConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed("PORT", 8080)?,
            database_url: var("DATABASE_URL"),
            run_migrations: flag("RUN_MIGRATIONS", true),
            frontend_url: var("FRONTEND_URL"),
            enable_hsts: flag("ENABLE_HSTS", false),
            throttle: ThrottleConfig::from_env(),
        })
    }
}
