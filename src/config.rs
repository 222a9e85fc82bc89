// src/config.rs

use std::{env, fmt, path::PathBuf, str::FromStr};

use dotenvy::dotenv;
use sqlx::postgres::PgConnectOptions;

/// Errors raised while reading configuration at start-up.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    Missing(&'static str),
    /// A variable is present but cannot be parsed.
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "{} has an invalid value: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL, takes precedence over the individual fields.
    pub url: Option<String>,
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url).map_err(|_| ConfigError::Invalid {
                key: "DATABASE_URL",
                value: url.clone(),
            });
        }

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub debug: bool,
    pub allowed_hosts: Vec<String>,
    pub database: DatabaseConfig,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub server_port: u16,
    pub media_root: PathBuf,
    pub data_folder: PathBuf,
    pub admin_email: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret_key = get("SECRET_KEY").ok_or(ConfigError::Missing("SECRET_KEY"))?;

        let debug = get("IS_DEBUG").map(|v| parse_flag(&v)).unwrap_or(false);

        let allowed_hosts = get("ALLOWED_HOSTS")
            .unwrap_or_else(|| "localhost,127.0.0.1".to_string())
            .split(',')
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();

        let db_prod = get("DB_PROD").map(|v| parse_flag(&v)).unwrap_or(false);

        let database = DatabaseConfig {
            url: get("DATABASE_URL"),
            name: get("POSTGRES_DB").unwrap_or_else(|| "foodgram_db".to_string()),
            user: get("POSTGRES_USER").unwrap_or_else(|| "default_user".to_string()),
            password: lookup("POSTGRES_PASSWORD").unwrap_or_default(),
            host: if db_prod {
                get("DB_HOST").unwrap_or_else(|| "db".to_string())
            } else {
                "localhost".to_string()
            },
            port: parse_or("DB_PORT", get("DB_PORT"), 5432)?,
        };

        let default_log = if debug { "debug" } else { "info" };
        let rust_log = get("RUST_LOG").unwrap_or_else(|| default_log.to_string());

        Ok(Self {
            secret_key,
            debug,
            allowed_hosts,
            database,
            jwt_expiration: parse_or("JWT_EXPIRATION", get("JWT_EXPIRATION"), 604_800)?,
            rust_log,
            server_port: parse_or("SERVER_PORT", get("SERVER_PORT"), 8000)?,
            media_root: get("MEDIA_ROOT").unwrap_or_else(|| "media".to_string()).into(),
            data_folder: get("DATA_FOLDER").unwrap_or_else(|| "data".to_string()).into(),
            admin_email: get("ADMIN_EMAIL"),
            admin_username: get("ADMIN_USERNAME"),
            admin_password: get("ADMIN_PASSWORD"),
        })
    }

    /// Checks a `Host` header value (port ignored) against `ALLOWED_HOSTS`.
    pub fn is_host_allowed(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        let bare = match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => host.as_str(),
        };

        self.allowed_hosts.iter().any(|allowed| {
            allowed == "*"
                || allowed == bare
                || (allowed.starts_with('.')
                    && (bare.ends_with(allowed.as_str()) || bare == &allowed[1..]))
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "True" | "true" | "1")
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
