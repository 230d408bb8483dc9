//! Runtime configuration, read from environment variables with defaults.

use std::env;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

/// Errors raised while building a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,

    pub password_min_length: usize,
    pub bcrypt_rounds: u32,
    pub auth_required: bool,

    pub rate_limit_enabled: bool,
    pub rate_limit_read_requests: u32,
    pub rate_limit_write_requests: u32,
    pub rate_limit_auth_requests: u32,
    pub rate_limit_window_seconds: u64,

    pub max_request_size: usize,
    pub enable_html_sanitization: bool,
    pub enable_sql_sanitization: bool,
    pub forbidden_words: Vec<String>,

    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reader = Reader { lookup };

        let jwt_algorithm = match reader.raw("JWT_ALGORITHM") {
            Some(value) => match Algorithm::from_str(&value) {
                Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => alg,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "JWT_ALGORITHM",
                        value,
                    })
                }
            },
            None => Algorithm::HS256,
        };

        let jwt_secret = reader
            .raw("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let bcrypt_rounds = reader.bounded("BCRYPT_ROUNDS", 12u32, 4..=31)?;

        let rate_limit_window_seconds = reader.parse("RATE_LIMIT_WINDOW_SECONDS", 60u64)?;
        if rate_limit_window_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "RATE_LIMIT_WINDOW_SECONDS",
                value: "0".into(),
            });
        }

        Ok(Self {
            server_host: reader
                .raw("SERVER_HOST")
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: reader.parse("SERVER_PORT", 8080)?,
            database_url: reader.raw("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: reader.parse("DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            jwt_algorithm,
            // One year of minutes and ten years of days
            access_token_expire_minutes: reader.bounded(
                "JWT_ACCESS_TOKEN_EXPIRE_MINUTES",
                30,
                1..=525_600,
            )?,
            refresh_token_expire_days: reader.bounded(
                "JWT_REFRESH_TOKEN_EXPIRE_DAYS",
                7,
                1..=3650,
            )?,
            password_min_length: reader.parse("PASSWORD_MIN_LENGTH", 8)?,
            bcrypt_rounds,
            auth_required: reader.flag("AUTH_REQUIRED", false)?,
            rate_limit_enabled: reader.flag("RATE_LIMIT_ENABLED", true)?,
            rate_limit_read_requests: reader.parse("RATE_LIMIT_READ_REQUESTS", 200)?,
            rate_limit_write_requests: reader.parse("RATE_LIMIT_WRITE_REQUESTS", 50)?,
            rate_limit_auth_requests: reader.parse("RATE_LIMIT_AUTH_REQUESTS", 10)?,
            rate_limit_window_seconds,
            max_request_size: reader.parse("MAX_REQUEST_SIZE", 1_048_576)?,
            enable_html_sanitization: reader.flag("ENABLE_HTML_SANITIZATION", true)?,
            enable_sql_sanitization: reader.flag("ENABLE_SQL_SANITIZATION", true)?,
            forbidden_words: reader.list("FORBIDDEN_WORDS").unwrap_or_default(),
            cors_origins: reader.list("CORS_ORIGINS").unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ]
            }),
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

struct Reader<F> {
    lookup: F,
}

impl<F> Reader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|value| value.trim().to_string())
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.raw(key) {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
            None => Ok(default),
        }
    }

    fn bounded<T>(
        &self,
        key: &'static str,
        default: T,
        range: RangeInclusive<T>,
    ) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Display,
    {
        let value = self.parse(key, default)?;
        if range.contains(&value) {
            Ok(value)
        } else {
            Err(ConfigError::Invalid {
                key,
                value: value.to_string(),
            })
        }
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.raw(key) {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid { key, value }),
            },
            None => Ok(default),
        }
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.raw(key).map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}
