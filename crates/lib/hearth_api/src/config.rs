//! API server configuration.

use hearth_core::auth::password::DEFAULT_BCRYPT_COST;
use thiserror::Error;
use url::Url;

/// Configuration errors. Any of these stops the process at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SESSION_SECRET (or JWT_SECRET) must be set")]
    MissingSecret,

    #[error("Invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Session token signing secret.
    pub session_secret: String,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
    /// Public base URL of the web app, used to build invite links.
    pub public_url: Url,
    /// bcrypt cost factor for new password hashes.
    pub bcrypt_cost: u32,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("session_secret", &"<redacted>")
            .field("secure_cookies", &self.secure_cookies)
            .field("public_url", &self.public_url.as_str())
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3100";
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                      | Default                    |
    /// |-------------------------------|----------------------------|
    /// | `BIND_ADDR`                   | `127.0.0.1:3100`           |
    /// | `DATABASE_URL`                | unset (in-memory store)    |
    /// | `SESSION_SECRET` / `JWT_SECRET` | required                 |
    /// | `APP_ENV`                     | `development`              |
    /// | `PUBLIC_URL`                  | `http://localhost:3000`    |
    /// | `BCRYPT_COST`                 | `10`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let session_secret = non_empty("SESSION_SECRET")
            .or_else(|| non_empty("JWT_SECRET"))
            .ok_or(ConfigError::MissingSecret)?;

        let public_url = non_empty("PUBLIC_URL").unwrap_or_else(|| DEFAULT_PUBLIC_URL.into());
        let public_url = Url::parse(&public_url).map_err(|e| ConfigError::Invalid {
            var: "PUBLIC_URL",
            reason: e.to_string(),
        })?;

        let bcrypt_cost = match non_empty("BCRYPT_COST") {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
                var: "BCRYPT_COST",
                reason: e.to_string(),
            })?,
            None => DEFAULT_BCRYPT_COST,
        };

        Ok(Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            database_url: non_empty("DATABASE_URL"),
            session_secret,
            secure_cookies: non_empty("APP_ENV").is_some_and(|env| env == "production"),
            public_url,
            bcrypt_cost,
        })
    }
}
