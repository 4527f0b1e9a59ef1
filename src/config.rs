//! Authenticator configuration.
//!
//! The signing secret and token lifetime come from the environment at process
//! start (a `.env` file is honoured by the binary via `dotenvy`). A missing
//! secret is a startup error; tokens are never signed with a built-in default.

use crate::models::ConfigError;
use chrono::Duration;

/// Environment variable holding the HMAC signing secret.
pub const SECRET_KEY_VAR: &str = "SECRET_KEY";

/// Environment variable holding the token lifetime in minutes.
pub const TTL_MINUTES_VAR: &str = "ACCESS_TOKEN_EXPIRE_MINUTES";

/// Environment variable holding the listen address for the web server.
pub const BIND_ADDR_VAR: &str = "BIND_ADDR";

/// Environment variable toggling the `Secure` attribute on the session cookie.
pub const COOKIE_SECURE_VAR: &str = "COOKIE_SECURE";

/// Token expiry time in minutes when none is configured.
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// Longest accepted token lifetime (about a hundred years).
pub const MAX_TTL_MINUTES: i64 = 100 * 365 * 24 * 60;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

#[derive(Clone)]
pub struct AuthConfig {
    secret: Vec<u8>,
    ttl: Duration,
    bind_addr: String,
    secure_cookies: bool,
}

impl AuthConfig {
    /// Builds a config with the default TTL and bind address.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        Ok(Self {
            secret: secret.to_vec(),
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            secure_cookies: true,
        })
    }

    /// Overrides the token lifetime.
    ///
    /// Non-positive durations are rejected, and so is anything longer than
    /// [`MAX_TTL_MINUTES`], past which expiry timestamps stop being representable.
    pub fn with_ttl(mut self, ttl: Duration) -> Result<Self, ConfigError> {
        if ttl <= Duration::zero() || ttl.num_minutes() > MAX_TTL_MINUTES {
            return Err(ConfigError::InvalidTtl(format!(
                "{} seconds",
                ttl.num_seconds()
            )));
        }
        self.ttl = ttl;
        Ok(self)
    }

    /// Whether the session cookie carries `Secure`. On by default; turn it off
    /// only when serving plain HTTP to a non-local address.
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    pub fn with_bind_addr(mut self, bind_addr: impl Into<String>) -> Self {
        self.bind_addr = bind_addr.into();
        self
    }

    /// Loads the config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the config through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(SECRET_KEY_VAR).ok_or(ConfigError::MissingSecret)?;
        let mut config = Self::new(secret.trim())?;

        if let Some(raw) = lookup(TTL_MINUTES_VAR) {
            let minutes: i64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTtl(raw.clone()))?;
            if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
                return Err(ConfigError::InvalidTtl(raw));
            }
            config.ttl = Duration::try_minutes(minutes).ok_or(ConfigError::InvalidTtl(raw))?;
        }

        if let Some(raw) = lookup(COOKIE_SECURE_VAR) {
            config.secure_cookies = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidFlag(COOKIE_SECURE_VAR, raw)),
            };
        }

        if let Some(addr) = lookup(BIND_ADDR_VAR).filter(|a| !a.trim().is_empty()) {
            config.bind_addr = addr.trim().to_string();
        }

        Ok(config)
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .field("bind_addr", &self.bind_addr)
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}
