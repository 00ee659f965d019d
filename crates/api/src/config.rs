//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 4000)
//! - `DATABASE_URL` - `PostgreSQL` connection string; without it documents
//!   are kept in memory
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `JWT_SECRET` - HS256 signing secret for bearer tokens
//! - `DEFAULT_USER_ROLE` - Role given to new users that do not ask for one
//!   (default: buyer)

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;
use tracing::warn;

use shelfmark_auth::Role;

const DEV_JWT_SECRET: &str = "dev-secret";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: IpAddr,
    pub port: u16,
    /// `PostgreSQL` connection URL (contains password)
    pub database_url: Option<SecretString>,
    pub database_max_connections: u32,
    /// HS256 signing secret for bearer tokens
    pub jwt_secret: SecretString,
    pub default_user_role: Role,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = parse_or_default(get("HOST"), "HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port = parse_or_default(get("PORT"), "PORT", 4000u16)?;
        let database_max_connections =
            parse_or_default(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 5u32)?;
        if database_max_connections == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "DATABASE_MAX_CONNECTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let jwt_secret = SecretString::from(get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        }));

        let default_user_role = match get("DEFAULT_USER_ROLE") {
            Some(raw) => raw.parse::<Role>().map_err(|e| {
                ConfigError::InvalidEnvVar("DEFAULT_USER_ROLE".to_string(), e.to_string())
            })?,
            None => Role::default(),
        };

        Ok(Self {
            host,
            port,
            database_url: get("DATABASE_URL").map(SecretString::from),
            database_max_connections,
            jwt_secret,
            default_user_role,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or_default<T>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:4000");
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.jwt_secret.expose_secret(), DEV_JWT_SECRET);
        assert_eq!(config.default_user_role, Role::Buyer);
    }

    #[test]
    fn values_are_read_and_parsed() {
        let config = config(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/shelf"),
            ("JWT_SECRET", "s3cr3t"),
            ("DEFAULT_USER_ROLE", "Librarian"),
        ])
        .unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(
            config.database_url.as_ref().map(|url| url.expose_secret()),
            Some("postgres://localhost/shelf")
        );
        assert_eq!(config.jwt_secret.expose_secret(), "s3cr3t");
        assert_eq!(config.default_user_role, Role::Librarian);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(config(&[("PORT", "eighty")]).is_err());
        assert!(config(&[("DEFAULT_USER_ROLE", "king")]).is_err());
        assert!(config(&[("DATABASE_MAX_CONNECTIONS", "0")]).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = config(&[("JWT_SECRET", "s3cr3t"), ("DATABASE_URL", "postgres://u:pw@h/db")])
            .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("pw@h"));
    }
}
