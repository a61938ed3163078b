//! Process configuration, read once at start-up.

use std::net::SocketAddr;

use thiserror::Error;

pub const BIND_ENV: &str = "STOCKBOOK_BIND";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get(BIND_ENV)
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar(BIND_ENV.to_string(), e.to_string()))?;

        let jwt_secret = get(JWT_SECRET_ENV).unwrap_or_else(|| {
            tracing::warn!("{JWT_SECRET_ENV} not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let database_url = get(DATABASE_URL_ENV);
        if database_url
            .as_deref()
            .is_some_and(|url| !(url.starts_with("postgres://") || url.starts_with("postgresql://")))
        {
            return Err(ConfigError::InvalidEnvVar(
                DATABASE_URL_ENV.to_string(),
                "expected a postgres:// URL".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn reads_all_values() {
        let config = ApiConfig::from_lookup(lookup(&[
            (BIND_ENV, "127.0.0.1:3000"),
            (JWT_SECRET_ENV, "s3cret"),
            (DATABASE_URL_ENV, "postgres://stock@localhost/stockbook"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.database_url.as_deref(), Some("postgres://stock@localhost/stockbook"));
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let config = ApiConfig::from_lookup(lookup(&[(DATABASE_URL_ENV, "  ")])).unwrap();
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn rejects_bad_values() {
        let err = ApiConfig::from_lookup(lookup(&[(BIND_ENV, "not-an-addr")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == BIND_ENV));

        let err = ApiConfig::from_lookup(lookup(&[(DATABASE_URL_ENV, "mysql://db")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == DATABASE_URL_ENV));
    }
}
