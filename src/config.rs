use chrono::Duration;
use std::env;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::auth::session::SessionConfig;
use crate::auth::token::MIN_SECRET_LEN;

/// Longest accepted token lifetime: ten years.
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub struct Config {
    pub database_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {} bytes", MIN_SECRET_LEN),
            });
        }

        let bcrypt_cost: u32 = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                reason: "must be between 4 and 31".to_string(),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            jwt_secret,
            access_token_ttl: ttl_or(&lookup, "ACCESS_TOKEN_TTL_SECS", 24 * 60 * 60)?,
            refresh_token_ttl: ttl_or(&lookup, "REFRESH_TOKEN_TTL_SECS", 7 * 24 * 60 * 60)?,
            bcrypt_cost,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            access_ttl: self.access_token_ttl,
            refresh_ttl: self.refresh_token_ttl,
            bcrypt_cost: self.bcrypt_cost,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"<redacted>")
            .field("server_port", &self.server_port)
            .field("server_host", &self.server_host)
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

fn ttl_or<F>(lookup: &F, name: &'static str, default_secs: i64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: i64 = parse_or(lookup, name, default_secs)?;
    let out_of_range = || ConfigError::Invalid {
        name,
        reason: format!("must be between 1 and {} seconds", MAX_TTL_SECS),
    };
    if !(1..=MAX_TTL_SECS).contains(&secs) {
        return Err(out_of_range());
    }
    Duration::try_seconds(secs).ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "config-test-secret-at-least-32-bytes";

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://test"), ("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.database_url, "postgres://test");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");
        assert_eq!(config.access_token_ttl, Duration::hours(24));
        assert_eq!(config.refresh_token_ttl, Duration::days(7));
        assert_eq!(config.bcrypt_cost, 12);
    }

    #[test]
    fn test_custom_values() {
        let config = load(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", SECRET),
            ("SERVER_PORT", "3000"),
            ("SERVER_HOST", "0.0.0.0"),
            ("ACCESS_TOKEN_TTL_SECS", "900"),
            ("BCRYPT_COST", "4"),
        ])
        .unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.session().access_ttl, Duration::minutes(15));
        assert_eq!(config.session().bcrypt_cost, 4);
    }

    #[test]
    fn test_errors_name_the_variable() {
        assert_eq!(
            load(&[("JWT_SECRET", SECRET)]).err(),
            Some(ConfigError::Missing("DATABASE_URL"))
        );
        assert_eq!(
            load(&[("DATABASE_URL", "postgres://test")]).err(),
            Some(ConfigError::Missing("JWT_SECRET"))
        );

        let short = load(&[("DATABASE_URL", "postgres://test"), ("JWT_SECRET", "short")]);
        assert!(matches!(short, Err(ConfigError::Invalid { name: "JWT_SECRET", .. })));

        let port = load(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", SECRET),
            ("SERVER_PORT", "eighty"),
        ]);
        assert!(matches!(port, Err(ConfigError::Invalid { name: "SERVER_PORT", .. })));

        let ttl = load(&[
            ("DATABASE_URL", "postgres://test"),
            ("JWT_SECRET", SECRET),
            ("REFRESH_TOKEN_TTL_SECS", "0"),
        ]);
        assert!(matches!(
            ttl,
            Err(ConfigError::Invalid { name: "REFRESH_TOKEN_TTL_SECS", .. })
        ));
    }

    #[test]
    fn test_ttl_upper_bound() {
        let ttl = |value: &str| {
            load(&[
                ("DATABASE_URL", "postgres://test"),
                ("JWT_SECRET", SECRET),
                ("ACCESS_TOKEN_TTL_SECS", value),
            ])
        };

        assert!(matches!(
            ttl("10000000000000"),
            Err(ConfigError::Invalid { name: "ACCESS_TOKEN_TTL_SECS", .. })
        ));
        assert!(matches!(
            ttl(&(MAX_TTL_SECS + 1).to_string()),
            Err(ConfigError::Invalid { name: "ACCESS_TOKEN_TTL_SECS", .. })
        ));

        let longest = ttl(&MAX_TTL_SECS.to_string()).unwrap();
        assert_eq!(longest.access_token_ttl, Duration::seconds(MAX_TTL_SECS));

        let signer = crate::auth::Signer::new(SECRET.as_bytes()).unwrap();
        assert!(signer
            .issue("a@x.com", longest.access_token_ttl, serde_json::Map::new())
            .is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&[("DATABASE_URL", "postgres://u:pw@db"), ("JWT_SECRET", SECRET)]).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains(SECRET));
        assert!(!debug.contains("pw@db"));
    }
}
