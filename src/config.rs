use std::env;
use std::time::Duration;
use thiserror::Error;

/// Below this many bytes the signing key is accepted but reported as weak.
const RECOMMENDED_SIGNING_KEY_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("access token lifetime must not exceed refresh token lifetime")]
    InvalidLifetimes,
}

pub struct JwtConfig {
    pub signing_key: Vec<u8>,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
}

pub struct UserBlockingConfig {
    pub max_errors: u32,
    pub lifetime: Duration,
}

pub struct VerificationConfig {
    pub email_confirm_token_lifetime: Duration,
    pub password_reset_token_lifetime: Duration,
}

pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub server_port: u16,
    pub server_host: String,
    pub cache_timeout: Duration,
    pub jwt: JwtConfig,
    pub user_blocking: UserBlockingConfig,
    pub verification: VerificationConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; missing optional keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let signing_key = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?
            .into_bytes();
        if signing_key.len() < RECOMMENDED_SIGNING_KEY_LEN {
            log::warn!(
                "JWT_SECRET is shorter than {} bytes; use a 256-bit random secret",
                RECOMMENDED_SIGNING_KEY_LEN
            );
        }

        let jwt = JwtConfig {
            signing_key,
            access_token_lifetime: seconds(&lookup, "ACCESS_TOKEN_LIFETIME_SECS", 15 * 60)?,
            refresh_token_lifetime: seconds(
                &lookup,
                "REFRESH_TOKEN_LIFETIME_SECS",
                30 * 24 * 60 * 60,
            )?,
        };
        if jwt.access_token_lifetime > jwt.refresh_token_lifetime {
            return Err(ConfigError::InvalidLifetimes);
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            server_port: parse(&lookup, "SERVER_PORT", 8080)?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            cache_timeout: Duration::from_millis(parse(&lookup, "CACHE_TIMEOUT_MILLIS", 2000)?),
            jwt,
            user_blocking: UserBlockingConfig {
                max_errors: parse(&lookup, "USER_BLOCKING_MAX_ERRORS", 5)?,
                lifetime: seconds(&lookup, "USER_BLOCKING_LIFETIME_SECS", 15 * 60)?,
            },
            verification: VerificationConfig {
                email_confirm_token_lifetime: seconds(
                    &lookup,
                    "EMAIL_CONFIRM_TOKEN_LIFETIME_SECS",
                    24 * 60 * 60,
                )?,
                password_reset_token_lifetime: seconds(
                    &lookup,
                    "PASSWORD_RESET_TOKEN_LIFETIME_SECS",
                    60 * 60,
                )?,
            },
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ConfigError::Invalid { key, value }),
        },
        None => Ok(default),
    }
}

fn seconds<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse(lookup, key, default).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://test"),
        ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
    ];

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.database_url, "postgres://test");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");
        assert_eq!(config.redis_url, None);
        assert_eq!(config.jwt.access_token_lifetime, Duration::from_secs(900));
        assert_eq!(config.jwt.refresh_token_lifetime, Duration::from_secs(2_592_000));
        assert_eq!(config.user_blocking.max_errors, 5);
        assert_eq!(config.cache_timeout, Duration::from_millis(2000));
        assert_eq!(
            config.verification.password_reset_token_lifetime,
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_config_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("SERVER_PORT", "3000"),
            ("SERVER_HOST", "0.0.0.0"),
            ("REDIS_URL", "redis://cache:6379"),
            ("USER_BLOCKING_MAX_ERRORS", "3"),
            ("ACCESS_TOKEN_LIFETIME_SECS", "60"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.user_blocking.max_errors, 3);
        assert_eq!(config.jwt.access_token_lifetime, Duration::from_secs(60));
    }

    #[test]
    fn test_config_errors() {
        assert_eq!(
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://test")])).err(),
            Some(ConfigError::Missing("JWT_SECRET"))
        );

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SERVER_PORT", "eighty"));
        assert_eq!(
            Config::from_lookup(lookup_from(&pairs)).err(),
            Some(ConfigError::Invalid {
                key: "SERVER_PORT",
                value: "eighty".to_string()
            })
        );

        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("ACCESS_TOKEN_LIFETIME_SECS", "7200"),
            ("REFRESH_TOKEN_LIFETIME_SECS", "3600"),
        ]);
        assert_eq!(
            Config::from_lookup(lookup_from(&pairs)).err(),
            Some(ConfigError::InvalidLifetimes)
        );
    }
}
