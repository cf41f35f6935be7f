#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv};

/// Redis connection settings
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Base URL, e.g. `redis://127.0.0.1:6379`
    pub url: String,

    /// Logical database selected after connect
    pub database: Option<u8>,

    pub username: Option<String>,
    pub password: Option<String>,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: None,
            username: None,
            password: None,
        }
    }

    pub fn with_database(mut self, database: u8) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_auth(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// URL with credentials and database folded in.
    ///
    /// Values already present in `url` win over the separate fields.
    pub fn connection_url(&self) -> String {
        let (scheme, rest) = match self.url.split_once("://") {
            Some(parts) => parts,
            None => ("redis", self.url.as_str()),
        };

        let mut url = format!("{scheme}://");
        if !rest.contains('@') {
            match (&self.username, &self.password) {
                (Some(user), Some(pass)) => url.push_str(&format!("{user}:{pass}@")),
                (None, Some(pass)) => url.push_str(&format!(":{pass}@")),
                (Some(user), None) => url.push_str(&format!("{user}@")),
                (None, None) => {}
            }
        }

        let host_part = rest.split('@').next_back().unwrap_or(rest);
        let has_db_path = host_part
            .split_once('/')
            .is_some_and(|(_, path)| !path.is_empty());

        url.push_str(rest.trim_end_matches('/'));
        if let (Some(db), false) = (self.database, has_db_path) {
            url.push_str(&format!("/{db}"));
        }
        url
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

#[cfg(feature = "config")]
impl RedisConfig {
    /// Like [`FromEnv::from_env`] but treats a missing URL as "Redis disabled".
    ///
    /// Malformed optional values still fail.
    pub fn from_env_optional() -> Result<Option<Self>, ConfigError> {
        match Self::from_env() {
            Ok(config) => Ok(Some(config)),
            Err(ConfigError::MissingEnvVar(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Environment variables:
/// - `REDIS_URL` or `REDIS_HOST` (required)
/// - `REDIS_DATABASE`, `REDIS_USERNAME`, `REDIS_PASSWORD` (optional)
#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("REDIS_URL")
            .or_else(|_| std::env::var("REDIS_HOST"))
            .map(|v| v.trim().to_string())
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL or REDIS_HOST".to_string()))?;

        let database = match std::env::var("REDIS_DATABASE") {
            Ok(raw) => Some(raw.trim().parse().map_err(|e| ConfigError::ParseError {
                key: "REDIS_DATABASE".to_string(),
                details: format!("{e}"),
            })?),
            Err(_) => None,
        };

        Ok(Self {
            url,
            database,
            username: std::env::var("REDIS_USERNAME").ok(),
            password: std::env::var("REDIS_PASSWORD").ok(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_url_plain() {
        let config = RedisConfig::new("redis://localhost:6379");
        assert_eq!(config.connection_url(), "redis://localhost:6379");
    }

    #[test]
    fn test_connection_url_folds_auth_and_database() {
        let config = RedisConfig::new("redis://localhost:6379")
            .with_auth(Some("svc".to_string()), Some("pw".to_string()))
            .with_database(2);
        assert_eq!(config.connection_url(), "redis://svc:pw@localhost:6379/2");
    }

    #[test]
    fn test_connection_url_keeps_embedded_values() {
        let config = RedisConfig::new("redis://a:b@localhost:6379/5")
            .with_auth(None, Some("ignored".to_string()))
            .with_database(1);
        assert_eq!(config.connection_url(), "redis://a:b@localhost:6379/5");
    }

    #[test]
    fn test_password_only_auth() {
        let config =
            RedisConfig::new("rediss://cache:6380").with_auth(None, Some("pw".to_string()));
        assert_eq!(config.connection_url(), "rediss://:pw@cache:6380");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_env_prefers_redis_url() {
        temp_env::with_vars(
            [
                ("REDIS_URL", Some("redis://primary:6379")),
                ("REDIS_HOST", Some("redis://fallback:6379")),
                ("REDIS_DATABASE", Some("3")),
            ],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://primary:6379");
                assert_eq!(config.database, Some(3));
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_env_optional_missing_is_none() {
        temp_env::with_vars(
            [("REDIS_URL", None::<&str>), ("REDIS_HOST", None::<&str>)],
            || {
                assert!(RedisConfig::from_env_optional().unwrap().is_none());
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_env_optional_blank_is_none() {
        temp_env::with_vars(
            [("REDIS_URL", Some("  ")), ("REDIS_HOST", None::<&str>)],
            || {
                assert!(RedisConfig::from_env_optional().unwrap().is_none());
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_env_optional_still_rejects_bad_database() {
        temp_env::with_vars(
            [
                ("REDIS_URL", Some("redis://localhost:6379")),
                ("REDIS_DATABASE", Some("sixteen")),
            ],
            || {
                let err = RedisConfig::from_env_optional().unwrap_err();
                assert!(err.to_string().contains("REDIS_DATABASE"));
            },
        );
    }
}
