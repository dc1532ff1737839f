// Client configuration

use thiserror::Error;

pub const DEFAULT_BASE_URLS: [&str; 2] = [
    // Android emulator alias for the host machine
    "http://10.0.2.2:3000/api/v1",
    "http://localhost:3000/api/v1",
];
pub const DEFAULT_TIMEOUT_MS: u64 = 8000;

pub const ENV_BASE_URLS: &str = "HOTEL_API_BASE_URLS";
pub const ENV_TIMEOUT_MS: &str = "HOTEL_API_TIMEOUT_MS";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Candidate service roots, tried in this order on every call.
    pub base_urls: Vec<String>,
    /// Applies to each request separately.
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_urls: DEFAULT_BASE_URLS.iter().map(|url| url.to_string()).collect(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset keys keep their defaults; set but unusable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BASE_URLS) {
            let urls: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(|url| url.trim_end_matches('/').to_string())
                .collect();
            if urls.is_empty() {
                return Err(ClientError::ConfigError(format!(
                    "{} lists no base urls",
                    ENV_BASE_URLS
                )));
            }
            config.base_urls = urls;
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| {
                    ClientError::ConfigError(format!("{} must be a positive integer, got {:?}", ENV_TIMEOUT_MS, raw))
                })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_urls, DEFAULT_BASE_URLS);
        assert_eq!(config.timeout_ms, 8000);
        assert!(config.user_agent.starts_with("hotel_search_cache/"));
    }

    #[test]
    fn test_base_urls_keep_order_and_drop_trailing_slash() {
        let config = ClientConfig::from_lookup(lookup(&[(
            ENV_BASE_URLS,
            " http://a.test/api/v1/ , ,http://b.test/api/v1",
        )]))
        .unwrap();
        assert_eq!(config.base_urls, vec!["http://a.test/api/v1", "http://b.test/api/v1"]);
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_BASE_URLS, " , ")])),
            Err(ClientError::ConfigError(_))
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "soon")])),
            Err(ClientError::ConfigError(_))
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "0")])),
            Err(ClientError::ConfigError(_))
        ));

        let config = ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_MS, "2500")])).unwrap();
        assert_eq!(config.timeout_ms, 2500);
    }
}
