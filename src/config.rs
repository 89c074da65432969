use std::env;

use crate::services::opnform::OPNFORM_BASE_URL;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL used when a credential does not carry its own `baseApiUrl`.
    pub opnform_api_url: String,
    pub bind_addr: String,
    pub http_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            opnform_api_url: OPNFORM_BASE_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            http_timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECONDS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Config::default();

        let opnform_api_url = read("OPNFORM_API_URL").unwrap_or(defaults.opnform_api_url);
        let bind_addr = read("BIND_ADDR").unwrap_or(defaults.bind_addr);
        let http_timeout_seconds = read("HTTP_TIMEOUT_SECONDS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|seconds| *seconds > 0)
            .unwrap_or(defaults.http_timeout_seconds);

        Config {
            opnform_api_url,
            bind_addr,
            http_timeout_seconds,
        }
    }
}
