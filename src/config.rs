use std::time::Duration;

use crate::error::{PulseError, PulseResult};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub timeout: Duration,
}

impl Config {
    /// Reads `PULSE_API_URL` and `PULSE_TIMEOUT_SECS`; `api_url` overrides the env value.
    pub fn from_env(api_url: Option<String>) -> PulseResult<Self> {
        let env_url = std::env::var("PULSE_API_URL").ok();
        let env_timeout = std::env::var("PULSE_TIMEOUT_SECS").ok();
        Self::resolve(api_url.or(env_url), env_timeout.as_deref())
    }

    fn resolve(api_url: Option<String>, timeout_secs: Option<&str>) -> PulseResult<Self> {
        let api_url = api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = api_url.trim().trim_end_matches('/').to_string();
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(PulseError::Config(format!(
                "API URL must start with http:// or https://, got {api_url:?}"
            )));
        }

        let timeout = match timeout_secs {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    PulseError::Config(format!("PULSE_TIMEOUT_SECS must be a positive integer, got {raw:?}"))
                })?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self { api_url, timeout })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
