use std::time::Duration;

use crate::error::{ApiError, Result};

/// Production sticker service.
pub const DEFAULT_BASE_URL: &str = "https://muslimaikeyboard.tech";

/// Client identity sent as `User-Agent`.
pub const DEFAULT_USER_AGENT: &str = "Muslim AI Keyboard iOS/1.0";

/// Largest asset the client will accept (10 MiB).
pub const DEFAULT_MAX_ASSET_BYTES: usize = 10 * 1024 * 1024;

/// Polling behaviour of a generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between polls while the task is pending or processing.
    pub interval: Duration,

    /// Hard ceiling on poll iterations (successful or not).
    pub max_iterations: u32,

    /// Consecutive failed polls after which the run gives up.
    pub max_consecutive_errors: u32,

    /// Backoff added per consecutive error.
    pub backoff_step: Duration,

    /// Upper bound on a single backoff.
    pub backoff_cap: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_iterations: 120,
            max_consecutive_errors: 5,
            backoff_step: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(10),
        }
    }
}

impl PollPolicy {
    /// Backoff before retrying after `consecutive_errors` failed polls.
    pub fn backoff(&self, consecutive_errors: u32) -> Duration {
        self.backoff_step
            .saturating_mul(consecutive_errors)
            .min(self.backoff_cap)
    }
}

/// Configuration for a [`StickerClient`](crate::StickerClient).
///
/// Use [`ClientConfig::builder()`] for construction, [`ClientConfig::from_env()`]
/// to read overrides from the environment, or [`ClientConfig::default()`] for the
/// production service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the sticker API, without a trailing slash.
    pub base_url: String,

    /// Timeout for generation-adjacent calls (submit, status, result, download).
    pub request_timeout: Duration,

    /// Timeout for lightweight probes (`/health`, `/test`, `/examples`).
    pub probe_timeout: Duration,

    /// Timeout for the task cancellation call.
    pub cancel_timeout: Duration,

    /// Value of the `User-Agent` header.
    pub user_agent: String,

    /// Value of the `Accept-Language` header.
    pub accept_language: String,

    /// Downloads larger than this are rejected.
    pub max_asset_bytes: usize,

    /// Poll loop behaviour.
    pub polling: PollPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(180),
            probe_timeout: Duration::from_secs(5),
            cancel_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en".to_string(),
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
            polling: PollPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Build a config from the defaults plus environment overrides.
    ///
    /// Reads `STICKER_API_URL`, `STICKER_API_TIMEOUT_SECS`,
    /// `STICKER_API_USER_AGENT` and `STICKER_API_LANGUAGE` (falling back to
    /// `LANG` for the language).
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Ok(url) = std::env::var("STICKER_API_URL") {
            builder = builder.with_base_url(url);
        }
        if let Ok(secs) = std::env::var("STICKER_API_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ApiError::Validation(format!("invalid STICKER_API_TIMEOUT_SECS: {secs:?}"))
            })?;
            builder = builder.with_request_timeout(Duration::from_secs(secs));
        }
        if let Ok(agent) = std::env::var("STICKER_API_USER_AGENT") {
            builder = builder.with_user_agent(agent);
        }
        let locale = std::env::var("STICKER_API_LANGUAGE")
            .or_else(|_| std::env::var("LANG"))
            .unwrap_or_default();
        builder = builder.with_accept_language(language_from_locale(&locale));

        builder.build()
    }
}

/// Reduce a POSIX-style locale (`ru_RU.UTF-8`) to its language code (`ru`).
pub fn language_from_locale(locale: &str) -> String {
    let code = locale
        .split(['_', '-', '.', '@'])
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if code.is_empty() || code == "c" || code == "posix" || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        "en".to_string()
    } else {
        code
    }
}

/// Check that `raw` has a scheme and a host, and strip trailing slashes.
pub(crate) fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| ApiError::InvalidUrl(format!("{trimmed}: {e}")))?;
    if parsed.host_str().is_none() || parsed.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(format!("{trimmed}: missing host")));
    }
    Ok(trimmed.to_string())
}

/// Builder for [`ClientConfig`].
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL of the sticker API.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the timeout for generation-adjacent requests.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the timeout for health, test and examples probes.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Set the timeout for the cancellation request.
    pub fn with_cancel_timeout(mut self, timeout: Duration) -> Self {
        self.config.cancel_timeout = timeout;
        self
    }

    /// Set the `User-Agent` header value.
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Set the `Accept-Language` header value.
    pub fn with_accept_language(mut self, language: impl Into<String>) -> Self {
        self.config.accept_language = language.into();
        self
    }

    /// Set the maximum accepted asset size in bytes.
    pub fn with_max_asset_bytes(mut self, bytes: usize) -> Self {
        self.config.max_asset_bytes = bytes;
        self
    }

    /// Replace the whole polling policy.
    pub fn with_polling(mut self, policy: PollPolicy) -> Self {
        self.config.polling = policy;
        self
    }

    /// Set the delay between polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.polling.interval = interval;
        self
    }

    /// Set the poll iteration ceiling.
    pub fn with_max_poll_iterations(mut self, iterations: u32) -> Self {
        self.config.polling.max_iterations = iterations;
        self
    }

    /// Build the final [`ClientConfig`], validating the base URL.
    pub fn build(mut self) -> Result<ClientConfig> {
        self.config.base_url = normalize_base_url(&self.config.base_url)?;
        if self.config.polling.max_consecutive_errors == 0 {
            return Err(ApiError::Validation(
                "max_consecutive_errors must be at least 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(180));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.polling.interval, Duration::from_secs(1));
        assert_eq!(config.polling.max_iterations, 120);
        assert_eq!(config.polling.max_consecutive_errors, 5);
        assert_eq!(config.max_asset_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_backoff_is_linear_and_capped() {
        let policy = PollPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(6));
        assert_eq!(policy.backoff(5), Duration::from_secs(10));
        assert_eq!(policy.backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn test_builder_normalizes_base_url() {
        let config = ClientConfig::builder()
            .with_base_url("http://localhost:8000///")
            .with_request_timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_rejects_invalid_url() {
        let result = ClientConfig::builder().with_base_url("not a url").build();
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));

        let result = ClientConfig::builder().with_base_url("mailto:me@example.com").build();
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_builder_rejects_zero_error_budget() {
        let policy = PollPolicy {
            max_consecutive_errors: 0,
            ..PollPolicy::default()
        };
        let result = ClientConfig::builder().with_polling(policy).build();
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_language_from_locale() {
        assert_eq!(language_from_locale("ru_RU.UTF-8"), "ru");
        assert_eq!(language_from_locale("ar-SA"), "ar");
        assert_eq!(language_from_locale("EN"), "en");
        assert_eq!(language_from_locale("C"), "en");
        assert_eq!(language_from_locale("POSIX"), "en");
        assert_eq!(language_from_locale(""), "en");
    }
}
