// Client configuration shared by the tracker library and the CLI

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_BOILERPLATE_MAX_ATTEMPTS: u32 = 15;
/// Floor for any poll cadence; a timer cannot tick with a zero period
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    /// Cadence for run/submit/validate tracking
    pub poll_interval: Duration,
    pub boilerplate_poll_interval: Duration,
    pub boilerplate_max_attempts: u32,
    /// Optional cap for submission sessions; None polls until terminal or cancelled
    pub submission_max_attempts: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            boilerplate_poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            boilerplate_max_attempts: DEFAULT_BOILERPLATE_MAX_ATTEMPTS,
            submission_max_attempts: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Build from VERDICT_* environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("VERDICT_API_URL") {
            config.base_url = url;
        }
        config.api_token = std::env::var("VERDICT_TOKEN").ok().filter(|t| !t.is_empty());

        if let Some(ms) = env_u64("VERDICT_POLL_INTERVAL_MS").filter(|ms| *ms > 0) {
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(secs) = env_u64("VERDICT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }

        config
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Intervals below `MIN_POLL_INTERVAL` are raised to it
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        let interval = interval.max(MIN_POLL_INTERVAL);
        self.poll_interval = interval;
        self.boilerplate_poll_interval = interval;
        self
    }

    pub fn with_submission_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.submission_max_attempts = max_attempts;
        self
    }

    /// Join an API path onto the base URL without doubling slashes
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok()?.trim().parse().ok()
}
