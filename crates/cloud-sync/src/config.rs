use std::env;
use std::time::Duration;

use crate::error::{CloudError, Result};

/// Default timeout for remote store requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL of the document API, without a trailing slash.
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `RENTDESK_CLOUD_URL` (required), `RENTDESK_CLOUD_TOKEN` and
    /// `RENTDESK_CLOUD_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("RENTDESK_CLOUD_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| CloudError::invalid_request("RENTDESK_CLOUD_URL is not set"))?;
        let mut config = Self::new(base_url.trim());

        if let Ok(token) = env::var("RENTDESK_CLOUD_TOKEN") {
            if !token.trim().is_empty() {
                config.access_token = Some(token.trim().to_string());
            }
        }
        if let Ok(secs) = env::var("RENTDESK_CLOUD_TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                CloudError::invalid_request(format!("RENTDESK_CLOUD_TIMEOUT_SECS is not a number: {secs}"))
            })?;
            config.timeout = Duration::from_secs(secs.max(1));
        }
        Ok(config)
    }
}
