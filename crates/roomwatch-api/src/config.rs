//! HTTP client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`BilibiliClient`](crate::BilibiliClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Scheme and host of the live API, without a trailing slash.
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,

    pub user_agent: String,

    /// Sent as `Referer` on every request.
    pub referer: String,

    /// Rooms requested per page when listing an area.
    pub page_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.live.bilibili.com".into(),
            timeout_ms: 10_000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36"
                .into(),
            referer: "https://live.bilibili.com".into(),
            page_size: 99,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Clamp values the API would reject.
    pub fn validated(mut self) -> Self {
        self.page_size = self.page_size.clamp(1, 99);
        if self.timeout_ms == 0 {
            tracing::warn!("api timeout of 0 ms, using the default");
            self.timeout_ms = Self::default().timeout_ms;
        }
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_normalizes_values() {
        let config = ApiConfig {
            base_url: "http://127.0.0.1:8080//".into(),
            timeout_ms: 0,
            page_size: 500,
            ..ApiConfig::default()
        }
        .validated();

        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.page_size, 99);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ApiConfig = serde_json::from_str(r#"{"timeout_ms": 2500}"#).unwrap();
        assert_eq!(config.timeout_ms, 2500);
        assert_eq!(config.base_url, "https://api.live.bilibili.com");
    }
}
