#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Constant;
use bon::Builder;

const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(1000);
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Configuration for a [`Client`](crate::Client).
///
/// Immutable once the client is constructed.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Target endpoint, e.g. `wss://example.com/feed`.
    ///
    /// Not validated here; a bad address surfaces when dialing.
    #[builder(into)]
    pub endpoint: String,
    /// Sub-protocols offered during the handshake, in preference order
    #[builder(default)]
    pub protocols: Vec<String>,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// Dial as soon as the client is constructed
    #[builder(default = true)]
    pub auto_open: bool,
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Fixed delay between reconnection attempts
    pub interval: Duration,
    /// Maximum number of reconnection attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONNECT_INTERVAL,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl From<ReconnectConfig> for Constant {
    fn from(config: ReconnectConfig) -> Self {
        Self::new(config.interval)
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff as _;

    use super::*;

    #[test]
    fn default_interval_is_one_second() {
        let config = ReconnectConfig::default();
        assert_eq!(config.interval, Duration::from_secs(1));
    }

    #[test]
    fn default_budget_is_five_attempts() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, Some(5));
    }

    #[test]
    fn delay_is_constant() {
        let config = ReconnectConfig {
            interval: Duration::from_millis(250),
            max_attempts: None,
        };
        let mut delay: Constant = config.into();

        // The delay never grows, however many cycles have elapsed
        for _ in 0..10 {
            assert_eq!(delay.next_backoff(), Some(Duration::from_millis(250)));
        }
    }

    #[test]
    fn builder_applies_defaults() {
        let config = ClientConfig::builder().endpoint("ws://localhost").build();

        assert_eq!(config.endpoint, "ws://localhost");
        assert!(config.protocols.is_empty());
        assert!(config.auto_open);
        assert_eq!(config.reconnect, ReconnectConfig::default());
    }
}
