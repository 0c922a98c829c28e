//! Wallet Connect exchange configuration

use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounds for a single request/response exchange.
///
/// The wait for a reply ends at whichever comes first: `max_attempts` frames
/// read, or `reply_timeout` elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConnectConfig {
    /// Frames consulted before giving up on a reply
    pub max_attempts: u32,
    /// Wall-clock bound on the whole reply wait
    pub reply_timeout: Duration,
    /// Bound on opening the relay connection
    pub connect_timeout: Duration,
}

impl WalletConnectConfig {
    /// Built-in defaults, ignoring the environment.
    pub fn reference() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl WalletConnectConfig {
    /// Overlay `NWC_*` settings from `lookup` on the built-in defaults.
    /// Unset or unparseable values keep the default.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let reference = Self::reference();

        Self {
            max_attempts: env_parse(&lookup, "NWC_MAX_ATTEMPTS").unwrap_or(reference.max_attempts),
            reply_timeout: env_parse(&lookup, "NWC_REPLY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(reference.reply_timeout),
            connect_timeout: env_parse(&lookup, "NWC_CONNECT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(reference.connect_timeout),
        }
    }
}

fn env_parse<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse::<T>().ok())
}

impl Default for WalletConnectConfig {
    fn default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}
