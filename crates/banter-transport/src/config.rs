//! Transport connection configuration.

use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

/// Connection parameters for [`crate::WsTransport`].
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Socket endpoint, e.g. `ws://localhost:8080/ws/chat`.
    pub url: String,
    /// Credential appended to the connect URL as `api_key` when set.
    pub api_key: Option<String>,
    /// Fixed delay between reconnection attempts.
    pub reconnect_interval: Duration,
    /// Maximum consecutive failed attempts before giving up.
    /// `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
}

impl TransportConfig {
    /// Config with default reconnect tuning (3s interval, no cap).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            reconnect_interval: Duration::from_secs(3),
            max_reconnect_attempts: None,
        }
    }

    /// The URL actually dialed, with the credential escaped into the
    /// query string when one is configured.
    pub fn connect_url(&self) -> String {
        match self.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                let escaped = utf8_percent_encode(key, NON_ALPHANUMERIC);
                format!("{}{sep}api_key={escaped}", self.url)
            }
            None => self.url.clone(),
        }
    }
}
