//! Layered engine configuration: defaults, optional JSON file, env
//! overrides, in that order of precedence (later wins).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use banter_core::errors::{ChatError, Result};
use banter_transport::TransportConfig;

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Base URL of the conversation REST API.
    pub api_base_url: String,
    /// URL of the streaming WebSocket endpoint.
    pub ws_url: String,
    /// Optional bearer credential. Presence selects remote mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Path to the local durable snapshot database.
    pub storage_path: PathBuf,
    /// Delay between reconnect attempts, milliseconds.
    pub reconnect_interval_ms: u64,
    /// Cap on consecutive failed dials. `None` retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            ws_url: "ws://localhost:8080/ws/chat".to_string(),
            api_key: None,
            storage_path: default_storage_path(),
            reconnect_interval_ms: 3000,
            max_reconnect_attempts: None,
        }
    }
}

fn default_storage_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".banter").join("store.db")
}

/// Recursively merge `overlay` into `base`. Objects merge key-by-key;
/// any other value in the overlay replaces the base value.
fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        let _ = base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file merged over the defaults.
    ///
    /// A missing file is not an error — the defaults stand. A present
    /// but unreadable/invalid file is.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())
            .map_err(|e| ChatError::Validation(e.to_string()))?;
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let overlay: Value = serde_json::from_str(&text).map_err(|e| {
                    ChatError::Validation(format!("config {}: {e}", path.display()))
                })?;
                deep_merge(&mut merged, overlay);
                debug!(path = %path.display(), "loaded config file");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
            }
            Err(e) => {
                return Err(ChatError::Validation(format!(
                    "config {}: {e}",
                    path.display()
                )));
            }
        }
        let mut config: Self =
            serde_json::from_value(merged).map_err(|e| ChatError::Validation(e.to_string()))?;
        config.validate();
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    ///
    /// Taking the lookup as a parameter keeps the layering testable
    /// without mutating process-wide environment state.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BANTER_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("BANTER_WS_URL") {
            self.ws_url = v;
        }
        if let Some(v) = lookup("BANTER_API_KEY") {
            self.api_key = Some(v);
        }
        if let Some(v) = lookup("BANTER_STORAGE_PATH") {
            self.storage_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("BANTER_RECONNECT_INTERVAL_MS") {
            match v.parse() {
                Ok(ms) => self.reconnect_interval_ms = ms,
                Err(_) => warn!(value = %v, "ignoring non-numeric BANTER_RECONNECT_INTERVAL_MS"),
            }
        }
        if let Some(v) = lookup("BANTER_RECONNECT_MAX_ATTEMPTS") {
            match v.parse() {
                Ok(n) => self.max_reconnect_attempts = Some(n),
                Err(_) => warn!(value = %v, "ignoring non-numeric BANTER_RECONNECT_MAX_ATTEMPTS"),
            }
        }
        self.validate();
    }

    /// Correct degenerate values with a warning.
    pub fn validate(&mut self) {
        if self.reconnect_interval_ms == 0 {
            warn!("reconnectIntervalMs of 0 would spin, using 3000");
            self.reconnect_interval_ms = 3000;
        }
        if self.api_key.as_deref() == Some("") {
            self.api_key = None;
        }
    }

    /// The transport configuration this engine config implies.
    pub fn transport_config(&self) -> TransportConfig {
        let mut config = TransportConfig::new(self.ws_url.clone());
        config.api_key = self.api_key.clone();
        config.reconnect_interval = Duration::from_millis(self.reconnect_interval_ms);
        config.max_reconnect_attempts = self.max_reconnect_attempts;
        config
    }
}
