//! Chat settings: credential, model selection, and sampling knobs.
//!
//! The presence of a non-empty `api_key` is what selects remote mode for
//! the persistence gateway — there is no separate mode switch, and the
//! mode can change between calls when settings change.

use serde::{Deserialize, Serialize};

/// Inclusive temperature range accepted by the backend.
pub const TEMPERATURE_RANGE: (f64, f64) = (0.0, 2.0);
/// Inclusive max-tokens range accepted by the backend.
pub const MAX_TOKENS_RANGE: (u32, u32) = (256, 4096);

/// User-tunable chat settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// Bearer credential for the remote authority. `None` or empty means
    /// local-only mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model identifier sent with each exchange.
    pub model_name: String,
    /// Sampling temperature in `[0, 2]`.
    pub temperature: f64,
    /// Response token budget in `[256, 4096]`.
    pub max_tokens: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model_name: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

impl ChatSettings {
    /// The credential, if one is configured and non-empty.
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Whether a remote authority should be consulted.
    pub fn remote_enabled(&self) -> bool {
        self.credential().is_some()
    }

    /// Clamp out-of-range numeric fields.
    ///
    /// Out-of-range values are corrected with a warning rather than
    /// rejected, so a hand-edited settings blob still loads.
    pub fn validate(&mut self) {
        let (t_lo, t_hi) = TEMPERATURE_RANGE;
        if !(t_lo..=t_hi).contains(&self.temperature) || self.temperature.is_nan() {
            let clamped = if self.temperature.is_nan() {
                0.7
            } else {
                self.temperature.clamp(t_lo, t_hi)
            };
            tracing::warn!(
                temperature = self.temperature,
                clamped,
                "temperature out of range, clamped"
            );
            self.temperature = clamped;
        }
        let (m_lo, m_hi) = MAX_TOKENS_RANGE;
        if !(m_lo..=m_hi).contains(&self.max_tokens) {
            let clamped = self.max_tokens.clamp(m_lo, m_hi);
            tracing::warn!(
                max_tokens = self.max_tokens,
                clamped,
                "maxTokens out of range, clamped"
            );
            self.max_tokens = clamped;
        }
    }
}

/// A partial settings update.
///
/// Mirrors the body of `POST /settings` — only the provided fields
/// change. Fields that are `None` are omitted from the wire payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    /// New credential, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// New model name, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// New temperature, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// New token budget, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl SettingsPatch {
    /// Merge this patch into `settings`, then re-validate.
    pub fn apply(&self, settings: &mut ChatSettings) {
        if let Some(key) = &self.api_key {
            settings.api_key = Some(key.clone());
        }
        if let Some(model) = &self.model_name {
            settings.model_name = model.clone();
        }
        if let Some(t) = self.temperature {
            settings.temperature = t;
        }
        if let Some(m) = self.max_tokens {
            settings.max_tokens = m;
        }
        settings.validate();
    }
}
