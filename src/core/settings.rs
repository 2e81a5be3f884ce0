//! Learner settings.
//!
//! Settings travel alongside the corpus: they live in the local store and,
//! when a cloud identity is present, are synced to the remote one. They are
//! the only data allowed to fall back to a local copy on remote failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CahierError, Result};

/// Which content generator the learner prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    #[default]
    Gemini,
    Openai,
}

impl ModelChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::Gemini => "gemini",
            ModelChoice::Openai => "openai",
        }
    }
}

/// Speech synthesis provider for audio playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsProvider {
    #[default]
    Browser,
    GoogleCloud,
    Openai,
}

impl TtsProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsProvider::Browser => "browser",
            TtsProvider::GoogleCloud => "google_cloud",
            TtsProvider::Openai => "openai",
        }
    }
}

/// Persisted learner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub gemini_key: String,
    pub openai_key: String,
    #[serde(rename = "googleTTSKey")]
    pub google_tts_key: String,
    pub selected_model: ModelChoice,
    pub tts_provider: TtsProvider,
    pub user_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_key: String::new(),
            openai_key: String::new(),
            google_tts_key: String::new(),
            selected_model: ModelChoice::default(),
            tts_provider: TtsProvider::default(),
            user_name: "Guest".to_string(),
        }
    }
}

/// Credentials handed to the content generator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub model: ModelChoice,
    pub api_key: String,
}

/// Setting keys accepted by [`Settings::set_field`].
pub const SETTING_KEYS: &[&str] = &[
    "gemini_key",
    "openai_key",
    "google_tts_key",
    "selected_model",
    "tts_provider",
    "user_name",
];

impl Settings {
    /// Credentials for the selected generator.
    pub fn credentials(&self) -> Credentials {
        let api_key = match self.selected_model {
            ModelChoice::Gemini => self.gemini_key.clone(),
            ModelChoice::Openai => self.openai_key.clone(),
        };
        Credentials {
            model: self.selected_model,
            api_key,
        }
    }

    /// Overlay the fields present in `other` onto these settings.
    ///
    /// Unknown or mistyped fields in `other` are ignored rather than
    /// discarding the whole document.
    pub fn overlay(&self, other: &Value) -> Settings {
        let Value::Object(incoming) = other else {
            return self.clone();
        };
        let mut merged = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => return self.clone(),
        };
        for (key, value) in incoming {
            if !merged.contains_key(key) {
                continue;
            }
            let previous = merged.insert(key.clone(), value.clone());
            if serde_json::from_value::<Settings>(Value::Object(merged.clone())).is_err() {
                if let Some(previous) = previous {
                    merged.insert(key.clone(), previous);
                }
            }
        }
        serde_json::from_value(Value::Object(merged)).unwrap_or_else(|_| self.clone())
    }

    /// Set one field from its CLI key and string value.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "gemini_key" => self.gemini_key = value.to_string(),
            "openai_key" => self.openai_key = value.to_string(),
            "google_tts_key" => self.google_tts_key = value.to_string(),
            "user_name" => self.user_name = value.to_string(),
            "selected_model" => {
                self.selected_model = serde_json::from_value(Value::String(value.to_lowercase()))
                    .map_err(|_| {
                        CahierError::invalid_input(format!(
                            "unknown model '{}' (expected gemini or openai)",
                            value
                        ))
                    })?
            }
            "tts_provider" => {
                self.tts_provider = serde_json::from_value(Value::String(value.to_lowercase()))
                    .map_err(|_| {
                        CahierError::invalid_input(format!(
                            "unknown TTS provider '{}' (expected browser, google_cloud or openai)",
                            value
                        ))
                    })?
            }
            other => {
                return Err(CahierError::invalid_input(format!(
                    "unknown setting '{}' (valid: {})",
                    other,
                    SETTING_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// Copy with API keys masked, for display.
    pub fn redacted(&self) -> Settings {
        Settings {
            gemini_key: mask(&self.gemini_key),
            openai_key: mask(&self.openai_key),
            google_tts_key: mask(&self.google_tts_key),
            ..self.clone()
        }
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}
