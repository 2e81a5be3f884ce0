//! Settings command for cahier.
//!
//! Shows or changes learner settings. API keys are masked on display.

use serde::{Deserialize, Serialize};

use crate::core::Settings;
use crate::error::Result;
use crate::storage::StorageAdapter;

/// What the settings command should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsAction {
    Show,
    Set { key: String, value: String },
}

/// Options for the settings command.
#[derive(Debug, Clone)]
pub struct SettingsOptions {
    pub action: SettingsAction,
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the settings command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsOutput {
    pub success: bool,
    /// Settings after the action, keys masked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    /// Key that was changed, for `set`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The settings command implementation.
pub struct SettingsCommand {
    storage: StorageAdapter,
}

impl SettingsCommand {
    /// Create a new settings command.
    pub fn new(storage: StorageAdapter) -> Self {
        Self { storage }
    }

    /// Run the settings command.
    pub fn run(&self, options: &SettingsOptions) -> SettingsOutput {
        match self.apply(&options.action) {
            Ok(settings) => SettingsOutput {
                success: true,
                settings: Some(settings.redacted()),
                updated: match &options.action {
                    SettingsAction::Set { key, .. } => Some(key.clone()),
                    SettingsAction::Show => None,
                },
                error: None,
            },
            Err(e) => SettingsOutput {
                success: false,
                settings: None,
                updated: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn apply(&self, action: &SettingsAction) -> Result<Settings> {
        let mut settings = self.storage.load_settings();
        if let SettingsAction::Set { key, value } = action {
            settings.set_field(key, value)?;
            self.storage.save_settings(&settings)?;
        }
        Ok(settings)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &SettingsOutput, options: &SettingsOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if !output.success {
            return format!(
                "Settings failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut lines = Vec::new();
        if let Some(key) = &output.updated {
            lines.push(format!("Updated {}\n", key));
        }
        if let Some(settings) = &output.settings {
            let or_unset = |s: &str| {
                if s.is_empty() {
                    "(not set)".to_string()
                } else {
                    s.to_string()
                }
            };
            lines.push(format!("user_name:      {}", settings.user_name));
            lines.push(format!(
                "selected_model: {}",
                settings.selected_model.as_str()
            ));
            lines.push(format!("tts_provider:   {}", settings.tts_provider.as_str()));
            lines.push(format!("gemini_key:     {}", or_unset(&settings.gemini_key)));
            lines.push(format!("openai_key:     {}", or_unset(&settings.openai_key)));
            lines.push(format!(
                "google_tts_key: {}",
                or_unset(&settings.google_tts_key)
            ));
        }
        lines.join("\n")
    }
}
