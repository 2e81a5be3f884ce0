//! Delete command for cahier.

use serde::{Deserialize, Serialize};

use crate::archive::{Clock, ContentArchive, SystemClock};

/// Options for the delete command.
#[derive(Debug, Clone)]
pub struct DeleteOptions {
    /// Item to delete.
    pub id: String,
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the delete command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteOutput {
    pub success: bool,
    pub id: String,
    /// Whether the item existed before deletion.
    pub existed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The delete command implementation.
pub struct DeleteCommand<C: Clock = SystemClock> {
    archive: ContentArchive<C>,
}

impl<C: Clock> DeleteCommand<C> {
    /// Create a new delete command.
    pub fn new(archive: ContentArchive<C>) -> Self {
        Self { archive }
    }

    /// Run the delete command. Deleting an unknown id succeeds.
    pub fn run(&self, options: &DeleteOptions) -> DeleteOutput {
        let result = self.archive.get_item(&options.id).and_then(|existing| {
            self.archive.delete_item(&options.id)?;
            Ok(existing.is_some())
        });
        match result {
            Ok(existed) => DeleteOutput {
                success: true,
                id: options.id.clone(),
                existed,
                error: None,
            },
            Err(e) => DeleteOutput {
                success: false,
                id: options.id.clone(),
                existed: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &DeleteOutput, options: &DeleteOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else if !output.success {
            format!(
                "Delete failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            )
        } else if output.existed {
            format!("Deleted {}\n", output.id)
        } else {
            format!("No item {} (nothing to delete)\n", output.id)
        }
    }
}
