//! CLI commands for cahier.
//!
//! This module provides the commands behind the `cahier` binary, organized into:
//! - **Content commands**: import, lessons, groups
//! - **Review commands**: list, due, review, delete
//! - **Utility commands**: settings

// Content commands
pub mod groups;
pub mod import;
pub mod lessons;

// Review commands
pub mod delete;
pub mod list;
pub mod review;

// Utility commands
pub mod settings_cmd;

pub use delete::DeleteCommand;
pub use groups::GroupsCommand;
pub use import::ImportCommand;
pub use lessons::LessonsCommand;
pub use list::ListCommand;
pub use review::ReviewCommand;
pub use settings_cmd::SettingsCommand;

use chrono::DateTime;

/// Render epoch milliseconds as a UTC timestamp.
pub fn format_millis(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(at) => at.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => format!("{}ms", millis),
    }
}
