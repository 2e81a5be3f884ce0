//! Groups command for cahier.
//!
//! Summarizes review items per lesson group.

use serde::{Deserialize, Serialize};

use crate::archive::{Clock, ContentArchive, GroupSummary, SystemClock};

/// Options for the groups command.
#[derive(Debug, Clone, Default)]
pub struct GroupsOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the groups command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsOutput {
    pub success: bool,
    pub groups: Vec<GroupInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One group line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: String,
    pub count: usize,
    pub due: usize,
}

impl From<GroupSummary> for GroupInfo {
    fn from(summary: GroupSummary) -> Self {
        Self {
            group_id: summary.group_id,
            count: summary.count,
            due: summary.due,
        }
    }
}

/// The groups command implementation.
pub struct GroupsCommand<C: Clock = SystemClock> {
    archive: ContentArchive<C>,
}

impl<C: Clock> GroupsCommand<C> {
    /// Create a new groups command.
    pub fn new(archive: ContentArchive<C>) -> Self {
        Self { archive }
    }

    /// Run the groups command.
    pub fn run(&self, _options: &GroupsOptions) -> GroupsOutput {
        match self.archive.list_groups() {
            Ok(groups) => GroupsOutput {
                success: true,
                groups: groups.into_iter().map(GroupInfo::from).collect(),
                error: None,
            },
            Err(e) => GroupsOutput {
                success: false,
                groups: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &GroupsOutput, options: &GroupsOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if !output.success {
            return format!(
                "Groups failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }
        if output.groups.is_empty() {
            return "No groups yet. Import a lesson to get started.\n".to_string();
        }

        let width = output
            .groups
            .iter()
            .map(|g| g.group_id.chars().count())
            .max()
            .unwrap_or(0);
        let mut lines = Vec::new();
        for group in &output.groups {
            lines.push(format!(
                "{:<width$}  {:>4} items  {:>4} due",
                group.group_id,
                group.count,
                group.due,
                width = width
            ));
        }
        lines.join("\n")
    }
}
