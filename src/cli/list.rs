//! List and due commands for cahier.
//!
//! Lists review items from the active backend, either all of them (newest
//! first) or only those due now (most overdue first). When the synced store
//! is unreachable the last mirrored copy is shown instead, marked offline.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::format_millis;
use crate::archive::{Clock, ContentArchive, SystemClock};
use crate::core::{ItemFilter, ItemKind, ReviewItem};

/// Options for the list command.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Only items of this kind.
    pub kind: Option<ItemKind>,
    /// Only items of this group.
    pub group: Option<String>,
    /// Only items due now.
    pub due: bool,
}

impl ListOptions {
    fn filter(&self) -> ItemFilter {
        ItemFilter {
            kind: self.kind,
            group_id: self.group.clone(),
        }
    }
}

/// Output format for the list command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOutput {
    /// Whether the list was successful.
    pub success: bool,
    /// Number of items shown.
    pub count: usize,
    /// Number of matching items before the limit was applied.
    pub total: usize,
    /// The items.
    pub items: Vec<ItemInfo>,
    /// Items come from the local mirror because the synced store failed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub offline: bool,
    /// Error message if listing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Simplified item info for output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemInfo {
    pub id: String,
    pub kind: String,
    pub group_id: String,
    /// Word, grammar point or sentence.
    pub title: String,
    /// Meaning, example or translation.
    pub subtitle: String,
    pub strength_level: i32,
    /// Next review time, or "never" when unreadable.
    pub next_review: String,
    pub due: bool,
}

impl ItemInfo {
    /// Create from a review item as of `now`.
    pub fn from_item(item: &ReviewItem, now: i64) -> Self {
        Self {
            id: item.id.clone(),
            kind: item.kind().to_string(),
            group_id: item.group_id.clone(),
            title: item.payload.title(),
            subtitle: item.payload.subtitle(),
            strength_level: item.strength_level,
            next_review: item
                .next_review_at
                .map(format_millis)
                .unwrap_or_else(|| "never".to_string()),
            due: item.is_due(now),
        }
    }
}

impl ListOutput {
    /// Create a successful output.
    pub fn success(items: Vec<ItemInfo>, total: usize) -> Self {
        Self {
            success: true,
            count: items.len(),
            total,
            items,
            offline: false,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            count: 0,
            total: 0,
            items: Vec::new(),
            offline: false,
            error: Some(error.into()),
        }
    }
}

/// The list command implementation.
pub struct ListCommand<C: Clock = SystemClock> {
    archive: ContentArchive<C>,
}

impl<C: Clock> ListCommand<C> {
    /// Create a new list command.
    pub fn new(archive: ContentArchive<C>) -> Self {
        Self { archive }
    }

    /// Run the list command.
    pub fn run(&self, options: &ListOptions) -> ListOutput {
        let filter = options.filter();
        let now = self.archive.clock().now_millis();
        let result = if options.due {
            self.archive.due_queue(&filter)
        } else {
            self.archive.list_items(&filter)
        };

        match result {
            Ok(items) => Self::build(items, now, options),
            Err(e) if e.is_retryable() && self.archive.storage().selection().is_remote() => {
                warn!(error = %e, "Synced store unavailable, showing cached items");
                match self.archive.cached_items() {
                    Ok(cached) => {
                        let mut items: Vec<ReviewItem> = cached
                            .into_iter()
                            .filter(|item| filter.matches(item))
                            .filter(|item| !options.due || item.is_due(now))
                            .collect();
                        if options.due {
                            items.sort_by(|a, b| {
                                a.next_review_at
                                    .cmp(&b.next_review_at)
                                    .then_with(|| a.id.cmp(&b.id))
                            });
                        }
                        ListOutput {
                            offline: true,
                            ..Self::build(items, now, options)
                        }
                    }
                    Err(_) => ListOutput::failure(e.to_string()),
                }
            }
            Err(e) => ListOutput::failure(e.to_string()),
        }
    }

    fn build(items: Vec<ReviewItem>, now: i64, options: &ListOptions) -> ListOutput {
        let total = items.len();
        let mut infos: Vec<ItemInfo> = items
            .iter()
            .map(|item| ItemInfo::from_item(item, now))
            .collect();
        if let Some(limit) = options.limit {
            infos.truncate(limit);
        }
        ListOutput::success(infos, total)
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ListOutput, options: &ListOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output, options)
        }
    }

    /// Format output as human-readable text.
    fn format_human_readable(&self, output: &ListOutput, options: &ListOptions) -> String {
        if !output.success {
            return format!(
                "List failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        if output.items.is_empty() {
            return if options.due {
                "Nothing due for review.\n".to_string()
            } else {
                "No items found.\n".to_string()
            };
        }

        let mut lines = Vec::new();
        if output.offline {
            lines.push("(offline: showing the last synced copy)".to_string());
        }
        let noun = if options.due { "due item(s)" } else { "item(s)" };
        if output.total > output.count {
            lines.push(format!(
                "Showing {} of {} {}:\n",
                output.count, output.total, noun
            ));
        } else {
            lines.push(format!("Found {} {}:\n", output.count, noun));
        }

        for (i, item) in output.items.iter().enumerate() {
            let marker = if item.due && !options.due { " *due*" } else { "" };
            lines.push(format!(
                "{}. [{}] {}{}",
                i + 1,
                item.kind,
                item.title,
                marker
            ));
            if !item.subtitle.is_empty() {
                lines.push(format!("   {}", item.subtitle));
            }
            lines.push(format!(
                "   Level {} | Next: {} | Group: {} | ID: {}",
                item.strength_level, item.next_review, item.group_id, item.id
            ));
            lines.push(String::new());
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::FixedClock;
    use crate::core::{parse_segments, GrammarEntry, Quality, VocabEntry, DAY_MS};
    use crate::storage::{BackendSelection, MemoryDocumentStore, StorageAdapter};
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000_000;

    fn vocab(word: &str, meaning: &str) -> VocabEntry {
        VocabEntry::new(parse_segments(word), meaning)
    }

    fn seeded(archive: &ContentArchive<FixedClock>) {
        archive
            .add_vocabulary(
                "café__A1",
                None,
                &[vocab("café", "coffee"), vocab("thé", "tea")],
            )
            .unwrap();
        archive.clock().advance(1);
        archive
            .add_grammar(
                "gare__A2",
                None,
                &[GrammarEntry {
                    point: "Le futur proche".to_string(),
                    explanation: "aller + infinitive".to_string(),
                    ..Default::default()
                }],
            )
            .unwrap();
    }

    fn local_command() -> ListCommand<FixedClock> {
        let store = Arc::new(MemoryDocumentStore::non_atomic());
        let archive =
            ContentArchive::with_clock(StorageAdapter::local(store), FixedClock::new(NOW));
        seeded(&archive);
        ListCommand::new(archive)
    }

    #[test]
    fn test_list_output_failure() {
        let output = ListOutput::failure("backend error");

        assert!(!output.success);
        assert_eq!(output.count, 0);
        assert!(output.items.is_empty());
        assert_eq!(output.error, Some("backend error".to_string()));
    }

    #[test]
    fn test_list_basic() {
        let cmd = local_command();
        let output = cmd.run(&ListOptions::default());

        assert!(output.success);
        assert_eq!(output.count, 3);
        assert_eq!(output.items[0].kind, "grammar");
        assert!(output.items.iter().all(|i| i.due));
    }

    #[test]
    fn test_list_filters_and_limit() {
        let cmd = local_command();

        let vocab_only = cmd.run(&ListOptions {
            kind: Some(ItemKind::Vocabulary),
            ..Default::default()
        });
        assert_eq!(vocab_only.count, 2);

        let group = cmd.run(&ListOptions {
            group: Some("gare__A2".to_string()),
            ..Default::default()
        });
        assert_eq!(group.count, 1);
        assert_eq!(group.items[0].title, "Le futur proche");

        let limited = cmd.run(&ListOptions {
            limit: Some(1),
            ..Default::default()
        });
        assert_eq!(limited.count, 1);
        assert_eq!(limited.total, 3);
    }

    #[test]
    fn test_due_excludes_reviewed_items() {
        let cmd = local_command();
        let first = cmd.run(&ListOptions::default()).items[0].id.clone();
        cmd.archive.review(&first, Quality::Good).unwrap();

        let due = cmd.run(&ListOptions {
            due: true,
            ..Default::default()
        });
        assert_eq!(due.count, 2);
        assert!(due.items.iter().all(|i| i.id != first));

        cmd.archive.clock().advance(DAY_MS);
        let later = cmd.run(&ListOptions {
            due: true,
            ..Default::default()
        });
        assert_eq!(later.count, 3);
    }

    #[test]
    fn test_remote_outage_falls_back_to_mirror() {
        let local = Arc::new(MemoryDocumentStore::non_atomic());
        let remote = Arc::new(MemoryDocumentStore::new());
        let adapter = StorageAdapter::new(
            BackendSelection::Remote {
                identity: "u1".to_string(),
            },
            local,
            Some(remote.clone()),
        )
        .unwrap();
        let archive = ContentArchive::with_clock(adapter, FixedClock::new(NOW));
        seeded(&archive);
        let cmd = ListCommand::new(archive);

        let online = cmd.run(&ListOptions::default());
        assert!(!online.offline);
        assert_eq!(online.count, 3);

        remote.set_unavailable(true);
        let offline = cmd.run(&ListOptions {
            kind: Some(ItemKind::Vocabulary),
            ..Default::default()
        });
        assert!(offline.success);
        assert!(offline.offline);
        assert_eq!(offline.count, 2);
    }

    #[test]
    fn test_local_failure_is_reported() {
        let store = Arc::new(MemoryDocumentStore::non_atomic());
        let archive =
            ContentArchive::with_clock(StorageAdapter::local(store.clone()), FixedClock::new(NOW));
        let cmd = ListCommand::new(archive);
        store.set_unavailable(true);

        let output = cmd.run(&ListOptions::default());
        assert!(!output.success);
        assert!(output.error.is_some());
    }

    #[test]
    fn test_format_output() {
        let cmd = local_command();
        let options = ListOptions {
            limit: Some(2),
            ..Default::default()
        };
        let output = cmd.run(&options);

        let text = cmd.format_output(&output, &options);
        assert!(text.contains("Showing 2 of 3 item(s)"));
        assert!(text.contains("[grammar] Le futur proche *due*"));

        let json = cmd.format_output(
            &output,
            &ListOptions {
                json: true,
                ..options.clone()
            },
        );
        let parsed: ListOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.count, 2);
        assert!(!json.contains("offline"));

        let quiet = ListOptions {
            quiet: true,
            ..Default::default()
        };
        assert!(cmd.format_output(&output, &quiet).is_empty());
    }

    #[test]
    fn test_format_empty_due() {
        let store = Arc::new(MemoryDocumentStore::new());
        let cmd = ListCommand::new(ContentArchive::with_clock(
            StorageAdapter::local(store),
            FixedClock::new(NOW),
        ));
        let options = ListOptions {
            due: true,
            ..Default::default()
        };
        let output = cmd.run(&options);
        assert_eq!(
            cmd.format_output(&output, &options),
            "Nothing due for review.\n"
        );
    }
}
