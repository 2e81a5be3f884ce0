//! Review command for cahier.
//!
//! Grades one item and reports its new place on the interval ladder.

use serde::{Deserialize, Serialize};

use super::format_millis;
use crate::archive::{Clock, ContentArchive, SystemClock};
use crate::core::schedule::{clamp_strength, format_interval, INTERVAL_DAYS};
use crate::core::Quality;

/// Options for the review command.
#[derive(Debug, Clone)]
pub struct ReviewOptions {
    /// Item to grade.
    pub id: String,
    /// Recall quality.
    pub quality: Quality,
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the review command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewOutput {
    /// Whether the review was recorded.
    pub success: bool,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review: Option<String>,
    /// Human interval until the next review, e.g. "3d" or "2w".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Error message if the review failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The review command implementation.
pub struct ReviewCommand<C: Clock = SystemClock> {
    archive: ContentArchive<C>,
}

impl<C: Clock> ReviewCommand<C> {
    /// Create a new review command.
    pub fn new(archive: ContentArchive<C>) -> Self {
        Self { archive }
    }

    /// Run the review command.
    pub fn run(&self, options: &ReviewOptions) -> ReviewOutput {
        match self.archive.review(&options.id, options.quality) {
            Ok(item) => {
                let level = clamp_strength(item.strength_level);
                ReviewOutput {
                    success: true,
                    id: item.id.clone(),
                    title: Some(item.payload.title()),
                    quality: Some(options.quality.to_string()),
                    strength_level: Some(item.strength_level),
                    next_review: item.next_review_at.map(format_millis),
                    interval: Some(format_interval(INTERVAL_DAYS[level as usize])),
                    error: None,
                }
            }
            Err(e) => ReviewOutput {
                success: false,
                id: options.id.clone(),
                error: Some(e.to_string()),
                ..Default::default()
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ReviewOutput, options: &ReviewOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else if output.success {
            format!(
                "{} ({}): level {}, next review in {} ({})\n",
                output.title.as_deref().unwrap_or(&output.id),
                output.quality.as_deref().unwrap_or(""),
                output.strength_level.unwrap_or_default(),
                output.interval.as_deref().unwrap_or("?"),
                output.next_review.as_deref().unwrap_or("never"),
            )
        } else {
            format!(
                "Review failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::FixedClock;
    use crate::core::{parse_segments, VocabEntry};
    use crate::storage::{MemoryDocumentStore, StorageAdapter};
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000_000;

    fn command_with_item() -> (ReviewCommand<FixedClock>, String) {
        let store = Arc::new(MemoryDocumentStore::non_atomic());
        let archive =
            ContentArchive::with_clock(StorageAdapter::local(store), FixedClock::new(NOW));
        archive
            .add_vocabulary(
                "café__A1",
                None,
                &[VocabEntry::new(parse_segments("pain[pɛ̃]"), "bread")],
            )
            .unwrap();
        let id = archive.list_items(&Default::default()).unwrap()[0].id.clone();
        (ReviewCommand::new(archive), id)
    }

    fn options(id: &str, quality: Quality) -> ReviewOptions {
        ReviewOptions {
            id: id.to_string(),
            quality,
            json: false,
            quiet: false,
        }
    }

    #[test]
    fn test_review_climbs_the_ladder() {
        let (cmd, id) = command_with_item();

        let first = cmd.run(&options(&id, Quality::Easy));
        assert!(first.success);
        assert_eq!(first.title.as_deref(), Some("pain"));
        assert_eq!(first.strength_level, Some(2));
        assert_eq!(first.interval.as_deref(), Some("3d"));

        let second = cmd.run(&options(&id, Quality::Good));
        assert_eq!(second.strength_level, Some(3));
        assert_eq!(second.interval.as_deref(), Some("1w"));
    }

    #[test]
    fn test_review_hard_stays_due() {
        let (cmd, id) = command_with_item();
        let output = cmd.run(&options(&id, Quality::Hard));

        assert_eq!(output.strength_level, Some(0));
        assert_eq!(output.interval.as_deref(), Some("now"));
        assert_eq!(output.next_review, Some(format_millis(NOW)));
    }

    #[test]
    fn test_review_unknown_item() {
        let (cmd, _id) = command_with_item();
        let output = cmd.run(&options("missing", Quality::Good));

        assert!(!output.success);
        assert_eq!(output.id, "missing");
        assert!(output.error.unwrap().contains("missing"));
    }

    #[test]
    fn test_format_output() {
        let (cmd, id) = command_with_item();
        let opts = options(&id, Quality::Good);
        let output = cmd.run(&opts);

        let text = cmd.format_output(&output, &opts);
        assert!(text.starts_with("pain (good): level 1, next review in 1d"));

        let json = cmd.format_output(
            &output,
            &ReviewOptions {
                json: true,
                ..opts.clone()
            },
        );
        let parsed: ReviewOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.strength_level, Some(1));
    }
}
