//! Import command for cahier.
//!
//! Generates a lesson, archives it and seeds review items for its vocabulary.
//! Grammar points and text lines are only added when asked for.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::{Clock, ContentArchive, SystemClock};
use crate::core::{canonical_surface, Lesson, Level};
use crate::error::Result;
use crate::generation::LessonGenerator;

/// Options for the import command.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Lesson topic, free-form.
    pub topic: String,
    /// Proficiency level.
    pub level: Level,
    /// Also add the lesson's grammar points to review.
    pub with_grammar: bool,
    /// Also add the lesson's dialogue and essay lines to review.
    pub with_text: bool,
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

impl ImportOptions {
    pub fn new(topic: impl Into<String>, level: Level) -> Self {
        Self {
            topic: topic.into(),
            level,
            with_grammar: false,
            with_text: false,
            json: false,
            quiet: false,
        }
    }
}

/// Output format for the import command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOutput {
    /// Whether the import was successful.
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// False when the lesson had already been imported.
    pub lesson_stored: bool,
    pub vocabulary_added: usize,
    pub vocabulary_skipped: usize,
    pub grammar_added: usize,
    pub text_added: usize,
    /// Error message if the import failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportOutput {
    /// Create a failed output.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// The import command implementation.
pub struct ImportCommand<C: Clock = SystemClock> {
    archive: ContentArchive<C>,
    generator: Box<dyn LessonGenerator>,
}

impl<C: Clock> ImportCommand<C> {
    /// Create a new import command.
    pub fn new(archive: ContentArchive<C>, generator: Box<dyn LessonGenerator>) -> Self {
        Self { archive, generator }
    }

    /// Run the import command.
    pub fn run(&self, options: &ImportOptions) -> ImportOutput {
        let credentials = self.archive.storage().load_settings().credentials();
        debug!(generator = self.generator.name(), topic = %options.topic, "Generating lesson");

        let lesson = match self
            .generator
            .generate(&options.topic, options.level, &credentials)
        {
            Ok(lesson) => lesson,
            Err(e) => return ImportOutput::failure(e.to_string()),
        };

        match self.store(&lesson, options) {
            Ok(output) => output,
            Err(e) => ImportOutput {
                lesson_id: Some(lesson.id.clone()),
                group_id: Some(lesson.group_id.clone()),
                ..ImportOutput::failure(e.to_string())
            },
        }
    }

    fn store(&self, lesson: &Lesson, options: &ImportOptions) -> Result<ImportOutput> {
        let outcome = self.archive.archive_lesson(lesson)?;
        let source = Some(lesson.id.as_str());

        let grammar_added = if options.with_grammar {
            self.archive
                .add_grammar(&lesson.group_id, source, &lesson.grammar)?
                .added
        } else {
            0
        };
        let text_added = if options.with_text {
            let lines: Vec<_> = lesson.text_lines().cloned().collect();
            self.archive.add_text(&lesson.group_id, source, &lines)?.added
        } else {
            0
        };

        Ok(ImportOutput {
            success: true,
            lesson_id: Some(outcome.lesson_id),
            group_id: Some(lesson.group_id.clone()),
            title: Some(canonical_surface(&lesson.title)),
            lesson_stored: outcome.lesson_stored,
            vocabulary_added: outcome.vocabulary.added,
            vocabulary_skipped: outcome.vocabulary.skipped,
            grammar_added,
            text_added,
            error: None,
        })
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &ImportOutput, options: &ImportOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        } else {
            self.format_human_readable(output)
        }
    }

    fn format_human_readable(&self, output: &ImportOutput) -> String {
        if !output.success {
            return format!(
                "Import failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let title = output.title.as_deref().unwrap_or("");
        let group = output.group_id.as_deref().unwrap_or("");
        let mut lines = Vec::new();
        if output.lesson_stored {
            lines.push(format!("Imported \"{}\" into {}", title, group));
        } else {
            lines.push(format!("\"{}\" was already imported into {}", title, group));
        }
        lines.push(format!(
            "  Vocabulary: {} added, {} already known",
            output.vocabulary_added, output.vocabulary_skipped
        ));
        if output.grammar_added > 0 {
            lines.push(format!("  Grammar: {} added", output.grammar_added));
        }
        if output.text_added > 0 {
            lines.push(format!("  Text: {} added", output.text_added));
        }
        if let Some(id) = &output.lesson_id {
            lines.push(format!("  Lesson ID: {}", id));
        }
        lines.join("\n")
    }
}
