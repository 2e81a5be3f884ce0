//! Lessons command for cahier.
//!
//! Lists archived lessons, newest first.

use serde::{Deserialize, Serialize};

use super::format_millis;
use crate::archive::{Clock, ContentArchive, SystemClock};
use crate::core::{canonical_surface, Lesson};

/// Options for the lessons command.
#[derive(Debug, Clone, Default)]
pub struct LessonsOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

/// Output format for the lessons command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonsOutput {
    pub success: bool,
    pub count: usize,
    pub lessons: Vec<LessonInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Simplified lesson info for output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonInfo {
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub level: String,
    pub vocabulary: usize,
    pub grammar: usize,
    pub text_lines: usize,
    pub created: String,
}

impl LessonInfo {
    pub fn from_lesson(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id.clone(),
            group_id: lesson.group_id.clone(),
            title: canonical_surface(&lesson.title),
            level: lesson.level.to_string(),
            vocabulary: lesson.vocabulary.len(),
            grammar: lesson.grammar.len(),
            text_lines: lesson.text_lines().count(),
            created: format_millis(lesson.created_at),
        }
    }
}

/// The lessons command implementation.
pub struct LessonsCommand<C: Clock = SystemClock> {
    archive: ContentArchive<C>,
}

impl<C: Clock> LessonsCommand<C> {
    /// Create a new lessons command.
    pub fn new(archive: ContentArchive<C>) -> Self {
        Self { archive }
    }

    /// Run the lessons command.
    pub fn run(&self, options: &LessonsOptions) -> LessonsOutput {
        match self.archive.list_lessons() {
            Ok(lessons) => {
                let mut infos: Vec<LessonInfo> =
                    lessons.iter().map(LessonInfo::from_lesson).collect();
                if let Some(limit) = options.limit {
                    infos.truncate(limit);
                }
                LessonsOutput {
                    success: true,
                    count: infos.len(),
                    lessons: infos,
                    error: None,
                }
            }
            Err(e) => LessonsOutput {
                success: false,
                count: 0,
                lessons: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Format output based on options.
    pub fn format_output(&self, output: &LessonsOutput, options: &LessonsOptions) -> String {
        if options.quiet {
            return String::new();
        }

        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if !output.success {
            return format!(
                "Lessons failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            );
        }
        if output.lessons.is_empty() {
            return "No lessons archived.\n".to_string();
        }

        let mut lines = vec![format!("Found {} lesson(s):\n", output.count)];
        for (i, lesson) in output.lessons.iter().enumerate() {
            lines.push(format!("{}. {} [{}]", i + 1, lesson.title, lesson.level));
            lines.push(format!(
                "   {} words, {} grammar points, {} text lines",
                lesson.vocabulary, lesson.grammar, lesson.text_lines
            ));
            lines.push(format!(
                "   Created: {} | Group: {} | ID: {}",
                lesson.created, lesson.group_id, lesson.id
            ));
            lines.push(String::new());
        }
        lines.join("\n")
    }
}
