//! Lesson generation seam.
//!
//! Content comes from an external generator that, given a topic and level,
//! returns structured lesson JSON. The core consumes its output as data; a
//! failed generation is reported once and never retried here.

pub mod parse;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::archive::{Clock, SystemClock};
use crate::core::{Credentials, Lesson, Level};
use crate::error::{CahierError, Result};

pub use parse::{extract_json, lesson_from_response, parse_response, strip_trailing_commas};

/// Produces a lesson for a topic and level.
pub trait LessonGenerator: Send + Sync {
    /// Generate one lesson. Failures are [`CahierError::Generation`].
    fn generate(&self, topic: &str, level: Level, credentials: &Credentials) -> Result<Lesson>;

    /// Generator name for logging.
    fn name(&self) -> &'static str;
}

/// Generator that replays a response saved to disk.
///
/// Needs no credentials.
pub struct ResponseFileGenerator {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl ResponseFileGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for the lesson creation time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl LessonGenerator for ResponseFileGenerator {
    fn generate(&self, topic: &str, level: Level, _credentials: &Credentials) -> Result<Lesson> {
        debug!(path = %self.path.display(), topic, level = %level, "Reading saved response");
        let text = fs::read_to_string(&self.path).map_err(|e| {
            CahierError::generation(format!(
                "cannot read response file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        lesson_from_response(&text, topic, level, self.clock.now_millis())
    }

    fn name(&self) -> &'static str {
        "response-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::FixedClock;
    use tempfile::TempDir;

    #[test]
    fn test_response_file_generator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("response.txt");
        fs::write(
            &path,
            r#"```json
{"title": "Au marché", "vocabulary": [{"word": "pomme[pɔm]", "meaning": "apple"},]}
```"#,
        )
        .unwrap();

        let generator =
            ResponseFileGenerator::new(&path).with_clock(Arc::new(FixedClock::new(99)));
        let lesson = generator
            .generate("Marché", Level::A2, &Credentials::default())
            .unwrap();

        assert_eq!(lesson.group_id, "marché__A2");
        assert_eq!(lesson.created_at, 99);
        assert_eq!(lesson.vocabulary.len(), 1);
        assert_eq!(generator.name(), "response-file");
    }

    #[test]
    fn test_missing_file_is_generation_error() {
        let dir = TempDir::new().unwrap();
        let generator = ResponseFileGenerator::new(dir.path().join("absent.json"));
        let err = generator
            .generate("Café", Level::A1, &Credentials::default())
            .unwrap_err();
        assert!(matches!(err, CahierError::Generation { .. }));
        assert!(!err.is_retryable());
    }
}
