//! Core domain types for cahier.
//!
//! This module holds the pure parts of the system: lesson content, content
//! identity, review items, the scheduling ladder and learner settings.
//! Nothing here touches storage.

pub mod content;
pub mod identity;
pub mod item;
pub mod schedule;
pub mod settings;

pub use content::{
    group_id, normalize_topic, parse_segments, Essay, Gender, GrammarEntry, GrammarExample,
    Lesson, LessonTexts, Level, LevelSizing, PhoneticSegment, TextLine, VocabEntry, VocabExample,
};
pub use identity::{canonical_surface, lesson_id, stable_id, vocab_dedup_key};
pub use item::{ItemFilter, ItemKind, Payload, ReviewItem};
pub use schedule::{schedule, Quality, DAY_MS, INTERVAL_DAYS, MAX_STRENGTH, MIN_STRENGTH};
pub use settings::{Credentials, ModelChoice, Settings, TtsProvider};
