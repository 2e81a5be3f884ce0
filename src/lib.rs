//! Cahier - spaced-repetition archive for language lessons
//!
//! Cahier stores generated lessons, derives deduplicated review items from
//! them and schedules those items on a fixed interval ladder. Storage goes
//! through one adapter that routes to a device-local store or, when a cloud
//! identity is present, to a synced store.

pub mod archive;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod generation;
pub mod storage;

pub use archive::{open_archive, Clock, ContentArchive, FixedClock, SystemClock};
pub use config::Config;
pub use core::{
    ItemFilter, ItemKind, Lesson, Level, Payload, Quality, ReviewItem, Settings, VocabEntry,
};
pub use error::{CahierError, Result};
pub use generation::{LessonGenerator, ResponseFileGenerator};
pub use storage::{
    BackendSelection, DocumentStore, FileDocumentStore, MemoryDocumentStore, StorageAdapter,
};

// CLI commands
pub use cli::{
    DeleteCommand, GroupsCommand, ImportCommand, LessonsCommand, ListCommand, ReviewCommand,
    SettingsCommand,
};
