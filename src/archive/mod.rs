//! Durable lesson and review-item archive.

pub mod clock;
pub mod content_archive;

pub use clock::{Clock, FixedClock, SystemClock};
pub use content_archive::{AddOutcome, ArchiveOutcome, ContentArchive, GroupSummary};

use crate::config::Config;
use crate::error::Result;
use crate::storage::StorageAdapter;

/// Open the archive for the session described by `config`.
pub fn open_archive(config: &Config) -> Result<ContentArchive> {
    Ok(ContentArchive::new(StorageAdapter::from_config(config)?))
}
