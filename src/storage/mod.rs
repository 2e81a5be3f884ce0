//! Document storage for cahier.
//!
//! This module provides the document store contract, file-based and
//! in-memory backends, and the adapter that routes between a local and a
//! remote store.

pub mod adapter;
pub mod file;
pub mod memory;
pub mod traits;

pub use adapter::{BackendSelection, StorageAdapter, ITEMS, LESSONS, SETTINGS_PATH};
pub use file::FileDocumentStore;
pub use memory::MemoryDocumentStore;
pub use traits::{Document, DocumentStore, SetOptions, WriteOp};
