//! In-memory document storage for testing.
//!
//! Thread-safe implementation of [`DocumentStore`] with switches for
//! simulating an unreachable backend and a non-atomic batch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{CahierError, Result};
use crate::storage::traits::{apply_write, is_direct_child, path_segments, Document, WriteOp};
use crate::storage::{DocumentStore, SetOptions};

/// In-memory document store.
///
/// Documents are kept in a `RwLock<BTreeMap>` keyed by path and are lost
/// when the store is dropped.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    documents: RwLock<BTreeMap<String, Document>>,
    atomic_batch: bool,
    unavailable: AtomicBool,
    /// Writes remaining before every further write fails; `usize::MAX` = off.
    writes_left: AtomicUsize,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// Create an empty store with atomic batches.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            atomic_batch: true,
            unavailable: AtomicBool::new(false),
            writes_left: AtomicUsize::new(usize::MAX),
        }
    }

    /// Create an empty store whose batches apply one write at a time.
    pub fn non_atomic() -> Self {
        Self {
            atomic_batch: false,
            ..Self::new()
        }
    }

    /// Make every operation fail as if the backend were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Let `count` more document writes succeed, then fail the rest.
    pub fn fail_writes_after(&self, count: usize) {
        self.writes_left.store(count, Ordering::SeqCst);
    }

    /// Remove any write failure set by [`fail_writes_after`](Self::fail_writes_after).
    pub fn clear_write_failures(&self) {
        self.writes_left.store(usize::MAX, Ordering::SeqCst);
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.read().map(|docs| docs.len()).unwrap_or(0)
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored paths, in order.
    pub fn paths(&self) -> Vec<String> {
        self.read()
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CahierError::backend("memory store is unavailable"));
        }
        Ok(())
    }

    fn take_write_permit(&self) -> Result<()> {
        let granted = self
            .writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok();
        if !granted {
            return Err(CahierError::backend("memory store rejected the write"));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Document>>> {
        self.documents
            .read()
            .map_err(|_| CahierError::backend("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Document>>> {
        self.documents
            .write()
            .map_err(|_| CahierError::backend("memory store lock poisoned"))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, path: &str) -> Result<Option<Document>> {
        path_segments(path)?;
        self.check_available()?;
        Ok(self.read()?.get(path).cloned())
    }

    fn set(&self, path: &str, document: &Document, options: SetOptions) -> Result<()> {
        path_segments(path)?;
        self.check_available()?;
        self.take_write_permit()?;
        let mut docs = self.write()?;
        let next = apply_write(docs.get(path), document, options);
        docs.insert(path.to_string(), next);
        Ok(())
    }

    fn query(
        &self,
        collection: &str,
        predicate: &dyn Fn(&Document) -> bool,
    ) -> Result<Vec<Document>> {
        self.check_available()?;
        let docs = self.read()?;
        Ok(docs
            .iter()
            .filter(|(path, doc)| is_direct_child(collection, path) && predicate(doc))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    fn delete(&self, path: &str) -> Result<()> {
        path_segments(path)?;
        self.check_available()?;
        self.write()?.remove(path);
        Ok(())
    }

    fn batch_write(&self, ops: &[WriteOp]) -> Result<()> {
        for op in ops {
            path_segments(&op.path)?;
        }
        self.check_available()?;

        if !self.atomic_batch {
            for op in ops {
                self.set(&op.path, &op.document, op.options)?;
            }
            return Ok(());
        }

        // Stage every write against a copy, then swap it in.
        for _ in ops {
            self.take_write_permit()?;
        }
        let mut docs = self.write()?;
        let mut staged = docs.clone();
        for op in ops {
            let next = apply_write(staged.get(&op.path), &op.document, op.options);
            staged.insert(op.path.clone(), next);
        }
        *docs = staged;
        Ok(())
    }

    fn supports_atomic_batch(&self) -> bool {
        self.atomic_batch
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
