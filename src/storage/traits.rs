//! Document store trait for cahier.
//!
//! The archive reaches persistence only through this narrow CRUD + query
//! contract. Paths are `/`-separated (`items/vocab-1a2b3c4d`); a collection
//! is the path prefix one level above its documents.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{CahierError, Result};

/// A stored JSON document.
pub type Document = Value;

/// Options for a single document write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Merge top-level fields into the existing document instead of
    /// replacing it.
    pub merge: bool,
}

impl SetOptions {
    /// Replace the whole document.
    pub const fn replace() -> Self {
        Self { merge: false }
    }

    /// Shallow-merge into the existing document.
    pub const fn merge() -> Self {
        Self { merge: true }
    }
}

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub path: String,
    pub document: Document,
    pub options: SetOptions,
}

impl WriteOp {
    pub fn new(path: impl Into<String>, document: Document, options: SetOptions) -> Self {
        Self {
            path: path.into(),
            document,
            options,
        }
    }
}

/// Trait for document store backends.
///
/// Implementations must be thread-safe. Deleting a missing document is not
/// an error.
pub trait DocumentStore: Send + Sync {
    /// Read a document. Returns `Ok(None)` if it doesn't exist.
    fn get(&self, path: &str) -> Result<Option<Document>>;

    /// Write a document.
    fn set(&self, path: &str, document: &Document, options: SetOptions) -> Result<()>;

    /// All documents directly inside `collection` that satisfy `predicate`.
    fn query(&self, collection: &str, predicate: &dyn Fn(&Document) -> bool)
        -> Result<Vec<Document>>;

    /// Delete a document.
    fn delete(&self, path: &str) -> Result<()>;

    /// Apply several writes.
    ///
    /// All-or-nothing only when [`supports_atomic_batch`](Self::supports_atomic_batch)
    /// is true; otherwise a failure may leave a prefix of `ops` applied.
    fn batch_write(&self, ops: &[WriteOp]) -> Result<()>;

    /// Whether `batch_write` is atomic.
    fn supports_atomic_batch(&self) -> bool {
        false
    }

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn get(&self, path: &str) -> Result<Option<Document>> {
        (**self).get(path)
    }

    fn set(&self, path: &str, document: &Document, options: SetOptions) -> Result<()> {
        (**self).set(path, document, options)
    }

    fn query(
        &self,
        collection: &str,
        predicate: &dyn Fn(&Document) -> bool,
    ) -> Result<Vec<Document>> {
        (**self).query(collection, predicate)
    }

    fn delete(&self, path: &str) -> Result<()> {
        (**self).delete(path)
    }

    fn batch_write(&self, ops: &[WriteOp]) -> Result<()> {
        (**self).batch_write(ops)
    }

    fn supports_atomic_batch(&self) -> bool {
        (**self).supports_atomic_batch()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Compute the document that a write leaves behind.
///
/// With `merge`, top-level fields of `incoming` overwrite those of
/// `existing` and the rest are kept; without it, `incoming` wins outright.
pub fn apply_write(existing: Option<&Document>, incoming: &Document, options: SetOptions) -> Document {
    match (options.merge, existing, incoming) {
        (true, Some(Value::Object(current)), Value::Object(update)) => {
            let mut merged = current.clone();
            for (key, value) in update {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

/// Split a document path into its segments, rejecting unsafe ones.
pub fn path_segments(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('/').collect();
    let valid = segments.iter().all(|s| {
        !s.is_empty() && !s.starts_with('.') && !s.contains('\\') && !s.contains('\0')
    });
    if !valid {
        return Err(CahierError::invalid_input(format!(
            "invalid document path '{}'",
            path
        )));
    }
    Ok(segments)
}

/// Whether `path` names a document directly inside `collection`.
pub fn is_direct_child(collection: &str, path: &str) -> bool {
    path.strip_prefix(collection)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|leaf| !leaf.is_empty() && !leaf.contains('/'))
}
