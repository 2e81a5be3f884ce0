//! File-based document storage for cahier.
//!
//! Each document is a JSON file: `items/vocab-1a2b3c4d` lives at
//! `<root>/items/vocab-1a2b3c4d.json`. Single writes go through temp file +
//! rename. A synced store additionally stages every file of a batch before
//! renaming any of them, so a failed batch leaves nothing behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CahierError, Result};
use crate::storage::traits::{apply_write, path_segments, Document, WriteOp};
use crate::storage::{DocumentStore, SetOptions};

/// File-based document store.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    /// Directory under which documents are stored.
    root: PathBuf,
    /// Whether batches are staged and committed together.
    synced: bool,
}

impl FileDocumentStore {
    /// Create a store in `root` whose batches write one document at a time.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open(root.into(), false)
    }

    /// Create a store in `root` with all-or-nothing batches.
    pub fn synced(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open(root.into(), true)
    }

    fn open(root: PathBuf, synced: bool) -> Result<Self> {
        if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| CahierError::storage(&root, e))?;
        }
        Ok(Self { root, synced })
    }

    /// The directory this store writes under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a document path.
    fn document_path(&self, path: &str) -> Result<PathBuf> {
        let segments = path_segments(path)?;
        let (leaf, parents) = segments
            .split_last()
            .ok_or_else(|| CahierError::invalid_input("empty document path"))?;
        let mut file = self.root.clone();
        for segment in parents {
            file.push(segment);
        }
        file.push(format!("{}.json", leaf));
        Ok(file)
    }

    /// Temp file used while writing `final_path`.
    fn temp_path(final_path: &Path) -> PathBuf {
        let name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        final_path.with_file_name(format!(".{}.tmp", name))
    }

    fn read_document(path: &Path) -> Result<Option<Document>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|e| CahierError::storage(path, e))?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write `document` to the temp file for `final_path` and return it.
    fn stage(final_path: &Path, document: &Document) -> Result<PathBuf> {
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).map_err(|e| CahierError::storage(parent, e))?;
        }
        let temp_path = Self::temp_path(final_path);
        let json = serde_json::to_string_pretty(document)?;

        let mut file =
            fs::File::create(&temp_path).map_err(|e| CahierError::storage(&temp_path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| CahierError::storage(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| CahierError::storage(&temp_path, e))?;

        Ok(temp_path)
    }

    fn commit(temp_path: &Path, final_path: &Path) -> Result<()> {
        // Rename is atomic on POSIX
        fs::rename(temp_path, final_path).map_err(|e| CahierError::storage(final_path, e))
    }

    fn atomic_write(&self, path: &str, document: &Document, options: SetOptions) -> Result<()> {
        let final_path = self.document_path(path)?;
        let existing = if options.merge {
            Self::read_document(&final_path)?
        } else {
            None
        };
        let next = apply_write(existing.as_ref(), document, options);
        let temp_path = Self::stage(&final_path, &next)?;
        Self::commit(&temp_path, &final_path)
    }

    fn staged_batch(&self, ops: &[WriteOp]) -> Result<()> {
        // Resolve merges in order so later ops see earlier ones.
        let mut pending: Vec<(PathBuf, Document)> = Vec::with_capacity(ops.len());
        for op in ops {
            let final_path = self.document_path(&op.path)?;
            let existing = match pending.iter().rev().find(|(p, _)| *p == final_path) {
                Some((_, doc)) => Some(doc.clone()),
                None if op.options.merge => Self::read_document(&final_path)?,
                None => None,
            };
            let next = apply_write(existing.as_ref(), &op.document, op.options);
            pending.retain(|(p, _)| *p != final_path);
            pending.push((final_path, next));
        }

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(pending.len());
        for (final_path, document) in &pending {
            match Self::stage(final_path, document) {
                Ok(temp_path) => staged.push((temp_path, final_path.clone())),
                Err(e) => {
                    for (temp_path, _) in &staged {
                        let _ = fs::remove_file(temp_path);
                    }
                    return Err(e);
                }
            }
        }

        for (temp_path, final_path) in &staged {
            Self::commit(temp_path, final_path)?;
        }
        Ok(())
    }
}

impl DocumentStore for FileDocumentStore {
    fn get(&self, path: &str) -> Result<Option<Document>> {
        Self::read_document(&self.document_path(path)?)
    }

    fn set(&self, path: &str, document: &Document, options: SetOptions) -> Result<()> {
        self.atomic_write(path, document, options)
    }

    fn query(
        &self,
        collection: &str,
        predicate: &dyn Fn(&Document) -> bool,
    ) -> Result<Vec<Document>> {
        let mut dir = self.root.clone();
        for segment in path_segments(collection)? {
            dir.push(segment);
        }
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        let entries = fs::read_dir(&dir).map_err(|e| CahierError::storage(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CahierError::storage(&dir, e))?;
            let path = entry.path();

            // Skip subcollections, non-JSON files and temp files
            if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
            {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .map_err(CahierError::from)
                .and_then(|content| Ok(serde_json::from_str::<Document>(&content)?));
            match parsed {
                Ok(doc) => {
                    if predicate(&doc) {
                        documents.push(doc);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                }
            }
        }

        Ok(documents)
    }

    fn delete(&self, path: &str) -> Result<()> {
        let final_path = self.document_path(path)?;
        if final_path.exists() {
            fs::remove_file(&final_path).map_err(|e| CahierError::storage(&final_path, e))?;
        }

        // Also clean up any temp file
        let temp_path = Self::temp_path(&final_path);
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        Ok(())
    }

    fn batch_write(&self, ops: &[WriteOp]) -> Result<()> {
        for op in ops {
            self.document_path(&op.path)?;
        }
        if self.synced {
            return self.staged_batch(ops);
        }
        for op in ops {
            self.atomic_write(&op.path, &op.document, op.options)?;
        }
        Ok(())
    }

    fn supports_atomic_batch(&self) -> bool {
        self.synced
    }

    fn name(&self) -> &'static str {
        if self.synced {
            "synced-file"
        } else {
            "file"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::test_document_store_contract;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (FileDocumentStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::new(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn test_file_store_contract() {
        let (store, _dir) = create_test_store();
        test_document_store_contract(&store);
    }

    #[test]
    fn test_synced_store_contract() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::synced(dir.path()).unwrap();
        assert!(store.supports_atomic_batch());
        test_document_store_contract(&store);
    }

    #[test]
    fn test_new_creates_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("store");
        assert!(!root.exists());

        let store = FileDocumentStore::new(&root).unwrap();

        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[test]
    fn test_document_path_layout() {
        let (store, dir) = create_test_store();
        let path = store.document_path("users/u1/items/vocab-1").unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("users")
                .join("u1")
                .join("items")
                .join("vocab-1.json")
        );
    }

    #[test]
    fn test_written_file_is_valid_json() {
        let (store, dir) = create_test_store();
        store
            .set("items/a", &json!({"id": "a"}), SetOptions::replace())
            .unwrap();

        let content = fs::read_to_string(dir.path().join("items").join("a.json")).unwrap();
        let parsed: Document = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["id"], json!("a"));
        assert!(!dir.path().join("items").join(".a.json.tmp").exists());
    }

    #[test]
    fn test_query_ignores_temp_and_invalid_files() {
        let (store, dir) = create_test_store();
        store
            .set("items/valid", &json!({"id": "valid"}), SetOptions::replace())
            .unwrap();

        let items = dir.path().join("items");
        fs::write(items.join(".stale.json.tmp"), "{}").unwrap();
        fs::write(items.join("broken.json"), "not valid json").unwrap();
        fs::write(items.join("notes.txt"), "hello").unwrap();

        let docs = store.query("items", &|_| true).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], json!("valid"));
    }

    #[test]
    fn test_get_invalid_json_is_error() {
        let (store, dir) = create_test_store();
        fs::create_dir_all(dir.path().join("items")).unwrap();
        fs::write(dir.path().join("items").join("bad.json"), "{").unwrap();
        assert!(store.get("items/bad").is_err());
    }

    #[test]
    fn test_synced_batch_failure_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::synced(dir.path()).unwrap();

        // A regular file where a collection directory is needed
        fs::write(dir.path().join("blocked"), "x").unwrap();

        let result = store.batch_write(&[
            WriteOp::new("items/a", json!({"id": "a"}), SetOptions::replace()),
            WriteOp::new("blocked/b", json!({"id": "b"}), SetOptions::replace()),
        ]);
        assert!(result.is_err());
        assert!(store.get("items/a").unwrap().is_none());
        assert!(!dir.path().join("items").join(".a.json.tmp").exists());
    }

    #[test]
    fn test_plain_batch_failure_keeps_prefix() {
        let (store, dir) = create_test_store();
        fs::write(dir.path().join("blocked"), "x").unwrap();

        let result = store.batch_write(&[
            WriteOp::new("items/a", json!({"id": "a"}), SetOptions::replace()),
            WriteOp::new("blocked/b", json!({"id": "b"}), SetOptions::replace()),
        ]);
        assert!(result.is_err());
        assert!(store.get("items/a").unwrap().is_some());
    }

    #[test]
    fn test_synced_batch_merges_in_order() {
        let dir = TempDir::new().unwrap();
        let store = FileDocumentStore::synced(dir.path()).unwrap();
        store
            .set("items/a", &json!({"x": 1, "y": 1}), SetOptions::replace())
            .unwrap();

        store
            .batch_write(&[
                WriteOp::new("items/a", json!({"y": 2}), SetOptions::merge()),
                WriteOp::new("items/a", json!({"z": 3}), SetOptions::merge()),
            ])
            .unwrap();

        assert_eq!(
            store.get("items/a").unwrap().unwrap(),
            json!({"x": 1, "y": 2, "z": 3})
        );
    }

    #[test]
    fn test_delete_cleans_temp_file() {
        let (store, dir) = create_test_store();
        store
            .set("items/a", &json!({}), SetOptions::replace())
            .unwrap();
        let temp = dir.path().join("items").join(".a.json.tmp");
        fs::write(&temp, "{}").unwrap();

        store.delete("items/a").unwrap();

        assert!(!temp.exists());
        assert!(store.get("items/a").unwrap().is_none());
    }
}
