//! Backend routing for cahier.
//!
//! The adapter presents one logical document store. With no cloud identity
//! every path goes to the local device store; with one, paths are scoped to
//! `users/<identity>/` on the remote store and remote reads and writes are
//! mirrored into the local store under `mirror/<identity>/`. The two
//! corpora are never merged.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::core::Settings;
use crate::error::{CahierError, FailOpen, Result};
use crate::storage::traits::{Document, WriteOp};
use crate::storage::{DocumentStore, FileDocumentStore, SetOptions};

/// Collection holding review items.
pub const ITEMS: &str = "items";

/// Collection holding archived lessons.
pub const LESSONS: &str = "lessons";

/// Path of the settings document, relative to the scope root.
pub const SETTINGS_PATH: &str = "settings/preferences";

/// Which physical backend a session talks to.
///
/// Fixed for the lifetime of an adapter; signing in or out means building
/// a new one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackendSelection {
    /// No cloud identity: device-local store only.
    #[default]
    Local,
    /// Signed in: remote store scoped by `identity`.
    Remote { identity: String },
}

impl BackendSelection {
    /// Select from an optional identity; blank identities count as absent.
    pub fn from_identity(identity: Option<&str>) -> Self {
        match identity.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self::Remote {
                identity: id.to_string(),
            },
            None => Self::Local,
        }
    }

    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::Local => None,
            Self::Remote { identity } => Some(identity),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// Routes document operations to the local or remote store.
#[derive(Clone)]
pub struct StorageAdapter {
    selection: BackendSelection,
    local: Arc<dyn DocumentStore>,
    remote: Option<Arc<dyn DocumentStore>>,
}

impl std::fmt::Debug for StorageAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAdapter")
            .field("selection", &self.selection)
            .field("local", &self.local.name())
            .field("remote", &self.remote.as_ref().map(|r| r.name()))
            .finish()
    }
}

impl StorageAdapter {
    /// Build an adapter for `selection`.
    ///
    /// A remote selection requires a remote store.
    pub fn new(
        selection: BackendSelection,
        local: Arc<dyn DocumentStore>,
        remote: Option<Arc<dyn DocumentStore>>,
    ) -> Result<Self> {
        if let BackendSelection::Remote { identity } = &selection {
            if identity.contains('/') || identity.starts_with('.') {
                return Err(CahierError::invalid_input(format!(
                    "invalid identity '{}'",
                    identity
                )));
            }
            if remote.is_none() {
                return Err(CahierError::config(
                    "an identity is set but no remote store is configured",
                ));
            }
        }
        debug!(selection = ?selection, local = local.name(), "Storage adapter ready");
        Ok(Self {
            selection,
            local,
            remote,
        })
    }

    /// Local-only adapter.
    pub fn local(local: Arc<dyn DocumentStore>) -> Self {
        Self {
            selection: BackendSelection::Local,
            local,
            remote: None,
        }
    }

    /// Open the file-backed stores named by `config`.
    ///
    /// The remote directory is only opened when an identity is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let selection = BackendSelection::from_identity(config.session.identity.as_deref());
        let local_dir = config
            .local_dir()
            .ok_or_else(|| CahierError::config("no local storage directory available"))?;
        let local: Arc<dyn DocumentStore> = Arc::new(FileDocumentStore::new(local_dir)?);

        let remote: Option<Arc<dyn DocumentStore>> = if selection.is_remote() {
            let remote_dir = config
                .remote_dir()
                .ok_or_else(|| CahierError::config("no remote storage directory available"))?;
            Some(Arc::new(FileDocumentStore::synced(remote_dir)?))
        } else {
            None
        };
        Self::new(selection, local, remote)
    }

    pub fn selection(&self) -> &BackendSelection {
        &self.selection
    }

    /// The store every operation is routed to, with its identity if remote.
    fn active(&self) -> (&dyn DocumentStore, Option<&str>) {
        match (&self.selection, &self.remote) {
            (BackendSelection::Remote { identity }, Some(remote)) => {
                (remote.as_ref(), Some(identity.as_str()))
            }
            _ => (self.local.as_ref(), None),
        }
    }

    /// Physical path for a path relative to the session scope.
    pub fn scoped(&self, path: &str) -> String {
        match self.active().1 {
            Some(identity) => format!("users/{}/{}", identity, path),
            None => path.to_string(),
        }
    }

    fn mirror_path(identity: &str, path: &str) -> String {
        format!("mirror/{}/{}", identity, path)
    }

    /// Copy remote documents into the local mirror. Failures are logged only.
    fn mirror(&self, identity: &str, entries: &[(String, Document)]) {
        if entries.is_empty() {
            return;
        }
        let ops: Vec<WriteOp> = entries
            .iter()
            .map(|(path, doc)| {
                WriteOp::new(
                    Self::mirror_path(identity, path),
                    doc.clone(),
                    SetOptions::replace(),
                )
            })
            .collect();
        self.local
            .batch_write(&ops)
            .fail_open_default("Failed to mirror remote documents locally");
    }

    /// Carry successful remote writes into the mirror.
    ///
    /// A merge is only applied over a document already mirrored, so the
    /// mirror never holds a partial patch as if it were a whole document.
    fn mirror_writes(&self, identity: &str, ops: &[WriteOp]) {
        let mut mirrored = Vec::with_capacity(ops.len());
        for op in ops {
            let path = Self::mirror_path(identity, &op.path);
            if op.options.merge {
                let existing = self
                    .local
                    .get(&path)
                    .fail_open_default("Failed to read mirrored document");
                if existing.is_none() {
                    continue;
                }
            }
            mirrored.push(WriteOp::new(path, op.document.clone(), op.options));
        }
        if mirrored.is_empty() {
            return;
        }
        self.local
            .batch_write(&mirrored)
            .fail_open_default("Failed to mirror remote write locally");
    }

    /// Make the mirror of `collection` match a full remote listing.
    ///
    /// Documents absent from `docs` were deleted elsewhere and are dropped.
    fn replace_mirror(&self, identity: &str, collection: &str, docs: &[Document]) {
        let entries: Vec<(String, Document)> = docs
            .iter()
            .filter_map(|doc| {
                mirror_key(doc).map(|id| (format!("{}/{}", collection, id), doc.clone()))
            })
            .collect();
        self.mirror(identity, &entries);

        let live: HashSet<&str> = docs.iter().filter_map(mirror_key).collect();
        let stale: Vec<String> = self
            .local
            .query(&Self::mirror_path(identity, collection), &|_| true)
            .fail_open_default("Failed to list mirrored documents")
            .iter()
            .filter_map(mirror_key)
            .filter(|id| !live.contains(id))
            .map(str::to_string)
            .collect();
        for id in stale {
            debug!(collection, id = %id, "Dropping stale mirrored document");
            self.local
                .delete(&Self::mirror_path(identity, &format!("{}/{}", collection, id)))
                .fail_open_default("Failed to drop stale mirrored document");
        }
    }

    /// Documents last mirrored from the remote store for `collection`.
    ///
    /// Empty when running local-only. This is a display fallback for when
    /// the remote store is unreachable; it is never written back.
    pub fn cached(&self, collection: &str) -> Result<Vec<Document>> {
        match self.selection.identity() {
            Some(identity) => self
                .local
                .query(&Self::mirror_path(identity, collection), &|_| true),
            None => Ok(Vec::new()),
        }
    }

    /// Settings for this session.
    ///
    /// Local settings overlaid by the remote copy when signed in; the merged
    /// result is written back locally. Never fails.
    pub fn load_settings(&self) -> Settings {
        let mut settings = self
            .local
            .get(SETTINGS_PATH)
            .map(|doc| {
                doc.map(|doc| Settings::default().overlay(&doc))
                    .unwrap_or_default()
            })
            .fail_open_with("Failed to read local settings", Settings::default());

        if let (Some(identity), Some(remote)) = (self.selection.identity(), &self.remote) {
            let path = format!("users/{}/{}", identity, SETTINGS_PATH);
            let synced = remote
                .get(&path)
                .fail_open_default("Failed to read synced settings");
            if let Some(doc) = synced {
                settings = settings.overlay(&doc);
                self.write_local_settings(&settings);
            }
        }
        settings
    }

    /// Persist settings locally and, when signed in, remotely.
    ///
    /// Only a local failure is reported; remote failures are logged.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let doc = serde_json::to_value(settings)?;
        self.local.set(SETTINGS_PATH, &doc, SetOptions::merge())?;

        if let (Some(identity), Some(remote)) = (self.selection.identity(), &self.remote) {
            let path = format!("users/{}/{}", identity, SETTINGS_PATH);
            remote
                .set(&path, &doc, SetOptions::merge())
                .fail_open_default("Failed to sync settings");
        }
        Ok(())
    }

    fn write_local_settings(&self, settings: &Settings) {
        match serde_json::to_value(settings) {
            Ok(doc) => self
                .local
                .set(SETTINGS_PATH, &doc, SetOptions::merge())
                .fail_open_default("Failed to cache synced settings"),
            Err(e) => warn!(error = %e, "Failed to encode settings"),
        }
    }
}

impl DocumentStore for StorageAdapter {
    fn get(&self, path: &str) -> Result<Option<Document>> {
        let (store, identity) = self.active();
        let doc = store.get(&self.scoped(path))?;
        if let (Some(identity), Some(doc)) = (identity, &doc) {
            self.mirror(identity, &[(path.to_string(), doc.clone())]);
        }
        Ok(doc)
    }

    fn set(&self, path: &str, document: &Document, options: SetOptions) -> Result<()> {
        let (store, identity) = self.active();
        store.set(&self.scoped(path), document, options)?;
        if let Some(identity) = identity {
            self.mirror_writes(identity, &[WriteOp::new(path, document.clone(), options)]);
        }
        Ok(())
    }

    fn query(
        &self,
        collection: &str,
        predicate: &dyn Fn(&Document) -> bool,
    ) -> Result<Vec<Document>> {
        let (store, identity) = self.active();
        let Some(identity) = identity else {
            let docs = store.query(&self.scoped(collection), predicate)?;
            debug!(collection, backend = store.name(), count = docs.len(), "Queried documents");
            return Ok(docs);
        };

        // Remote queries fetch the whole collection so the mirror can be
        // replaced, then filter locally.
        let all = store.query(&self.scoped(collection), &|_| true)?;
        debug!(collection, backend = store.name(), count = all.len(), "Queried documents");
        self.replace_mirror(identity, collection, &all);
        Ok(all.into_iter().filter(|doc| predicate(doc)).collect())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let (store, identity) = self.active();
        store.delete(&self.scoped(path))?;
        if let Some(identity) = identity {
            self.local
                .delete(&Self::mirror_path(identity, path))
                .fail_open_default("Failed to drop mirrored document");
        }
        Ok(())
    }

    fn batch_write(&self, ops: &[WriteOp]) -> Result<()> {
        let scoped: Vec<WriteOp> = ops
            .iter()
            .map(|op| WriteOp::new(self.scoped(&op.path), op.document.clone(), op.options))
            .collect();
        let (store, identity) = self.active();
        store.batch_write(&scoped)?;
        if let Some(identity) = identity {
            self.mirror_writes(identity, ops);
        }
        Ok(())
    }

    fn supports_atomic_batch(&self) -> bool {
        self.active().0.supports_atomic_batch()
    }

    fn name(&self) -> &'static str {
        self.active().0.name()
    }
}

/// Id under which a remote document is mirrored, if it has a usable one.
fn mirror_key(doc: &Document) -> Option<&str> {
    doc.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty() && !id.contains('/'))
}
