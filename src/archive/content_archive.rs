//! The content archive: lessons and review items for one learner.
//!
//! All writes go through [`StorageAdapter`], so the same archive code serves
//! the local and the synced corpus. Derived review items are computed in
//! full before any write, and every write is keyed by a content-derived id;
//! re-running an interrupted operation completes it instead of duplicating.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use crate::core::{
    schedule, GrammarEntry, ItemFilter, ItemKind, Lesson, Quality, ReviewItem, TextLine,
    VocabEntry,
};
use crate::error::{CahierError, Result};
use crate::storage::{Document, DocumentStore, SetOptions, StorageAdapter, WriteOp, ITEMS, LESSONS};

/// Result of adding review items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    /// Items written (new items, or superseded ones for grammar and text).
    pub added: usize,
    /// Vocabulary entries dropped as duplicates.
    pub skipped: usize,
}

/// Result of archiving a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveOutcome {
    pub lesson_id: String,
    /// False when the lesson was already archived and nothing was written.
    pub lesson_stored: bool,
    pub vocabulary: AddOutcome,
}

/// Review item count for one lesson group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub group_id: String,
    pub count: usize,
    pub due: usize,
}

/// Lessons and review items, persisted through a [`StorageAdapter`].
pub struct ContentArchive<C: Clock = SystemClock> {
    storage: StorageAdapter,
    clock: C,
}

impl ContentArchive<SystemClock> {
    /// Archive on wall-clock time.
    pub fn new(storage: StorageAdapter) -> Self {
        Self::with_clock(storage, SystemClock)
    }
}

impl<C: Clock> ContentArchive<C> {
    pub fn with_clock(storage: StorageAdapter, clock: C) -> Self {
        Self { storage, clock }
    }

    pub fn storage(&self) -> &StorageAdapter {
        &self.storage
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Store a lesson and seed review items for its vocabulary.
    ///
    /// A lesson whose id is already stored is left alone. Otherwise the new
    /// vocabulary items and the lesson are written in one batch, lesson
    /// last, so an interrupted call can simply be repeated.
    pub fn archive_lesson(&self, lesson: &Lesson) -> Result<ArchiveOutcome> {
        let lesson_path = document_path(LESSONS, &lesson.id)?;
        if self.storage.get(&lesson_path)?.is_some() {
            debug!(lesson_id = %lesson.id, "Lesson already archived");
            return Ok(ArchiveOutcome {
                lesson_id: lesson.id.clone(),
                lesson_stored: false,
                vocabulary: AddOutcome::default(),
            });
        }

        let now = self.clock.now_millis();
        let (items, skipped) =
            self.plan_vocabulary(&lesson.group_id, Some(&lesson.id), &lesson.vocabulary, now)?;

        let mut ops = new_item_ops(&items)?;
        ops.push(WriteOp::new(
            lesson_path,
            serde_json::to_value(lesson)?,
            SetOptions::replace(),
        ));
        self.storage.batch_write(&ops)?;

        let vocabulary = AddOutcome {
            added: items.len(),
            skipped,
        };
        info!(
            lesson_id = %lesson.id,
            group_id = %lesson.group_id,
            added = vocabulary.added,
            skipped = vocabulary.skipped,
            backend = self.storage.name(),
            "Archived lesson"
        );
        Ok(ArchiveOutcome {
            lesson_id: lesson.id.clone(),
            lesson_stored: true,
            vocabulary,
        })
    }

    /// Add vocabulary to a group, skipping words the group already has.
    ///
    /// Duplicates are detected by surface form against stored items and
    /// within `entries` itself; only the first occurrence is added.
    pub fn add_vocabulary(
        &self,
        group_id: &str,
        source_lesson_id: Option<&str>,
        entries: &[VocabEntry],
    ) -> Result<AddOutcome> {
        if entries.is_empty() {
            return Ok(AddOutcome::default());
        }

        let now = self.clock.now_millis();
        let (items, skipped) = self.plan_vocabulary(group_id, source_lesson_id, entries, now)?;
        if !items.is_empty() {
            self.storage.batch_write(&new_item_ops(&items)?)?;
        }

        let outcome = AddOutcome {
            added: items.len(),
            skipped,
        };
        debug!(group_id, added = outcome.added, skipped = outcome.skipped, "Added vocabulary");
        Ok(outcome)
    }

    /// Add or supersede grammar items.
    ///
    /// Entries whose id already exists replace the stored content but keep
    /// the item's review progress.
    pub fn add_grammar(
        &self,
        group_id: &str,
        source_lesson_id: Option<&str>,
        entries: &[GrammarEntry],
    ) -> Result<AddOutcome> {
        if entries.is_empty() {
            return Ok(AddOutcome::default());
        }
        let now = self.clock.now_millis();
        let items: Vec<ReviewItem> = entries
            .iter()
            .map(|entry| ReviewItem::grammar(group_id, source_lesson_id, entry.clone(), now))
            .collect();
        self.upsert(group_id, ItemKind::Grammar, &items)
    }

    /// Add or supersede text items. Same policy as [`add_grammar`](Self::add_grammar).
    pub fn add_text(
        &self,
        group_id: &str,
        source_lesson_id: Option<&str>,
        lines: &[TextLine],
    ) -> Result<AddOutcome> {
        if lines.is_empty() {
            return Ok(AddOutcome::default());
        }
        let now = self.clock.now_millis();
        let items: Vec<ReviewItem> = lines
            .iter()
            .map(|line| ReviewItem::text(group_id, source_lesson_id, line.clone(), now))
            .collect();
        self.upsert(group_id, ItemKind::Text, &items)
    }

    /// Items matching `filter`, newest first.
    pub fn list_items(&self, filter: &ItemFilter) -> Result<Vec<ReviewItem>> {
        let docs = self
            .storage
            .query(ITEMS, &|doc: &Document| filter.matches_document(doc))?;
        let mut items = decode_items(&docs);
        sort_newest_first(&mut items);
        Ok(items)
    }

    /// Items matching `filter` that are due now, most overdue first.
    ///
    /// Items without a readable next-review time are never due.
    pub fn due_queue(&self, filter: &ItemFilter) -> Result<Vec<ReviewItem>> {
        let now = self.clock.now_millis();
        let mut due: Vec<ReviewItem> = self
            .list_items(filter)?
            .into_iter()
            .filter(|item| item.is_due(now))
            .collect();
        due.sort_by(|a, b| {
            a.next_review_at
                .cmp(&b.next_review_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(due)
    }

    /// Delete an item. Deleting an unknown id is not an error.
    pub fn delete_item(&self, id: &str) -> Result<()> {
        self.storage.delete(&document_path(ITEMS, id)?)?;
        debug!(item_id = %id, "Deleted item");
        Ok(())
    }

    /// Item counts per group, ordered by group id.
    pub fn list_groups(&self) -> Result<Vec<GroupSummary>> {
        let now = self.clock.now_millis();
        let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for item in self.list_items(&ItemFilter::all())? {
            let entry = counts.entry(item.group_id.clone()).or_default();
            entry.0 += 1;
            if item.is_due(now) {
                entry.1 += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|(group_id, (count, due))| GroupSummary {
                group_id,
                count,
                due,
            })
            .collect())
    }

    /// Grade an item and persist its new schedule.
    ///
    /// Only the scheduling fields are written. Concurrent reviews of the same
    /// item from two devices are last-writer-wins.
    pub fn review(&self, id: &str, quality: Quality) -> Result<ReviewItem> {
        let path = document_path(ITEMS, id)?;
        let doc = self
            .storage
            .get(&path)?
            .ok_or_else(|| CahierError::item_not_found(id))?;
        let item = ReviewItem::from_document(&doc)?;

        let updated = schedule(&item, quality, self.clock.now_millis());
        let patch = json!({
            "srsLevel": updated.strength_level,
            "nextReview": updated.next_review_at,
        });
        self.storage.set(&path, &patch, SetOptions::merge())?;

        info!(
            item_id = %id,
            quality = %quality,
            from = item.strength_level,
            to = updated.strength_level,
            "Reviewed item"
        );
        Ok(updated)
    }

    pub fn get_item(&self, id: &str) -> Result<Option<ReviewItem>> {
        self.storage
            .get(&document_path(ITEMS, id)?)?
            .map(|doc| ReviewItem::from_document(&doc))
            .transpose()
    }

    /// Archived lessons, newest first.
    pub fn list_lessons(&self) -> Result<Vec<Lesson>> {
        let docs = self.storage.query(LESSONS, &|_: &Document| true)?;
        let mut lessons: Vec<Lesson> = docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc_id(&doc).to_string();
                match serde_json::from_value::<Lesson>(doc) {
                    Ok(lesson) => Some(lesson),
                    Err(e) => {
                        warn!(lesson_id = %id, error = %e, "Skipping malformed lesson");
                        None
                    }
                }
            })
            .collect();
        lessons.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(lessons)
    }

    pub fn get_lesson(&self, id: &str) -> Result<Option<Lesson>> {
        match self.storage.get(&document_path(LESSONS, id)?)? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Items last mirrored from the synced store, newest first.
    ///
    /// Read-only fallback for when the remote store cannot be reached.
    pub fn cached_items(&self) -> Result<Vec<ReviewItem>> {
        let mut items = decode_items(&self.storage.cached(ITEMS)?);
        sort_newest_first(&mut items);
        Ok(items)
    }

    /// New vocabulary items for `entries`, and how many were duplicates.
    fn plan_vocabulary(
        &self,
        group_id: &str,
        source_lesson_id: Option<&str>,
        entries: &[VocabEntry],
        now: i64,
    ) -> Result<(Vec<ReviewItem>, usize)> {
        if entries.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let filter = ItemFilter::group(group_id).with_kind(ItemKind::Vocabulary);
        let existing = self
            .storage
            .query(ITEMS, &|doc: &Document| filter.matches_document(doc))?;
        let mut seen_keys: HashSet<String> = existing
            .iter()
            .filter_map(|doc| doc.get("dedupKey").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        let mut seen_ids: HashSet<String> = existing
            .iter()
            .map(|doc| doc_id(doc).to_string())
            .collect();

        let mut items = Vec::new();
        let mut skipped = 0;
        for entry in entries {
            let item = ReviewItem::vocabulary(group_id, source_lesson_id, entry.clone(), now);
            let key = item.dedup_key.clone().unwrap_or_default();
            if seen_keys.contains(&key) || seen_ids.contains(&item.id) {
                skipped += 1;
                continue;
            }
            seen_keys.insert(key);
            seen_ids.insert(item.id.clone());
            items.push(item);
        }
        Ok((items, skipped))
    }

    fn upsert(&self, group_id: &str, kind: ItemKind, items: &[ReviewItem]) -> Result<AddOutcome> {
        let filter = ItemFilter::group(group_id).with_kind(kind);
        let mut stored: HashSet<String> = self
            .storage
            .query(ITEMS, &|doc: &Document| filter.matches_document(doc))?
            .iter()
            .map(|doc| doc_id(doc).to_string())
            .collect();

        let mut written: HashSet<&str> = HashSet::new();
        let mut ops = Vec::with_capacity(items.len());
        for item in items {
            let path = document_path(ITEMS, &item.id)?;
            // Existing items keep their review progress.
            let op = if stored.contains(&item.id) {
                WriteOp::new(path, item.content_document()?, SetOptions::merge())
            } else {
                stored.insert(item.id.clone());
                WriteOp::new(path, item.to_document()?, SetOptions::replace())
            };
            written.insert(&item.id);
            ops.push(op);
        }
        self.storage.batch_write(&ops)?;

        let outcome = AddOutcome {
            added: written.len(),
            skipped: 0,
        };
        debug!(group_id, kind = %kind, added = outcome.added, "Upserted items");
        Ok(outcome)
    }
}

/// `<collection>/<id>`, rejecting ids that would escape the collection.
fn document_path(collection: &str, id: &str) -> Result<String> {
    if id.is_empty() || id.contains('/') || id.starts_with('.') {
        return Err(CahierError::invalid_input(format!("invalid id '{}'", id)));
    }
    Ok(format!("{}/{}", collection, id))
}

fn doc_id(doc: &Document) -> &str {
    doc.get("id").and_then(Value::as_str).unwrap_or("")
}

fn new_item_ops(items: &[ReviewItem]) -> Result<Vec<WriteOp>> {
    items
        .iter()
        .map(|item| {
            Ok(WriteOp::new(
                document_path(ITEMS, &item.id)?,
                item.to_document()?,
                SetOptions::replace(),
            ))
        })
        .collect()
}

fn decode_items(docs: &[Document]) -> Vec<ReviewItem> {
    docs.iter()
        .filter_map(|doc| match ReviewItem::from_document(doc) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(item_id = %doc_id(doc), error = %e, "Skipping malformed review item");
                None
            }
        })
        .collect()
}

fn sort_newest_first(items: &mut [ReviewItem]) {
    items.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
