//! Review items: the unit the scheduler operates on.
//!
//! Items are persisted as JSON documents with the field names `id`,
//! `groupId`, `sourceLessonId`, `type`, `dedupKey`, `content`, `createdAt`,
//! `srsLevel` and `nextReview`. Reading is lenient about the scheduling
//! fields so a partially corrupted document stays visible.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::content::{GrammarEntry, TextLine, VocabEntry};
use super::identity::{
    canonical_surface, grammar_raw_key, stable_id, text_raw_key, vocab_dedup_key,
};
use crate::error::{CahierError, Result};

/// Kind of review item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    #[serde(rename = "vocab", alias = "vocabulary")]
    Vocabulary,
    #[serde(rename = "grammar")]
    Grammar,
    #[serde(rename = "text")]
    Text,
}

impl ItemKind {
    /// The persisted discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Vocabulary => "vocab",
            ItemKind::Grammar => "grammar",
            ItemKind::Text => "text",
        }
    }

    pub fn all() -> &'static [ItemKind] {
        &[ItemKind::Vocabulary, ItemKind::Grammar, ItemKind::Text]
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = CahierError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vocab" | "vocabulary" => Ok(ItemKind::Vocabulary),
            "grammar" => Ok(ItemKind::Grammar),
            "text" => Ok(ItemKind::Text),
            other => Err(CahierError::invalid_input(format!(
                "unknown item kind '{}'",
                other
            ))),
        }
    }
}

/// Kind-specific content of a review item.
///
/// The archive and scheduler never look inside; only display code matches
/// on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Vocabulary(VocabEntry),
    Grammar(GrammarEntry),
    Text(TextLine),
}

impl Payload {
    pub fn kind(&self) -> ItemKind {
        match self {
            Payload::Vocabulary(_) => ItemKind::Vocabulary,
            Payload::Grammar(_) => ItemKind::Grammar,
            Payload::Text(_) => ItemKind::Text,
        }
    }

    /// Headline shown for the item in lists and review prompts.
    pub fn title(&self) -> String {
        match self {
            Payload::Vocabulary(entry) => canonical_surface(&entry.word),
            Payload::Grammar(entry) => entry.point.clone(),
            Payload::Text(line) => canonical_surface(&line.text),
        }
    }

    /// Secondary line: meaning, example or translation.
    pub fn subtitle(&self) -> String {
        match self {
            Payload::Vocabulary(entry) => entry.meaning.clone(),
            Payload::Grammar(entry) => canonical_surface(&entry.example.text),
            Payload::Text(line) => line.translation.clone(),
        }
    }

    fn to_value(&self) -> Result<Value> {
        let value = match self {
            Payload::Vocabulary(entry) => serde_json::to_value(entry)?,
            Payload::Grammar(entry) => serde_json::to_value(entry)?,
            Payload::Text(line) => serde_json::to_value(line)?,
        };
        Ok(value)
    }

    fn from_value(kind: ItemKind, value: Value) -> Result<Self> {
        let payload = match kind {
            ItemKind::Vocabulary => Payload::Vocabulary(serde_json::from_value(value)?),
            ItemKind::Grammar => Payload::Grammar(serde_json::from_value(value)?),
            ItemKind::Text => Payload::Text(serde_json::from_value(value)?),
        };
        Ok(payload)
    }
}

/// One vocabulary word, grammar point or text line under review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewItem {
    pub id: String,
    pub group_id: String,
    pub source_lesson_id: Option<String>,
    /// Present only for vocabulary items.
    pub dedup_key: Option<String>,
    pub payload: Payload,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Recall strength, 0..=5 for well-formed items. Stored values outside
    /// that range are kept as read and clamped when scheduled.
    pub strength_level: i32,
    /// `None` only when the stored value was missing or unreadable; such an
    /// item is listed but never due.
    pub next_review_at: Option<i64>,
}

impl ReviewItem {
    /// New vocabulary item, immediately due.
    pub fn vocabulary(
        group_id: &str,
        source_lesson_id: Option<&str>,
        entry: VocabEntry,
        now: i64,
    ) -> Self {
        let dedup_key = vocab_dedup_key(&entry);
        let id = stable_id(group_id, ItemKind::Vocabulary, &dedup_key);
        Self::fresh(
            id,
            group_id,
            source_lesson_id,
            Some(dedup_key),
            Payload::Vocabulary(entry),
            now,
        )
    }

    /// New grammar item, immediately due.
    pub fn grammar(
        group_id: &str,
        source_lesson_id: Option<&str>,
        entry: GrammarEntry,
        now: i64,
    ) -> Self {
        let id = stable_id(group_id, ItemKind::Grammar, &grammar_raw_key(&entry));
        Self::fresh(
            id,
            group_id,
            source_lesson_id,
            None,
            Payload::Grammar(entry),
            now,
        )
    }

    /// New text item, immediately due.
    pub fn text(group_id: &str, source_lesson_id: Option<&str>, line: TextLine, now: i64) -> Self {
        let id = stable_id(group_id, ItemKind::Text, &text_raw_key(&line));
        Self::fresh(
            id,
            group_id,
            source_lesson_id,
            None,
            Payload::Text(line),
            now,
        )
    }

    fn fresh(
        id: String,
        group_id: &str,
        source_lesson_id: Option<&str>,
        dedup_key: Option<String>,
        payload: Payload,
        now: i64,
    ) -> Self {
        Self {
            id,
            group_id: group_id.to_string(),
            source_lesson_id: source_lesson_id.map(str::to_string),
            dedup_key,
            payload,
            created_at: now,
            strength_level: 0,
            next_review_at: Some(now),
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.payload.kind()
    }

    /// Whether the item is eligible for review at `now`.
    pub fn is_due(&self, now: i64) -> bool {
        self.next_review_at.is_some_and(|at| at <= now)
    }

    /// Serialize to the persisted document shape.
    pub fn to_document(&self) -> Result<Value> {
        let doc = ItemDocument {
            id: &self.id,
            group_id: &self.group_id,
            source_lesson_id: self.source_lesson_id.as_deref(),
            kind: self.kind(),
            dedup_key: self.dedup_key.as_deref(),
            content: self.payload.to_value()?,
            created_at: self.created_at,
            strength_level: self.strength_level,
            next_review_at: self.next_review_at,
        };
        Ok(serde_json::to_value(doc)?)
    }

    /// The document fields that carry content but no scheduling state.
    ///
    /// Merged over an existing document, this supersedes the content and
    /// leaves `srsLevel`, `nextReview` and `createdAt` alone.
    pub fn content_document(&self) -> Result<Value> {
        let mut doc = self.to_document()?;
        if let Value::Object(map) = &mut doc {
            map.remove("createdAt");
            map.remove("srsLevel");
            map.remove("nextReview");
        }
        Ok(doc)
    }

    /// Decode a stored document.
    ///
    /// Fails only when the id, kind or content cannot be decoded; bad
    /// scheduling fields degrade instead.
    pub fn from_document(doc: &Value) -> Result<Self> {
        let stored: StoredItem = serde_json::from_value(doc.clone())?;
        let payload = Payload::from_value(stored.kind, stored.content)?;
        let strength_level = stored
            .strength_level
            .map(|level| level.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
            .unwrap_or(0);

        Ok(Self {
            id: stored.id,
            group_id: stored.group_id,
            source_lesson_id: stored.source_lesson_id,
            dedup_key: stored.dedup_key,
            payload,
            created_at: stored.created_at.unwrap_or(0),
            strength_level,
            next_review_at: stored.next_review_at,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemDocument<'a> {
    id: &'a str,
    group_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lesson_id: Option<&'a str>,
    #[serde(rename = "type")]
    kind: ItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    dedup_key: Option<&'a str>,
    content: Value,
    created_at: i64,
    #[serde(rename = "srsLevel")]
    strength_level: i32,
    #[serde(rename = "nextReview")]
    next_review_at: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredItem {
    id: String,
    #[serde(default)]
    group_id: String,
    #[serde(default, alias = "courseId")]
    source_lesson_id: Option<String>,
    #[serde(rename = "type")]
    kind: ItemKind,
    #[serde(default)]
    dedup_key: Option<String>,
    #[serde(default)]
    content: Value,
    #[serde(default, deserialize_with = "lenient_millis")]
    created_at: Option<i64>,
    #[serde(
        default,
        rename = "srsLevel",
        alias = "srs_level",
        deserialize_with = "lenient_millis"
    )]
    strength_level: Option<i64>,
    #[serde(
        default,
        rename = "nextReview",
        alias = "next_review",
        deserialize_with = "lenient_millis"
    )]
    next_review_at: Option<i64>,
}

/// Integers, integral floats and numeric strings decode; anything else is `None`.
fn lenient_millis<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

/// Optional narrowing of item listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub kind: Option<ItemKind>,
    pub group_id: Option<String>,
}

impl ItemFilter {
    /// Match everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kind(kind: ItemKind) -> Self {
        Self {
            kind: Some(kind),
            group_id: None,
        }
    }

    pub fn group(group_id: impl Into<String>) -> Self {
        Self {
            kind: None,
            group_id: Some(group_id.into()),
        }
    }

    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn matches(&self, item: &ReviewItem) -> bool {
        self.kind.is_none_or(|kind| item.kind() == kind)
            && self
                .group_id
                .as_deref()
                .is_none_or(|group| item.group_id == group)
    }

    /// Same test on a raw stored document, for backend-side filtering.
    pub fn matches_document(&self, doc: &Value) -> bool {
        let kind_ok = self.kind.is_none_or(|kind| {
            doc.get("type")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<ItemKind>().ok())
                == Some(kind)
        });
        let group_ok = self
            .group_id
            .as_deref()
            .is_none_or(|group| doc.get("groupId").and_then(Value::as_str) == Some(group));
        kind_ok && group_ok
    }
}
