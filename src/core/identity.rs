//! Stable identities for archived content.
//!
//! Ids are pure functions of logical content, so re-archiving the same
//! lesson overwrites in place instead of appending duplicates. The hash is
//! 32-bit FNV-1a over UTF-16 code units: stable across processes and
//! platforms, and not a security boundary.

use super::content::{GrammarEntry, LessonTexts, PhoneticSegment, TextLine, VocabEntry};
use super::item::ItemKind;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over the UTF-16 encoding of `input`.
pub fn fnv1a(input: &str) -> u32 {
    input.encode_utf16().fold(FNV_OFFSET_BASIS, |hash, unit| {
        (hash ^ u32::from(unit)).wrapping_mul(FNV_PRIME)
    })
}

/// Fixed-width lowercase hex of [`fnv1a`].
pub fn fnv1a_hex(input: &str) -> String {
    format!("{:08x}", fnv1a(input))
}

/// Flatten annotated segments into their plain surface text.
pub fn canonical_surface(segments: &[PhoneticSegment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

/// Duplicate-suppression key for a vocabulary entry.
///
/// Only the surface word counts: meaning, gender and examples may differ.
pub fn vocab_dedup_key(entry: &VocabEntry) -> String {
    canonical_surface(&entry.word).trim().to_lowercase()
}

/// Distinguishing content of a grammar entry: point plus example surface.
pub fn grammar_raw_key(entry: &GrammarEntry) -> String {
    format!(
        "{}__{}",
        entry.point,
        canonical_surface(&entry.example.text)
    )
}

/// Distinguishing content of a text line: surface plus translation.
pub fn text_raw_key(line: &TextLine) -> String {
    format!("{}__{}", canonical_surface(&line.text), line.translation)
}

/// Stable review item id: `<kind>-<hash(group::kind::key)>`.
pub fn stable_id(group_id: &str, kind: ItemKind, raw_key: &str) -> String {
    let kind = kind.as_str();
    format!(
        "{}-{}",
        kind,
        fnv1a_hex(&format!("{}::{}::{}", group_id, kind, raw_key))
    )
}

/// Content-derived lesson id.
///
/// Covers the group, the title, the ordered vocabulary surfaces, every
/// grammar entry and every text line. A re-import of the same generator
/// response maps to the same lesson; a regeneration that differs anywhere
/// gets a new one.
pub fn lesson_id(
    group_id: &str,
    title: &[PhoneticSegment],
    vocabulary: &[VocabEntry],
    grammar: &[GrammarEntry],
    texts: &LessonTexts,
) -> String {
    let words: Vec<String> = vocabulary.iter().map(vocab_dedup_key).collect();
    let points: Vec<String> = grammar
        .iter()
        .map(|entry| {
            format!(
                "{}__{}__{}",
                grammar_raw_key(entry),
                entry.explanation,
                entry.example.translation
            )
        })
        .collect();
    let dialogue: Vec<String> = texts.dialogue.iter().map(text_raw_key).collect();
    let essay: Vec<String> = texts.essay.content.iter().map(text_raw_key).collect();
    format!(
        "lesson-{}",
        fnv1a_hex(&format!(
            "{}::{}::{}::{}::{}::{}::{}",
            group_id,
            canonical_surface(title),
            words.join("|"),
            points.join("|"),
            dialogue.join("|"),
            texts.essay.title,
            essay.join("|")
        ))
    )
}
