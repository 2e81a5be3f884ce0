//! Lesson content types.
//!
//! A [`Lesson`] is one generated study session for a (topic, level) pair.
//! Lessons are immutable once archived; a new generation supersedes rather
//! than edits. Every lesson belongs to a lesson group whose id is derived
//! from the normalized topic and the proficiency level.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CahierError;

/// One fragment of annotated text: the surface text plus an optional
/// pronunciation hint (IPA or simplified phonetics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneticSegment {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<String>,
}

impl PhoneticSegment {
    /// A segment without pronunciation annotation.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            phonetic: None,
        }
    }

    /// A segment with a pronunciation annotation.
    pub fn annotated(text: impl Into<String>, phonetic: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            phonetic: Some(phonetic.into()),
        }
    }
}

/// Proficiency level (CEFR scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

/// How much content a generated lesson carries at a given level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelSizing {
    pub vocabulary: usize,
    pub grammar: usize,
    pub dialogue: usize,
    pub essay: usize,
}

impl Level {
    /// All levels, lowest first.
    pub fn all() -> &'static [Level] {
        &[
            Level::A1,
            Level::A2,
            Level::B1,
            Level::B2,
            Level::C1,
            Level::C2,
        ]
    }

    /// The canonical uppercase code (`"B1"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::A1 => "A1",
            Level::A2 => "A2",
            Level::B1 => "B1",
            Level::B2 => "B2",
            Level::C1 => "C1",
            Level::C2 => "C2",
        }
    }

    /// Content sizing requested from the generator at this level.
    pub fn sizing(&self) -> LevelSizing {
        let (vocabulary, grammar, dialogue, essay) = match self {
            Level::A1 => (12, 3, 6, 8),
            Level::A2 => (15, 3, 8, 10),
            Level::B1 => (18, 4, 10, 12),
            Level::B2 => (22, 4, 12, 14),
            Level::C1 => (25, 5, 14, 16),
            Level::C2 => (30, 5, 16, 18),
        };
        LevelSizing {
            vocabulary,
            grammar,
            dialogue,
            essay,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = CahierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Level::all()
            .iter()
            .copied()
            .find(|level| level.as_str() == upper)
            .ok_or_else(|| CahierError::invalid_input(format!("unknown level '{}'", s)))
    }
}

/// Grammatical gender of a vocabulary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>")]
pub enum Gender {
    #[serde(rename = "m")]
    Masculine,
    #[serde(rename = "f")]
    Feminine,
    #[default]
    #[serde(rename = "none")]
    None,
}

impl From<Option<String>> for Gender {
    fn from(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some("m") | Some("M") => Gender::Masculine,
            Some("f") | Some("F") => Gender::Feminine,
            _ => Gender::None,
        }
    }
}

/// Example sentence attached to a vocabulary entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabExample {
    #[serde(deserialize_with = "deserialize_segments")]
    pub text: Vec<PhoneticSegment>,
    pub translation: String,
    pub grammar_point: String,
}

/// A vocabulary word with its meaning and usage example.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabEntry {
    #[serde(deserialize_with = "deserialize_segments")]
    pub word: Vec<PhoneticSegment>,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plural: Option<String>,
    pub meaning: String,
    pub grammar_tag: String,
    pub example: VocabExample,
}

impl VocabEntry {
    /// Minimal entry for a word and its meaning.
    pub fn new(word: Vec<PhoneticSegment>, meaning: impl Into<String>) -> Self {
        Self {
            word,
            meaning: meaning.into(),
            ..Default::default()
        }
    }
}

/// Example sentence attached to a grammar point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarExample {
    #[serde(deserialize_with = "deserialize_segments")]
    pub text: Vec<PhoneticSegment>,
    pub translation: String,
}

/// A grammar point with explanation and example.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarEntry {
    pub point: String,
    pub explanation: String,
    pub example: GrammarExample,
}

/// One line of dialogue or one essay sentence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "deserialize_segments")]
    pub text: Vec<PhoneticSegment>,
    pub translation: String,
}

/// A short essay: title plus ordered sentences.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Essay {
    pub title: String,
    pub content: Vec<TextLine>,
}

/// The two text collections of a lesson.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LessonTexts {
    pub dialogue: Vec<TextLine>,
    pub essay: Essay,
}

/// One generated study session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub group_id: String,
    pub topic: String,
    pub level: Level,
    #[serde(default, deserialize_with = "deserialize_segments")]
    pub title: Vec<PhoneticSegment>,
    #[serde(default)]
    pub vocabulary: Vec<VocabEntry>,
    #[serde(default)]
    pub grammar: Vec<GrammarEntry>,
    #[serde(default)]
    pub texts: LessonTexts,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: i64,
}

impl Lesson {
    /// Dialogue lines followed by essay sentences.
    pub fn text_lines(&self) -> impl Iterator<Item = &TextLine> {
        self.texts
            .dialogue
            .iter()
            .chain(self.texts.essay.content.iter())
    }
}

/// Normalize a free-form topic for use in a group id.
///
/// Trims, lowercases, collapses whitespace runs to one space and drops
/// anything that is neither a letter, a digit nor whitespace.
pub fn normalize_topic(topic: &str) -> String {
    let collapsed = topic
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

/// The lesson group id for a (topic, level) pair: `<normalized topic>__<LEVEL>`.
pub fn group_id(topic: &str, level: Level) -> String {
    format!("{}__{}", normalize_topic(topic), level.as_str())
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic() || ('\u{C0}'..='\u{FF}').contains(&c) || c == '\'' || c == '-'
}

/// Parse inline pronunciation notation into segments.
///
/// Words may carry an annotation in brackets or parentheses directly after
/// them: `"bonjour[bɔ̃ʒuʁ] les amis"`. Text between words (spaces,
/// punctuation, other scripts) is kept as plain segments.
pub fn parse_segments(input: &str) -> Vec<PhoneticSegment> {
    let chars: Vec<char> = input.chars().collect();
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut i = 0;

    while i < chars.len() {
        if !is_word_char(chars[i]) {
            plain.push(chars[i]);
            i += 1;
            continue;
        }

        if !plain.is_empty() {
            segments.push(PhoneticSegment::plain(std::mem::take(&mut plain)));
        }

        let start = i;
        while i < chars.len() && is_word_char(chars[i]) {
            i += 1;
        }
        let word: String = chars[start..i].iter().collect();

        let close = match chars.get(i) {
            Some('[') => Some(']'),
            Some('(') => Some(')'),
            _ => None,
        };
        let annotation = close.and_then(|close| {
            let end = chars[i + 1..].iter().position(|&c| c == close)?;
            // Empty brackets are not an annotation.
            (end > 0).then(|| {
                let phonetic: String = chars[i + 1..i + 1 + end].iter().collect();
                (phonetic, i + 1 + end + 1)
            })
        });

        match annotation {
            Some((phonetic, next)) => {
                segments.push(PhoneticSegment::annotated(word, phonetic));
                i = next;
            }
            None => segments.push(PhoneticSegment::plain(word)),
        }
    }

    if !plain.is_empty() {
        segments.push(PhoneticSegment::plain(plain));
    }

    segments
}

/// Accept either a segment array or an annotated string for segment fields.
///
/// Generators are inconsistent about which form they emit; both decode to
/// the same segment list. Anything else decodes to its string form.
pub fn deserialize_segments<'de, D>(deserializer: D) -> Result<Vec<PhoneticSegment>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(segments_from_value(&value))
}

fn segments_from_value(value: &serde_json::Value) -> Vec<PhoneticSegment> {
    use serde_json::Value;

    match value {
        Value::Null => Vec::new(),
        Value::String(s) => parse_segments(s),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(_) => serde_json::from_value(item.clone()).ok(),
                Value::String(s) => Some(PhoneticSegment::plain(s.clone())),
                _ => None,
            })
            .collect(),
        other => vec![PhoneticSegment::plain(other.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse_and_display() {
        assert_eq!("b1".parse::<Level>().unwrap(), Level::B1);
        assert_eq!(" C2 ".parse::<Level>().unwrap(), Level::C2);
        assert!("D1".parse::<Level>().is_err());
        assert_eq!(Level::A2.to_string(), "A2");
    }

    #[test]
    fn test_level_sizing_grows() {
        let sizes: Vec<usize> = Level::all().iter().map(|l| l.sizing().vocabulary).collect();
        assert_eq!(sizes, vec![12, 15, 18, 22, 25, 30]);
        assert_eq!(Level::B2.sizing().essay, 14);
    }

    #[test]
    fn test_level_json_uses_code() {
        assert_eq!(serde_json::to_string(&Level::C1).unwrap(), "\"C1\"");
    }

    #[test]
    fn test_normalize_topic() {
        assert_eq!(normalize_topic("  Au   Café! "), "au café");
        assert_eq!(normalize_topic("Travel\tPlans"), "travel plans");
        assert_eq!(normalize_topic("???"), "");
    }

    #[test]
    fn test_group_id() {
        assert_eq!(group_id("Au Café", Level::A1), "au café__A1");
        assert_eq!(group_id("au café", Level::A1), group_id(" AU  CAFÉ ", Level::A1));
        assert_ne!(group_id("au café", Level::A1), group_id("au café", Level::A2));
    }

    #[test]
    fn test_parse_segments_with_annotations() {
        let segs = parse_segments("bonjour[bɔ̃ʒuʁ] les(le) amis");
        assert_eq!(
            segs,
            vec![
                PhoneticSegment::annotated("bonjour", "bɔ̃ʒuʁ"),
                PhoneticSegment::plain(" "),
                PhoneticSegment::annotated("les", "le"),
                PhoneticSegment::plain(" "),
                PhoneticSegment::plain("amis"),
            ]
        );
    }

    #[test]
    fn test_parse_segments_keeps_punctuation_and_accents() {
        let segs = parse_segments("c'est l'été !");
        let surface: String = segs.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(surface, "c'est l'été !");
        assert_eq!(segs[0].text, "c'est");
    }

    #[test]
    fn test_parse_segments_unclosed_bracket_is_text() {
        let segs = parse_segments("vin[vɛ̃");
        let surface: String = segs.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(surface, "vin[vɛ̃");
        assert!(segs.iter().all(|s| s.phonetic.is_none()));
    }

    #[test]
    fn test_parse_segments_empty() {
        assert!(parse_segments("").is_empty());
    }

    #[test]
    fn test_vocab_accepts_string_or_segments() {
        let from_string: VocabEntry =
            serde_json::from_str(r#"{"word": "chat[ʃa]", "meaning": "cat", "gender": "m"}"#)
                .unwrap();
        let from_array: VocabEntry = serde_json::from_str(
            r#"{"word": [{"text": "chat", "phonetic": "ʃa"}], "meaning": "cat", "gender": "m"}"#,
        )
        .unwrap();
        assert_eq!(from_string.word, from_array.word);
        assert_eq!(from_string.gender, Gender::Masculine);
    }

    #[test]
    fn test_unknown_gender_is_none() {
        let entry: VocabEntry =
            serde_json::from_str(r#"{"word": "ami", "gender": "neuter"}"#).unwrap();
        assert_eq!(entry.gender, Gender::None);
    }

    #[test]
    fn test_lesson_text_lines_order() {
        let lesson = Lesson {
            id: "lesson-1".to_string(),
            group_id: group_id("café", Level::A1),
            topic: "café".to_string(),
            level: Level::A1,
            title: parse_segments("Au café"),
            vocabulary: Vec::new(),
            grammar: Vec::new(),
            texts: LessonTexts {
                dialogue: vec![TextLine {
                    text: parse_segments("Bonjour"),
                    ..Default::default()
                }],
                essay: Essay {
                    title: "Le matin".to_string(),
                    content: vec![TextLine {
                        text: parse_segments("Il fait beau."),
                        ..Default::default()
                    }],
                },
            },
            created_at: 0,
        };

        let lines: Vec<&str> = lesson
            .text_lines()
            .map(|l| l.text[0].text.as_str())
            .collect();
        assert_eq!(lines, vec!["Bonjour", "Il"]);
    }
}
