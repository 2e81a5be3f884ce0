//! Tolerant parsing of generator responses.
//!
//! Generators wrap their JSON in prose or code fences and tend to leave
//! trailing commas behind. Parsing takes the outermost object, cleans it up
//! and only then hands it to serde.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::content::deserialize_segments;
use crate::core::{
    group_id, lesson_id, normalize_topic, GrammarEntry, Lesson, LessonTexts, Level,
    PhoneticSegment, VocabEntry,
};
use crate::error::{CahierError, Result};

/// The text from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Result<&str> {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(CahierError::generation("response contains no JSON object")),
    }
}

/// Drop commas that directly precede `}` or `]`, outside string literals.
pub fn strip_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Parse a generator response into a JSON value.
pub fn parse_response(text: &str) -> Result<serde_json::Value> {
    let cleaned = strip_trailing_commas(&extract_json(text)?.replace('\u{a0}', " "));
    serde_json::from_str(&cleaned)
        .map_err(|e| CahierError::generation(format!("invalid lesson JSON: {}", e)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeneratedLesson {
    #[serde(deserialize_with = "deserialize_segments")]
    title: Vec<PhoneticSegment>,
    vocabulary: Vec<VocabEntry>,
    grammar: Vec<GrammarEntry>,
    texts: LessonTexts,
}

/// Build a lesson from a raw generator response.
///
/// The lesson id is derived from its content, so importing the same
/// response twice yields the same lesson.
pub fn lesson_from_response(text: &str, topic: &str, level: Level, now: i64) -> Result<Lesson> {
    if normalize_topic(topic).is_empty() {
        return Err(CahierError::invalid_input("topic must not be empty"));
    }

    let generated: GeneratedLesson = serde_json::from_value(parse_response(text)?)
        .map_err(|e| CahierError::generation(format!("unexpected lesson shape: {}", e)))?;

    let has_texts =
        !generated.texts.dialogue.is_empty() || !generated.texts.essay.content.is_empty();
    if generated.vocabulary.is_empty() && generated.grammar.is_empty() && !has_texts {
        return Err(CahierError::generation("response contains no lesson content"));
    }

    let sizing = level.sizing();
    if generated.vocabulary.len() < sizing.vocabulary {
        warn!(
            level = %level,
            requested = sizing.vocabulary,
            received = generated.vocabulary.len(),
            "Generated lesson has less vocabulary than requested"
        );
    }

    let title = if generated.title.is_empty() {
        vec![PhoneticSegment::plain(topic.trim())]
    } else {
        generated.title
    };
    let group = group_id(topic, level);
    let id = lesson_id(
        &group,
        &title,
        &generated.vocabulary,
        &generated.grammar,
        &generated.texts,
    );
    debug!(lesson_id = %id, group_id = %group, "Parsed generated lesson");

    Ok(Lesson {
        id,
        group_id: group,
        topic: topic.trim().to_string(),
        level,
        title,
        vocabulary: generated.vocabulary,
        grammar: generated.grammar,
        texts: generated.texts,
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{canonical_surface, Gender};

    const RESPONSE: &str = r#"Here is your lesson:
```json
{
  "topic": "Café",
  "title": "Au café[o kafe]",
  "vocabulary": [
    {
      "id": "v1",
      "word": [{"text": "chat", "phonetic": "ʃa"}],
      "gender": "m",
      "plural": "chats",
      "meaning": "cat",
      "grammar_tag": "noun",
      "example": {"text": "Le chat[ʃa] dort.", "translation": "The cat sleeps.", "grammar_point": "article"},
    },
    {
      "word": "croissant[kʁwasɑ̃]",
      "gender": "none",
      "meaning": "croissant"
    },
  ],
  "grammar": [
    {"point": "Le présent", "explanation": "Present tense, regular verbs", "example": {"text": "Je parle", "translation": "I speak"}}
  ],
  "texts": {
    "dialogue": [{"id": "d1", "role": "A", "name": "Léa", "text": "Bonjour !", "translation": "Hello!"}],
    "essay": {"title": "Le matin", "content": [{"id": "e1", "text": "Je bois un café.", "translation": "I drink a coffee."}]}
  }
}
```
Enjoy!"#;

    #[test]
    fn test_extract_json() {
        assert_eq!(extract_json("noise {\"a\": {}} tail").unwrap(), "{\"a\": {}}");
        assert!(extract_json("no json here").is_err());
        assert!(extract_json("} backwards {").is_err());
    }

    #[test]
    fn test_strip_trailing_commas() {
        assert_eq!(strip_trailing_commas("[1, 2, ]"), "[1, 2 ]");
        assert_eq!(strip_trailing_commas("{\"a\": 1,\n}"), "{\"a\": 1\n}");
        assert_eq!(strip_trailing_commas("{\"a\": [1,], }"), "{\"a\": [1] }");
        // Commas inside strings are content
        assert_eq!(
            strip_trailing_commas(r#"{"a": "x, ]", "b": "q\",}"}"#),
            r#"{"a": "x, ]", "b": "q\",}"}"#
        );
    }

    #[test]
    fn test_parse_response_handles_nbsp() {
        let value = parse_response("{\"a\":\u{a0}1}").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_parse_response_invalid_is_generation_error() {
        let err = parse_response("{ not json }").unwrap_err();
        assert!(matches!(err, CahierError::Generation { .. }));
    }

    #[test]
    fn test_lesson_from_response() {
        let lesson = lesson_from_response(RESPONSE, "  Café ", Level::A1, 42).unwrap();

        assert_eq!(lesson.group_id, "café__A1");
        assert_eq!(lesson.topic, "Café");
        assert_eq!(lesson.created_at, 42);
        assert_eq!(canonical_surface(&lesson.title), "Au café");
        assert_eq!(lesson.vocabulary.len(), 2);
        assert_eq!(lesson.vocabulary[0].gender, Gender::Masculine);
        assert_eq!(lesson.vocabulary[0].example.grammar_point, "article");
        assert_eq!(canonical_surface(&lesson.vocabulary[1].word), "croissant");
        assert_eq!(lesson.grammar.len(), 1);
        assert_eq!(lesson.texts.dialogue[0].name.as_deref(), Some("Léa"));
        assert_eq!(lesson.texts.essay.title, "Le matin");
        assert_eq!(lesson.text_lines().count(), 2);
        assert!(lesson.id.starts_with("lesson-"));
    }

    #[test]
    fn test_lesson_id_is_stable_across_imports() {
        let a = lesson_from_response(RESPONSE, "Café", Level::A1, 1).unwrap();
        let b = lesson_from_response(RESPONSE, "café", Level::A1, 2).unwrap();
        assert_eq!(a.id, b.id);

        let other_level = lesson_from_response(RESPONSE, "Café", Level::B1, 1).unwrap();
        assert_ne!(a.id, other_level.id);
    }

    #[test]
    fn test_missing_title_falls_back_to_topic() {
        let lesson =
            lesson_from_response(r#"{"vocabulary": [{"word": "pain"}]}"#, "Boulangerie", Level::A2, 0)
                .unwrap();
        assert_eq!(canonical_surface(&lesson.title), "Boulangerie");
    }

    #[test]
    fn test_empty_lesson_is_rejected() {
        let err = lesson_from_response(r#"{"title": "Rien"}"#, "Rien", Level::A1, 0).unwrap_err();
        assert!(matches!(err, CahierError::Generation { .. }));
    }

    #[test]
    fn test_blank_topic_is_rejected() {
        let err = lesson_from_response(RESPONSE, " !! ", Level::A1, 0).unwrap_err();
        assert!(matches!(err, CahierError::InvalidInput { .. }));
    }

    #[test]
    fn test_wrong_shape_is_generation_error() {
        let err = lesson_from_response(r#"{"vocabulary": 3}"#, "Café", Level::A1, 0).unwrap_err();
        assert!(matches!(err, CahierError::Generation { .. }));
    }
}
