//! Case-insensitive field lookup across historical key spellings.
//!
//! Prompt revisions have produced cards keyed `recto`/`verso`, `front`/`back`,
//! `question`/`answer`, capitalised variants and even French labels such as
//! `"Verso (Réponse)"`. Each logical field has an ordered alias list; the
//! first alias present in the object wins.

use serde_json::{Map, Value};

pub const SECTION_ALIASES: &[&str] = &["section"];
pub const FRONT_ALIASES: &[&str] = &["recto", "front", "question", "Recto (Question)"];
pub const BACK_ALIASES: &[&str] = &["verso", "back", "answer", "Verso (Réponse)"];
pub const QUESTION_ALIASES: &[&str] = &["question", "prompt"];
pub const OPTIONS_ALIASES: &[&str] = &["options", "choices"];
pub const ANSWER_ALIASES: &[&str] = &["answer", "correct_answer"];
pub const EVALUATION_DICT_ALIASES: &[&str] = &["evaluation_dict", "evaluation"];
pub const FLASHCARD_DICT_ALIASES: &[&str] = &["flascard_dict", "flashcard_dict", "flashcards"];

/// Shown when none of a field's aliases is present.
pub const MISSING_FIELD: &str = "(not provided)";

/// Return the value of the first alias present in `obj`, ignoring key case.
///
/// Aliases are tried in order. When two keys differ only in case, the one
/// that appears last in the object is used.
pub fn lookup_alias<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    for alias in aliases {
        let wanted = alias.to_lowercase();
        let found = obj
            .iter()
            .filter(|(k, _)| k.to_lowercase() == wanted)
            .last()
            .map(|(_, v)| v);
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Like [`lookup_alias`], rendered as display text.
///
/// Strings are returned as-is, numbers and booleans are formatted, anything
/// else (absent, null, nested) yields [`MISSING_FIELD`].
pub fn text_alias(obj: &Map<String, Value>, aliases: &[&str]) -> String {
    match lookup_alias(obj, aliases) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => MISSING_FIELD.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn matches_regardless_of_case() {
        let card = obj(json!({"Section": "Intro"}));
        assert_eq!(lookup_alias(&card, &["section"]), Some(&json!("Intro")));
    }

    #[test]
    fn first_alias_wins() {
        let card = obj(json!({"question": "Q?", "Recto": "R"}));
        assert_eq!(text_alias(&card, FRONT_ALIASES), "R");
    }

    #[test]
    fn falls_through_to_later_alias() {
        let card = obj(json!({"Front": "F"}));
        assert_eq!(text_alias(&card, FRONT_ALIASES), "F");
    }

    #[test]
    fn french_label() {
        let card = obj(json!({"VERSO (RÉPONSE)": "Réponse"}));
        assert_eq!(text_alias(&card, BACK_ALIASES), "Réponse");
    }

    #[test]
    fn placeholder_when_missing() {
        let card = obj(json!({"hint": "x"}));
        assert_eq!(text_alias(&card, BACK_ALIASES), MISSING_FIELD);
        assert_eq!(lookup_alias(&card, BACK_ALIASES), None);
    }

    #[test]
    fn numbers_rendered() {
        let q = obj(json!({"answer": 2}));
        assert_eq!(text_alias(&q, ANSWER_ALIASES), "2");
    }
}
