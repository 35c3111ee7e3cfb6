//! Structured study results.
//!
//! A finished task leaves one raw payload on the backend: a JSON object with
//! four string fields (`explanation`, `evaluation`, `flashcard_building`,
//! `summary`), where `evaluation` and `flashcard_building` are themselves
//! JSON documents produced by the model. [`ParsedResult::from_payload`]
//! decodes the envelope and each embedded document separately, so a truncated
//! flashcard deck does not hide the explanation or the quiz.

use crate::error::PayloadError;
use crate::parser::alias::{
    lookup_alias, text_alias, ANSWER_ALIASES, BACK_ALIASES, EVALUATION_DICT_ALIASES,
    FLASHCARD_DICT_ALIASES, FRONT_ALIASES, OPTIONS_ALIASES, QUESTION_ALIASES, SECTION_ALIASES,
};
use crate::parser::parse_tolerant;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write as _;
use tracing::warn;

/// Everything the backend produced for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResult {
    /// Markdown explanation of the material.
    pub explanation: String,
    /// Quiz, or `None` if it could not be decoded.
    pub evaluation: Option<Evaluation>,
    /// Flashcards, or `None` if they could not be decoded.
    pub flashcards: Option<FlashcardDeck>,
    /// Plain-text summary.
    pub summary: String,
}

/// Multiple-choice questions grouped by difficulty level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub levels: Vec<QuizLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizLevel {
    pub name: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    /// Options as written by the model, usually prefixed `"a) "`, `"b) "`, …
    pub options: Vec<String>,
    /// Letter of the correct option, e.g. `"b"`.
    pub answer: String,
}

/// Flashcards grouped by difficulty level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardDeck {
    pub levels: Vec<FlashcardLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardLevel {
    pub name: String,
    pub cards: Vec<Flashcard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub section: String,
    pub front: String,
    pub back: String,
}

impl ParsedResult {
    /// Decode a raw result payload.
    ///
    /// `Value::String` payloads go through the tolerant parser; objects are
    /// used directly. Returns `None` when the envelope itself is unusable;
    /// sub-payload failures only blank out that field.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        match payload {
            Value::String(raw) => Self::from_raw(raw),
            Value::Object(map) => Some(Self::from_envelope(map)),
            other => {
                warn!("Result payload is neither text nor an object: {}", type_name(other));
                None
            }
        }
    }

    /// Decode a raw result string.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match parse_tolerant(raw, "result")? {
            Value::Object(map) => Some(Self::from_envelope(&map)),
            other => {
                warn!("Result envelope is {}, expected an object", type_name(&other));
                None
            }
        }
    }

    fn from_envelope(map: &Map<String, Value>) -> Self {
        let evaluation = embedded(map.get("evaluation"), "evaluation").and_then(|v| {
            Evaluation::from_value(&v)
                .map_err(|e| warn!("Discarding evaluation: {}", e))
                .ok()
        });
        let flashcards = embedded(
            lookup_alias(map, &["flashcard_building", "flashcards"]),
            "flashcards",
        )
        .and_then(|v| {
            FlashcardDeck::from_value(&v)
                .map_err(|e| warn!("Discarding flashcards: {}", e))
                .ok()
        });

        Self {
            explanation: plain_text(map.get("explanation")),
            evaluation,
            flashcards,
            summary: plain_text(map.get("summary")),
        }
    }

    /// Render the whole result as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();

        out.push_str("# Explanation\n\n");
        out.push_str(self.explanation.trim());
        out.push_str("\n\n# Evaluation\n\n");
        match &self.evaluation {
            Some(eval) => eval.write_markdown(&mut out),
            None => out.push_str("_No evaluation data available._\n"),
        }

        out.push_str("\n# Flashcards\n\n");
        match &self.flashcards {
            Some(deck) => deck.write_markdown(&mut out),
            None => out.push_str("_No flashcard data available._\n"),
        }

        out.push_str("\n# Summary\n\n");
        out.push_str(self.summary.trim());
        out.push('\n');
        out
    }
}

impl Evaluation {
    /// Build from a decoded `{"evaluation_dict": {level: [question, …]}}` document.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let levels = level_map(value, EVALUATION_DICT_ALIASES, "evaluation_dict")?;
        let levels = levels
            .iter()
            .filter_map(|(name, items)| {
                let items = level_items(name, items)?;
                Some(QuizLevel {
                    name: name.clone(),
                    questions: items
                        .iter()
                        .filter_map(Value::as_object)
                        .map(QuizQuestion::from_object)
                        .collect(),
                })
            })
            .collect();
        Ok(Self { levels })
    }

    pub fn question_count(&self) -> usize {
        self.levels.iter().map(|l| l.questions.len()).sum()
    }

    fn write_markdown(&self, out: &mut String) {
        for level in &self.levels {
            let _ = writeln!(out, "## {} Level\n", level.name);
            for (i, q) in level.questions.iter().enumerate() {
                let _ = writeln!(out, "{}. {}", i + 1, q.question);
                for idx in 0..q.options.len() {
                    let mark = if q.correct_index() == Some(idx) { " ✓" } else { "" };
                    let _ = writeln!(
                        out,
                        "   - {}) {}{}",
                        QuizQuestion::option_letter(idx),
                        q.option_text(idx),
                        mark
                    );
                }
                out.push('\n');
            }
        }
    }
}

impl QuizQuestion {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let options = match lookup_alias(obj, OPTIONS_ALIASES) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|o| match o {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };
        Self {
            question: text_alias(obj, QUESTION_ALIASES),
            options,
            answer: text_alias(obj, ANSWER_ALIASES),
        }
    }

    /// `0 → 'a'`, `1 → 'b'`, …
    pub fn option_letter(idx: usize) -> char {
        (b'a' + (idx % 26) as u8) as char
    }

    /// Option text without its `"a) "` prefix.
    pub fn option_text(&self, idx: usize) -> &str {
        let Some(option) = self.options.get(idx) else {
            return "";
        };
        let mut chars = option.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(l), Some(')'), Some(' ')) if l.is_ascii_alphabetic() => &option[3..],
            _ => option,
        }
    }

    /// Index of the correct option, if the answer names one.
    pub fn correct_index(&self) -> Option<usize> {
        let letter = self.answer.trim().chars().next()?.to_ascii_lowercase();
        if !letter.is_ascii_lowercase() {
            return None;
        }
        let idx = (letter as u8 - b'a') as usize;
        (idx < self.options.len()).then_some(idx)
    }

    /// Whether choosing option `letter` is correct.
    pub fn is_correct(&self, letter: char) -> bool {
        self.correct_index()
            .is_some_and(|i| Self::option_letter(i) == letter.to_ascii_lowercase())
    }
}

impl FlashcardDeck {
    /// Build from a decoded `{"flascard_dict": {level: [card, …]}}` document.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let levels = level_map(value, FLASHCARD_DICT_ALIASES, "flascard_dict")?;
        let levels = levels
            .iter()
            .filter_map(|(name, items)| {
                let items = level_items(name, items)?;
                Some(FlashcardLevel {
                    name: name.clone(),
                    cards: items
                        .iter()
                        .filter_map(Value::as_object)
                        .map(|card| Flashcard {
                            section: text_alias(card, SECTION_ALIASES),
                            front: text_alias(card, FRONT_ALIASES),
                            back: text_alias(card, BACK_ALIASES),
                        })
                        .collect(),
                })
            })
            .collect();
        Ok(Self { levels })
    }

    pub fn card_count(&self) -> usize {
        self.levels.iter().map(|l| l.cards.len()).sum()
    }

    fn write_markdown(&self, out: &mut String) {
        for level in &self.levels {
            let _ = writeln!(out, "## {} Level\n", level.name);
            for card in &level.cards {
                let _ = writeln!(out, "- **{}**: {}", card.section, card.front);
                let _ = writeln!(out, "  > {}", card.back);
            }
            out.push('\n');
        }
    }
}

/// Decode an embedded document: strings are parsed, objects used as-is.
fn embedded(value: Option<&Value>, label: &str) -> Option<Value> {
    match value? {
        Value::String(raw) if raw.trim().is_empty() => None,
        Value::String(raw) => parse_tolerant(raw, label),
        Value::Null => None,
        other => Some(other.clone()),
    }
}

fn plain_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn level_map<'a>(
    value: &'a Value,
    aliases: &[&str],
    field: &str,
) -> Result<&'a Map<String, Value>, PayloadError> {
    let obj = value.as_object().ok_or_else(|| PayloadError::Shape {
        field: field.to_string(),
        detail: format!("expected an object, got {}", type_name(value)),
    })?;
    match lookup_alias(obj, aliases) {
        Some(Value::Object(levels)) => Ok(levels),
        Some(other) => Err(PayloadError::Shape {
            field: field.to_string(),
            detail: format!("expected an object of levels, got {}", type_name(other)),
        }),
        None => Err(PayloadError::Shape {
            field: field.to_string(),
            detail: "missing".to_string(),
        }),
    }
}

fn level_items<'a>(name: &str, items: &'a Value) -> Option<&'a Vec<Value>> {
    match items.as_array() {
        Some(items) => Some(items),
        None => {
            warn!("Skipping level '{}': expected a list, got {}", name, type_name(items));
            None
        }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
