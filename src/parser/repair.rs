//! Dangling-answer-field repair.
//!
//! The generation step that writes quizzes and flashcards sometimes stops at
//! its token limit in the middle of the last card, typically while writing
//! the answer (`"verso": "Psychology is the scientif`). This module handles
//! exactly that shape and nothing more general:
//!
//! 1. If the text ends while an answer field is open (inside its key, right
//!    after its colon, or inside its string value), the field is cut off at
//!    the start of its key and replaced with a placeholder value, then the
//!    containers that are still open are closed.
//! 2. Text that already ends with `}` is left alone.
//! 3. Anything else gets a best-effort closing suffix: an unterminated
//!    string is closed, a dangling comma is dropped, open containers are
//!    closed.
//!
//! Well-formed JSON always passes through unchanged.

use tracing::debug;

/// Keys whose value is the answer side of a card or question.
pub const ANSWER_KEYS: &[&str] = &["verso", "answer", "back"];

/// Value written in place of a truncated answer.
pub const TRUNCATION_PLACEHOLDER: &str = "INCOMPLETE - truncated by model";

/// Closing sequence of a complete `{ "dict": { "Level": [ { … } ] } }` payload.
pub const EXPECTED_CLOSING: &str = "}]}}";

/// What [`repair`] did to its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// The text was left as it was.
    Untouched,
    /// A truncated answer field was replaced with the placeholder.
    DanglingAnswer { key: String },
    /// A closing suffix was appended.
    ClosingSuffix { suffix: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Object,
    Array,
}

#[derive(Debug, Clone)]
struct KeySpan {
    /// Byte offset of the key's opening quote.
    start: usize,
    name: String,
}

#[derive(Debug, Clone)]
struct Frame {
    kind: Container,
    expect_key: bool,
    last_key: Option<KeySpan>,
}

#[derive(Debug, Clone)]
struct OpenString {
    start: usize,
    is_key: bool,
    content: String,
}

/// Where a left-to-right scan of the text ended up.
#[derive(Debug, Clone, Default)]
struct ScanState {
    frames: Vec<Frame>,
    open_string: Option<OpenString>,
}

impl ScanState {
    fn closers(&self) -> String {
        self.frames
            .iter()
            .rev()
            .map(|f| match f.kind {
                Container::Object => '}',
                Container::Array => ']',
            })
            .collect()
    }
}

fn scan(text: &str) -> ScanState {
    let mut state = ScanState::default();
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(open) = state.open_string.as_mut() {
            if escaped {
                escaped = false;
                open.content.push(c);
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' => {
                    if let Some(open) = state.open_string.take() {
                        if open.is_key {
                            if let Some(frame) = state.frames.last_mut() {
                                frame.last_key = Some(KeySpan {
                                    start: open.start,
                                    name: open.content,
                                });
                            }
                        }
                    }
                }
                _ => open.content.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                let is_key = matches!(
                    state.frames.last(),
                    Some(f) if f.kind == Container::Object && f.expect_key
                );
                state.open_string = Some(OpenString {
                    start: i,
                    is_key,
                    content: String::new(),
                });
            }
            '{' => state.frames.push(Frame {
                kind: Container::Object,
                expect_key: true,
                last_key: None,
            }),
            '[' => state.frames.push(Frame {
                kind: Container::Array,
                expect_key: false,
                last_key: None,
            }),
            '}' | ']' => {
                state.frames.pop();
            }
            ':' => {
                if let Some(frame) = state.frames.last_mut() {
                    frame.expect_key = false;
                }
            }
            ',' => {
                if let Some(frame) = state.frames.last_mut() {
                    if frame.kind == Container::Object {
                        frame.expect_key = true;
                    }
                }
            }
            _ => {}
        }
    }

    state
}

fn answer_key(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    ANSWER_KEYS.iter().copied().find(|k| *k == lower)
}

/// Locate a truncated answer field: `(cut offset, key to write back)`.
fn find_dangling_answer(text: &str, state: &ScanState) -> Option<(usize, String)> {
    let frame = state.frames.last()?;
    if frame.kind != Container::Object {
        return None;
    }

    match &state.open_string {
        // Cut inside the key itself: `"ver`
        Some(open) if open.is_key => {
            let partial = open.content.to_lowercase();
            if partial.is_empty() {
                return None;
            }
            ANSWER_KEYS
                .iter()
                .find(|k| k.starts_with(&partial))
                .map(|k| (open.start, k.to_string()))
        }
        // Cut inside the value: `"verso": "Psychology is`
        Some(_) => {
            let key = frame.last_key.as_ref()?;
            answer_key(&key.name)?;
            Some((key.start, key.name.clone()))
        }
        // Cut right after the colon: `"verso":`
        None => {
            let key = frame.last_key.as_ref()?;
            answer_key(&key.name)?;
            if frame.expect_key || !text.trim_end().ends_with(':') {
                return None;
            }
            Some((key.start, key.name.clone()))
        }
    }
}

fn closing_suffix(text: &str, state: &ScanState) -> (String, String) {
    let mut out = match &state.open_string {
        // A half-written key has no value to keep.
        Some(open) if open.is_key => text[..open.start].trim_end().to_string(),
        // An odd run of trailing backslashes would escape the closing quote.
        Some(_) => {
            let run = text.len() - text.trim_end_matches('\\').len();
            let body = if run % 2 == 1 { &text[..text.len() - 1] } else { text };
            format!("{body}\"")
        }
        None => text.to_string(),
    };

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    }

    let closers = scan(&out).closers();
    out.push_str(&closers);

    let suffix = out
        .strip_prefix(text)
        .map(str::to_string)
        .unwrap_or_else(|| closers.clone());
    (out, suffix)
}

/// Apply the truncation heuristics to already fence-stripped text.
pub fn repair(text: &str) -> (String, Repair) {
    let state = scan(text);

    if !text.ends_with('"') && !text.ends_with(EXPECTED_CLOSING) {
        if let Some((cut, key)) = find_dangling_answer(text, &state) {
            let prefix = text[..cut].trim_end();
            let closers = scan(prefix).closers();
            let repaired = format!("{prefix}\"{key}\": \"{TRUNCATION_PLACEHOLDER}\"{closers}");
            debug!("Replaced truncated '{}' field with placeholder", key);
            return (repaired, Repair::DanglingAnswer { key });
        }
    }

    if text.ends_with('}') || text.ends_with(EXPECTED_CLOSING) {
        return (text.to_string(), Repair::Untouched);
    }

    let (repaired, suffix) = closing_suffix(text, &state);
    if repaired == text {
        return (repaired, Repair::Untouched);
    }
    debug!("Appended closing suffix {:?}", suffix);
    (repaired, Repair::ClosingSuffix { suffix })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parses(s: &str) -> Value {
        serde_json::from_str(s).unwrap_or_else(|e| panic!("not JSON ({e}): {s}"))
    }

    #[test]
    fn well_formed_object_untouched() {
        let text = r#"{"flascard_dict":{"Beginner":[{"recto":"Q","verso":"A"}]}}"#;
        assert_eq!(repair(text), (text.to_string(), Repair::Untouched));
    }

    #[test]
    fn well_formed_array_untouched() {
        let text = r#"[{"verso":"A"}]"#;
        assert_eq!(repair(text).1, Repair::Untouched);
    }

    #[test]
    fn truncated_inside_answer_value() {
        let text = r#"{"flascard_dict":{"Beginner":[{"section":"Intro","recto":"What is psychology?","verso":"Psychology is the scien"#;
        let (out, kind) = repair(text);
        assert_eq!(kind, Repair::DanglingAnswer { key: "verso".into() });
        let v = parses(&out);
        assert_eq!(
            v["flascard_dict"]["Beginner"][0]["verso"],
            TRUNCATION_PLACEHOLDER
        );
        assert_eq!(v["flascard_dict"]["Beginner"][0]["recto"], "What is psychology?");
    }

    #[test]
    fn truncated_after_answer_colon() {
        let text = r#"{"d":{"L":[{"recto":"Q","verso":"#;
        let (out, kind) = repair(text);
        assert!(matches!(kind, Repair::DanglingAnswer { .. }));
        assert_eq!(parses(&out)["d"]["L"][0]["verso"], TRUNCATION_PLACEHOLDER);
    }

    #[test]
    fn truncated_inside_answer_key() {
        let text = r#"{"d":{"L":[{"recto":"Q","ver"#;
        let (out, kind) = repair(text);
        assert_eq!(kind, Repair::DanglingAnswer { key: "verso".into() });
        assert_eq!(parses(&out)["d"]["L"][0]["verso"], TRUNCATION_PLACEHOLDER);
    }

    #[test]
    fn answer_key_match_is_case_insensitive() {
        let text = r#"{"d":{"L":[{"Recto":"Q","Verso":"partial"#;
        let (out, kind) = repair(text);
        assert_eq!(kind, Repair::DanglingAnswer { key: "Verso".into() });
        assert_eq!(parses(&out)["d"]["L"][0]["Verso"], TRUNCATION_PLACEHOLDER);
    }

    #[test]
    fn escaped_quote_inside_value_does_not_close_it() {
        let text = r#"{"d":{"L":[{"recto":"Q","verso":"he said \"hi"#;
        let (out, kind) = repair(text);
        assert!(matches!(kind, Repair::DanglingAnswer { .. }));
        parses(&out);
    }

    #[test]
    fn dangling_escape_is_dropped_before_closing() {
        let text = r#"{"d":{"L":[{"recto":"a\"#;
        let (out, kind) = repair(text);
        assert!(matches!(kind, Repair::ClosingSuffix { .. }));
        assert_eq!(parses(&out)["d"]["L"][0]["recto"], "a");

        let text = r#"{"d":{"L":[{"recto":"a\\"#;
        assert_eq!(parses(&repair(text).0)["d"]["L"][0]["recto"], "a\\");
    }

    #[test]
    fn truncated_in_other_field_gets_closing_suffix() {
        let text = r#"{"d":{"L":[{"recto":"What is"#;
        let (out, kind) = repair(text);
        assert_eq!(
            kind,
            Repair::ClosingSuffix {
                suffix: "\"}]}}".into()
            }
        );
        assert_eq!(parses(&out)["d"]["L"][0]["recto"], "What is");
    }

    #[test]
    fn dangling_comma_dropped() {
        let text = r#"{"d":{"L":[{"recto":"Q","verso":"A"},"#;
        let (out, _) = repair(text);
        assert_eq!(parses(&out)["d"]["L"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn half_written_key_dropped() {
        let text = r#"{"d":{"L":[{"recto":"Q","sect"#;
        let (out, _) = repair(text);
        assert_eq!(parses(&out)["d"]["L"][0]["recto"], "Q");
    }

    #[test]
    fn ends_with_closing_brace_left_alone_even_if_invalid() {
        let text = r#"{"d":[{"a":1}"#;
        // Ends with '}' so it is assumed complete; the caller's parse decides.
        assert_eq!(repair(text).1, Repair::Untouched);
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(repair("No flashcards today").1, Repair::Untouched);
    }
}
