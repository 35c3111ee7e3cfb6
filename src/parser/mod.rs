//! Tolerant parsing of model output.
//!
//! Backend results are strings that *should* be JSON but arrive wrapped in
//! markdown fences and, for the long quiz and flashcard payloads, sometimes cut
//! off mid-string. Parsing never fails loudly: the tolerant entry points log
//! and return `None`, and callers show "not available" for that field.
//!
//! ## Data Flow
//!
//! ```text
//! raw ──▶ fence ──▶ repair ──▶ serde_json ──▶ Value
//!         (strip)   (dangling answer / closing suffix)
//! ```
//!
//! 1. [`fence`] : trim and strip ```` ```json ```` fences
//! 2. [`repair`]: dangling-answer-field repair, closing suffix
//! 3. parse     : `serde_json::from_str`
//!
//! [`alias`] resolves field names once the JSON is decoded.

pub mod alias;
pub mod fence;
pub mod repair;

use crate::error::PayloadError;
use serde_json::Value;
use tracing::warn;

pub use alias::{lookup_alias, text_alias};
pub use fence::strip_fences;
pub use repair::{repair, Repair};

/// Run fence stripping and truncation repair without parsing.
pub fn prepare(raw: &str) -> (String, Repair) {
    let clean = strip_fences(raw);
    repair(&clean)
}

/// Parse model output, reporting why it failed.
pub fn try_parse(raw: &str) -> Result<Value, PayloadError> {
    let (text, _) = prepare(raw);
    if text.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Parse model output, or `None` if it cannot be recovered.
///
/// `label` names the payload in the log line (e.g. `"flashcards"`).
pub fn parse_tolerant(raw: &str, label: &str) -> Option<Value> {
    match try_parse(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Could not parse {} payload: {}", label, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_object() {
        assert_eq!(
            parse_tolerant("```json\n{\"a\":1}\n```", "test"),
            Some(json!({"a": 1}))
        );
    }

    #[test]
    fn empty_payload() {
        assert_eq!(try_parse("  ```json\n```  "), Err(PayloadError::Empty));
        assert_eq!(parse_tolerant("", "test"), None);
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_tolerant("I could not generate flashcards.", "test"), None);
    }

    #[test]
    fn fence_stripping_is_transparent_for_clean_json() {
        let clean = r#"{"evaluation_dict":{"Beginner":[{"question":"Q","options":["a) x"],"answer":"a"}]}}"#;
        let fenced = format!("```json\n{clean}\n```");
        assert_eq!(try_parse(clean), try_parse(&fenced));
        assert_eq!(prepare(clean).0, clean);
    }
}
