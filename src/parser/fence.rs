//! Markdown code-fence removal.
//!
//! Models are asked for bare JSON but often wrap it in ```` ```json ```` fences,
//! sometimes with prose around the block. Text that already opens as a JSON
//! document is returned trimmed, so Markdown inside its string values keeps
//! its own fences. Text that opens with a fence (tagged or not) loses the
//! leading and trailing markers; a fence that was opened but never closed
//! (truncated output) is still removed from the front. Otherwise a tagged
//! block found inside surrounding prose is extracted.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json\s*([\s\S]*?)```").unwrap());

static RE_LEADING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```(?:json)?").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```$").unwrap());

/// Trim and remove code fences around an embedded JSON document.
pub fn strip_fences(raw: &str) -> String {
    let clean = raw.trim();
    if clean.starts_with('{') || clean.starts_with('[') {
        return clean.to_string();
    }

    if clean.starts_with("```") {
        let without_lead = RE_LEADING_FENCE.replace(clean, "");
        return RE_TRAILING_FENCE
            .replace(without_lead.trim_end(), "")
            .trim()
            .to_string();
    }

    match RE_JSON_BLOCK.captures(clean) {
        Some(caps) => caps[1].trim().to_string(),
        None => clean.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_fence() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn untagged_fence() {
        assert_eq!(strip_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn block_inside_prose() {
        let raw = "Here are your flashcards:\n```json\n{\"a\":1}\n```\nGood luck!";
        assert_eq!(strip_fences(raw), "{\"a\":1}");
    }

    #[test]
    fn unterminated_fence() {
        assert_eq!(strip_fences("```json\n{\"a\":\"tru"), "{\"a\":\"tru");
    }

    #[test]
    fn fence_inside_json_string_is_kept() {
        let doc = r#"{"explanation":"Example:\n```json\n{\"debug\": true}\n```\nDone."}"#;
        assert_eq!(strip_fences(doc), doc);
        assert_eq!(strip_fences(&format!("```json\n{doc}\n```")), doc);
    }

    #[test]
    fn no_fence_is_trimmed_only() {
        assert_eq!(strip_fences("  {\"a\":1}\n"), "{\"a\":1}");
    }
}
