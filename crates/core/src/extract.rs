//! Tolerant extraction of payloads from generative model output.
//!
//! The model is asked for a bare JSON object but regularly wraps it in code
//! fences, surrounds it with prose, or emits something that is not JSON at all.
//! Extraction runs an ordered chain of independent tiers and the first one that
//! produces a payload wins:
//!
//! 1. [`ExtractionTier::Whole`]: strip fences and parse the whole text.
//! 2. [`ExtractionTier::BraceSubstring`]: parse from the first `{` to the last `}`.
//! 3. [`ExtractionTier::FieldRegex`]: locate `"vi"` / `"phonetic"` fields by regex.
//! 4. [`ExtractionTier::Fallback`]: return the raw text as the translation.
//!
//! The last tier cannot fail, so [`extract`] is total.

use crate::payload::{FieldValue, LyricsPayload};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```[a-z]*\n?").expect("valid regex"));

static JSON_TAG_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*json\s*$").expect("valid regex"));

static VI_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""vi"\s*:\s*"([\s\S]*?)"\s*[},]"#).expect("valid regex"));

static VI_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""vi"\s*:\s*(\[[\s\S]*?\])\s*[},]"#).expect("valid regex"));

static PHONETIC_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""phonetic"\s*:\s*"([\s\S]*?)"\s*[},]"#).expect("valid regex")
});

static PHONETIC_ARRAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""phonetic"\s*:\s*(\[[\s\S]*?\])\s*[},]"#).expect("valid regex")
});

/// Which extraction strategy produced a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtractionTier {
    Whole,
    BraceSubstring,
    FieldRegex,
    Fallback,
}

impl ExtractionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Whole => "whole",
            Self::BraceSubstring => "brace_substring",
            Self::FieldRegex => "field_regex",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ExtractionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An extracted payload together with the tier that recovered it.
#[derive(Clone, Debug, PartialEq)]
pub struct Extraction {
    pub payload: LyricsPayload,
    pub tier: ExtractionTier,
}

/// Extract a payload from model output. Never fails.
pub fn extract(text: &str) -> LyricsPayload {
    extract_payload(text).payload
}

/// Extract a payload and report which tier succeeded.
pub fn extract_payload(text: &str) -> Extraction {
    let cleaned = strip_code_fences(text);

    let tiers: [(ExtractionTier, fn(&str) -> Option<LyricsPayload>); 3] = [
        (ExtractionTier::Whole, parse_whole),
        (ExtractionTier::BraceSubstring, parse_brace_substring),
        (ExtractionTier::FieldRegex, extract_fields),
    ];

    for (tier, attempt) in tiers {
        if let Some(payload) = attempt(&cleaned) {
            tracing::debug!(tier = %tier, "Extracted payload from model output");
            return Extraction { payload, tier };
        }
    }

    tracing::warn!("No structured payload found in model output, using raw text");
    Extraction {
        payload: LyricsPayload::translation(FieldValue::Text(text.replace("\\n", "\n"))),
        tier: ExtractionTier::Fallback,
    }
}

/// Unescape literal `\n`, `\t`, `\"` and `\\` sequences.
///
/// Replacements are applied one after another, so `\\n` becomes a backslash
/// followed by a newline.
pub fn decode_lines(s: &str) -> String {
    s.replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}

fn strip_code_fences(text: &str) -> String {
    let raw = FENCE_OPEN.replace_all(text.trim(), "");
    let raw = raw.replace("```", "");
    JSON_TAG_LINE.replace_all(&raw, "").into_owned()
}

fn parse_whole(cleaned: &str) -> Option<LyricsPayload> {
    parse_object(cleaned)
}

fn parse_brace_substring(cleaned: &str) -> Option<LyricsPayload> {
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&cleaned[start..=end])
}

fn parse_object(candidate: &str) -> Option<LyricsPayload> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(map) => payload_from_map(map),
        _ => None,
    }
}

fn payload_from_map(mut map: Map<String, Value>) -> Option<LyricsPayload> {
    if !map.contains_key("vi") && !map.contains_key("phonetic") {
        return None;
    }
    Some(LyricsPayload {
        vi: map.remove("vi").map(normalize_field),
        phonetic: map.remove("phonetic").map(normalize_field),
        detected_language: map.remove("detected_language"),
    })
}

fn normalize_field(value: Value) -> FieldValue {
    match value {
        Value::Array(lines) => FieldValue::Lines(lines),
        Value::String(text) => FieldValue::Text(decode_lines(&text)),
        other => FieldValue::Text(decode_lines(&other.to_string())),
    }
}

fn extract_fields(cleaned: &str) -> Option<LyricsPayload> {
    let vi = find_field(cleaned, &VI_STRING, &VI_ARRAY);
    let phonetic = find_field(cleaned, &PHONETIC_STRING, &PHONETIC_ARRAY);
    if vi.is_none() && phonetic.is_none() {
        return None;
    }
    Some(LyricsPayload {
        vi,
        phonetic,
        detected_language: None,
    })
}

/// Locate one field by regex, preferring the array form.
fn find_field(cleaned: &str, string_re: &Regex, array_re: &Regex) -> Option<FieldValue> {
    let string_capture = || {
        string_re
            .captures(cleaned)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    };

    if let Some(array) = array_re.captures(cleaned).and_then(|c| c.get(1)) {
        return Some(match serde_json::from_str::<Vec<Value>>(array.as_str()) {
            Ok(lines) => FieldValue::Lines(lines),
            Err(_) => FieldValue::Text(decode_lines(string_capture().unwrap_or_default())),
        });
    }

    string_capture().map(|text| FieldValue::Text(decode_lines(text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_json(payload: &LyricsPayload) -> Value {
        serde_json::to_value(payload).unwrap()
    }

    #[test]
    fn clean_json_is_parsed_whole() {
        let extraction = extract_payload(r#"{"vi": ["안녕", ""]}"#);
        assert_eq!(extraction.tier, ExtractionTier::Whole);
        assert_eq!(to_json(&extraction.payload), json!({"vi": ["안녕", ""]}));
    }

    #[test]
    fn fenced_json_is_parsed_whole() {
        let text = "```json\n{\"phonetic\": \"Tokyo\", \"detected_language\": \"ja\"}\n```";
        let extraction = extract_payload(text);
        assert_eq!(extraction.tier, ExtractionTier::Whole);
        assert_eq!(
            to_json(&extraction.payload),
            json!({"phonetic": "Tokyo", "detected_language": "ja"})
        );
    }

    #[test]
    fn lone_json_tag_line_is_removed() {
        let text = "json\n{\"vi\": [\"a\"]}";
        let extraction = extract_payload(text);
        assert_eq!(extraction.tier, ExtractionTier::Whole);
        assert_eq!(to_json(&extraction.payload), json!({"vi": ["a"]}));
    }

    #[test]
    fn prose_around_json_uses_brace_substring() {
        let text = r#"Sure! {"vi": ["line1","line2"]} Hope that helps!"#;
        let extraction = extract_payload(text);
        assert_eq!(extraction.tier, ExtractionTier::BraceSubstring);
        assert_eq!(to_json(&extraction.payload), json!({"vi": ["line1", "line2"]}));
    }

    #[test]
    fn unterminated_object_uses_field_regex() {
        let text = r#"{"vi": ["a","b"], "note": "this never closes"#;
        let extraction = extract_payload(text);
        assert_eq!(extraction.tier, ExtractionTier::FieldRegex);
        assert_eq!(to_json(&extraction.payload), json!({"vi": ["a", "b"]}));
    }

    #[test]
    fn regex_string_field_is_line_decoded() {
        let text = r#"garbage "phonetic": "sa\nra", "x": oops"#;
        let extraction = extract_payload(text);
        assert_eq!(extraction.tier, ExtractionTier::FieldRegex);
        assert_eq!(
            extraction.payload.phonetic.as_ref().and_then(|p| p.as_text()),
            Some("sa\nra")
        );
        assert!(extraction.payload.detected_language.is_none());
    }

    #[test]
    fn broken_array_falls_back_to_string_capture() {
        let text = r#"{"vi": [oops], "bad"#;
        let extraction = extract_payload(text);
        assert_eq!(extraction.tier, ExtractionTier::FieldRegex);
        assert_eq!(to_json(&extraction.payload), json!({"vi": ""}));
    }

    #[test]
    fn plain_text_falls_back() {
        let extraction = extract_payload("no json here at all");
        assert_eq!(extraction.tier, ExtractionTier::Fallback);
        assert_eq!(to_json(&extraction.payload), json!({"vi": "no json here at all"}));
    }

    #[test]
    fn fallback_converts_escaped_newlines_in_raw_text() {
        let payload = extract("line one\\nline two");
        assert_eq!(to_json(&payload), json!({"vi": "line one\nline two"}));
    }

    #[test]
    fn object_without_known_fields_is_rejected() {
        let extraction = extract_payload(r#"{"text": "hello"}"#);
        assert_eq!(extraction.tier, ExtractionTier::Fallback);
    }

    #[test]
    fn scalar_field_values_are_stringified() {
        let payload = extract(r#"{"vi": "first\\nsecond", "phonetic": 42}"#);
        assert_eq!(to_json(&payload), json!({"vi": "first\nsecond", "phonetic": "42"}));
    }

    #[test]
    fn decode_lines_handles_all_escapes() {
        assert_eq!(decode_lines(r#"a\tb\"c\\d"#), "a\tb\"c\\d");
    }
}
