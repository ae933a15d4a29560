//! Translation and phonetic payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A payload field: either one line per element, or a single newline-joined string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// List values are passed through exactly as the model produced them.
    Lines(Vec<Value>),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Lines(_) => None,
        }
    }

    pub fn as_lines(&self) -> Option<&[Value]> {
        match self {
            Self::Lines(lines) => Some(lines),
            Self::Text(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(lines: Vec<&str>) -> Self {
        Self::Lines(lines.into_iter().map(Value::from).collect())
    }
}

/// Structured result recovered from a model response.
///
/// `vi` carries a translation, `phonetic` a romanization. Absent fields are
/// omitted when serialized so cache files hold exactly what was extracted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LyricsPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vi: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<Value>,
}

impl LyricsPayload {
    pub fn translation(vi: impl Into<FieldValue>) -> Self {
        Self {
            vi: Some(vi.into()),
            ..Default::default()
        }
    }

    pub fn phonetic(phonetic: impl Into<FieldValue>, detected_language: Option<&str>) -> Self {
        Self {
            phonetic: Some(phonetic.into()),
            detected_language: detected_language.map(Value::from),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vi.is_none() && self.phonetic.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_only_present_fields() {
        let payload = LyricsPayload::translation(vec!["안녕", ""]);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"vi": ["안녕", ""]}));
    }

    #[test]
    fn deserializes_text_and_lines() {
        let payload: LyricsPayload =
            serde_json::from_value(json!({"phonetic": "Tōkyō", "detected_language": "ja"}))
                .unwrap();
        assert_eq!(payload.phonetic.as_ref().and_then(|p| p.as_text()), Some("Tōkyō"));
        assert_eq!(payload.detected_language, Some(json!("ja")));

        let payload: LyricsPayload = serde_json::from_value(json!({"vi": ["a", 1]})).unwrap();
        assert_eq!(payload.vi.as_ref().and_then(|v| v.as_lines()).map(<[_]>::len), Some(2));
    }
}
