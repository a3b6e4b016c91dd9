//! Gemini wire types
//!
//! Request and response shapes of the `generateContent` family of endpoints.
//! Response structs tolerate missing fields so partial streaming events decode.

use serde::{Deserialize, Serialize};

/// Body of `generateContent` / `streamGenerateContent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Part {
    /// Absent on non-text parts; decodes as empty.
    #[serde(default)]
    pub text: String,
    /// Set on thought-summary parts of thinking models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            thought: None,
        }
    }

    pub fn is_thought(&self) -> bool {
        self.thought == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

/// Response of `generateContent`, and each event of `streamGenerateContent`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    pub model_version: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's non-thought parts.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.is_thought())
                    .map(|p| p.text.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Text of the first non-thought part of the first candidate, if non-empty.
    ///
    /// This is the delta carried by one streaming event.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find(|p| !p.is_thought())
            .map(|p| p.text.as_str())
            .filter(|text| !text.is_empty())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }
}

/// Streaming events share the non-streaming shape.
pub type GeminiStreamResponse = GenerateContentResponse;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SafetyRating {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub probability: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_in_camel_case() {
        let req = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part::text("hello")],
            }],
            generation_config: GenerationConfig {
                temperature: Some(0.5),
                max_output_tokens: Some(64),
                top_p: None,
                top_k: None,
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": {"temperature": 0.5, "maxOutputTokens": 64}
            })
        );
    }

    #[test]
    fn response_text_skips_thought_parts() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[
                {"text":"pondering","thought":true},{"text":"Hello "},{"text":"world"}
            ]},"finishReason":"STOP"}],"modelVersion":"gemini-2.5-flash"}"#,
        )
        .unwrap();
        assert_eq!(resp.text(), "Hello world");
        assert_eq!(resp.finish_reason(), Some("STOP"));
        assert_eq!(resp.model_version.as_deref(), Some("gemini-2.5-flash"));
    }

    #[test]
    fn partial_event_decodes() {
        let resp: GeminiStreamResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#).unwrap();
        assert_eq!(resp.first_text(), None);
        assert_eq!(resp.finish_reason(), Some("MAX_TOKENS"));
    }

    #[test]
    fn stream_delta_skips_thought_parts() {
        let resp: GeminiStreamResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"pondering","thought":true},{"text":"Hello"}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.first_text(), Some("Hello"));

        let only_thought: GeminiStreamResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"hmm","thought":true}]}}]}"#,
        )
        .unwrap();
        assert_eq!(only_thought.first_text(), None);
    }

    #[test]
    fn incomplete_safety_ratings_still_decode() {
        let resp: GeminiStreamResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]},
                "safetyRatings":[{"category":"HARM_CATEGORY_HARASSMENT"},{"probability":"LOW"}]}]}"#,
        )
        .unwrap();
        assert_eq!(resp.first_text(), Some("ok"));
        assert_eq!(resp.candidates[0].safety_ratings[0].probability, "");
        assert_eq!(resp.candidates[0].safety_ratings[1].category, "");
    }
}
