//! Legacy response shape
//!
//! Some callers still expect an OpenAI-style `choices`/`usage` body. This is
//! a pure translation from the Gemini response; nothing in the transport or
//! the decoder depends on it.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, Usage};

use super::types::GenerateContentResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyChatCompletion {
    pub choices: Vec<LegacyChoice>,
    pub usage: Usage,
}

/// Map every candidate to a choice; missing usage becomes all zeros.
///
/// Each choice carries the candidate's first text part, or an empty
/// assistant message when there is none.
pub fn to_legacy(response: &GenerateContentResponse) -> LegacyChatCompletion {
    let choices = response
        .candidates
        .iter()
        .map(|c| LegacyChoice {
            index: c.index,
            message: ChatMessage::assistant(
                c.content
                    .as_ref()
                    .and_then(|content| content.parts.first())
                    .map(|p| p.text.clone())
                    .unwrap_or_default(),
            ),
            finish_reason: c.finish_reason.clone(),
        })
        .collect();

    LegacyChatCompletion {
        choices,
        usage: response.usage_metadata.map(Usage::from).unwrap_or_default(),
    }
}

impl From<super::types::UsageMetadata> for Usage {
    fn from(meta: super::types::UsageMetadata) -> Self {
        Self {
            prompt_tokens: meta.prompt_token_count,
            completion_tokens: meta.candidates_token_count,
            total_tokens: meta.total_token_count,
        }
    }
}
