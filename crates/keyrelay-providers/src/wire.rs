// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-provider wire formats.
//!
//! Three request/response shapes cover the four providers: OpenAI and Grok
//! share the chat-completions format, Claude uses the Anthropic Messages
//! format, Google uses the Gemini generateContent format. Each shape converts
//! from the neutral [`ChatMessage`] history and back into the neutral
//! [`ChatCompletion`].

use keyrelay_core::{ChatMessage, RelayError, TokenUsage};
use serde::{Deserialize, Serialize};

/// Neutral result of one chat call, whichever wire format produced it.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    /// The assistant's text reply.
    pub content: String,
    /// Provider-reported token counts.
    pub usage: TokenUsage,
    /// Provider-reported cost in USD, when the provider includes one.
    /// Missing stays `None`; it is never defaulted to zero.
    pub reported_cost: Option<f64>,
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions (OpenAI, Grok)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiResponse {
    pub choices: Vec<OpenAiChoice>,
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiChoice {
    pub message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    /// Some OpenAI-compatible gateways attach a dollar cost here.
    #[serde(default)]
    pub cost: Option<f64>,
}

impl OpenAiRequest {
    pub fn new(model: &str, messages: &[ChatMessage], max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            messages: messages.to_vec(),
            max_tokens,
        }
    }
}

impl OpenAiResponse {
    pub fn into_completion(self) -> Result<ChatCompletion, RelayError> {
        let content = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RelayError::ProviderUnavailable {
                message: "response contained no choices".to_string(),
                source: None,
            })?;
        let (usage, reported_cost) = match self.usage {
            Some(u) => (
                TokenUsage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                },
                u.cost,
            ),
            None => (TokenUsage::default(), None),
        };
        Ok(ChatCompletion {
            content,
            usage,
            reported_cost,
        })
    }
}

// ---------------------------------------------------------------------------
// Anthropic Messages (Claude)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    pub content: Vec<AnthropicContentBlock>,
    pub usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

impl AnthropicRequest {
    /// The Messages API takes system prompts as a top-level field, not a
    /// message role, so system messages are lifted out of the history.
    pub fn new(model: &str, messages: &[ChatMessage], max_tokens: u32) -> Self {
        let mut system_parts = Vec::new();
        let mut turns = Vec::new();
        for msg in messages {
            if msg.role == "system" {
                system_parts.push(msg.content.clone());
            } else {
                turns.push(msg.clone());
            }
        }
        Self {
            model: model.to_string(),
            max_tokens,
            messages: turns,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n"))
            },
        }
    }
}

impl AnthropicResponse {
    pub fn into_completion(self) -> ChatCompletion {
        let content = self
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");
        ChatCompletion {
            content,
            usage: TokenUsage {
                prompt_tokens: self.usage.input_tokens,
                completion_tokens: self.usage.output_tokens,
            },
            reported_cost: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Gemini generateContent (Google)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata", default)]
    pub usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
pub struct GeminiCandidate {
    pub content: GeminiContent,
}

#[derive(Debug, Deserialize)]
pub struct GeminiUsage {
    #[serde(rename = "promptTokenCount", default)]
    pub prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    pub candidates_token_count: u32,
}

impl GeminiRequest {
    /// Gemini uses "model" where everyone else says "assistant" and lifts
    /// system prompts into a dedicated field.
    pub fn new(messages: &[ChatMessage], max_tokens: u32) -> Self {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();
        for msg in messages {
            match msg.role.as_str() {
                "system" => system_parts.push(GeminiPart {
                    text: msg.content.clone(),
                }),
                role => contents.push(GeminiContent {
                    role: Some(if role == "assistant" { "model" } else { "user" }.to_string()),
                    parts: vec![GeminiPart {
                        text: msg.content.clone(),
                    }],
                }),
            }
        }
        Self {
            contents,
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(GeminiContent {
                    role: None,
                    parts: system_parts,
                })
            },
            generation_config: GeminiGenerationConfig {
                max_output_tokens: max_tokens,
            },
        }
    }
}

impl GeminiResponse {
    pub fn into_completion(self) -> Result<ChatCompletion, RelayError> {
        let content = self
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| RelayError::ProviderUnavailable {
                message: "response contained no candidates".to_string(),
                source: None,
            })?;
        let usage = self
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();
        Ok(ChatCompletion {
            content,
            usage,
            reported_cost: None,
        })
    }
}

/// Generic provider error body, the `{"error": {"message": ...}}` shape all
/// four providers use. Parsing is best effort; the raw body is the fallback.
#[derive(Debug, Deserialize)]
pub struct ProviderErrorBody {
    pub error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ProviderErrorDetail {
    #[serde(default)]
    pub message: String,
}

/// Extract a human-readable message from an error response body.
pub fn error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ProviderErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ => format!("provider returned status {status}"),
    }
}
