// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Keyrelay workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The closed set of supported LLM providers.
///
/// Dispatch on this enum is exhaustive everywhere (endpoint mapping, wire
/// format selection, pricing), so adding a provider is a compile-time-checked
/// change rather than a string branch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Grok,
    Claude,
    Google,
}

/// Validity state of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    /// Never validated since creation.
    Unknown,
    /// Last validation round-trip was accepted by the provider.
    Valid,
    /// Last validation round-trip was rejected or failed.
    Invalid,
}

/// One message in a chat conversation, in the neutral role/content form
/// all provider wire formats are built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "user", "assistant", or "system".
    pub role: String,
    /// Plain text content.
    pub content: String,
}

/// Provider-reported token counts for one completed call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt (input side).
    pub prompt_tokens: u32,
    /// Tokens generated in the completion (output side).
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Prompt plus completion tokens.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}
