// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Keyrelay credential vault and proxy.
//!
//! This crate provides the error taxonomy and the common types shared by the
//! vault, storage, provider, and gateway crates.

pub mod error;
pub mod types;

pub use error::RelayError;
pub use types::{ChatMessage, Provider, TokenUsage, Validity};
