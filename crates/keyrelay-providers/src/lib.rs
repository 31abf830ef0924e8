// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound provider integration: endpoint mapping, per-provider wire
//! formats, and the single-attempt [`ChatClient`] used by both proxying and
//! credential validation.

pub mod client;
pub mod endpoints;
pub mod wire;

pub use client::ChatClient;
pub use wire::ChatCompletion;
