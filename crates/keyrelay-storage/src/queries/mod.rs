// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. One module per table this crate owns.

pub mod credentials;
pub mod usage_events;
