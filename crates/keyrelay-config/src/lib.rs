// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for Keyrelay.
//!
//! Layered loading (defaults, TOML files, `KEYRELAY_*` env vars) via Figment,
//! with `deny_unknown_fields` models and startup validation.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str, validate};
pub use model::KeyrelayConfig;
