// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for Keyrelay.
//!
//! Owns the schema (embedded refinery migrations), the async connection
//! wrapper, typed per-table query modules, and the [`CredentialStore`] that
//! layers vault encryption over the credentials table.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod store;

pub use database::Database;
pub use models::{CredentialRow, CredentialSummary, UsageEventRow};
pub use store::{CredentialStore, NewCredential, now_timestamp};
