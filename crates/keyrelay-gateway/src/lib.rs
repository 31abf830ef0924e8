// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Keyrelay HTTP gateway: bearer auth, the `/api` routes, and the
//! JSON error surface.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthTokens;
pub use server::{AppState, build_router, start_server};
