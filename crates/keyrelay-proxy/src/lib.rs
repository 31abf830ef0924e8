// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request-path services: live credential validation and chat proxying with
//! usage accounting.

pub mod proxy;
pub mod validator;

pub use proxy::{ChatProxy, ChatSend};
pub use validator::{ProviderValidator, ValidationOutcome};
