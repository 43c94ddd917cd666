// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! A module containing the in-memory implementation of the OAuth 2.0 related
//! repositories

mod client;
mod id_token;

pub use self::{client::MemoryOAuth2ClientRepository, id_token::MemoryIdTokenRepository};
