// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

#![allow(clippy::module_name_repetitions)]

mod clock;
pub mod oauth2;
mod site_config;
pub(crate) mod users;

pub use ulid::Ulid;

pub use self::{
    clock::{Clock, MockClock, SystemClock},
    oauth2::{Client, ClientType, IdTokenClaims},
    site_config::{LogoutPolicy, SiteConfig},
    users::{BrowserSession, User},
};
