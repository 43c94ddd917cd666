// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

#![deny(clippy::future_not_send)]
#![allow(clippy::module_name_repetitions)]

pub mod cookies;
mod error_wrapper;
pub mod origin;
pub mod session;

pub use axum;

pub use self::{
    cookies::{CookieJar, CookieManager},
    error_wrapper::ErrorWrapper,
    origin::RequestOrigin,
    session::{SessionInfo, SessionInfoExt},
};
