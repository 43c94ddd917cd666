// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use serde::Serialize;

pub mod discovery;
pub mod end_session;
pub mod keys;

/// Error body returned to clients, following the OAuth 2.0 error format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ClientError {
    error: &'static str,
    error_description: String,
}

impl ClientError {
    pub(crate) fn new(error: &'static str, error_description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: error_description.into(),
        }
    }
}
