// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The claims of an ID token previously issued by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdTokenClaims {
    /// Subject the token was issued for
    pub sub: String,

    /// Client the token was issued to
    pub client_id: String,

    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdTokenClaims {
    /// Returns `true` if the token has not expired yet at `now`
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
