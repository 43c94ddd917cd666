// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use chrono::Duration;
use idp_data_model::{Client, IdTokenClaims, User};

use crate::{Clock, repository_impl};

/// An [`IdTokenRepository`] resolves ID tokens previously issued by the
/// provider back to their claims
#[async_trait]
pub trait IdTokenRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Find the claims of an ID token
    ///
    /// Returns `None` if the token is unknown or could not be verified. The
    /// expiry of the token is *not* checked.
    ///
    /// # Parameters
    ///
    /// * `token`: The serialized ID token
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn find_by_token(&mut self, token: &str) -> Result<Option<IdTokenClaims>, Self::Error>;

    /// Record an ID token issued to a client for a user
    ///
    /// Returns the claims of the token
    ///
    /// # Parameters
    ///
    /// * `clock`: The clock used to generate timestamps
    /// * `token`: The serialized ID token
    /// * `client`: The client the token was issued to
    /// * `user`: The user the token was issued for
    /// * `expires_in`: How long the token is valid for
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        clock: &dyn Clock,
        token: String,
        client: &Client,
        user: &User,
        expires_in: Duration,
    ) -> Result<IdTokenClaims, Self::Error>;
}

repository_impl!(IdTokenRepository:
    async fn find_by_token(&mut self, token: &str) -> Result<Option<IdTokenClaims>, Self::Error>;

    async fn add(
        &mut self,
        clock: &dyn Clock,
        token: String,
        client: &Client,
        user: &User,
        expires_in: Duration,
    ) -> Result<IdTokenClaims, Self::Error>;
);
