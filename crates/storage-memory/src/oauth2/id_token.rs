// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use chrono::Duration;
use idp_data_model::{Client, IdTokenClaims, User};
use idp_storage::{Clock, oauth2::IdTokenRepository};

use crate::{MemoryError, SharedState};

/// An implementation of [`IdTokenRepository`] for the in-memory store
pub struct MemoryIdTokenRepository<'c> {
    state: &'c SharedState,
}

impl<'c> MemoryIdTokenRepository<'c> {
    /// Create a new [`MemoryIdTokenRepository`] on the shared store
    pub(crate) fn new(state: &'c SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl IdTokenRepository for MemoryIdTokenRepository<'_> {
    type Error = MemoryError;

    #[tracing::instrument(name = "db.id_token.find_by_token", skip_all, err)]
    async fn find_by_token(&mut self, token: &str) -> Result<Option<IdTokenClaims>, Self::Error> {
        let state = self.state.read()?;
        Ok(state.id_tokens.get(token).cloned())
    }

    #[tracing::instrument(
        name = "db.id_token.add",
        skip_all,
        fields(
            %client.client_id,
            user.id = %user.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        clock: &dyn Clock,
        token: String,
        client: &Client,
        user: &User,
        expires_in: Duration,
    ) -> Result<IdTokenClaims, Self::Error> {
        let issued_at = clock.now();
        let claims = IdTokenClaims {
            sub: user.sub.clone(),
            client_id: client.client_id.clone(),
            issued_at,
            expires_at: issued_at + expires_in,
        };

        let mut state = self.state.write()?;
        state.id_tokens.insert(token, claims.clone());

        Ok(claims)
    }
}
