// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use idp_data_model::{Client, ClientType};
use idp_storage::{Clock, oauth2::OAuth2ClientRepository};
use rand::RngCore;
use ulid::Ulid;

use crate::{MemoryError, SharedState};

/// An implementation of [`OAuth2ClientRepository`] for the in-memory store
pub struct MemoryOAuth2ClientRepository<'c> {
    state: &'c SharedState,
}

impl<'c> MemoryOAuth2ClientRepository<'c> {
    /// Create a new [`MemoryOAuth2ClientRepository`] on the shared store
    pub(crate) fn new(state: &'c SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl OAuth2ClientRepository for MemoryOAuth2ClientRepository<'_> {
    type Error = MemoryError;

    #[tracing::instrument(
        name = "db.oauth2_client.find_by_client_id",
        skip_all,
        fields(oauth2_client.client_id = client_id),
        err,
    )]
    async fn find_by_client_id(&mut self, client_id: &str) -> Result<Option<Client>, Self::Error> {
        let state = self.state.read()?;
        Ok(state
            .clients
            .values()
            .find(|client| client.client_id == client_id)
            .cloned())
    }

    #[tracing::instrument(
        name = "db.oauth2_client.upsert_static",
        skip_all,
        fields(oauth2_client.client_id = client_id),
        err,
    )]
    async fn upsert_static(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        client_id: String,
        client_type: ClientType,
        client_name: Option<String>,
        post_logout_redirect_uris: Vec<String>,
    ) -> Result<Client, Self::Error> {
        let mut state = self.state.write()?;

        let existing = state
            .clients
            .values()
            .find(|client| client.client_id == client_id)
            .map(|client| client.id);
        let id = existing
            .unwrap_or_else(|| Ulid::from_datetime_with_source(clock.now().into(), rng));

        let client = Client {
            id,
            client_id,
            client_type,
            client_name,
            post_logout_redirect_uris,
        };
        state.clients.insert(id, client.clone());

        Ok(client)
    }

    #[tracing::instrument(name = "db.oauth2_client.all_static", skip_all, err)]
    async fn all_static(&mut self) -> Result<Vec<Client>, Self::Error> {
        let state = self.state.read()?;
        let mut clients: Vec<Client> = state.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Ok(clients)
    }
}
