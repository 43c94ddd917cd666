// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use idp_data_model::{Client, ClientType};
use rand_core::RngCore;

use crate::{Clock, repository_impl};

/// An [`OAuth2ClientRepository`] helps interacting with [`Client`] saved in the
/// storage backend
#[async_trait]
pub trait OAuth2ClientRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Find an OAuth2 client by its client ID
    ///
    /// Returns `None` if no client is registered with this client ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn find_by_client_id(&mut self, client_id: &str) -> Result<Option<Client>, Self::Error>;

    /// Create or update a client from the configuration
    ///
    /// Returns the client as saved
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate timestamps
    /// * `client_id`: The client ID of the client
    /// * `client_type`: Whether the client is confidential or public
    /// * `client_name`: The name shown to the End-User
    /// * `post_logout_redirect_uris`: The URIs registered for the end of
    ///   session redirects
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    #[allow(clippy::too_many_arguments)]
    async fn upsert_static(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        client_id: String,
        client_type: ClientType,
        client_name: Option<String>,
        post_logout_redirect_uris: Vec<String>,
    ) -> Result<Client, Self::Error>;

    /// Load all the clients which were registered from the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn all_static(&mut self) -> Result<Vec<Client>, Self::Error>;
}

repository_impl!(OAuth2ClientRepository:
    async fn find_by_client_id(&mut self, client_id: &str) -> Result<Option<Client>, Self::Error>;

    async fn upsert_static(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        client_id: String,
        client_type: ClientType,
        client_name: Option<String>,
        post_logout_redirect_uris: Vec<String>,
    ) -> Result<Client, Self::Error>;

    async fn all_static(&mut self) -> Result<Vec<Client>, Self::Error>;
);
