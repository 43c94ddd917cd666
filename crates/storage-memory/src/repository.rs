// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{FutureExt, future::BoxFuture};
use idp_storage::{
    BoxRepository, Repository, RepositoryAccess, RepositoryError, RepositoryFactory,
    RepositoryTransaction,
    oauth2::{IdTokenRepository, OAuth2ClientRepository},
    user::{BrowserSessionRepository, UserRepository},
};

use crate::{
    MemoryError, SharedState,
    oauth2::{MemoryIdTokenRepository, MemoryOAuth2ClientRepository},
    user::{MemoryBrowserSessionRepository, MemoryUserRepository},
};

/// An implementation of the [`RepositoryFactory`] trait backed by a store
/// living in memory.
///
/// Every repository created by the same factory, or by one of its clones,
/// sees the same data.
#[derive(Clone, Default)]
pub struct MemoryRepositoryFactory {
    state: Arc<SharedState>,
}

impl MemoryRepositoryFactory {
    /// Create a new factory with an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a repository on the store, without type erasure
    #[must_use]
    pub fn repository(&self) -> MemoryRepository {
        MemoryRepository {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl RepositoryFactory for MemoryRepositoryFactory {
    async fn create(&self) -> Result<BoxRepository, RepositoryError> {
        Ok(self.repository().boxed())
    }
}

/// An implementation of the [`Repository`] trait backed by the in-memory
/// store.
pub struct MemoryRepository {
    state: Arc<SharedState>,
}

impl Repository<MemoryError> for MemoryRepository {}

impl RepositoryTransaction for MemoryRepository {
    type Error = MemoryError;

    fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        futures_util::future::ready(Ok(())).boxed()
    }

    fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        futures_util::future::ready(Ok(())).boxed()
    }
}

impl RepositoryAccess for MemoryRepository {
    type Error = MemoryError;

    fn oauth2_client<'c>(
        &'c mut self,
    ) -> Box<dyn OAuth2ClientRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryOAuth2ClientRepository::new(&self.state))
    }

    fn id_token<'c>(&'c mut self) -> Box<dyn IdTokenRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryIdTokenRepository::new(&self.state))
    }

    fn user<'c>(&'c mut self) -> Box<dyn UserRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryUserRepository::new(&self.state))
    }

    fn browser_session<'c>(
        &'c mut self,
    ) -> Box<dyn BrowserSessionRepository<Error = Self::Error> + 'c> {
        Box::new(MemoryBrowserSessionRepository::new(&self.state))
    }
}
