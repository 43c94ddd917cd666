// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! A module containing the in-memory implementation of the user-related
//! repositories

use async_trait::async_trait;
use idp_data_model::User;
use idp_storage::{Clock, user::UserRepository};
use rand::RngCore;
use ulid::Ulid;

use crate::{MemoryError, SharedState};

mod session;

pub use self::session::MemoryBrowserSessionRepository;

/// An implementation of [`UserRepository`] for the in-memory store
pub struct MemoryUserRepository<'c> {
    state: &'c SharedState,
}

impl<'c> MemoryUserRepository<'c> {
    /// Create a new [`MemoryUserRepository`] on the shared store
    pub(crate) fn new(state: &'c SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository<'_> {
    type Error = MemoryError;

    #[tracing::instrument(
        name = "db.user.add",
        skip_all,
        fields(user.username = username, user.id),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        username: String,
        sub: String,
    ) -> Result<User, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("user.id", tracing::field::display(id));

        let user = User {
            id,
            username,
            sub,
            created_at,
        };

        let mut state = self.state.write()?;
        state.users.insert(id, user.clone());

        Ok(user)
    }
}
