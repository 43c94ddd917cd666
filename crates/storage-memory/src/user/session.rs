// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use idp_data_model::{BrowserSession, User};
use idp_storage::{Clock, user::BrowserSessionRepository};
use rand::RngCore;
use ulid::Ulid;

use crate::{MemoryError, SharedState};

/// An implementation of [`BrowserSessionRepository`] for the in-memory store
pub struct MemoryBrowserSessionRepository<'c> {
    state: &'c SharedState,
}

impl<'c> MemoryBrowserSessionRepository<'c> {
    /// Create a new [`MemoryBrowserSessionRepository`] on the shared store
    pub(crate) fn new(state: &'c SharedState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl BrowserSessionRepository for MemoryBrowserSessionRepository<'_> {
    type Error = MemoryError;

    #[tracing::instrument(
        name = "db.browser_session.lookup",
        skip_all,
        fields(user_session.id = %id),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<BrowserSession>, Self::Error> {
        let state = self.state.read()?;
        let Some(mut session) = state.browser_sessions.get(&id).cloned() else {
            return Ok(None);
        };

        // The user is read from its own table, sessions of unknown users are
        // not returned
        let Some(user) = state.users.get(&session.user.id) else {
            return Ok(None);
        };
        session.user = user.clone();

        Ok(Some(session))
    }

    #[tracing::instrument(
        name = "db.browser_session.add",
        skip_all,
        fields(user.id = %user.id, user_session.id),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        user: &User,
        user_agent: Option<String>,
    ) -> Result<BrowserSession, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("user_session.id", tracing::field::display(id));

        let session = BrowserSession {
            id,
            user: user.clone(),
            created_at,
            finished_at: None,
            user_agent,
        };

        let mut state = self.state.write()?;
        state.browser_sessions.insert(id, session.clone());

        Ok(session)
    }

    #[tracing::instrument(
        name = "db.browser_session.finish",
        skip_all,
        fields(user_session.id = %user_session.id),
        err,
    )]
    async fn finish(
        &mut self,
        clock: &dyn Clock,
        mut user_session: BrowserSession,
    ) -> Result<BrowserSession, Self::Error> {
        let mut state = self.state.write()?;

        let Some(stored) = state.browser_sessions.get_mut(&user_session.id) else {
            // Not ours, just mark the copy we were given as finished
            user_session.finished_at.get_or_insert_with(|| clock.now());
            return Ok(user_session);
        };

        if stored.active() {
            stored.finished_at = Some(clock.now());
        }

        Ok(stored.clone())
    }
}
