// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! An implementation of the storage traits which keeps everything in the
//! process memory.
//!
//! Writes are applied as soon as they are made, so saving or cancelling a
//! [`MemoryRepository`] has no effect. Everything is lost when the process
//! exits, which makes it suitable for tests and for providers whose clients
//! all come from the configuration.

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use idp_data_model::{BrowserSession, Client, IdTokenClaims, User};
use thiserror::Error;
use ulid::Ulid;

pub mod oauth2;
mod repository;
pub mod user;


pub use self::repository::{MemoryRepository, MemoryRepositoryFactory};

/// Generic error when interacting with the in-memory store
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MemoryError {
    /// A thread panicked while holding the lock on the store
    #[error("The in-memory store is poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
struct MemoryState {
    clients: BTreeMap<Ulid, Client>,
    id_tokens: HashMap<String, IdTokenClaims>,
    users: BTreeMap<Ulid, User>,
    browser_sessions: BTreeMap<Ulid, BrowserSession>,
}

/// The store shared by every repository handed out by a
/// [`MemoryRepositoryFactory`]
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    inner: RwLock<MemoryState>,
}

impl SharedState {
    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, MemoryError> {
        self.inner.read().map_err(|_| MemoryError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, MemoryError> {
        self.inner.write().map_err(|_| MemoryError::Poisoned)
    }
}
