// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Whether a client is able to hold a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// The client authenticates with a secret or a key
    Confidential,

    /// The client runs on the user's device and holds no credential
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Client {
    pub id: Ulid,

    /// Client identifier
    pub client_id: String,

    pub client_type: ClientType,

    /// Name of the Client to be presented to the End-User
    pub client_name: Option<String>,

    /// URIs the End-User may be sent to after logging out. They are matched
    /// as exact strings.
    pub post_logout_redirect_uris: Vec<String>,
}

impl Client {
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.client_type == ClientType::Confidential
    }

    /// The URI schemes this client may redirect to after logout.
    ///
    /// `https` is always allowed, `http` only for confidential clients.
    #[must_use]
    pub fn allowed_schemes(&self) -> &'static [&'static str] {
        match self.client_type {
            ClientType::Confidential => &["https", "http"],
            ClientType::Public => &["https"],
        }
    }

    /// Whether the exact URI was registered as a post-logout redirect URI
    #[must_use]
    pub fn is_post_logout_redirect_allowed(&self, uri: &str) -> bool {
        self.post_logout_redirect_uris
            .iter()
            .any(|registered| registered == uri)
    }

    /// Name to show to the End-User, falling back to the client ID
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.client_name.as_deref().unwrap_or(&self.client_id)
    }
}
