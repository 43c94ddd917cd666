// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ConfigurationSection, util::error_on_field};

const fn default_true() -> bool {
    true
}

fn default_allowed_redirect_uri_schemes() -> Vec<String> {
    vec!["http".to_owned(), "https".to_owned()]
}

/// Configuration of the RP-Initiated Logout endpoint
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LogoutConfig {
    /// Whether the logout endpoint is mounted and advertised. Defaults to
    /// `false`.
    #[serde(default)]
    pub enabled: bool,

    /// Always ask the user to confirm, even when the request carries an ID
    /// token matching the current user. Defaults to `true`.
    #[serde(default = "default_true")]
    pub always_prompt: bool,

    /// Accept an `id_token_hint` which has expired. Defaults to `false`.
    #[serde(default)]
    pub accept_expired_id_token_hint: bool,

    /// URI schemes allowed when redirecting to the application root after
    /// logout
    #[serde(default = "default_allowed_redirect_uri_schemes")]
    pub allowed_redirect_uri_schemes: Vec<String>,
}

impl Default for LogoutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            always_prompt: default_true(),
            accept_expired_id_token_hint: false,
            allowed_redirect_uri_schemes: default_allowed_redirect_uri_schemes(),
        }
    }
}

impl ConfigurationSection for LogoutConfig {
    const PATH: Option<&'static str> = Some("logout");

    fn validate(
        &self,
        figment: &figment::Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        if self.allowed_redirect_uri_schemes.is_empty() {
            let error = figment::Error::from(
                "At least one redirect URI scheme must be allowed".to_owned(),
            );
            return Err(
                error_on_field::<Self>(figment, error, "allowed_redirect_uri_schemes").into(),
            );
        }

        Ok(())
    }
}
