// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{collections::BTreeSet, ops::Deref};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ConfigurationSection, util::error_on_field};

/// Whether a client can keep a credential secret
#[derive(JsonSchema, Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientTypeConfig {
    /// The client runs on a server and holds a credential
    Confidential,

    /// The client runs on the user's device. Only `https` post-logout
    /// redirects are allowed for it.
    #[default]
    Public,
}

/// An OAuth 2.0 client configuration
#[derive(JsonSchema, Serialize, Deserialize, Clone, Debug)]
pub struct ClientConfig {
    /// The client ID
    pub client_id: String,

    /// Whether the client is confidential or public
    #[serde(default)]
    pub client_type: ClientTypeConfig,

    /// Name of the client, shown on the logout confirmation page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// List of URIs the user may be redirected to after logging out.
    ///
    /// They are matched exactly against the `post_logout_redirect_uri`
    /// parameter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_logout_redirect_uris: Vec<String>,
}

/// List of OAuth 2.0 clients known by the provider
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClientsConfig(Vec<ClientConfig>);

impl ClientsConfig {
    /// Returns true if all fields are at their default values
    pub(crate) fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl Deref for ClientsConfig {
    type Target = Vec<ClientConfig>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for ClientsConfig {
    type Item = ClientConfig;
    type IntoIter = std::vec::IntoIter<ClientConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<ClientConfig> for ClientsConfig {
    fn from_iter<T: IntoIterator<Item = ClientConfig>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl ConfigurationSection for ClientsConfig {
    const PATH: Option<&'static str> = Some("clients");

    fn validate(
        &self,
        figment: &figment::Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        let mut seen = BTreeSet::new();

        for (index, client) in self.0.iter().enumerate() {
            let field = index.to_string();

            if client.client_id.is_empty() {
                let error = figment::Error::from("client_id must not be empty".to_owned());
                return Err(error_on_field::<Self>(figment, error, &field).into());
            }

            if !seen.insert(client.client_id.as_str()) {
                let error = figment::Error::from(format!(
                    "client_id {:?} is registered more than once",
                    client.client_id
                ));
                return Err(error_on_field::<Self>(figment, error, &field).into());
            }
        }

        Ok(())
    }
}
