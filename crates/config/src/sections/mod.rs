// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod clients;
mod http;
mod logout;
mod oidc;
mod secrets;
mod templates;

pub use self::{
    clients::{ClientConfig, ClientTypeConfig, ClientsConfig},
    http::HttpConfig,
    logout::LogoutConfig,
    oidc::OidcConfig,
    secrets::{KeyConfig, SecretsConfig},
    templates::TemplatesConfig,
};
use crate::util::ConfigurationSection;

/// Application configuration root
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RootConfig {
    /// List of OAuth 2.0/OIDC clients config
    #[serde(default, skip_serializing_if = "ClientsConfig::is_default")]
    pub clients: ClientsConfig,

    /// Configuration of the HTTP server
    #[serde(default)]
    pub http: HttpConfig,

    /// Configuration of the OpenID Connect provider metadata
    #[serde(default)]
    pub oidc: OidcConfig,

    /// Configuration of the RP-Initiated Logout endpoint
    #[serde(default)]
    pub logout: LogoutConfig,

    /// Configuration related to templates
    #[serde(default, skip_serializing_if = "TemplatesConfig::is_default")]
    pub templates: TemplatesConfig,

    /// Application secrets
    pub secrets: SecretsConfig,
}

impl ConfigurationSection for RootConfig {
    fn validate(
        &self,
        figment: &figment::Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        self.clients.validate(figment)?;
        self.http.validate(figment)?;
        self.oidc.validate(figment)?;
        self.logout.validate(figment)?;
        self.templates.validate(figment)?;
        self.secrets.validate(figment)?;

        Ok(())
    }
}

/// Partial configuration actually used by the server
#[allow(missing_docs)]
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub clients: ClientsConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub oidc: OidcConfig,

    #[serde(default)]
    pub logout: LogoutConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,

    pub secrets: SecretsConfig,
}

impl ConfigurationSection for AppConfig {
    fn validate(
        &self,
        figment: &figment::Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        self.clients.validate(figment)?;
        self.http.validate(figment)?;
        self.oidc.validate(figment)?;
        self.logout.validate(figment)?;
        self.templates.validate(figment)?;
        self.secrets.validate(figment)?;

        Ok(())
    }
}
