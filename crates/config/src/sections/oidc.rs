// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ConfigurationSection, util::error_on_field};

fn default_scopes() -> Vec<String> {
    ["openid", "profile", "email"]
        .into_iter()
        .map(ToOwned::to_owned)
        .collect()
}

fn default_claims() -> Vec<String> {
    vec!["sub".to_owned()]
}

fn default_response_types() -> Vec<String> {
    [
        "code",
        "token",
        "id_token",
        "id_token token",
        "code token",
        "code id_token",
        "code id_token token",
    ]
    .into_iter()
    .map(ToOwned::to_owned)
    .collect()
}

fn default_subject_types() -> Vec<String> {
    vec!["public".to_owned()]
}

fn default_token_endpoint_auth_methods() -> Vec<String> {
    vec![
        "client_secret_post".to_owned(),
        "client_secret_basic".to_owned(),
    ]
}

const fn default_jwks_max_age() -> u32 {
    3600
}

/// Provider capabilities advertised in the discovery document
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OidcConfig {
    /// Scopes clients can request
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Claims the provider can put in ID tokens and userinfo responses
    #[serde(default = "default_claims")]
    pub claims: Vec<String>,

    /// `response_type` values supported by the authorization endpoint
    #[serde(default = "default_response_types")]
    pub response_types_supported: Vec<String>,

    /// Subject identifier types
    #[serde(default = "default_subject_types")]
    pub subject_types_supported: Vec<String>,

    /// Client authentication methods supported by the token endpoint
    #[serde(default = "default_token_endpoint_auth_methods")]
    pub token_endpoint_auth_methods_supported: Vec<String>,

    /// Advertise this URL as the userinfo endpoint instead of the built-in
    /// one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<Url>,

    /// How long, in seconds, clients may cache the JSON Web Key Set
    #[serde(default = "default_jwks_max_age")]
    #[schemars(range(max = 31_536_000))]
    pub jwks_max_age: u32,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            scopes: default_scopes(),
            claims: default_claims(),
            response_types_supported: default_response_types(),
            subject_types_supported: default_subject_types(),
            token_endpoint_auth_methods_supported: default_token_endpoint_auth_methods(),
            userinfo_endpoint: None,
            jwks_max_age: default_jwks_max_age(),
        }
    }
}

impl ConfigurationSection for OidcConfig {
    const PATH: Option<&'static str> = Some("oidc");

    fn validate(
        &self,
        figment: &figment::Figment,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        if self.response_types_supported.is_empty() {
            let error = figment::Error::from(
                "At least one response type must be supported".to_owned(),
            );
            return Err(error_on_field::<Self>(figment, error, "response_types_supported").into());
        }

        if self.subject_types_supported.is_empty() {
            let error = figment::Error::from(
                "At least one subject type must be supported".to_owned(),
            );
            return Err(error_on_field::<Self>(figment, error, "subject_types_supported").into());
        }

        Ok(())
    }
}
