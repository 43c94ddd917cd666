// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use axum::{Json, extract::State};
use idp_axum_utils::RequestOrigin;
use idp_data_model::SiteConfig;
use idp_jose::jwa::JsonWebSignatureAlg;
use idp_keystore::Keystore;
use idp_router::UrlBuilder;
use serde::Serialize;
use url::Url;

/// OpenID Connect provider metadata, as served by the discovery endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderMetadata {
    pub issuer: Url,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Url,
    pub jwks_uri: Url,
    pub scopes_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<JsonWebSignatureAlg>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub claims_supported: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<Url>,
}

/// Remove the duplicates of a list, keeping the first occurrence of each
/// element in place
fn dedup(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }
    out
}

pub(crate) fn provider_metadata(
    url_builder: &UrlBuilder,
    key_store: &Keystore,
    site_config: &SiteConfig,
) -> ProviderMetadata {
    let mut id_token_signing_alg_values_supported = vec![JsonWebSignatureAlg::Hs256];
    if key_store.has_rsa_signing_key() {
        id_token_signing_alg_values_supported.insert(0, JsonWebSignatureAlg::Rs256);
    }

    let userinfo_endpoint = site_config
        .userinfo_endpoint
        .clone()
        .unwrap_or_else(|| url_builder.oidc_userinfo_endpoint());

    let end_session_endpoint = site_config
        .logout
        .enabled
        .then(|| url_builder.end_session_endpoint());

    ProviderMetadata {
        issuer: url_builder.oidc_issuer(),
        authorization_endpoint: url_builder.oauth_authorization_endpoint(),
        token_endpoint: url_builder.oauth_token_endpoint(),
        userinfo_endpoint,
        jwks_uri: url_builder.jwks_uri(),
        scopes_supported: dedup(&site_config.scopes_supported),
        response_types_supported: site_config.response_types_supported.clone(),
        subject_types_supported: site_config.subject_types_supported.clone(),
        id_token_signing_alg_values_supported,
        token_endpoint_auth_methods_supported: site_config
            .token_endpoint_auth_methods_supported
            .clone(),
        claims_supported: dedup(&site_config.claims_supported),
        end_session_endpoint,
    }
}

#[tracing::instrument(name = "handlers.oauth2.discovery.get", skip_all)]
pub(crate) async fn get(
    RequestOrigin(origin): RequestOrigin,
    State(key_store): State<Keystore>,
    State(site_config): State<SiteConfig>,
) -> Json<ProviderMetadata> {
    let url_builder = UrlBuilder::new(origin, site_config.issuer.clone());
    Json(provider_metadata(&url_builder, &key_store, &site_config))
}
