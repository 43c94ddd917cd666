// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use anyhow::Context;
use idp_axum_utils::CookieManager;
use idp_config::{HttpConfig, LogoutConfig, OidcConfig, SecretsConfig, TemplatesConfig};
use idp_data_model::{LogoutPolicy, SiteConfig};
use idp_templates::Templates;

/// Assemble the provider-wide settings handed to the request handlers
pub fn site_config_from_config(
    http_config: &HttpConfig,
    oidc_config: &OidcConfig,
    logout_config: &LogoutConfig,
) -> SiteConfig {
    SiteConfig {
        issuer: http_config.issuer.clone(),
        allowed_hosts: http_config.allowed_hosts.clone(),
        userinfo_endpoint: oidc_config.userinfo_endpoint.clone(),
        scopes_supported: oidc_config.scopes.clone(),
        claims_supported: oidc_config.claims.clone(),
        response_types_supported: oidc_config.response_types_supported.clone(),
        subject_types_supported: oidc_config.subject_types_supported.clone(),
        token_endpoint_auth_methods_supported: oidc_config
            .token_endpoint_auth_methods_supported
            .clone(),
        jwks_max_age: oidc_config.jwks_max_age,
        logout: LogoutPolicy {
            enabled: logout_config.enabled,
            always_prompt: logout_config.always_prompt,
            accept_expired_id_token_hint: logout_config.accept_expired_id_token_hint,
            allowed_redirect_uri_schemes: logout_config.allowed_redirect_uri_schemes.clone(),
        },
    }
}

pub async fn templates_from_config(config: &TemplatesConfig) -> Result<Templates, anyhow::Error> {
    Templates::load(config.path.clone())
        .await
        .with_context(|| format!("Failed to load the templates at {}", config.path))
}

/// Cookies are scoped to the issuer when there is one
pub fn cookie_manager_from_config(
    http_config: &HttpConfig,
    secrets_config: &SecretsConfig,
) -> CookieManager {
    CookieManager::derive_from(http_config.issuer.as_ref(), &secrets_config.encryption)
}
