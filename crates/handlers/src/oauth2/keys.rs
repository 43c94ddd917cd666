// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use axum::{Json, extract::State, http::header::CACHE_CONTROL, response::IntoResponse};
use idp_data_model::SiteConfig;
use idp_keystore::Keystore;

#[tracing::instrument(name = "handlers.oauth2.keys.get", skip_all)]
pub(crate) async fn get(
    State(key_store): State<Keystore>,
    State(site_config): State<SiteConfig>,
) -> impl IntoResponse {
    let jwks = key_store.public_jwks();

    let max_age = site_config.jwks_max_age;
    let cache_control = format!(
        "public, max-age={max_age}, stale-while-revalidate={max_age}, stale-if-error={max_age}"
    );

    ([(CACHE_CONTROL, cache_control)], Json(jwks))
}
