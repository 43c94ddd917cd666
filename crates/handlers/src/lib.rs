// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

#![deny(clippy::future_not_send)]
#![allow(clippy::module_name_repetitions)]

use std::time::Duration;

use axum::{
    Router,
    extract::{FromRef, FromRequestParts},
    http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    routing::get,
};
use idp_axum_utils::CookieManager;
use idp_data_model::SiteConfig;
use idp_keystore::Keystore;
use idp_router::Route;
use idp_storage::{BoxClock, BoxRepository};
use idp_templates::Templates;
use tower_http::cors::{Any, CorsLayer};

mod oauth2;

#[cfg(test)]
mod test_utils;

/// Implement `From<E>` for `RouteError`, for "internal server error" kind of
/// errors.
#[macro_export]
macro_rules! impl_from_error_for_route {
    ($route_error:ty : $error:ty) => {
        impl From<$error> for $route_error {
            fn from(e: $error) -> Self {
                Self::Internal(Box::new(e))
            }
        }
    };
    ($error:ty) => {
        impl_from_error_for_route!(self::RouteError: $error);
    };
}

pub use self::oauth2::discovery::ProviderMetadata;

/// Routes serving the provider metadata and its public keys
///
/// Both documents are public, so any origin may fetch them.
pub fn discovery_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Keystore: FromRef<S>,
    SiteConfig: FromRef<S>,
{
    Router::new()
        .route(
            idp_router::OidcConfiguration::route(),
            get(self::oauth2::discovery::get),
        )
        .route(
            idp_router::OAuth2Keys::route(),
            get(self::oauth2::keys::get),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
                .max_age(Duration::from_secs(60 * 60)),
        )
}

/// Routes serving the RP-Initiated Logout endpoint
pub fn end_session_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    SiteConfig: FromRef<S>,
    Templates: FromRef<S>,
    CookieManager: FromRef<S>,
    BoxClock: FromRequestParts<S>,
    BoxRepository: FromRequestParts<S>,
{
    Router::new().route(
        idp_router::EndSession::route(),
        get(self::oauth2::end_session::get).post(self::oauth2::end_session::post),
    )
}

/// All the provider routes. The end session endpoint is only mounted when
/// logout is enabled.
pub fn router<S>(site_config: &SiteConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Keystore: FromRef<S>,
    SiteConfig: FromRef<S>,
    Templates: FromRef<S>,
    CookieManager: FromRef<S>,
    BoxClock: FromRequestParts<S>,
    BoxRepository: FromRequestParts<S>,
{
    let router = discovery_router();

    if site_config.logout.enabled {
        router.merge(end_session_router())
    } else {
        router
    }
}
