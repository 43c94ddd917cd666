// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Extract the absolute origin a request was made to

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use headers::{HeaderMapExt as _, Host};
use idp_data_model::SiteConfig;
use thiserror::Error;
use url::Url;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// The scheme and host absolute URLs are built from, as an URL with an empty
/// path.
///
/// When an issuer is configured, this is the issuer origin and the request
/// headers are not looked at. Otherwise the host comes from the `Host` header,
/// falling back to the request URI authority, and must be one of the allowed
/// hosts. The scheme comes from the `X-Forwarded-Proto` header when it is
/// `http` or `https`, falling back to the request URI scheme, then to `http`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin(pub Url);

#[derive(Debug, Error)]
pub enum RequestOriginRejection {
    #[error("could not build the request origin from {origin:?}")]
    Invalid {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error("host {0:?} is not in the allowed hosts")]
    DisallowedHost(String),
}

impl IntoResponse for RequestOriginRejection {
    fn into_response(self) -> Response {
        tracing::warn!(
            error = &self as &dyn std::error::Error,
            "Rejecting request with an invalid Host header"
        );
        (StatusCode::BAD_REQUEST, "Invalid Host header").into_response()
    }
}

fn origin_of(issuer: &Url) -> Url {
    let mut origin = issuer.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}

impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
    SiteConfig: FromRef<S>,
{
    type Rejection = RequestOriginRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let site_config = SiteConfig::from_ref(state);
        if let Some(issuer) = &site_config.issuer {
            return Ok(Self(origin_of(issuer)));
        }

        let host = parts
            .headers
            .typed_get::<Host>()
            .map(|host| host.to_string())
            .or_else(|| parts.uri.authority().map(ToString::to_string))
            .unwrap_or_else(|| "localhost".to_owned());

        let forwarded_proto = parts
            .headers
            .get(X_FORWARDED_PROTO)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|proto| matches!(*proto, "http" | "https"));

        let scheme = forwarded_proto
            .or_else(|| parts.uri.scheme_str())
            .unwrap_or("http");

        let origin = format!("{scheme}://{host}/");
        let url = Url::parse(&origin)
            .map_err(|source| RequestOriginRejection::Invalid { origin, source })?;

        let host = url.host_str().unwrap_or_default();
        if !site_config.is_host_allowed(host) {
            return Err(RequestOriginRejection::DisallowedHost(host.to_owned()));
        }

        Ok(Self(url))
    }
}
