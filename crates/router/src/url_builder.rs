// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Utility to build URLs

use url::Url;

use crate::traits::Route;

/// Builds absolute URLs for the provider endpoints.
///
/// URLs are built from a base holding only a scheme and a host. When an issuer
/// is configured, the base comes from it. Otherwise it is the origin the
/// request was made to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlBuilder {
    http_base: Url,
    issuer: Url,
}

impl UrlBuilder {
    /// Create a new [`UrlBuilder`] for a request made to `request_origin`
    #[must_use]
    pub fn new(request_origin: Url, issuer: Option<Url>) -> Self {
        let issuer = issuer.unwrap_or_else(|| strip_to_origin(request_origin));
        let http_base = strip_to_origin(issuer.clone());

        Self { http_base, issuer }
    }

    /// OIDC issuer
    #[must_use]
    pub fn oidc_issuer(&self) -> Url {
        self.issuer.clone()
    }

    /// Absolute URL for the given route
    #[must_use]
    pub fn absolute_url_for<U>(&self, destination: &U) -> Url
    where
        U: Route,
    {
        destination.absolute_url(&self.http_base)
    }

    /// OAuth 2.0 authorization endpoint
    #[must_use]
    pub fn oauth_authorization_endpoint(&self) -> Url {
        self.absolute_url_for(&crate::endpoints::OAuth2AuthorizationEndpoint)
    }

    /// OAuth 2.0 token endpoint
    #[must_use]
    pub fn oauth_token_endpoint(&self) -> Url {
        self.absolute_url_for(&crate::endpoints::OAuth2TokenEndpoint)
    }

    /// OIDC userinfo endpoint
    #[must_use]
    pub fn oidc_userinfo_endpoint(&self) -> Url {
        self.absolute_url_for(&crate::endpoints::OidcUserinfo)
    }

    /// JWKS URI
    #[must_use]
    pub fn jwks_uri(&self) -> Url {
        self.absolute_url_for(&crate::endpoints::OAuth2Keys)
    }

    /// RP-Initiated Logout endpoint
    #[must_use]
    pub fn end_session_endpoint(&self) -> Url {
        self.absolute_url_for(&crate::endpoints::EndSession)
    }

    /// Root of the application
    #[must_use]
    pub fn index(&self) -> Url {
        self.absolute_url_for(&crate::endpoints::Index)
    }
}

/// Keep only the scheme, host and port of the URL
fn strip_to_origin(mut url: Url) -> Url {
    // Those only fail on URLs which can't have a host, which are never used here
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    url
}
