// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2023, 2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use url::Url;

/// How RP-Initiated Logout requests are handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutPolicy {
    /// Whether the end session endpoint is served and advertised
    pub enabled: bool,

    /// Always ask the user for confirmation, even when the request carries a
    /// valid ID token for the current user
    pub always_prompt: bool,

    /// Accept ID token hints past their expiry
    pub accept_expired_id_token_hint: bool,

    /// Schemes allowed when redirecting without a client, to the site root
    pub allowed_redirect_uri_schemes: Vec<String>,
}

impl Default for LogoutPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            always_prompt: true,
            accept_expired_id_token_hint: false,
            allowed_redirect_uri_schemes: vec!["http".to_owned(), "https".to_owned()],
        }
    }
}

impl LogoutPolicy {
    /// Whether redirecting to the given scheme is allowed when no client is
    /// involved
    #[must_use]
    pub fn is_scheme_allowed(&self, scheme: &str) -> bool {
        self.allowed_redirect_uri_schemes
            .iter()
            .any(|allowed| allowed == scheme)
    }
}

/// Provider-wide settings, built once from the configuration and shared by
/// all the request handlers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteConfig {
    /// Issuer override. When unset, the issuer is derived from each request
    pub issuer: Option<Url>,

    /// Host names requests may be addressed to when the issuer is derived from
    /// the request. See [`SiteConfig::is_host_allowed`] for the patterns.
    pub allowed_hosts: Vec<String>,

    /// Userinfo endpoint override
    pub userinfo_endpoint: Option<Url>,

    /// Scopes advertised in the discovery document
    pub scopes_supported: Vec<String>,

    /// Claims advertised in the discovery document
    pub claims_supported: Vec<String>,

    /// Response types advertised in the discovery document
    pub response_types_supported: Vec<String>,

    /// Subject types advertised in the discovery document
    pub subject_types_supported: Vec<String>,

    /// Token endpoint authentication methods advertised in the discovery
    /// document
    pub token_endpoint_auth_methods_supported: Vec<String>,

    /// How long clients may cache the JWKS, in seconds
    pub jwks_max_age: u32,

    /// RP-Initiated Logout settings
    pub logout: LogoutPolicy,
}

impl SiteConfig {
    /// Whether a request addressed to `host` can be used to build absolute
    /// URLs.
    ///
    /// A pattern matches the host exactly, ignoring case and a trailing dot.
    /// A pattern starting with a dot, like `.example.com`, also matches every
    /// subdomain. `*` matches any host. IPv6 addresses are written with their
    /// brackets.
    #[must_use]
    pub fn is_host_allowed(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }

        self.allowed_hosts.iter().any(|pattern| {
            let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
            if pattern == "*" {
                return true;
            }

            match pattern.strip_prefix('.') {
                Some(domain) => {
                    host == domain
                        || host
                            .strip_suffix(domain)
                            .is_some_and(|prefix| prefix.ends_with('.'))
                }
                None => host == pattern,
            }
        })
    }
}
