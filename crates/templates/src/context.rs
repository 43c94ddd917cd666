// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2021-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Contexts used in templates

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use idp_data_model::{Client, ClientType};
use rand::Rng;
use serde::Serialize;
use ulid::Ulid;
use url::Url;

/// Helper trait to construct context wrappers
pub trait TemplateContext: Serialize {
    /// Generate sample values for this context type
    ///
    /// This is then used to check for template validity in unit tests
    fn sample<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> Vec<Self>
    where
        Self: Sized;
}

impl TemplateContext for BTreeMap<String, String> {
    fn sample<R: Rng>(_now: DateTime<Utc>, _rng: &mut R) -> Vec<Self>
    where
        Self: Sized,
    {
        vec![
            BTreeMap::new(),
            BTreeMap::from([
                ("client_id".to_owned(), "abc".to_owned()),
                (
                    "post_logout_redirect_uri".to_owned(),
                    "https://app.example/done".to_owned(),
                ),
                ("state".to_owned(), "xyz".to_owned()),
            ]),
        ]
    }
}

/// Context used by the `pages/logout_confirm.html` template
///
/// The request parameters are carried as `params` and re-submitted as hidden
/// fields, so the confirmation step needs no state on the server.
#[derive(Serialize, Debug, Clone)]
pub struct LogoutConfirmContext<T> {
    action: Url,
    params: T,
    client: Option<Client>,
}

impl<T> LogoutConfirmContext<T> {
    /// Constructs a context for the logout confirmation form, submitting to
    /// the given URL
    #[must_use]
    pub fn new(action: Url, params: T) -> Self {
        Self {
            action,
            params,
            client: None,
        }
    }

    /// Set the client on whose behalf the logout was requested
    #[must_use]
    pub fn with_client(mut self, client: Option<Client>) -> Self {
        self.client = client;
        self
    }
}

impl<T: TemplateContext> TemplateContext for LogoutConfirmContext<T> {
    fn sample<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> Vec<Self>
    where
        Self: Sized,
    {
        let Ok(action) = Url::parse("https://example.com/oauth2/logout") else {
            return Vec::new();
        };

        let client = Client {
            id: Ulid::from_datetime_with_source(now.into(), rng),
            client_id: "abc".to_owned(),
            client_type: ClientType::Confidential,
            client_name: Some("Example App".to_owned()),
            post_logout_redirect_uris: vec!["https://app.example/done".to_owned()],
        };

        // The first sample is rendered without a client
        T::sample(now, rng)
            .into_iter()
            .enumerate()
            .map(|(index, params)| {
                let client = (index > 0).then(|| client.clone());
                Self::new(action.clone(), params).with_client(client)
            })
            .collect()
    }
}
