// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use idp_data_model::{Client, ClientType, Clock, IdTokenClaims, LogoutPolicy, User};
use idp_storage::{RepositoryAccess, RepositoryError};
use thiserror::Error;
use url::Url;

use super::EndSessionParams;
use crate::{impl_from_error_for_route, oauth2::ClientError};

/// Why a post-logout redirect URI was refused
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub(crate) enum RedirectUriError {
    #[error("A Scheme is required for the redirect URI.")]
    MissingScheme,

    #[error("The redirect URI is malformed.")]
    Malformed,

    #[error("http is only allowed with confidential clients.")]
    HttpNotAllowed,

    #[error("Redirect to scheme {0:?} is not permitted.")]
    SchemeNotAllowed(String),

    #[error("This client does not have this redirect uri registered.")]
    NotRegistered,
}

#[derive(Debug, Error)]
pub(crate) enum EndSessionError {
    #[error("The ID Token is expired, revoked, malformed, or invalid for other reasons.")]
    InvalidIdToken,

    #[error("Mismatch between Client ID of the ID Token and provided the Client ID.")]
    ClientIdMismatch,

    #[error("The Client is unknown or no client was included.")]
    InvalidClient,

    #[error(transparent)]
    InvalidRedirectUri(#[from] RedirectUriError),

    #[error("Logout was denied by the user.")]
    LogoutDenied,

    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl_from_error_for_route!(EndSessionError: RepositoryError);
impl_from_error_for_route!(EndSessionError: idp_templates::TemplateError);

impl EndSessionError {
    const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidIdToken
            | Self::ClientIdMismatch
            | Self::InvalidClient
            | Self::InvalidRedirectUri(_)
            | Self::LogoutDenied => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidIdToken
            | Self::ClientIdMismatch
            | Self::InvalidClient
            | Self::InvalidRedirectUri(_) => "invalid_request",
            Self::LogoutDenied => "logout_denied",
            Self::Internal(_) => "server_error",
        }
    }
}

impl IntoResponse for EndSessionError {
    fn into_response(self) -> Response {
        let description = match &self {
            Self::Internal(e) => {
                tracing::error!(
                    error = &**e as &dyn std::error::Error,
                    "Failed to process logout request"
                );
                "Internal server error".to_owned()
            }
            Self::LogoutDenied => {
                tracing::info!("Logout was denied by the user");
                self.to_string()
            }
            _ => {
                tracing::warn!(error = &self as &dyn std::error::Error, "Invalid logout request");
                self.to_string()
            }
        };

        let body = ClientError::new(self.error_code(), description);
        (self.status_code(), Json(body)).into_response()
    }
}

/// Outcome of a successful logout request validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogoutDecision {
    /// Whether the user has to confirm the logout
    pub must_prompt: bool,

    /// The client on whose behalf the logout was requested
    pub client: Option<Client>,

    /// Where to send the user once logged out. Only set when `client` is set.
    pub redirect_uri: Option<Url>,
}

/// Validates logout requests against the stored clients and ID tokens
///
/// Validation has no side effect: running it twice on the same request gives
/// the same decision.
pub(crate) struct EndSessionValidator<'a> {
    clock: &'a dyn Clock,
    policy: &'a LogoutPolicy,
}

impl<'a> EndSessionValidator<'a> {
    pub(crate) fn new(clock: &'a dyn Clock, policy: &'a LogoutPolicy) -> Self {
        Self { clock, policy }
    }

    /// Resolve an ID token hint into its claims
    async fn validate_id_token(
        &self,
        repo: &mut impl RepositoryAccess<Error = RepositoryError>,
        hint: &str,
    ) -> Result<IdTokenClaims, EndSessionError> {
        let claims = repo
            .id_token()
            .find_by_token(hint)
            .await?
            .ok_or(EndSessionError::InvalidIdToken)?;

        if !self.policy.accept_expired_id_token_hint && !claims.is_valid(self.clock.now()) {
            return Err(EndSessionError::InvalidIdToken);
        }

        Ok(claims)
    }

    /// Validate a logout request made on behalf of `current_user`
    ///
    /// # Errors
    ///
    /// Returns an error if the ID token hint is invalid, if it was issued to
    /// another client than the one given, or if the post-logout redirect URI is
    /// not acceptable for the resolved client.
    #[tracing::instrument(
        name = "handlers.oauth2.end_session.validate",
        skip_all,
        fields(
            has_id_token_hint = params.id_token_hint.is_some(),
            client.id = params.client_id.as_deref(),
        ),
    )]
    pub(crate) async fn validate(
        &self,
        repo: &mut impl RepositoryAccess<Error = RepositoryError>,
        current_user: Option<&User>,
        params: &EndSessionParams,
    ) -> Result<LogoutDecision, EndSessionError> {
        let id_token = match params.id_token_hint.as_deref() {
            Some(hint) => Some(self.validate_id_token(repo, hint).await?),
            None => None,
        };

        let mut must_prompt = true;

        if let Some(id_token) = &id_token {
            if current_user.is_some_and(|user| user.sub == id_token.sub) {
                must_prompt = false;
            }

            if let Some(client_id) = params.client_id.as_deref() {
                if client_id != id_token.client_id {
                    return Err(EndSessionError::ClientIdMismatch);
                }
            }
        }

        must_prompt |= self.policy.always_prompt;

        let client_id = params
            .client_id
            .as_deref()
            .or(id_token.as_ref().map(|token| token.client_id.as_str()));

        let client = match client_id {
            Some(client_id) => repo.oauth2_client().find_by_client_id(client_id).await?,
            None => None,
        };

        let redirect_uri = match params.post_logout_redirect_uri.as_deref() {
            Some(uri) => {
                let client = client.as_ref().ok_or(EndSessionError::InvalidClient)?;
                Some(validate_redirect_uri(client, uri)?)
            }
            None => None,
        };

        Ok(LogoutDecision {
            must_prompt,
            client,
            redirect_uri,
        })
    }
}

/// Check a post-logout redirect URI against what the client allows
fn validate_redirect_uri(client: &Client, uri: &str) -> Result<Url, RedirectUriError> {
    let url = Url::parse(uri).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => RedirectUriError::MissingScheme,
        _ => RedirectUriError::Malformed,
    })?;

    let scheme = url.scheme();
    if scheme == "http" && client.client_type != ClientType::Confidential {
        return Err(RedirectUriError::HttpNotAllowed);
    }

    if !client.allowed_schemes().contains(&scheme) {
        return Err(RedirectUriError::SchemeNotAllowed(scheme.to_owned()));
    }

    if !client.is_post_logout_redirect_allowed(uri) {
        return Err(RedirectUriError::NotRegistered);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Duration;
    use idp_data_model::{MockClock, Ulid};
    use idp_storage::{BoxRepository, RepositoryFactory};
    use idp_storage_memory::MemoryRepositoryFactory;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    use super::*;

    fn client(client_id: &str, client_type: ClientType, uris: &[&str]) -> Client {
        Client {
            id: Ulid::nil(),
            client_id: client_id.to_owned(),
            client_type,
            client_name: None,
            post_logout_redirect_uris: uris.iter().map(|&uri| uri.to_owned()).collect(),
        }
    }

    fn params(pairs: &[(&str, &str)]) -> EndSessionParams {
        let query = serde_urlencoded::to_string(pairs).unwrap();
        serde_urlencoded::from_str(&query).unwrap()
    }

    fn policy() -> LogoutPolicy {
        LogoutPolicy {
            enabled: true,
            always_prompt: false,
            ..LogoutPolicy::default()
        }
    }

    struct Fixture {
        repo: BoxRepository,
        clock: MockClock,
        alice: User,
        bob: User,
    }

    /// Sets up two users, a confidential client `abc` and a public client
    /// `pub`, and ID tokens issued to `abc`:
    ///   - `alice-token` for alice
    ///   - `bob-token` for bob
    ///   - `short-token` for alice, expiring after a minute
    async fn fixture() -> Fixture {
        let factory = MemoryRepositoryFactory::new();
        let mut repo = factory.create().await.unwrap();
        let mut rng = ChaChaRng::seed_from_u64(42);
        let clock = MockClock::default();

        let alice = repo
            .user()
            .add(&mut rng, &clock, "alice".to_owned(), "sub-alice".to_owned())
            .await
            .unwrap();
        let bob = repo
            .user()
            .add(&mut rng, &clock, "bob".to_owned(), "sub-bob".to_owned())
            .await
            .unwrap();

        let abc = repo
            .oauth2_client()
            .upsert_static(
                &mut rng,
                &clock,
                "abc".to_owned(),
                ClientType::Confidential,
                Some("ABC".to_owned()),
                vec![
                    "https://app.example/done".to_owned(),
                    "http://app.example/done".to_owned(),
                ],
            )
            .await
            .unwrap();
        repo.oauth2_client()
            .upsert_static(
                &mut rng,
                &clock,
                "pub".to_owned(),
                ClientType::Public,
                None,
                vec![
                    "https://public.example/done".to_owned(),
                    "http://public.example/done".to_owned(),
                ],
            )
            .await
            .unwrap();

        let hour = Duration::try_hours(1).unwrap();
        let minute = Duration::try_minutes(1).unwrap();
        let mut id_tokens = repo.id_token();
        id_tokens
            .add(&clock, "alice-token".to_owned(), &abc, &alice, hour)
            .await
            .unwrap();
        id_tokens
            .add(&clock, "bob-token".to_owned(), &abc, &bob, hour)
            .await
            .unwrap();
        id_tokens
            .add(&clock, "short-token".to_owned(), &abc, &alice, minute)
            .await
            .unwrap();
        drop(id_tokens);

        Fixture {
            repo,
            clock,
            alice,
            bob,
        }
    }

    #[tokio::test]
    async fn test_empty_request_prompts() {
        let Fixture {
            mut repo,
            clock,
            alice,
            ..
        } = fixture().await;
        let policy = policy();
        let validator = EndSessionValidator::new(&clock, &policy);

        let decision = validator
            .validate(&mut repo, Some(&alice), &params(&[]))
            .await
            .unwrap();
        assert_eq!(
            decision,
            LogoutDecision {
                must_prompt: true,
                client: None,
                redirect_uri: None,
            }
        );

        // Without a session either
        let decision = validator
            .validate(&mut repo, None, &params(&[]))
            .await
            .unwrap();
        assert!(decision.must_prompt);

        // A client ID alone does not allow skipping the prompt
        let decision = validator
            .validate(&mut repo, Some(&alice), &params(&[("client_id", "abc")]))
            .await
            .unwrap();
        assert!(decision.must_prompt);
        assert_eq!(decision.client.unwrap().client_id, "abc");
    }

    #[tokio::test]
    async fn test_id_token_for_current_user_skips_prompt() {
        let Fixture {
            mut repo,
            clock,
            alice,
            bob,
        } = fixture().await;
        let policy = policy();
        let validator = EndSessionValidator::new(&clock, &policy);
        let request = params(&[("id_token_hint", "alice-token")]);

        let decision = validator
            .validate(&mut repo, Some(&alice), &request)
            .await
            .unwrap();
        assert!(!decision.must_prompt);
        // The client is resolved from the ID token
        assert_eq!(decision.client.unwrap().client_id, "abc");
        assert_eq!(decision.redirect_uri, None);

        // Another user is logged in
        let decision = validator
            .validate(&mut repo, Some(&bob), &request)
            .await
            .unwrap();
        assert!(decision.must_prompt);

        // Nobody is logged in
        let decision = validator.validate(&mut repo, None, &request).await.unwrap();
        assert!(decision.must_prompt);

        // The policy forces the prompt
        let always = LogoutPolicy {
            always_prompt: true,
            ..policy.clone()
        };
        let decision = EndSessionValidator::new(&clock, &always)
            .validate(&mut repo, Some(&alice), &request)
            .await
            .unwrap();
        assert!(decision.must_prompt);
    }

    #[tokio::test]
    async fn test_invalid_id_token() {
        let Fixture {
            mut repo,
            clock,
            alice,
            ..
        } = fixture().await;
        let policy = policy();

        let result = EndSessionValidator::new(&clock, &policy)
            .validate(&mut repo, Some(&alice), &params(&[("id_token_hint", "unknown")]))
            .await;
        assert_matches!(result, Err(EndSessionError::InvalidIdToken));

        // Expired tokens are refused
        clock.advance(Duration::try_minutes(2).unwrap());
        let request = params(&[("id_token_hint", "short-token")]);
        let result = EndSessionValidator::new(&clock, &policy)
            .validate(&mut repo, Some(&alice), &request)
            .await;
        assert_matches!(result, Err(EndSessionError::InvalidIdToken));

        // ...unless the policy says otherwise
        let lenient = LogoutPolicy {
            accept_expired_id_token_hint: true,
            ..policy.clone()
        };
        let decision = EndSessionValidator::new(&clock, &lenient)
            .validate(&mut repo, Some(&alice), &request)
            .await
            .unwrap();
        assert!(!decision.must_prompt);
    }

    #[tokio::test]
    async fn test_client_id_mismatch() {
        let Fixture {
            mut repo,
            clock,
            alice,
            ..
        } = fixture().await;
        let policy = policy();
        let validator = EndSessionValidator::new(&clock, &policy);

        let result = validator
            .validate(
                &mut repo,
                Some(&alice),
                &params(&[("id_token_hint", "alice-token"), ("client_id", "pub")]),
            )
            .await;
        assert_matches!(result, Err(EndSessionError::ClientIdMismatch));

        // Regardless of the other fields
        let result = validator
            .validate(
                &mut repo,
                Some(&alice),
                &params(&[
                    ("id_token_hint", "alice-token"),
                    ("client_id", "unknown"),
                    ("post_logout_redirect_uri", "https://app.example/done"),
                    ("state", "xyz"),
                ]),
            )
            .await;
        assert_matches!(result, Err(EndSessionError::ClientIdMismatch));

        // Matching client ID
        let decision = validator
            .validate(
                &mut repo,
                Some(&alice),
                &params(&[("id_token_hint", "alice-token"), ("client_id", "abc")]),
            )
            .await
            .unwrap();
        assert!(!decision.must_prompt);
    }

    #[tokio::test]
    async fn test_redirect_uri_needs_a_client() {
        let Fixture {
            mut repo,
            clock,
            alice,
            ..
        } = fixture().await;
        let policy = policy();
        let validator = EndSessionValidator::new(&clock, &policy);

        let result = validator
            .validate(
                &mut repo,
                Some(&alice),
                &params(&[("post_logout_redirect_uri", "https://app.example/done")]),
            )
            .await;
        assert_matches!(result, Err(EndSessionError::InvalidClient));

        // Unknown clients resolve to no client
        let result = validator
            .validate(
                &mut repo,
                Some(&alice),
                &params(&[
                    ("client_id", "unknown"),
                    ("post_logout_redirect_uri", "https://app.example/done"),
                ]),
            )
            .await;
        assert_matches!(result, Err(EndSessionError::InvalidClient));

        let decision = validator
            .validate(&mut repo, Some(&alice), &params(&[("client_id", "unknown")]))
            .await
            .unwrap();
        assert_eq!(decision.client, None);
    }

    #[tokio::test]
    async fn test_redirect_uri_validation() {
        let Fixture {
            mut repo,
            clock,
            alice,
            ..
        } = fixture().await;
        let policy = policy();
        let validator = EndSessionValidator::new(&clock, &policy);

        let decision = validator
            .validate(
                &mut repo,
                Some(&alice),
                &params(&[
                    ("client_id", "abc"),
                    ("post_logout_redirect_uri", "https://app.example/done"),
                ]),
            )
            .await
            .unwrap();
        assert!(decision.must_prompt);
        assert_eq!(decision.client.unwrap().client_id, "abc");
        assert_eq!(
            decision.redirect_uri.unwrap().as_str(),
            "https://app.example/done"
        );

        // Confidential clients may use http
        let decision = validator
            .validate(
                &mut repo,
                Some(&alice),
                &params(&[
                    ("client_id", "abc"),
                    ("post_logout_redirect_uri", "http://app.example/done"),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(
            decision.redirect_uri.unwrap().as_str(),
            "http://app.example/done"
        );

        // Public clients may not, even if registered
        let result = validator
            .validate(
                &mut repo,
                Some(&alice),
                &params(&[
                    ("client_id", "pub"),
                    ("post_logout_redirect_uri", "http://public.example/done"),
                ]),
            )
            .await;
        assert_matches!(
            result,
            Err(EndSessionError::InvalidRedirectUri(
                RedirectUriError::HttpNotAllowed
            ))
        );

        // Exact match only
        let result = validator
            .validate(
                &mut repo,
                Some(&alice),
                &params(&[
                    ("client_id", "abc"),
                    ("post_logout_redirect_uri", "https://app.example/done/"),
                ]),
            )
            .await;
        assert_matches!(
            result,
            Err(EndSessionError::InvalidRedirectUri(
                RedirectUriError::NotRegistered
            ))
        );

        // The ID token client is used when there is no client ID
        let decision = validator
            .validate(
                &mut repo,
                Some(&alice),
                &params(&[
                    ("id_token_hint", "alice-token"),
                    ("post_logout_redirect_uri", "https://app.example/done"),
                ]),
            )
            .await
            .unwrap();
        assert!(!decision.must_prompt);
        assert!(decision.redirect_uri.is_some());
    }

    #[test]
    fn test_redirect_uri_rules() {
        let confidential = client(
            "abc",
            ClientType::Confidential,
            &["https://app.example/done", "myapp:/logout"],
        );
        let public = client("pub", ClientType::Public, &["https://app.example/done"]);

        assert_eq!(
            validate_redirect_uri(&confidential, "/done"),
            Err(RedirectUriError::MissingScheme)
        );
        assert_eq!(
            validate_redirect_uri(&confidential, "https://"),
            Err(RedirectUriError::Malformed)
        );
        assert_eq!(
            validate_redirect_uri(&confidential, "myapp:/logout"),
            Err(RedirectUriError::SchemeNotAllowed("myapp".to_owned()))
        );
        assert_eq!(
            validate_redirect_uri(&public, "http://app.example/done"),
            Err(RedirectUriError::HttpNotAllowed)
        );
        assert_eq!(
            validate_redirect_uri(&public, "https://app.example/other"),
            Err(RedirectUriError::NotRegistered)
        );
        assert!(validate_redirect_uri(&public, "https://app.example/done").is_ok());
    }

    #[tokio::test]
    async fn test_validation_is_idempotent() {
        let Fixture {
            mut repo,
            clock,
            alice,
            ..
        } = fixture().await;
        let policy = policy();
        let validator = EndSessionValidator::new(&clock, &policy);
        let request = params(&[
            ("id_token_hint", "alice-token"),
            ("post_logout_redirect_uri", "https://app.example/done"),
            ("state", "xyz"),
        ]);

        let first = validator
            .validate(&mut repo, Some(&alice), &request)
            .await
            .unwrap();
        let second = validator
            .validate(&mut repo, Some(&alice), &request)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
