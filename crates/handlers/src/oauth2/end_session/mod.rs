// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2022-2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! RP-Initiated Logout
//!
//! A logout either happens straight away, or goes through a confirmation form
//! which posts the original parameters back to the same endpoint. Nothing is
//! kept on the server between the two requests.

use axum::{
    extract::{Form, Query, State},
    http::{StatusCode, header::LOCATION},
    response::{Html, IntoResponse, Response},
};
use idp_axum_utils::{CookieJar, RequestOrigin, SessionInfoExt};
use idp_data_model::{BrowserSession, Client, LogoutPolicy, SiteConfig};
use idp_router::UrlBuilder;
use idp_storage::{BoxClock, BoxRepository};
use idp_templates::{LogoutConfirmContext, Templates};
use serde::{Deserialize, Serialize};
use serde_with::{NoneAsEmptyString, serde_as};
use url::Url;

mod validation;

use self::validation::{EndSessionError, EndSessionValidator, LogoutDecision, RedirectUriError};

/// Parameters of a logout request
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EndSessionParams {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token_hint: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logout_hint: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_logout_redirect_uri: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ui_locales: Option<String>,
}

/// The confirmation form, as posted back by the user agent
#[serde_as]
#[derive(Debug, Deserialize)]
pub(crate) struct EndSessionForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    id_token_hint: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    logout_hint: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    client_id: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    post_logout_redirect_uri: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    state: Option<String>,

    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    ui_locales: Option<String>,

    #[serde(default)]
    allow: bool,
}

impl EndSessionForm {
    fn into_parts(self) -> (EndSessionParams, bool) {
        let params = EndSessionParams {
            id_token_hint: self.id_token_hint,
            logout_hint: self.logout_hint,
            client_id: self.client_id,
            post_logout_redirect_uri: self.post_logout_redirect_uri,
            state: self.state,
            ui_locales: self.ui_locales,
        };
        (params, self.allow)
    }
}

/// Where a logout request stands once validated
#[derive(Debug)]
enum LogoutState {
    /// The user has to confirm; the original parameters go back into the form
    AwaitingConfirmation {
        params: EndSessionParams,
        client: Option<Client>,
    },

    /// The session gets ended and the user agent redirected
    Terminated {
        redirect_uri: Option<Url>,
        state: Option<String>,
        client: Option<Client>,
    },
}

impl LogoutState {
    fn terminated(decision: LogoutDecision, params: EndSessionParams) -> Self {
        Self::Terminated {
            redirect_uri: decision.redirect_uri,
            state: params.state,
            client: decision.client,
        }
    }
}

/// Compute where to send the user agent once logged out
fn redirect_target(
    url_builder: &UrlBuilder,
    policy: &LogoutPolicy,
    redirect_uri: Option<Url>,
    state: Option<String>,
    client: Option<&Client>,
) -> Result<Url, EndSessionError> {
    let Some(mut target) = redirect_uri else {
        let index = url_builder.index();
        if !policy.is_scheme_allowed(index.scheme()) {
            return Err(RedirectUriError::SchemeNotAllowed(index.scheme().to_owned()).into());
        }
        return Ok(index);
    };

    let allowed = client.is_some_and(|client| client.allowed_schemes().contains(&target.scheme()));
    if !allowed {
        return Err(RedirectUriError::SchemeNotAllowed(target.scheme().to_owned()).into());
    }

    if let Some(state) = state {
        target.query_pairs_mut().append_pair("state", &state);
    }

    Ok(target)
}

/// End the current browser session, if any, and redirect
async fn terminate(
    clock: &BoxClock,
    mut repo: BoxRepository,
    cookie_jar: CookieJar,
    session: Option<BrowserSession>,
    target: Url,
) -> Result<Response, EndSessionError> {
    if let Some(session) = session {
        let session = repo.browser_session().finish(clock, session).await?;
        tracing::info!(
            browser_session.id = %session.id,
            user.id = %session.user.id,
            "Browser session ended"
        );
    }

    repo.save().await?;

    let cookie_jar = cookie_jar.clear_session_info();

    Ok((
        StatusCode::FOUND,
        cookie_jar,
        [(LOCATION, target.to_string())],
    )
        .into_response())
}

#[allow(clippy::too_many_arguments)]
async fn handle(
    clock: BoxClock,
    mut repo: BoxRepository,
    site_config: &SiteConfig,
    templates: &Templates,
    origin: Url,
    cookie_jar: CookieJar,
    params: EndSessionParams,
    allow: Option<bool>,
) -> Result<Response, EndSessionError> {
    let url_builder = UrlBuilder::new(origin, site_config.issuer.clone());
    let policy = &site_config.logout;

    let (session_info, cookie_jar) = cookie_jar.session_info();
    let session = session_info.load_active_session(&mut repo).await?;

    let decision = EndSessionValidator::new(&clock, policy)
        .validate(&mut repo, session.as_ref().map(|s| &s.user), &params)
        .await?;

    let state = match allow {
        // Coming back from the confirmation form
        Some(allow) if decision.must_prompt && !allow => return Err(EndSessionError::LogoutDenied),
        Some(_) => LogoutState::terminated(decision, params),

        None if decision.must_prompt => LogoutState::AwaitingConfirmation {
            params,
            client: decision.client,
        },
        None => LogoutState::terminated(decision, params),
    };

    match state {
        LogoutState::AwaitingConfirmation { params, client } => {
            let ctx = LogoutConfirmContext::new(url_builder.end_session_endpoint(), params)
                .with_client(client);
            let content = templates.render_logout_confirm(&ctx)?;
            Ok((cookie_jar, Html(content)).into_response())
        }

        LogoutState::Terminated {
            redirect_uri,
            state,
            client,
        } => {
            let target =
                redirect_target(&url_builder, policy, redirect_uri, state, client.as_ref())?;
            terminate(&clock, repo, cookie_jar, session, target).await
        }
    }
}

#[tracing::instrument(name = "handlers.oauth2.end_session.get", skip_all)]
pub(crate) async fn get(
    clock: BoxClock,
    repo: BoxRepository,
    State(site_config): State<SiteConfig>,
    State(templates): State<Templates>,
    RequestOrigin(origin): RequestOrigin,
    cookie_jar: CookieJar,
    Query(params): Query<EndSessionParams>,
) -> Result<Response, EndSessionError> {
    handle(
        clock,
        repo,
        &site_config,
        &templates,
        origin,
        cookie_jar,
        params,
        None,
    )
    .await
}

#[tracing::instrument(name = "handlers.oauth2.end_session.post", skip_all)]
pub(crate) async fn post(
    clock: BoxClock,
    repo: BoxRepository,
    State(site_config): State<SiteConfig>,
    State(templates): State<Templates>,
    RequestOrigin(origin): RequestOrigin,
    cookie_jar: CookieJar,
    Form(form): Form<EndSessionForm>,
) -> Result<Response, EndSessionError> {
    let (params, allow) = form.into_parts();
    handle(
        clock,
        repo,
        &site_config,
        &templates,
        origin,
        cookie_jar,
        params,
        Some(allow),
    )
    .await
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, header::SET_COOKIE};
    use chrono::Duration;
    use idp_data_model::{ClientType, User};
    use idp_router::SimpleRoute;

    use super::*;
    use crate::test_utils::{
        CookieHelper, RequestBuilderExt, ResponseExt, TestState, setup, test_site_config,
    };

    const LOGOUT: &str = idp_router::EndSession::PATH;

    struct Fixture {
        state: TestState,
        cookies: CookieHelper,
        user: User,
        session: BrowserSession,
    }

    /// Log `alice` in, and register a confidential client `abc` and a public
    /// client `pub`. An ID token `alice-token` was issued to `abc` for alice.
    async fn fixture(site_config: SiteConfig) -> Fixture {
        let state = TestState::from_site_config(site_config, crate::test_utils::test_key_store())
            .await
            .unwrap();
        let mut rng = state.rng();
        let mut repo = state.repository().await.unwrap();

        let user = repo
            .user()
            .add(
                &mut rng,
                &state.clock,
                "alice".to_owned(),
                "sub-alice".to_owned(),
            )
            .await
            .unwrap();

        let session = repo
            .browser_session()
            .add(&mut rng, &state.clock, &user, None)
            .await
            .unwrap();

        let abc = repo
            .oauth2_client()
            .upsert_static(
                &mut rng,
                &state.clock,
                "abc".to_owned(),
                ClientType::Confidential,
                Some("ABC App".to_owned()),
                vec!["https://app.example/done".to_owned()],
            )
            .await
            .unwrap();

        repo.oauth2_client()
            .upsert_static(
                &mut rng,
                &state.clock,
                "pub".to_owned(),
                ClientType::Public,
                None,
                vec!["http://public.example/done".to_owned()],
            )
            .await
            .unwrap();

        repo.id_token()
            .add(
                &state.clock,
                "alice-token".to_owned(),
                &abc,
                &user,
                Duration::try_hours(1).unwrap(),
            )
            .await
            .unwrap();

        repo.save().await.unwrap();

        let cookies = CookieHelper::new();
        cookies.import(state.cookie_jar().set_session(&session));

        Fixture {
            state,
            cookies,
            user,
            session,
        }
    }

    async fn fixture_with_defaults() -> Fixture {
        fixture(test_site_config()).await
    }

    async fn session_finished(state: &TestState, session: &BrowserSession) -> bool {
        let mut repo = state.repository().await.unwrap();
        let session = repo
            .browser_session()
            .lookup(session.id)
            .await
            .unwrap()
            .unwrap();
        !session.active()
    }

    fn get(query: &[(&str, &str)]) -> Request<String> {
        let query = serde_urlencoded::to_string(query).unwrap();
        Request::get(format!("{LOGOUT}?{query}")).empty()
    }

    #[tokio::test]
    async fn test_no_parameters_prompts() {
        setup();
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture_with_defaults().await;

        let request = cookies.with_cookies(get(&[]));
        let response = state.request(request).await;
        response.assert_status(StatusCode::OK);

        let body = response.body();
        assert!(body.contains("<form"));
        assert!(!body.contains("is asking to sign you out"));
        assert!(!session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_silent_logout_with_id_token() {
        setup();
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture_with_defaults().await;

        let request = cookies.with_cookies(get(&[("id_token_hint", "alice-token")]));
        let response = state.request(request).await;
        response.assert_status(StatusCode::FOUND);
        response.assert_header_value(LOCATION, "https://example.com/");

        // The session cookie is dropped
        let set_cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap().to_owned())
            .collect::<Vec<_>>();
        assert!(
            set_cookie.iter().any(|c| c.starts_with("session=;")),
            "{set_cookie:?}"
        );

        assert!(session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_silent_logout_with_redirect_and_state() {
        setup();
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture_with_defaults().await;

        let request = cookies.with_cookies(get(&[
            ("id_token_hint", "alice-token"),
            ("post_logout_redirect_uri", "https://app.example/done"),
            ("state", "a b&c"),
        ]));
        let response = state.request(request).await;
        response.assert_status(StatusCode::FOUND);
        response.assert_header_value(LOCATION, "https://app.example/done?state=a+b%26c");
        assert!(session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_always_prompt() {
        setup();
        let mut site_config = test_site_config();
        site_config.logout.always_prompt = true;
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture(site_config).await;

        let request = cookies.with_cookies(get(&[("id_token_hint", "alice-token")]));
        let response = state.request(request).await;
        response.assert_status(StatusCode::OK);
        assert!(response.body().contains(r#"name="id_token_hint" value="alice-token""#));
        assert!(!session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_confirmation_flow() {
        setup();
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture_with_defaults().await;

        let request = cookies.with_cookies(get(&[
            ("client_id", "abc"),
            ("post_logout_redirect_uri", "https://app.example/done"),
            ("state", "xyz"),
        ]));
        let response = state.request(request).await;
        response.assert_status(StatusCode::OK);

        let body = response.body();
        assert!(body.contains("ABC App is asking to sign you out."));
        assert!(body.contains(r#"name="client_id" value="abc""#));
        assert!(body.contains(r#"name="state" value="xyz""#));
        assert!(body.contains(r#"name="post_logout_redirect_uri""#));
        assert!(!session_finished(&state, &session).await);

        // The user confirms
        let request = Request::post(LOGOUT).form(serde_json::json!({
            "client_id": "abc",
            "post_logout_redirect_uri": "https://app.example/done",
            "state": "xyz",
            "allow": "true",
        }));
        let request = cookies.with_cookies(request);
        let response = state.request(request).await;
        response.assert_status(StatusCode::FOUND);
        response.assert_header_value(LOCATION, "https://app.example/done?state=xyz");
        assert!(session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_confirmation_denied() {
        setup();
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture_with_defaults().await;

        let request = Request::post(LOGOUT).form(serde_json::json!({
            "client_id": "abc",
            "post_logout_redirect_uri": "https://app.example/done",
            "allow": "false",
        }));
        let request = cookies.with_cookies(request);
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "logout_denied");
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert!(!session_finished(&state, &session).await);

        // A missing `allow` counts as a denial
        let request = Request::post(LOGOUT).form(serde_json::json!({ "client_id": "abc" }));
        let response = state.request(cookies.with_cookies(request)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_without_prompt_needs_no_confirmation() {
        setup();
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture_with_defaults().await;

        let request = Request::post(LOGOUT).form(serde_json::json!({
            "id_token_hint": "alice-token",
            "allow": "false",
        }));
        let response = state.request(cookies.with_cookies(request)).await;
        response.assert_status(StatusCode::FOUND);
        assert!(session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_client_id_mismatch() {
        setup();
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture_with_defaults().await;

        let request = cookies.with_cookies(get(&[
            ("id_token_hint", "alice-token"),
            ("client_id", "pub"),
        ]));
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json();
        insta::assert_json_snapshot!(body, @r###"
        {
          "error": "invalid_request",
          "error_description": "Mismatch between Client ID of the ID Token and provided the Client ID."
        }
        "###);
        assert!(!session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_http_redirect_for_public_client() {
        setup();
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture_with_defaults().await;

        let request = cookies.with_cookies(get(&[
            ("client_id", "pub"),
            ("post_logout_redirect_uri", "http://public.example/done"),
        ]));
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid_request");
        assert_eq!(
            body["error_description"],
            "http is only allowed with confidential clients."
        );
        assert!(!session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_invalid_id_token() {
        setup();
        let Fixture { state, cookies, .. } = fixture_with_defaults().await;

        let request = cookies.with_cookies(get(&[("id_token_hint", "garbage")]));
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn test_logout_without_session() {
        setup();
        let Fixture { state, session, .. } = fixture_with_defaults().await;

        // No session cookie: the ID token does not match anybody logged in
        let response = state.request(get(&[("id_token_hint", "alice-token")])).await;
        response.assert_status(StatusCode::OK);

        let response = state
            .request(
                Request::post(LOGOUT).form(serde_json::json!({
                    "id_token_hint": "alice-token",
                    "allow": "true",
                })),
            )
            .await;
        response.assert_status(StatusCode::FOUND);
        response.assert_header_value(LOCATION, "https://example.com/");

        // The session of the user is untouched
        assert!(!session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_confirmation_is_validated_again() {
        setup();
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture_with_defaults().await;

        let tampered = [
            // Not registered for `abc`
            serde_json::json!({
                "client_id": "abc",
                "post_logout_redirect_uri": "https://evil.example/",
                "allow": "true",
            }),
            // The ID token was issued to `abc`
            serde_json::json!({
                "id_token_hint": "alice-token",
                "client_id": "pub",
                "allow": "true",
            }),
            // `pub` is a public client
            serde_json::json!({
                "client_id": "pub",
                "post_logout_redirect_uri": "http://public.example/done",
                "allow": "true",
            }),
            // No client to check the redirect URI against
            serde_json::json!({
                "post_logout_redirect_uri": "https://app.example/done",
                "allow": "true",
            }),
            serde_json::json!({
                "id_token_hint": "garbage",
                "allow": "true",
            }),
        ];

        for form in tampered {
            let request = cookies.with_cookies(Request::post(LOGOUT).form(form.clone()));
            let response = state.request(request).await;
            response.assert_status(StatusCode::BAD_REQUEST);

            let body: serde_json::Value = response.json();
            assert_eq!(body["error"], "invalid_request", "{form}");
            assert!(response.headers().get(SET_COOKIE).is_none());
            assert!(!session_finished(&state, &session).await, "{form}");
        }
    }

    #[tokio::test]
    async fn test_request_origin_host_must_be_allowed() {
        setup();
        let mut site_config = test_site_config();
        site_config.issuer = None;
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture(site_config).await;

        let form = serde_json::json!({
            "id_token_hint": "alice-token",
            "allow": "true",
        });

        let request = Request::post(LOGOUT)
            .header("Host", "evil.attacker.example")
            .form(form.clone());
        let response = state.request(cookies.with_cookies(request)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.headers().get(LOCATION).is_none());
        assert!(!session_finished(&state, &session).await);

        let request = Request::post(LOGOUT)
            .header("Host", "idp.localhost:8080")
            .form(form);
        let response = state.request(cookies.with_cookies(request)).await;
        response.assert_status(StatusCode::FOUND);
        response.assert_header_value(LOCATION, "http://idp.localhost:8080/");
        assert!(session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_logout_twice() {
        setup();
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture_with_defaults().await;

        for _ in 0..2 {
            let request = cookies.with_cookies(get(&[("id_token_hint", "alice-token")]));
            let response = state.request(request).await;
            // The second time the cookie is gone, so the user is asked
            if response.status() == StatusCode::FOUND {
                cookies.save_cookies(&response);
            } else {
                response.assert_status(StatusCode::OK);
            }
        }

        assert!(session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_root_redirect_scheme_not_allowed() {
        setup();
        let mut site_config = test_site_config();
        site_config.logout.allowed_redirect_uri_schemes = vec!["http".to_owned()];
        let Fixture {
            state,
            cookies,
            session,
            ..
        } = fixture(site_config).await;

        let request = cookies.with_cookies(get(&[("id_token_hint", "alice-token")]));
        let response = state.request(request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(!session_finished(&state, &session).await);
    }

    #[tokio::test]
    async fn test_disabled_logout_is_not_mounted() {
        setup();
        let mut site_config = test_site_config();
        site_config.logout.enabled = false;
        let state = TestState::from_site_config(site_config, crate::test_utils::test_key_store())
            .await
            .unwrap();

        let response = state.request(get(&[])).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_params_ignore_empty_values() {
        let params: EndSessionParams =
            serde_urlencoded::from_str("id_token_hint=&client_id=abc&state=").unwrap();
        assert_eq!(
            params,
            EndSessionParams {
                client_id: Some("abc".to_owned()),
                ..EndSessionParams::default()
            }
        );

        let form: EndSessionForm = serde_urlencoded::from_str("client_id=abc&allow=true").unwrap();
        let (params, allow) = form.into_parts();
        assert!(allow);
        assert_eq!(params.client_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_redirect_target() {
        let url_builder = UrlBuilder::new("https://example.com/".parse().unwrap(), None);
        let policy = LogoutPolicy::default();

        let target = redirect_target(&url_builder, &policy, None, Some("xyz".to_owned()), None)
            .unwrap();
        assert_eq!(target.as_str(), "https://example.com/");

        // A redirect URI is only ever validated for a client
        let uri: Url = "https://app.example/done".parse().unwrap();
        let result = redirect_target(&url_builder, &policy, Some(uri), None, None);
        assert!(result.is_err());
    }
}
