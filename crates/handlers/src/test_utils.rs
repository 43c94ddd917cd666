// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2023, 2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{
    convert::Infallible,
    sync::{Arc, Mutex, RwLock},
};

use axum::{
    body::{Bytes, HttpBody},
    extract::{FromRef, FromRequestParts},
    http::{
        HeaderName, HeaderValue, Request, Response, StatusCode,
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
    },
    response::{IntoResponse, IntoResponseParts},
};
use cookie_store::{CookieStore, RawCookie};
use headers::{ContentType, HeaderMapExt};
use idp_axum_utils::{CookieJar, CookieManager, ErrorWrapper};
use idp_data_model::{LogoutPolicy, MockClock, SiteConfig};
use idp_keystore::{Keystore, PrivateKey};
use idp_storage::{BoxClock, BoxRepository, RepositoryError, RepositoryFactory};
use idp_storage_memory::MemoryRepositoryFactory;
use idp_templates::Templates;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use serde::{Serialize, de::DeserializeOwned};
use tower::{Service, ServiceExt};
use url::Url;

/// Setup tracing for tests.
#[allow(unused_must_use)]
pub(crate) fn setup() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

fn workspace_root() -> camino::Utf8PathBuf {
    camino::Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .canonicalize_utf8()
        .unwrap()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|&value| value.to_owned()).collect()
}

pub(crate) fn test_site_config() -> SiteConfig {
    SiteConfig {
        issuer: Some("https://example.com/".parse().unwrap()),
        allowed_hosts: strings(&[".localhost"]),
        userinfo_endpoint: None,
        scopes_supported: strings(&["openid", "profile", "email"]),
        claims_supported: strings(&["sub"]),
        response_types_supported: strings(&[
            "code",
            "token",
            "id_token",
            "id_token token",
            "code token",
            "code id_token",
            "code id_token token",
        ]),
        subject_types_supported: strings(&["public"]),
        token_endpoint_auth_methods_supported: strings(&[
            "client_secret_post",
            "client_secret_basic",
        ]),
        jwks_max_age: 3600,
        logout: LogoutPolicy {
            enabled: true,
            always_prompt: false,
            ..LogoutPolicy::default()
        },
    }
}

/// A key store with a single RSA key
pub(crate) fn test_key_store() -> Keystore {
    let key = PrivateKey::load_pem(include_str!("../../keystore/tests/keys/rsa.pkcs1.pem"))
        .unwrap();
    Keystore::new([key])
}

#[derive(Clone)]
pub(crate) struct TestState {
    pub repository_factory: MemoryRepositoryFactory,
    pub templates: Templates,
    pub key_store: Keystore,
    pub cookie_manager: CookieManager,
    pub site_config: SiteConfig,
    pub clock: Arc<MockClock>,
    pub rng: Arc<Mutex<ChaChaRng>>,
}

impl TestState {
    /// Create a new test state with the default site configuration and the
    /// test key store
    pub async fn new() -> Result<Self, anyhow::Error> {
        Self::from_site_config(test_site_config(), test_key_store()).await
    }

    pub async fn from_site_config(
        site_config: SiteConfig,
        key_store: Keystore,
    ) -> Result<Self, anyhow::Error> {
        let templates = Templates::load(workspace_root().join("templates")).await?;

        let cookie_manager = CookieManager::derive_from(site_config.issuer.as_ref(), &[0x42; 32]);

        let rng = Arc::new(Mutex::new(ChaChaRng::seed_from_u64(42)));
        let clock = Arc::new(MockClock::default());

        Ok(Self {
            repository_factory: MemoryRepositoryFactory::new(),
            templates,
            key_store,
            cookie_manager,
            site_config,
            clock,
            rng,
        })
    }

    pub async fn request<B>(&self, request: Request<B>) -> Response<String>
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        <B as HttpBody>::Error: std::error::Error + Send + Sync,
        B::Error: std::error::Error + Send + Sync,
        B::Data: Send,
    {
        let app = crate::router(&self.site_config)
            .with_state(self.clone())
            .into_service();

        let Ok(mut service) = app.ready_oneshot().await;
        let Ok(response) = service.call(request).await;

        let (parts, body) = response.into_parts();

        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .expect("Failed to read response body");
        let body = std::str::from_utf8(&body)
            .expect("Response body is not valid UTF-8")
            .to_owned();

        Response::from_parts(parts, body)
    }

    pub async fn repository(&self) -> Result<BoxRepository, RepositoryError> {
        self.repository_factory.create().await
    }

    /// Returns a new random number generator.
    ///
    /// # Panics
    ///
    /// Panics if the RNG is already locked.
    pub fn rng(&self) -> ChaChaRng {
        let mut parent_rng = self.rng.try_lock().expect("Failed to lock RNG");
        ChaChaRng::from_rng(&mut *parent_rng).unwrap()
    }

    /// Get an empty cookie jar
    pub fn cookie_jar(&self) -> CookieJar {
        self.cookie_manager.cookie_jar()
    }
}

impl FromRef<TestState> for Templates {
    fn from_ref(input: &TestState) -> Self {
        input.templates.clone()
    }
}

impl FromRef<TestState> for Keystore {
    fn from_ref(input: &TestState) -> Self {
        input.key_store.clone()
    }
}

impl FromRef<TestState> for CookieManager {
    fn from_ref(input: &TestState) -> Self {
        input.cookie_manager.clone()
    }
}

impl FromRef<TestState> for SiteConfig {
    fn from_ref(input: &TestState) -> Self {
        input.site_config.clone()
    }
}

impl FromRequestParts<TestState> for BoxClock {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut axum::http::request::Parts,
        state: &TestState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Box::new(state.clock.clone()))
    }
}

impl FromRequestParts<TestState> for BoxRepository {
    type Rejection = ErrorWrapper<RepositoryError>;

    async fn from_request_parts(
        _parts: &mut axum::http::request::Parts,
        state: &TestState,
    ) -> Result<Self, Self::Rejection> {
        let repo = state.repository_factory.create().await?;
        Ok(repo)
    }
}

pub(crate) trait RequestBuilderExt {
    /// Builds the request with the given form value as body.
    fn form<T: Serialize>(self, body: T) -> Request<String>;

    /// Builds the request with an empty body.
    fn empty(self) -> Request<String>;
}

impl RequestBuilderExt for axum::http::request::Builder {
    fn form<T: Serialize>(mut self, body: T) -> Request<String> {
        self.headers_mut()
            .unwrap()
            .typed_insert(ContentType::form_url_encoded());

        self.body(serde_urlencoded::to_string(&body).unwrap())
            .unwrap()
    }

    fn empty(self) -> Request<String> {
        self.body(String::new()).unwrap()
    }
}

pub(crate) trait ResponseExt {
    /// Asserts that the response has the given status code.
    ///
    /// # Panics
    ///
    /// Panics if the response has a different status code.
    fn assert_status(&self, status: StatusCode);

    /// Asserts that the response has the given header value.
    ///
    /// # Panics
    ///
    /// Panics if the response does not have the given header or if the header
    /// value does not match.
    fn assert_header_value(&self, header: HeaderName, value: &str);

    /// Get the response body as JSON.
    ///
    /// # Panics
    ///
    /// Panics if the response is missing the `Content-Type: application/json`,
    /// or if the body is not valid JSON.
    fn json<T: DeserializeOwned>(&self) -> T;
}

impl ResponseExt for Response<String> {
    #[track_caller]
    fn assert_status(&self, status: StatusCode) {
        assert_eq!(
            self.status(),
            status,
            "HTTP status code mismatch: got {}, expected {}. Body: {}",
            self.status(),
            status,
            self.body()
        );
    }

    #[track_caller]
    fn assert_header_value(&self, header: HeaderName, value: &str) {
        let actual_value = self
            .headers()
            .get(&header)
            .unwrap_or_else(|| panic!("Missing header {header}"));

        assert_eq!(
            actual_value,
            value,
            "Header mismatch: got {:?}, expected {:?}",
            self.headers().get(header),
            value
        );
    }

    #[track_caller]
    fn json<T: DeserializeOwned>(&self) -> T {
        self.assert_header_value(CONTENT_TYPE, "application/json");
        serde_json::from_str(self.body()).expect("JSON deserialization failed")
    }
}

/// A helper for storing and retrieving cookies in tests.
#[derive(Clone, Debug, Default)]
pub(crate) struct CookieHelper {
    store: Arc<RwLock<CookieStore>>,
}

impl CookieHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject the cookies from the store into the request.
    pub fn with_cookies<B>(&self, mut request: Request<B>) -> Request<B> {
        let url = Url::options()
            .base_url(Some(&"https://example.com/".parse().unwrap()))
            .parse(&request.uri().to_string())
            .expect("Failed to parse URL");

        let store = self.store.read().unwrap();
        let value = store
            .get_request_values(&url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        request.headers_mut().insert(
            COOKIE,
            HeaderValue::from_str(&value).expect("Invalid cookie value"),
        );
        request
    }

    /// Save the cookies from the response into the store.
    pub fn save_cookies<B>(&self, response: &Response<B>) {
        let url = "https://example.com/".parse().unwrap();
        let mut store = self.store.write().unwrap();
        store.store_response_cookies(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .map(|set_cookie| {
                    RawCookie::parse(
                        set_cookie
                            .to_str()
                            .expect("Invalid set-cookie header")
                            .to_owned(),
                    )
                    .expect("Invalid set-cookie header")
                }),
            &url,
        );
    }

    pub fn import(&self, res: impl IntoResponseParts) {
        let response = (res, "").into_response();
        self.save_cookies(&response);
    }
}
