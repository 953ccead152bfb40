//! HTTP test client for the plant-shop REST API.
//!
//! Verb methods always resolve to an [`HttpResult`]: HTTP error statuses are
//! returned as-is for the step to assert on, and transport failures become a
//! synthetic 503. Only [`ApiClient::authenticate`] returns an error, because a
//! scenario that cannot log in has nothing left to test.

mod auth;
mod pagination;

pub use auth::{extract_token, role_from_body, AuthOutcome, Role, TOKEN_FIELDS};
pub use pagination::{Pagination, SortDir};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::{SuiteConfig, API_PREFIX};
use crate::error::{SetupError, SetupResult};
use crate::response::HttpResult;

/// Login endpoint, relative to the API prefix.
pub const LOGIN_ENDPOINT: &str = "/auth/login";

#[derive(Clone, PartialEq, Eq)]
enum AuthHeader {
    Bearer(String),
    Basic(String),
}

impl AuthHeader {
    fn value(&self) -> String {
        match self {
            AuthHeader::Bearer(token) => format!("Bearer {}", token),
            AuthHeader::Basic(encoded) => format!("Basic {}", encoded),
        }
    }
}

/// Client bound to one API base URL and one evolving identity.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    auth: Option<AuthHeader>,
    role: Role,
    admin_username: String,
}

impl ApiClient {
    /// Create a client for `base_url` with the given per-request timeout.
    ///
    /// A trailing `/api` on the base URL is dropped so that endpoints given
    /// with or without the prefix resolve to the same URL.
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> SetupResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: normalize_base_url(base_url.as_ref()),
            timeout,
            auth: None,
            role: Role::Anonymous,
            admin_username: "admin".to_string(),
        })
    }

    /// Client for the configured API base URL and timeout
    pub fn from_config(config: &SuiteConfig) -> SetupResult<Self> {
        Ok(Self::new(&config.api_base_url, config.timeout)?
            .with_admin_username(config.admin.username.clone()))
    }

    /// Username whose login is treated as an admin login when the server
    /// does not state a role
    pub fn with_admin_username(mut self, username: impl Into<String>) -> Self {
        self.admin_username = username.into();
        self
    }

    /// A client sharing this one's connection pool but with no identity
    pub fn anonymous(&self) -> Self {
        Self {
            auth: None,
            role: Role::Anonymous,
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Bearer token currently attached to requests
    pub fn token(&self) -> Option<&str> {
        match &self.auth {
            Some(AuthHeader::Bearer(token)) => Some(token),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Resolve an endpoint to a full URL.
    ///
    /// Absolute URLs pass through. Relative endpoints get a leading slash
    /// and the API prefix unless they already start with it.
    pub fn url_for(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim();
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let path = if endpoint.starts_with('/') {
            endpoint.to_string()
        } else {
            format!("/{}", endpoint)
        };
        if has_api_prefix(&path) {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}{}", self.base_url, API_PREFIX, path)
        }
    }

    /// Log in and attach the returned token to every later request.
    ///
    /// Fails on transport errors, on a non-success status and on a success
    /// response with no usable token. The client's identity is left
    /// untouched when this fails.
    #[instrument(skip(self, password), fields(base_url = %self.base_url))]
    pub async fn authenticate(&mut self, username: &str, password: &str) -> SetupResult<AuthOutcome> {
        let url = self.url_for(LOGIN_ENDPOINT);
        let result = self
            .dispatch(Method::POST, &url, &[], Some(&login_body(username, password)), false)
            .await
            .map_err(|e| SetupError::LoginTransport {
                url: url.clone(),
                reason: describe_transport_error(&e, self.timeout),
            })?;

        if !result.is_success() {
            return Err(SetupError::LoginRejected {
                username: username.to_string(),
                status: result.status,
                body: result.data.to_string(),
            });
        }

        let token = extract_token(&result.data).ok_or_else(|| {
            warn!(username, body = %result.data, "Login succeeded but no token found");
            SetupError::MissingToken {
                username: username.to_string(),
            }
        })?;
        let role = role_from_body(&result.data).unwrap_or_else(|| self.infer_role(username));

        self.auth = Some(AuthHeader::Bearer(token.clone()));
        self.role = role;
        info!(username, %role, "Authenticated");

        Ok(AuthOutcome {
            token,
            role,
            status: result.status,
        })
    }

    /// Send the login request and return whatever came back, storing
    /// nothing. For scenarios that assert on rejected logins.
    pub async fn try_login(&self, username: &str, password: &str) -> HttpResult {
        let url = self.url_for(LOGIN_ENDPOINT);
        match self
            .dispatch(Method::POST, &url, &[], Some(&login_body(username, password)), false)
            .await
        {
            Ok(result) => result,
            Err(e) => self.synthetic_failure(&Method::POST, &url, &e),
        }
    }

    /// Forget the current identity
    pub fn logout(&mut self) {
        if self.auth.take().is_some() {
            debug!(role = %self.role, "Logged out");
        }
        self.role = Role::Anonymous;
    }

    /// Attach a token obtained elsewhere
    pub fn set_token(&mut self, token: impl Into<String>, role: Role) {
        self.auth = Some(AuthHeader::Bearer(token.into()));
        self.role = role;
    }

    /// Replace the auth header with HTTP Basic credentials
    pub fn set_basic_auth(&mut self, username: &str, password: &str) {
        let encoded = BASE64.encode(format!("{}:{}", username, password));
        self.auth = Some(AuthHeader::Basic(encoded));
        self.role = self.infer_role(username);
    }

    pub async fn get(&self, endpoint: &str) -> HttpResult {
        self.request(Method::GET, endpoint, &[], None).await
    }

    pub async fn get_with_query(&self, endpoint: &str, query: &[(String, String)]) -> HttpResult {
        self.request(Method::GET, endpoint, query, None).await
    }

    pub async fn get_page(&self, endpoint: &str, pagination: &Pagination) -> HttpResult {
        self.request(Method::GET, endpoint, &pagination.to_query(), None)
            .await
    }

    pub async fn post(&self, endpoint: &str, body: &Value) -> HttpResult {
        self.request(Method::POST, endpoint, &[], Some(body)).await
    }

    pub async fn put(&self, endpoint: &str, body: &Value) -> HttpResult {
        self.request(Method::PUT, endpoint, &[], Some(body)).await
    }

    pub async fn patch(&self, endpoint: &str, body: &Value) -> HttpResult {
        self.request(Method::PATCH, endpoint, &[], Some(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> HttpResult {
        self.request(Method::DELETE, endpoint, &[], None).await
    }

    /// Issue a request with the stored identity. Never fails.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> HttpResult {
        let url = self.url_for(endpoint);
        match self.dispatch(method.clone(), &url, query, body, true).await {
            Ok(result) => result,
            Err(e) => self.synthetic_failure(&method, &url, &e),
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        with_auth: bool,
    ) -> Result<HttpResult, reqwest::Error> {
        let started = Instant::now();
        let mut request = self.http.request(method.clone(), url);

        if with_auth {
            if let Some(auth) = &self.auth {
                request = request.header(AUTHORIZATION, auth.value());
            }
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let text = response.text().await?;

        debug!(
            %method,
            url,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        Ok(HttpResult::from_body(status, &text, headers))
    }

    fn synthetic_failure(&self, method: &Method, url: &str, error: &reqwest::Error) -> HttpResult {
        let reason = describe_transport_error(error, self.timeout);
        warn!(%method, url, %reason, "No response received");
        HttpResult::transport_failure(format!("{} {} failed: no response received", method, url), reason)
    }

    fn infer_role(&self, username: &str) -> Role {
        if username == self.admin_username {
            Role::Admin
        } else {
            Role::User
        }
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("authenticated", &self.auth.is_some())
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

fn login_body(username: &str, password: &str) -> Value {
    json!({
        "username": username,
        "password": password,
    })
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    trimmed
        .strip_suffix(API_PREFIX)
        .unwrap_or(trimmed)
        .to_string()
}

fn has_api_prefix(path: &str) -> bool {
    match path.strip_prefix(API_PREFIX) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}

fn describe_transport_error(error: &reqwest::Error, timeout: Duration) -> String {
    if error.is_timeout() {
        format!("Request timeout after {} ms: {}", timeout.as_millis(), error)
    } else if error.is_connect() {
        format!("Connection error: {}", error)
    } else {
        format!("HTTP error: {}", error)
    }
}
