/*
[INPUT]:  HTTP configuration (base URL, project key, timeouts), shared session
[OUTPUT]: Configured reqwest client ready for API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::time::Duration;

use reqwest::header::{HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::SessionManager;
use crate::http::{BackendError, Result};
use crate::types::{ErrorBody, Session};

const REST_PREFIX: &str = "rest/v1/";
const AUTH_PREFIX: &str = "auth/v1/";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the hosted backend (data API + auth API)
#[derive(Debug, Clone)]
pub struct BackendClient {
    http_client: Client,
    base_url: Url,
    api_key: String,
    timeout: Duration,
    session: SessionManager,
}

impl BackendClient {
    /// Create a new client with default configuration
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(base_url, api_key, ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(
        base_url: &str,
        api_key: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(BackendError::Config("api key must not be empty".to_string()));
        }

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        // A trailing slash keeps `join` from dropping the last path segment.
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http_client,
            base_url,
            api_key,
            timeout: config.timeout,
            session: SessionManager::new(),
        })
    }

    /// Session slot shared with the auth manager
    pub fn session_manager(&self) -> &SessionManager {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Return the active session or fail fast with `AuthRequired`
    pub fn require_session(&self) -> Result<Session> {
        self.session
            .active_session()
            .ok_or(BackendError::AuthRequired)
    }

    /// Build a data API URL for a table with encoded query parameters
    pub(crate) fn rest_url(&self, table: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = self.base_url.join(REST_PREFIX)?.join(table)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Build an auth API URL
    pub(crate) fn auth_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(AUTH_PREFIX)?.join(endpoint)?)
    }

    /// Request against the data API; requires an active session
    pub(crate) fn rest_request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let session = self.require_session()?;
        Ok(self
            .http_client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(session.access_token))
    }

    /// Request against the auth API with the project key only
    pub(crate) fn auth_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("apikey", &self.api_key)
    }

    /// Send a request and decode a JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| {
            BackendError::InvalidResponse(format!("unexpected response body: {err}"))
        })
    }

    /// Send a request and discard the body
    pub(crate) async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        self.send(builder).await.map(|_| ())
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                BackendError::Timeout {
                    duration: self.timeout.as_secs(),
                }
            } else {
                BackendError::Http(err)
            }
        })?;

        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "backend response");
        if status.is_success() {
            return Ok(response);
        }

        Err(self.error_from_response(response).await)
    }

    async fn error_from_response(&self, response: Response) -> BackendError {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(parse_retry_after)
                .unwrap_or(1);
            return BackendError::RateLimit { retry_after };
        }

        let body = response
            .bytes()
            .await
            .ok()
            .and_then(|bytes| serde_json::from_slice::<ErrorBody>(&bytes).ok());

        if status == StatusCode::UNAUTHORIZED {
            return BackendError::AuthRequired;
        }

        BackendError::api_error(status, body)
    }
}

fn parse_retry_after(value: &HeaderValue) -> Option<u64> {
    value.to_str().ok()?.trim().parse().ok()
}
