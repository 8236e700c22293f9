//! Shared request pipeline for every backend call.
//!
//! All requests go to one base URL with a JSON content type. Before a request
//! leaves, the stored bearer token (if any) is attached. When the backend
//! answers 401 to a request that has not been retried yet, the stored token
//! is cleared and a single [`AuthEvent::Unauthorized`] is broadcast so the
//! front end can send the user back to the login screen. Every failure is
//! still returned to the caller; nothing is retried here.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use url::Url;

use crate::domain::errors::{ApiError, ErrorBody};
use crate::domain::ports::AuthEvent;
use crate::domain::token_store::TokenStore;

const AUTH_EVENT_CAPACITY: usize = 16;

// Process-wide unauthorized signal. Cloning shares the same channel.
#[derive(Clone)]
pub struct UnauthorizedNotifier {
    tx: broadcast::Sender<AuthEvent>,
}

impl UnauthorizedNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self) {
        // Nobody listening is not an error.
        let _ = self.tx.send(AuthEvent::Unauthorized);
    }
}

impl Default for UnauthorizedNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid base url {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("base url {0:?} cannot carry a path")]
    NotABase(String),
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

// One outgoing call. Path segments are percent-encoded when joined.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    body: Option<Vec<u8>>,
    retried: bool,
}

impl ApiRequest {
    pub fn new<S: AsRef<str>>(method: Method, segments: &[S]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.as_ref().to_string()).collect(),
            body: None,
            retried: false,
        }
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_vec(body).map_err(ApiError::Encode)?);
        Ok(self)
    }

    // A request marked as retried never triggers the unauthorized handling.
    // The pipeline itself never retries; callers that replay a request after
    // a 401 set this so the replay cannot clear the token or signal again.
    pub fn mark_retried(mut self) -> Self {
        self.retried = true;
        self
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|err| ApiError::Decode(Box::new(err)))
    }

    // Empty bodies (e.g. 201 without content) read as null.
    pub fn value(&self) -> Result<Value, ApiError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        self.json()
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    tokens: TokenStore,
    unauthorized: UnauthorizedNotifier,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        tokens: TokenStore,
        unauthorized: UnauthorizedNotifier,
    ) -> Result<Self, ClientBuildError> {
        let parsed = Url::parse(base_url).map_err(|source| ClientBuildError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ClientBuildError::NotABase(base_url.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url: parsed,
            tokens,
            unauthorized,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn unauthorized(&self) -> &UnauthorizedNotifier {
        &self.unauthorized
    }

    pub fn url_for<S: AsRef<str>>(&self, segments: &[S]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base url always has a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    #[tracing::instrument(
        name = "api_request",
        skip_all,
        fields(method = %request.method, path = %request.path())
    )]
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(request.segments.as_slice());
        let mut builder = self.http.request(request.method.clone(), url);

        // Attach the bearer credential when a token is stored.
        if let Some(token) = self.tokens.get() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ApiError::Transport(Box::new(err)))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ApiError::Transport(Box::new(err)))?
            .to_vec();

        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "request succeeded");
            return Ok(ApiResponse {
                status: status.as_u16(),
                body,
            });
        }

        if status == StatusCode::UNAUTHORIZED && !request.retried {
            self.handle_unauthorized();
        }

        tracing::debug!(status = status.as_u16(), "request failed");
        Err(ApiError::Status {
            status: status.as_u16(),
            body: ErrorBody::from_bytes(&body),
        })
    }

    pub async fn get_json<T, S>(&self, segments: &[S]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
    {
        self.execute(ApiRequest::new(Method::GET, segments))
            .await?
            .json()
    }

    pub async fn send_json<B, S>(
        &self,
        method: Method,
        segments: &[S],
        body: &B,
    ) -> Result<ApiResponse, ApiError>
    where
        B: Serialize,
        S: AsRef<str>,
    {
        self.execute(ApiRequest::new(method, segments).json(body)?)
            .await
    }

    pub async fn delete<S: AsRef<str>>(&self, segments: &[S]) -> Result<(), ApiError> {
        self.execute(ApiRequest::new(Method::DELETE, segments))
            .await
            .map(|_| ())
    }

    fn handle_unauthorized(&self) {
        tracing::warn!("backend rejected credentials; clearing stored token");
        if let Err(error) = self.tokens.clear() {
            tracing::error!(%error, "failed to clear stored token");
        }
        self.unauthorized.notify();
    }
}
