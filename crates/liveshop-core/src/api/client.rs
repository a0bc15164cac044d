//! Session client for the liveshop REST API.
//!
//! `SessionClient` sends every call through the [`RequestPipeline`], which
//! attaches the stored access token. A 401 on an authenticated call triggers
//! one token refresh followed by one replay of the original request.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::auth::credentials::{clear_session, persist_tokens};
use crate::auth::{CredentialKey, CredentialStore};
use crate::config::Config;
use crate::models::{ApiResponse, AuthPayload, LoginCredentials, RegisterData, TokenPair, User};

use super::pipeline::{PendingRequest, RequestConfig, RequestPipeline};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// A request is replayed at most this many times after a token refresh.
const MAX_AUTH_RETRIES: u32 = 1;

const REFRESH_PATH: &str = "/auth/refresh";

/// Buffered session events per subscriber
const SESSION_EVENT_CAPACITY: usize = 16;

#[derive(Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

/// Credential changes made by the client on its own
#[derive(Clone)]
pub enum SessionEvent {
    /// Tokens were renewed; `previous_refresh_token` is the one exchanged
    Refreshed {
        previous_refresh_token: String,
        tokens: TokenPair,
    },
    /// The session could not be renewed and persisted credentials were cleared
    Expired { refresh_token: String },
}

impl fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Refreshed { .. } => f.write_str("Refreshed"),
            SessionEvent::Expired { .. } => f.write_str("Expired"),
        }
    }
}

/// API client with transparent access-token renewal.
/// Clone is cheap - all state is shared.
#[derive(Clone)]
pub struct SessionClient {
    client: Client,
    base_url: Arc<str>,
    credentials: Arc<dyn CredentialStore>,
    pipeline: Arc<RequestPipeline>,
    refresh_lock: Arc<Mutex<()>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionClient {
    /// Create a client with the default timeout
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS), credentials)
    }

    pub fn from_config(config: &Config, credentials: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Self::with_timeout(config.api_base_url(), config.request_timeout(), credentials)
    }

    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()?;

        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            pipeline: Arc::new(RequestPipeline::standard(Arc::clone(&credentials))),
            credentials,
            refresh_lock: Arc::new(Mutex::new(())),
            events,
        })
    }

    /// Replace the request pipeline
    pub fn with_pipeline(mut self, pipeline: RequestPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn credentials(&self) -> Arc<dyn CredentialStore> {
        Arc::clone(&self.credentials)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Subscribe to refresh/expiry events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // ========================================================================
    // Request execution
    // ========================================================================

    /// Send a request and decode the whole response body
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        config: Option<RequestConfig>,
    ) -> Result<T, ApiError> {
        let mut request = PendingRequest::new(method, path).with_config(config.unwrap_or_default());
        request.body = body;

        let response = self.execute(request).await?;
        Ok(response.json().await?)
    }

    /// Send a request and unwrap the `data` field of the response envelope
    pub async fn call<T: DeserializeOwned>(&self, request: PendingRequest) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response.json().await?;
        envelope.into_data(status)
    }

    /// Run a request to completion, recovering once from an expired token.
    ///
    /// Returns the successful response; any other status is mapped into
    /// an [`ApiError`].
    pub async fn execute(&self, mut request: PendingRequest) -> Result<Response, ApiError> {
        let mut attempt = 0;
        loop {
            let response = self.send_once(&mut request, attempt).await?;

            if response.status() != StatusCode::UNAUTHORIZED || request.config.skip_auth {
                return Self::check_response(response).await;
            }

            if attempt >= MAX_AUTH_RETRIES {
                warn!(path = %request.path, "Request still unauthorized after token refresh");
                return Err(ApiError::AuthExpired);
            }

            attempt += 1;
            let tokens = self.refresh_session(request.bearer.as_deref()).await?;
            request.bearer = Some(tokens.access_token);
            debug!(path = %request.path, attempt, "Replaying request with renewed token");
        }
    }

    async fn send_once(&self, request: &mut PendingRequest, attempt: u32) -> Result<Response, ApiError> {
        self.pipeline.prepare(request, attempt)?;

        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .headers(request.config.headers.clone());
        if !request.config.query.is_empty() {
            builder = builder.query(&request.config.query);
        }
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(method = %request.method, path = %request.path, error = %e, "Request failed");
            ApiError::from(e)
        })?;

        self.pipeline.observe(request, response.status(), attempt);
        Ok(response)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    // ========================================================================
    // Token refresh
    // ========================================================================

    /// Obtain a fresh access token after `rejected` was refused.
    ///
    /// Refreshes are serialised: a caller that waited on another refresh
    /// reuses its result instead of spending the refresh token again. On
    /// failure all persisted credentials are cleared before returning.
    async fn refresh_session(&self, rejected: Option<&str>) -> Result<TokenPair, ApiError> {
        let _guard = self.refresh_lock.lock().await;

        let Some(refresh_token) = self.credentials.get(CredentialKey::RefreshToken)? else {
            debug!("No refresh token stored, session cannot be renewed");
            return Err(ApiError::AuthExpired);
        };

        if let Some(current) = self.credentials.get(CredentialKey::AccessToken)? {
            if rejected != Some(current.as_str()) {
                debug!("Access token was renewed concurrently, reusing it");
                return Ok(TokenPair::new(current, refresh_token));
            }
        }

        let renewed = match self.request_new_tokens(&refresh_token).await {
            Ok(tokens) => {
                // Sign-out or a new sign-in may have replaced the slots meanwhile
                if self.credentials.get(CredentialKey::RefreshToken)?.as_deref()
                    != Some(refresh_token.as_str())
                {
                    debug!("Session changed during refresh, discarding renewed tokens");
                    return Err(ApiError::AuthExpired);
                }
                persist_tokens(self.credentials.as_ref(), &tokens)
                    .map(|()| tokens)
                    .map_err(ApiError::from)
            }
            Err(e) => Err(e),
        };

        match renewed {
            Ok(tokens) => {
                info!("Access token refreshed");
                let _ = self.events.send(SessionEvent::Refreshed {
                    previous_refresh_token: refresh_token,
                    tokens: tokens.clone(),
                });
                Ok(tokens)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                if let Err(clear_err) = clear_session(self.credentials.as_ref()) {
                    error!(error = %clear_err, "Failed to clear persisted credentials");
                }
                let _ = self.events.send(SessionEvent::Expired { refresh_token });
                Err(ApiError::AuthExpired)
            }
        }
    }

    /// Clear all persisted credentials.
    ///
    /// Waits for any refresh in flight, so a renewal cannot write tokens
    /// back after the session was cleared.
    pub async fn clear_credentials(&self) -> Result<(), ApiError> {
        let _guard = self.refresh_lock.lock().await;
        clear_session(self.credentials.as_ref())?;
        Ok(())
    }

    /// Exchange a refresh token. Bypasses the pipeline: the refresh token in
    /// the body is the only credential sent.
    async fn request_new_tokens(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let status = response.status().as_u16();
        let envelope: ApiResponse<TokenPair> = response.json().await?;
        envelope.into_data(status)
    }

    // ========================================================================
    // Auth endpoints
    // ========================================================================

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        let request = PendingRequest::new(Method::POST, "/auth/login")
            .with_body(&LoginCredentials { email, password })?
            .with_config(RequestConfig::unauthenticated());
        self.call(request).await
    }

    pub async fn register(&self, data: &RegisterData) -> Result<AuthPayload, ApiError> {
        let request = PendingRequest::new(Method::POST, "/auth/register")
            .with_body(data)?
            .with_config(RequestConfig::unauthenticated());
        self.call(request).await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.execute(PendingRequest::new(Method::POST, "/auth/logout"))
            .await
            .map(|_| ())
    }

    /// Fetch the profile of the signed-in user
    pub async fn get_profile(&self) -> Result<User, ApiError> {
        self.call(PendingRequest::new(Method::GET, "/auth/me")).await
    }
}
