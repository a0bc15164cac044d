//! Explicit request pipeline.
//!
//! Every outbound call is described by a [`PendingRequest`]. Before each send
//! attempt the request passes through the ordered [`RequestHook`]s; after the
//! response arrives the [`ResponseHook`]s observe its status. The attempt
//! number is passed to every hook so retries are visible to them.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::{CredentialKey, CredentialStore};

use super::ApiError;

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    /// Send without a bearer token and without 401 recovery
    pub skip_auth: bool,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config for calls that authenticate by other means (login, refresh)
    pub fn unauthenticated() -> Self {
        Self {
            skip_auth: true,
            ..Self::default()
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn queries<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// An outbound call, kept until it has been answered or replayed once
#[derive(Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub config: RequestConfig,
    /// Access token attached to this request, if any
    pub bearer: Option<String>,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            config: RequestConfig::default(),
            bearer: None,
        }
    }

    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Validation(format!("Request body is not serializable: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("has_body", &self.body.is_some())
            .field("skip_auth", &self.config.skip_auth)
            .field("has_bearer", &self.bearer.is_some())
            .finish()
    }
}

/// Runs before every send attempt and may amend the request
pub trait RequestHook: Send + Sync {
    fn before_send(&self, request: &mut PendingRequest, attempt: u32) -> Result<(), ApiError>;
}

/// Observes every response status
pub trait ResponseHook: Send + Sync {
    fn after_response(&self, request: &PendingRequest, status: StatusCode, attempt: u32);
}

/// Ordered pre-request and post-response hooks
#[derive(Clone, Default)]
pub struct RequestPipeline {
    request_hooks: Vec<Arc<dyn RequestHook>>,
    response_hooks: Vec<Arc<dyn ResponseHook>>,
}

impl RequestPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer attachment followed by response tracing
    pub fn standard(credentials: Arc<dyn CredentialStore>) -> Self {
        Self::new()
            .with_request_hook(BearerAuth::new(credentials))
            .with_response_hook(TraceResponses)
    }

    pub fn with_request_hook(mut self, hook: impl RequestHook + 'static) -> Self {
        self.request_hooks.push(Arc::new(hook));
        self
    }

    pub fn with_response_hook(mut self, hook: impl ResponseHook + 'static) -> Self {
        self.response_hooks.push(Arc::new(hook));
        self
    }

    pub fn prepare(&self, request: &mut PendingRequest, attempt: u32) -> Result<(), ApiError> {
        for hook in &self.request_hooks {
            hook.before_send(request, attempt)?;
        }
        Ok(())
    }

    pub fn observe(&self, request: &PendingRequest, status: StatusCode, attempt: u32) {
        for hook in &self.response_hooks {
            hook.after_response(request, status, attempt);
        }
    }
}

/// Attaches the stored access token unless the request already carries one
pub struct BearerAuth {
    credentials: Arc<dyn CredentialStore>,
}

impl BearerAuth {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }
}

impl RequestHook for BearerAuth {
    fn before_send(&self, request: &mut PendingRequest, _attempt: u32) -> Result<(), ApiError> {
        if request.config.skip_auth || request.bearer.is_some() {
            return Ok(());
        }
        match self.credentials.get(CredentialKey::AccessToken) {
            Ok(token) => request.bearer = token,
            // An unreadable slot is treated like an absent one
            Err(e) => warn!(error = %e, "Could not read access token, sending unauthenticated"),
        }
        Ok(())
    }
}

pub struct TraceResponses;

impl ResponseHook for TraceResponses {
    fn after_response(&self, request: &PendingRequest, status: StatusCode, attempt: u32) {
        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            attempt,
            "API response"
        );
    }
}
