//! REST API session layer for the liveshop backend.
//!
//! This module provides the `SessionClient` for authenticated calls against
//! the liveshop API, the explicit request pipeline it runs every call
//! through, and the `ApiError` taxonomy.
//!
//! Access tokens are opaque bearer strings. Expiry is only discovered when
//! the server answers 401, at which point the client renews the token once
//! using the stored refresh token.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod pipeline;

pub use reqwest::Method;

pub use client::{SessionClient, SessionEvent};
pub use error::ApiError;
pub use pipeline::{BearerAuth, PendingRequest, RequestConfig, RequestHook, RequestPipeline, ResponseHook, TraceResponses};
