//! liveshop-core - API session client, auth store and credential storage
//! for the liveshop shopping and live-streaming app.
//!
//! A typical caller builds one [`SessionClient`] and one [`AuthStore`] at
//! startup and passes the store to everything that needs the session:
//!
//! ```no_run
//! use std::sync::Arc;
//! use liveshop_core::{AuthStore, Config, SessionClient};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?.with_env();
//! let api = SessionClient::from_config(&config, config.credential_store()?)?;
//! let store = Arc::new(AuthStore::new(api));
//! let _listener = store.spawn_session_listener();
//!
//! store.load_user().await;
//! if !store.is_authenticated() {
//!     store.login("a@b.com", "secret1").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiError, Method, RequestConfig, SessionClient, SessionEvent};
pub use auth::{AuthState, AuthStore, CredentialKey, CredentialStore};
pub use config::Config;
pub use models::{RegisterData, TokenPair, User};
