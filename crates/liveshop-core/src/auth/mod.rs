//! Authentication module for session state and credential persistence.
//!
//! This module provides:
//! - `AuthStore`: login/register/logout/restore orchestration and observable state
//! - `CredentialStore`: the persisted `accessToken`/`refreshToken`/`user` slots,
//!   backed by the OS keychain (`KeyringStore`), a JSON file (`FileStore`),
//!   or memory (`MemoryStore`)
//!
//! The auth store is the only writer of persisted credentials apart from the
//! session client's token refresh.

pub mod credentials;
pub mod file_store;
pub mod store;

pub use credentials::{CredentialError, CredentialKey, CredentialStore, KeyringStore, MemoryStore};
pub use file_store::FileStore;
pub use store::{AuthState, AuthStore};
