use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use keyring::Entry;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::{TokenPair, User};

/// Keychain service name for stored credentials
const SERVICE_NAME: &str = "liveshop";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Credential file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored credential is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The three independently addressable credential slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
    User,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 3] = [
        CredentialKey::AccessToken,
        CredentialKey::RefreshToken,
        CredentialKey::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::AccessToken => "accessToken",
            CredentialKey::RefreshToken => "refreshToken",
            CredentialKey::User => "user",
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable key-value storage for session credentials.
///
/// Absent slots are `Ok(None)`, never an error.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, CredentialError>;

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), CredentialError>;

    /// Remove a slot. Removing an absent slot succeeds.
    fn remove(&self, key: CredentialKey) -> Result<(), CredentialError>;

    fn get_many(&self, keys: &[CredentialKey]) -> Result<Vec<Option<String>>, CredentialError> {
        keys.iter().map(|key| self.get(*key)).collect()
    }

    /// Remove every listed slot, attempting all of them before reporting
    /// the first failure.
    fn remove_many(&self, keys: &[CredentialKey]) -> Result<(), CredentialError> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.remove(*key) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Session slot helpers
// ============================================================================

/// Write tokens and user as one logical unit. On failure the partial write
/// is rolled back so no half-written session survives.
pub fn persist_session(
    store: &dyn CredentialStore,
    tokens: &TokenPair,
    user: &User,
) -> Result<(), CredentialError> {
    let result = serde_json::to_string(user)
        .map_err(CredentialError::from)
        .and_then(|user_json| {
            store.set(CredentialKey::AccessToken, &tokens.access_token)?;
            store.set(CredentialKey::RefreshToken, &tokens.refresh_token)?;
            store.set(CredentialKey::User, &user_json)
        });

    if result.is_err() {
        if let Err(e) = clear_session(store) {
            error!(error = %e, "Failed to roll back partially persisted session");
        }
    }
    result
}

pub fn persist_tokens(store: &dyn CredentialStore, tokens: &TokenPair) -> Result<(), CredentialError> {
    store.set(CredentialKey::AccessToken, &tokens.access_token)?;
    store.set(CredentialKey::RefreshToken, &tokens.refresh_token)
}

pub fn clear_session(store: &dyn CredentialStore) -> Result<(), CredentialError> {
    debug!("Clearing persisted credentials");
    store.remove_many(&CredentialKey::ALL)
}

/// Read all three slots. Returns `None` if any slot is missing.
pub fn load_session(store: &dyn CredentialStore) -> Result<Option<(TokenPair, User)>, CredentialError> {
    let mut slots = store.get_many(&CredentialKey::ALL)?.into_iter();
    let (Some(Some(access)), Some(Some(refresh)), Some(Some(user_json))) =
        (slots.next(), slots.next(), slots.next())
    else {
        return Ok(None);
    };

    let user: User = serde_json::from_str(&user_json)?;
    Ok(Some((TokenPair::new(access, refresh), user)))
}

// ============================================================================
// OS keychain
// ============================================================================

/// Credentials stored in the OS keychain, one entry per slot
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: CredentialKey) -> Result<Entry, CredentialError> {
        Ok(Entry::new(&self.service, key.as_str())?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, CredentialError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), CredentialError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<(), CredentialError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Ephemeral store; nothing survives the process
#[derive(Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<CredentialKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).is_empty()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, CredentialError> {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        Ok(slots.get(&key).cloned())
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), CredentialError> {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<(), CredentialError> {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.remove(&key);
        Ok(())
    }
}
