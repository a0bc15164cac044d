//! Shared helpers for session integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use liveshop_core::auth::{CredentialError, CredentialKey, CredentialStore, MemoryStore};
use liveshop_core::SessionClient;
use serde_json::{json, Value};
use wiremock::{MockServer, ResponseTemplate};

pub fn user_json(id: &str) -> Value {
    json!({
        "id": id,
        "email": "a@b.com",
        "firstName": "Ada",
        "lastName": "Byron",
        "role": "user",
        "isVerified": true,
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    })
}

/// 200 response wrapping `data` in the API envelope
pub fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
}

pub fn fail(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "success": false, "message": message }))
}

pub fn auth_payload(user_id: &str, access: &str, refresh: &str) -> Value {
    json!({
        "user": user_json(user_id),
        "tokens": { "accessToken": access, "refreshToken": refresh }
    })
}

pub fn client(server: &MockServer, store: &Arc<MemoryStore>) -> SessionClient {
    let credentials: Arc<dyn CredentialStore> = Arc::clone(store) as Arc<dyn CredentialStore>;
    SessionClient::new(&server.uri(), credentials).expect("Failed to build client")
}

/// Memory store pre-filled with a persisted session
pub fn persisted(access: &str, refresh: &str, user_id: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.set(CredentialKey::AccessToken, access).unwrap();
    store.set(CredentialKey::RefreshToken, refresh).unwrap();
    store
        .set(CredentialKey::User, &user_json(user_id).to_string())
        .unwrap();
    store
}

pub fn slot(store: &MemoryStore, key: CredentialKey) -> Option<String> {
    store.get(key).unwrap()
}

pub fn assert_slots_empty(store: &MemoryStore) {
    for key in CredentialKey::ALL {
        assert_eq!(slot(store, key), None, "slot {} should be cleared", key);
    }
}

/// Credential store whose writes to the `user` slot always fail
#[derive(Default)]
pub struct UserWriteFails {
    pub inner: MemoryStore,
}

impl CredentialStore for UserWriteFails {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, CredentialError> {
        self.inner.get(key)
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), CredentialError> {
        if key == CredentialKey::User {
            return Err(std::io::Error::other("disk full").into());
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: CredentialKey) -> Result<(), CredentialError> {
        self.inner.remove(key)
    }
}
