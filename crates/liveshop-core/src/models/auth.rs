use std::fmt;

use serde::{Deserialize, Serialize};

use super::User;

/// Access/refresh token pair. Both are opaque bearer strings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens must never end up in logs
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Payload returned by the login and register endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct AuthPayload {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl fmt::Debug for RegisterData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterData")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_pair_debug_is_redacted() {
        let tokens = TokenPair::new("secret-access", "secret-refresh");
        let debug = format!("{:?}", tokens);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn test_token_pair_wire_names() {
        let tokens: TokenPair =
            serde_json::from_str(r#"{"accessToken":"t2","refreshToken":"r2"}"#).unwrap();
        assert_eq!(tokens, TokenPair::new("t2", "r2"));
    }

    #[test]
    fn test_register_data_serializes_camel_case() {
        let data = RegisterData {
            email: "a@b.com".to_string(),
            password: "secret1".to_string(),
            username: "ada".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Byron".to_string(),
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["firstName"], "Ada");
        assert_eq!(value["lastName"], "Byron");
        assert!(!format!("{:?}", data).contains("secret1"));
    }
}
