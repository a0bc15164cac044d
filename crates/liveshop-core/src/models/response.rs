use serde::Deserialize;

use crate::api::ApiError;

/// Fallback message when the server gives no reason for a failure
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Envelope wrapping every API response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

fn default_success() -> bool {
    true
}

impl<T> ApiResponse<T> {
    /// Server-supplied reason, preferring `message` over `error`
    pub fn reason(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .filter(|m| !m.trim().is_empty())
    }

    /// Unwrap `data`, turning `success: false` into a server error
    pub fn into_data(self, status: u16) -> Result<T, ApiError> {
        if !self.success {
            let message = self.reason().unwrap_or(GENERIC_ERROR_MESSAGE).to_string();
            return Err(ApiError::Server { status, message });
        }
        self.data
            .ok_or_else(|| ApiError::InvalidResponse("Response envelope has no data".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_data_success() {
        let resp: ApiResponse<u32> = serde_json::from_str(r#"{"success":true,"data":7}"#).unwrap();
        assert_eq!(resp.into_data(200).unwrap(), 7);
    }

    #[test]
    fn test_into_data_unsuccessful_uses_message() {
        let resp: ApiResponse<u32> =
            serde_json::from_str(r#"{"success":false,"message":"Out of stock"}"#).unwrap();
        match resp.into_data(200) {
            Err(ApiError::Server { status, message }) => {
                assert_eq!(status, 200);
                assert_eq!(message, "Out of stock");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_reason_falls_back_to_error_field() {
        let resp: ApiResponse<u32> =
            serde_json::from_str(r#"{"success":false,"error":"bad_request","message":""}"#).unwrap();
        assert_eq!(resp.reason(), Some("bad_request"));
    }

    #[test]
    fn test_missing_data_is_invalid_response() {
        let resp: ApiResponse<u32> = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(matches!(resp.into_data(200), Err(ApiError::InvalidResponse(_))));
    }
}
