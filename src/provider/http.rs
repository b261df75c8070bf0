//! Shared HTTP client construction and error mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::VoxError;

/// Build a reqwest client with a whole-request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, VoxError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .build()?)
}

/// Build default headers for a Bearer-token API.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Map a non-success status to an error, preferring the JSON `error.message`.
pub fn status_to_error(status: u16, body: &str) -> VoxError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string());
    VoxError::api(status, message)
}

/// Map a transport failure, keeping timeouts distinguishable.
pub fn request_error(error: reqwest::Error, timeout: Duration) -> VoxError {
    if error.is_timeout() {
        VoxError::Timeout(timeout.as_millis() as u64)
    } else {
        VoxError::Network(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_to_error_extracts_json_message() {
        let err = status_to_error(429, r#"{"error":{"message":"slow down"}}"#);
        assert!(matches!(&err, VoxError::Api { status: 429, message } if message == "slow down"));
        assert!(err.is_retryable());
    }

    #[test]
    fn status_to_error_keeps_plain_body() {
        let err = status_to_error(401, "unauthorized");
        assert!(matches!(&err, VoxError::Api { status: 401, message } if message == "unauthorized"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn bearer_headers_set_authorization() {
        let headers = bearer_headers("sk-test");
        assert_eq!(
            headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer sk-test")
        );
    }
}
