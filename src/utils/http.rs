// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::GatewayConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &GatewayConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Error body shape shared by every service: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Pull the server message out of an error body, falling back to the raw
/// text or the status reason.
pub fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .ok()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|m| !m.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

/// Sort a non-success status into the error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> AppError {
    if status == StatusCode::UNAUTHORIZED {
        AppError::Unauthorized
    } else if status.is_server_error() {
        AppError::server_fault(status.as_u16(), error_message(status, body))
    } else {
        AppError::business(status.as_u16(), error_message(status, body))
    }
}

/// Map a transport failure. Anything that never produced a response is a
/// network failure; decode problems keep their reqwest error.
pub fn classify_transport(error: reqwest::Error) -> AppError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        AppError::network(error)
    } else {
        AppError::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_json() {
        let msg = error_message(StatusCode::BAD_REQUEST, r#"{"error":"no user ID provided"}"#);
        assert_eq!(msg, "no user ID provided");
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(StatusCode::CONFLICT, "plain text"), "plain text");
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            AppError::Unauthorized
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, r#"{"error":"missing"}"#),
            AppError::Business { status: 404, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            AppError::ServerFault { status: 502, .. }
        ));
    }

    #[test]
    fn test_client_builds_from_defaults() {
        assert!(create_async_client(&GatewayConfig::default()).is_ok());
    }
}
