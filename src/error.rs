// src/error.rs

//! Unified error handling for the lending client.
//!
//! Gateway failures are sorted into four kinds: no response at all
//! ([`AppError::Network`]), an expired or missing session
//! ([`AppError::Unauthorized`]), a rejected request with a server message
//! ([`AppError::Business`]) and a server-side fault ([`AppError::ServerFault`]).

use std::fmt;

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The request never produced a response
    #[error("Network failure: {0}")]
    Network(String),

    /// The gateway answered 401
    #[error("Unauthorized")]
    Unauthorized,

    /// 4xx with a server-provided message
    #[error("{message} (status {status})")]
    Business { status: u16, message: String },

    /// 5xx
    #[error("Server fault (status {status}): {message}")]
    ServerFault { status: u16, message: String },

    /// The session was torn down because the gateway rejected its token.
    /// Callers navigate to login; this is never a recoverable view error.
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// An operation that needs a session ran without one
    #[error("No active session")]
    NoSession,

    /// The session lacks the administrator role
    #[error("Administrator role required")]
    Forbidden,

    /// The same action is already waiting on the gateway
    #[error("Action already in progress: {0}")]
    InFlight(String),

    /// Only active reservations can be cancelled
    #[error("Reservation {id} is {status} and cannot be cancelled")]
    NotCancellable { id: i64, status: String },

    /// One of the dashboard's bulk fetches failed
    #[error("Dashboard data unavailable: {0}")]
    Dashboard(String),

    /// A result arrived for a view that has been torn down
    #[error("View is no longer mounted")]
    Unmounted,

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a business (4xx) error.
    pub fn business(status: u16, message: impl Into<String>) -> Self {
        Self::Business {
            status,
            message: message.into(),
        }
    }

    /// Create a server fault (5xx) error.
    pub fn server_fault(status: u16, message: impl Into<String>) -> Self {
        Self::ServerFault {
            status,
            message: message.into(),
        }
    }

    /// Create a network failure.
    pub fn network(message: impl fmt::Display) -> Self {
        Self::Network(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an in-flight rejection for the given action key.
    pub fn in_flight(key: impl Into<String>) -> Self {
        Self::InFlight(key.into())
    }

    /// True for a gateway 401.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// True when the error ends the session instead of being shown in a view.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::SessionExpired)
    }

    /// True when the initiating view can show the error and carry on.
    pub fn is_recoverable(&self) -> bool {
        !self.ends_session()
    }

    /// Message suitable for showing to the user in the initiating view.
    pub fn user_message(&self) -> String {
        match self {
            Self::Business { message, .. } => message.clone(),
            Self::Network(_) | Self::Http(_) => "Could not reach the library service".to_string(),
            Self::ServerFault { .. } => "The library service failed, try again later".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_message_is_shown_verbatim() {
        let err = AppError::business(400, "no user ID provided");
        assert_eq!(err.user_message(), "no user ID provided");
        assert!(!err.ends_session());
    }

    #[test]
    fn unauthorized_ends_session() {
        assert!(AppError::Unauthorized.ends_session());
        assert!(AppError::SessionExpired.ends_session());
        assert!(AppError::Unauthorized.is_unauthorized());
        assert!(!AppError::network("timeout").ends_session());
    }

    #[test]
    fn server_fault_hides_details() {
        let err = AppError::server_fault(503, "db down");
        assert!(!err.user_message().contains("db down"));
    }
}
