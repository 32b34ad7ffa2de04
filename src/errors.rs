#[cfg(feature = "server")]
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Unsupported TLD: {0}")]
    TldNotSupported(String),

    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    #[error("Connection refused by {0}")]
    ConnectionRefused(String),

    #[error("DNS resolution failed for {0}")]
    DnsFailure(String),

    #[error("Connection error: {0}")]
    ConnectionFailed(String),

    #[error("Network timeout: {0}")]
    Timeout(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{message}")]
    Query {
        message: String,
        manual_check_url: Option<String>,
    },

    #[error("Lookup cancelled")]
    Cancelled,

    #[error("Lookup deadline exceeded")]
    DeadlineExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire-level error codes exposed to callers of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidDomain,
    TldNotSupported,
    DomainNotFound,
    QueryError,
    NetworkError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidDomain => "INVALID_DOMAIN",
            ErrorCode::TldNotSupported => "TLD_NOT_SUPPORTED",
            ErrorCode::DomainNotFound => "DOMAIN_NOT_FOUND",
            ErrorCode::QueryError => "QUERY_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
        }
    }
}

/// Serialized failure shape: `{ code, message, details? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_check_url: Option<String>,
}

impl ResolveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ResolveError::InvalidDomain(_) => ErrorCode::InvalidDomain,
            ResolveError::TldNotSupported(_) => ErrorCode::TldNotSupported,
            ResolveError::DomainNotFound(_) => ErrorCode::DomainNotFound,
            ResolveError::EmptyResponse(_)
            | ResolveError::Protocol(_)
            | ResolveError::Query { .. }
            | ResolveError::Internal(_) => ErrorCode::QueryError,
            ResolveError::ConnectionRefused(_)
            | ResolveError::DnsFailure(_)
            | ResolveError::ConnectionFailed(_)
            | ResolveError::Timeout(_)
            | ResolveError::Cancelled
            | ResolveError::DeadlineExceeded => ErrorCode::NetworkError,
        }
    }

    /// Errors raised before any data was exchanged with the server.
    /// Trying another query syntax against the same host is pointless after one of these.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ResolveError::ConnectionRefused(_)
                | ResolveError::DnsFailure(_)
                | ResolveError::ConnectionFailed(_)
                | ResolveError::Timeout(_)
        )
    }

    /// Cancellation and deadline expiry stop the whole fallback chain.
    pub fn is_interruption(&self) -> bool {
        matches!(self, ResolveError::Cancelled | ResolveError::DeadlineExceeded)
    }

    /// Message safe to show end users: no hostnames, no internals.
    pub fn public_message(&self) -> String {
        match self {
            ResolveError::InvalidDomain(_) => "Invalid domain format".to_string(),
            ResolveError::TldNotSupported(_) => {
                "TLD not supported or not found in RDAP bootstrap registry".to_string()
            }
            ResolveError::DomainNotFound(_) => "Domain not found in registry".to_string(),
            ResolveError::ConnectionRefused(_)
            | ResolveError::DnsFailure(_)
            | ResolveError::ConnectionFailed(_) => {
                "Registry server could not be reached".to_string()
            }
            ResolveError::Timeout(_) => "Registry query timed out".to_string(),
            ResolveError::EmptyResponse(_) | ResolveError::Protocol(_) => {
                "Registry returned an unusable response".to_string()
            }
            ResolveError::Query { message, .. } => message.clone(),
            ResolveError::Cancelled => "Lookup was cancelled".to_string(),
            ResolveError::DeadlineExceeded => "Lookup deadline exceeded".to_string(),
            ResolveError::Internal(_) => "An unexpected error occurred".to_string(),
        }
    }

    /// Builds the wire body. `include_details` must only be set in development builds.
    pub fn to_body(&self, include_details: bool) -> ErrorBody {
        let manual_check_url = match self {
            ResolveError::Query {
                manual_check_url, ..
            } => manual_check_url.clone(),
            _ => None,
        };

        ErrorBody {
            code: self.code(),
            message: self.public_message(),
            details: include_details.then(|| self.to_string()),
            manual_check_url,
        }
    }

    #[cfg(feature = "server")]
    pub fn status_code(&self) -> StatusCode {
        match self.code() {
            ErrorCode::InvalidDomain | ErrorCode::TldNotSupported => StatusCode::BAD_REQUEST,
            ErrorCode::DomainNotFound => StatusCode::NOT_FOUND,
            ErrorCode::QueryError | ErrorCode::NetworkError => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<tokio::time::error::Elapsed> for ResolveError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ResolveError::Timeout("operation timed out".to_string())
    }
}
