//! Error types for the client layer.
//!
//! The transport and resource layers never swallow a failure; everything
//! they hit comes back as a [`ClientError`]. The session converts exactly
//! one case, a `403` during a profile refresh, into a forced sign-out.

use reqwest::StatusCode;
use safetrack_api::ValidationError;
use thiserror::Error;

use crate::storage::StoreError;

/// Failures of the sign-in flow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No account has the given email, or the server does not know the id.
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The server refused the login for a reason it described itself.
    #[error("login rejected: {0}")]
    Rejected(String),
}

/// Everything a client call can fail with.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status. Never retried.
    #[error("API error: {status} {status_text}")]
    Transport { status: u16, status_text: String },

    /// The request never produced a response: connection failure, timeout,
    /// or a body that could not be read.
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// A success response whose body is not the JSON the caller expected.
    #[error("failed to decode response for {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A decoded record failed [`safetrack_api::Entity::validate`].
    #[error("invalid record in response for {context}: {source}")]
    Invalid {
        context: String,
        #[source]
        source: ValidationError,
    },

    /// A success status carrying the backend's `{ "message": … }` error body.
    #[error("server reported an error: {message}")]
    Server { message: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The stored token cannot be used as an `Authorization` header value.
    #[error("credential contains characters not allowed in a header")]
    InvalidCredential,

    /// Persisting session entries failed.
    #[error("session storage failed: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    /// HTTP status of a [`ClientError::Transport`] failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server refused the credential the request carried.
    pub fn is_stale_credential(&self) -> bool {
        self.status() == Some(StatusCode::FORBIDDEN.as_u16())
    }

    pub(crate) fn transport(status: StatusCode) -> Self {
        ClientError::Transport {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_display_matches_status_line() {
        let e = ClientError::transport(StatusCode::FORBIDDEN);
        assert_eq!(e.to_string(), "API error: 403 Forbidden");
        assert!(e.is_stale_credential());
    }

    #[test]
    fn other_statuses_are_not_stale() {
        assert!(!ClientError::transport(StatusCode::NOT_FOUND).is_stale_credential());
        assert!(!ClientError::Auth(AuthError::InvalidCredentials).is_stale_credential());
    }

    #[test]
    fn auth_messages() {
        assert_eq!(AuthError::UserNotFound.to_string(), "User not found");
        assert_eq!(
            ClientError::from(AuthError::InvalidCredentials).to_string(),
            "Invalid credentials"
        );
    }
}
