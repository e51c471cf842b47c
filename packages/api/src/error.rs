//! The backend's error-shaped response body.

use serde::{Deserialize, Serialize};

/// The JSON body the backend returns when an operation fails.
///
/// ```json
/// { "message": "Invalid token" }
/// ```
///
/// The backend is not consistent about status codes: many failures are
/// reported with `200 OK` and this body, so the client checks for it when a
/// successful response fails to decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Human-readable description of the problem.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Messages the backend is known to send.
pub mod messages {
    pub const INVALID_TOKEN: &str = "Invalid token";
    pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
    pub const USER_NOT_FOUND: &str = "Failed to find user";
    /// Success reply to every `DELETE`; the record itself is not returned.
    pub const DELETION_SUCCESSFUL: &str = "Deletion successful";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_message_body() {
        let e: ErrorResponse = serde_json::from_str(r#"{"message":"Invalid token"}"#).unwrap();
        assert_eq!(e.message, messages::INVALID_TOKEN);
    }

    #[test]
    fn extra_fields_are_ignored() {
        // The login route echoes `output` next to the message.
        let e: ErrorResponse =
            serde_json::from_str(r#"{"message":"Failed to find user","output":null}"#).unwrap();
        assert_eq!(e, ErrorResponse::new(messages::USER_NOT_FOUND));
    }
}
