//! Login exchange: `POST /login/{id}`.

use serde::{Deserialize, Serialize};

use crate::ErrorResponse;

/// Request body for `POST /login/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub password: String,
}

/// What `POST /login/{id}` answers with.
///
/// On success the body is the bare token as a JSON string, not wrapped in an
/// object. On failure it is an [`ErrorResponse`], still with `200 OK`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum LoginReply {
    Token(String),
    Rejected(ErrorResponse),
}
