//! Request and response types for the SafeTrack incident-reporting API.
//!
//! This crate encodes the HTTP contract the client layer talks to as Rust
//! types. Every record the server returns is decoded into one of these
//! types and then checked with [`Entity::validate`] before it reaches a
//! caller; nothing is trusted on shape alone.
//!
//! # Endpoints covered
//!
//! | Method | Path | Type |
//! |--------|------|------|
//! | POST | `/login/{id}` | [`LoginRequest`] → [`LoginReply`] |
//! | GET, POST | `/users` | → `Vec<`[`User`]`>`, [`User`] → [`User`] |
//! | GET, PATCH, DELETE | `/users/{id}` | → [`User`] |
//! | GET, POST | `/workplaces` | → `Vec<`[`Workplace`]`>`, [`Workplace`] → [`Workplace`] |
//! | GET, PATCH, DELETE | `/workplaces/{id}` | → [`Workplace`] |
//! | GET, POST | `/incidents` | → `Vec<`[`Incident`]`>`, [`Incident`] → [`Incident`] |
//! | GET, PATCH, DELETE | `/incidents/{id}` | → [`Incident`] |
//! | GET | `/incidents/workplace/{id}` | → `Vec<`[`Incident`]`>` |

pub mod entity;
pub mod error;
pub mod incident;
pub mod login;
pub mod user;
pub mod workplace;

pub use entity::{Entity, Ref, ValidationError};
pub use error::ErrorResponse;
pub use incident::{Incident, IncidentStatus, IncidentSummary, RiskLevel};
pub use login::{LoginReply, LoginRequest};
pub use user::{Identity, Role, User};
pub use workplace::Workplace;

/// Error returned when parsing one of the API's string enums fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
