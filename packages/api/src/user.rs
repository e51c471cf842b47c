//! User records (`/users`) and the signed-in [`Identity`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::{require_field, require_id, Entity, Ref, ValidationError};
use crate::{ParseEnumError, Workplace};

/// The two roles the application knows about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Files incidents and sees their own reports.
    User,
    /// Triages incidents across the workplace.
    Foreman,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Foreman => f.write_str("foreman"),
        }
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "foreman" => Ok(Role::Foreman),
            other => Err(ParseEnumError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// A user account as the server returns it (the password hash is never
/// included).
///
/// # Example
///
/// ```json
/// {
///   "_id": "684e5ced8fe1c860d4b53d1a",
///   "name": "Ash",
///   "email": "ash@example.com",
///   "role": "user",
///   "workplaceId": "684e5bfc8fe1c860d4b53d0f"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    pub name: String,

    pub email: String,

    pub role: Role,

    /// The workplace this user belongs to; populated on some routes.
    #[serde(rename = "workplaceId")]
    pub workplace: Ref<Workplace>,
}

/// The signed-in user's profile as cached by the session.
///
/// Always a complete snapshot: a refresh replaces it, it is never patched
/// field by field.
pub type Identity = User;

impl User {
    pub fn is_foreman(&self) -> bool {
        self.role == Role::Foreman
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "/users";
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_id(Self::KIND, &self.id)?;
        require_field(Self::KIND, "email", &self.email)?;
        self.workplace.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ash_json() -> &'static str {
        r#"{
            "_id": "u-1",
            "name": "Ash",
            "email": "ash@example.com",
            "role": "user",
            "workplaceId": "wp-1",
            "__v": 0
        }"#
    }

    #[test]
    fn decodes_user() {
        let u: User = serde_json::from_str(ash_json()).unwrap();
        assert_eq!(u.id, "u-1");
        assert_eq!(u.role, Role::User);
        assert_eq!(u.workplace.id(), "wp-1");
        assert!(u.validate().is_ok());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let json = ash_json().replace("\"user\"", "\"admin\"");
        assert!(serde_json::from_str::<User>(&json).is_err());
    }

    #[test]
    fn role_parses_and_displays() {
        assert_eq!("foreman".parse::<Role>().unwrap(), Role::Foreman);
        assert_eq!(Role::User.to_string(), "user");
        assert!("Foreman".parse::<Role>().is_err());
    }

    #[test]
    fn blank_email_is_invalid() {
        let mut u: User = serde_json::from_str(ash_json()).unwrap();
        u.email = String::new();
        assert!(matches!(
            u.validate(),
            Err(ValidationError::EmptyField { field: "email", .. })
        ));
    }
}
