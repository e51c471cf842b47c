//! Workplace records (`/workplaces`).

use serde::{Deserialize, Serialize};

use crate::entity::{require_field, require_id, Entity, ValidationError};

/// A site incidents are reported against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workplace {
    /// Server-assigned identifier; omitted from create payloads.
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    pub name: String,

    pub location: String,
}

impl Workplace {
    /// A workplace that has not been stored yet.
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            location: location.into(),
        }
    }
}

impl Entity for Workplace {
    const COLLECTION: &'static str = "/workplaces";
    const KIND: &'static str = "workplace";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_id(Self::KIND, &self.id)?;
        require_field(Self::KIND, "name", &self.name)
    }
}
