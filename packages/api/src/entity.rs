//! The decode-and-validate contract shared by every resource record.
//!
//! Decoding a response into a Rust type already rejects payloads of the
//! wrong shape. [`Entity::validate`] then checks the things serde cannot
//! express, such as a stored record carrying an empty identifier.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A record decoded from the server failed validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{kind} has no identifier")]
    MissingId { kind: &'static str },

    #[error("{kind} field '{field}' must not be empty")]
    EmptyField {
        kind: &'static str,
        field: &'static str,
    },
}

/// A record stored in one of the server's collections.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection path, with a leading `/` (e.g. `"/incidents"`).
    const COLLECTION: &'static str;

    /// Lower-case name used in error messages and logs.
    const KIND: &'static str;

    /// The server-assigned identifier. Empty until the record is created.
    fn id(&self) -> &str;

    /// Check a record returned by the server.
    ///
    /// The default only requires an identifier; implementors that override
    /// this should call [`require_id`] themselves.
    fn validate(&self) -> Result<(), ValidationError> {
        require_id(Self::KIND, self.id())
    }
}

/// Fails with [`ValidationError::MissingId`] when `id` is blank.
pub fn require_id(kind: &'static str, id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::MissingId { kind });
    }
    Ok(())
}

/// Fails with [`ValidationError::EmptyField`] when `value` is blank.
pub fn require_field(
    kind: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { kind, field });
    }
    Ok(())
}

// ── Ref ──────────────────────────────────────────────────────────────────────

/// A foreign key that the server may or may not have expanded.
///
/// Listing and fetch routes populate `reportedBy` and `workplaceId` with the
/// full referenced record, while create and update payloads carry the bare
/// identifier. `Ref` decodes either form and always serializes as the
/// identifier, so a fetched record can be sent straight back in an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Ref<T> {
    Id(String),
    Populated(Box<T>),
}

impl<T: Entity> Ref<T> {
    /// The referenced record's identifier, whichever form was received.
    pub fn id(&self) -> &str {
        match self {
            Ref::Id(id) => id,
            Ref::Populated(record) => record.id(),
        }
    }

    /// The populated record, when the server expanded it.
    pub fn record(&self) -> Option<&T> {
        match self {
            Ref::Id(_) => None,
            Ref::Populated(record) => Some(record),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Ref::Id(id) => require_id(T::KIND, id),
            Ref::Populated(record) => record.validate(),
        }
    }
}

impl<T> From<String> for Ref<T> {
    fn from(id: String) -> Self {
        Ref::Id(id)
    }
}

impl<T> From<&str> for Ref<T> {
    fn from(id: &str) -> Self {
        Ref::Id(id.to_string())
    }
}

impl<T: Entity> Serialize for Ref<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Ref<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire<R> {
            Id(String),
            Populated(Box<R>),
        }

        Ok(match Wire::<T>::deserialize(deserializer)? {
            Wire::Id(id) => Ref::Id(id),
            Wire::Populated(record) => Ref::Populated(record),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Workplace;

    #[derive(Debug, Deserialize, Serialize)]
    struct Holder {
        #[serde(rename = "workplaceId")]
        workplace: Ref<Workplace>,
    }

    #[test]
    fn ref_decodes_bare_id() {
        let h: Holder = serde_json::from_str(r#"{"workplaceId":"wp-1"}"#).unwrap();
        assert_eq!(h.workplace.id(), "wp-1");
        assert!(h.workplace.record().is_none());
    }

    #[test]
    fn ref_decodes_populated_record() {
        let json = r#"{"workplaceId":{"_id":"wp-1","name":"Site A","location":"Dock 4"}}"#;
        let h: Holder = serde_json::from_str(json).unwrap();
        assert_eq!(h.workplace.id(), "wp-1");
        assert_eq!(h.workplace.record().unwrap().name, "Site A");
    }

    #[test]
    fn populated_ref_serializes_as_id() {
        let json = r#"{"workplaceId":{"_id":"wp-1","name":"Site A","location":"Dock 4"}}"#;
        let h: Holder = serde_json::from_str(json).unwrap();
        assert_eq!(serde_json::to_string(&h).unwrap(), r#"{"workplaceId":"wp-1"}"#);
    }

    #[test]
    fn ref_rejects_numbers() {
        assert!(serde_json::from_str::<Holder>(r#"{"workplaceId":42}"#).is_err());
    }

    #[test]
    fn empty_ref_fails_validation() {
        let r: Ref<Workplace> = Ref::from("");
        assert_eq!(
            r.validate(),
            Err(ValidationError::MissingId { kind: "workplace" })
        );
    }
}
