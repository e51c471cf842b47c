//! Generic typed CRUD over one collection endpoint.
//!
//! A [`ResourceService<T>`] binds a [`TransportClient`] to the collection
//! path of entity type `T` and exposes list/get/create/update/delete. Every
//! record the server returns is decoded and then passed through
//! [`Entity::validate`]; failures propagate unchanged, there is no recovery
//! at this level.
//!
//! # Update is a full replace
//!
//! [`ResourceService::update`] uses `PATCH`, but it always sends the whole
//! entity. Callers merge their change into a complete record first (usually
//! the one they fetched) and send that; a field left at its empty value in
//! the record is sent as empty and overwrites what the server holds.

use std::fmt;
use std::marker::PhantomData;

use safetrack_api::{error::messages, Entity, ErrorResponse, Incident, User, Workplace};
use serde::Deserialize;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::{error::ClientError, transport::TransportClient};

/// CRUD operations for entity type `T`.
pub struct ResourceService<T> {
    transport: TransportClient,
    path: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> ResourceService<T> {
    /// A service bound to `T::COLLECTION`.
    pub fn new(transport: TransportClient) -> Self {
        Self::with_path(transport, T::COLLECTION)
    }

    /// A service bound to a custom collection path (leading `/` included).
    pub fn with_path(transport: TransportClient, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
            _entity: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `GET {path}`
    pub async fn get_all(&self) -> Result<Vec<T>, ClientError> {
        let records: Vec<T> = self.transport.get(&self.path).await?;
        debug!(kind = T::KIND, count = records.len(), "listed records");
        validate_all(records, &self.path)
    }

    /// `GET {path}/{id}`
    pub async fn get_by_id(&self, id: &str) -> Result<T, ClientError> {
        let path = self.item_path(id);
        let record: T = self.transport.get(&path).await?;
        validated(record, &path)
    }

    /// `POST {path}`. Returns the record as the server stored it, with its
    /// assigned identifier (and anything else the server filled in).
    pub async fn create(&self, entity: &T) -> Result<T, ClientError> {
        let record: T = self.transport.post(&self.path, entity).await?;
        debug!(kind = T::KIND, id = record.id(), "created record");
        validated(record, &self.path)
    }

    /// `PATCH {path}/{id}` with the **entire** `entity`.
    ///
    /// This replaces the stored record by convention; it is not a partial
    /// update. Merge unchanged fields into `entity` before calling.
    pub async fn update(&self, id: &str, entity: &T) -> Result<T, ClientError> {
        let path = self.item_path(id);
        let record: T = self.transport.patch(&path, entity).await?;
        validated(record, &path)
    }

    /// `DELETE {path}/{id}`.
    ///
    /// The backend answers `{"message":"Deletion successful"}` rather than
    /// the removed record, and reports failures with the same shape and a
    /// `200`. Any other message is returned as [`ClientError::Server`].
    pub async fn delete(&self, id: &str) -> Result<Deleted<T>, ClientError> {
        let path = self.item_path(id);
        let reply: DeleteReply<T> = self.transport.delete(&path).await?;
        let outcome = deletion_outcome(reply, &path)?;
        debug!(kind = T::KIND, id, "deleted record");
        Ok(outcome)
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path, encode(id))
    }
}

impl ResourceService<Incident> {
    /// `GET {path}/workplace/{workplace_id}`: incidents at one workplace,
    /// newest first.
    pub async fn get_by_workplace(&self, workplace_id: &str) -> Result<Vec<Incident>, ClientError> {
        let path = format!("{}/workplace/{}", self.path, encode(workplace_id));
        let records: Vec<Incident> = self.transport.get(&path).await?;
        validate_all(records, &path)
    }
}

/// What a successful [`ResourceService::delete`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Deleted<T> {
    /// The server acknowledged the deletion with a message.
    Acknowledged(String),
    /// The server sent back the removed record.
    Record(T),
}

impl<T> Deleted<T> {
    pub fn record(&self) -> Option<&T> {
        match self {
            Deleted::Record(record) => Some(record),
            Deleted::Acknowledged(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeleteReply<T> {
    Record(T),
    Message(ErrorResponse),
}

fn deletion_outcome<T: Entity>(reply: DeleteReply<T>, path: &str) -> Result<Deleted<T>, ClientError> {
    match reply {
        DeleteReply::Record(record) => validated(record, path).map(Deleted::Record),
        DeleteReply::Message(ErrorResponse { message }) if message == messages::DELETION_SUCCESSFUL => {
            Ok(Deleted::Acknowledged(message))
        }
        DeleteReply::Message(ErrorResponse { message }) => {
            warn!(path, %message, "delete rejected");
            Err(ClientError::Server { message })
        }
    }
}

impl<T> Clone for ResourceService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            path: self.path.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ResourceService<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceService")
            .field("path", &self.path)
            .finish()
    }
}

fn validated<T: Entity>(record: T, path: &str) -> Result<T, ClientError> {
    record.validate().map_err(|source| ClientError::Invalid {
        context: path.to_string(),
        source,
    })?;
    Ok(record)
}

fn validate_all<T: Entity>(records: Vec<T>, path: &str) -> Result<Vec<T>, ClientError> {
    records.into_iter().map(|r| validated(r, path)).collect()
}

// ── Services ─────────────────────────────────────────────────────────────────

/// One service per collection, all sharing a single transport.
#[derive(Debug, Clone)]
pub struct Services {
    pub incidents: ResourceService<Incident>,
    pub workplaces: ResourceService<Workplace>,
    pub users: ResourceService<User>,
}

impl Services {
    pub fn new(transport: &TransportClient) -> Self {
        Self {
            incidents: ResourceService::new(transport.clone()),
            workplaces: ResourceService::new(transport.clone()),
            users: ResourceService::new(transport.clone()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use safetrack_api::{RiskLevel, ValidationError};

    fn services() -> Services {
        Services::new(&TransportClient::new(&ClientConfig::default()).unwrap())
    }

    #[test]
    fn services_bind_collection_paths() {
        let s = services();
        assert_eq!(s.incidents.path(), "/incidents");
        assert_eq!(s.workplaces.path(), "/workplaces");
        assert_eq!(s.users.path(), "/users");
    }

    #[test]
    fn item_path_encodes_id() {
        let s = services();
        assert_eq!(s.users.item_path("a/b c"), "/users/a%2Fb%20c");
    }

    #[test]
    fn validation_failure_names_the_path() {
        let unstored = Incident::new("t", "d", RiskLevel::Low, "u-1", "wp-1");
        match validated(unstored, "/incidents") {
            Err(ClientError::Invalid { context, source }) => {
                assert_eq!(context, "/incidents");
                assert_eq!(source, ValidationError::MissingId { kind: "incident" });
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    fn stored(id: &str) -> Incident {
        let mut incident = Incident::new("t", "d", RiskLevel::Low, "u-1", "wp-1");
        incident.id = id.into();
        incident
    }

    #[test]
    fn deletion_acknowledgement_is_success() {
        let reply: DeleteReply<Incident> =
            serde_json::from_str(r#"{"message":"Deletion successful"}"#).unwrap();
        assert_eq!(
            deletion_outcome(reply, "/incidents/i-1").unwrap(),
            Deleted::Acknowledged("Deletion successful".into())
        );
    }

    #[test]
    fn deletion_other_message_is_a_server_error() {
        let reply: DeleteReply<Incident> =
            serde_json::from_str(r#"{"message":"Cast to ObjectId failed"}"#).unwrap();
        match deletion_outcome(reply, "/incidents/x") {
            Err(ClientError::Server { message }) => assert_eq!(message, "Cast to ObjectId failed"),
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[test]
    fn deletion_returning_the_record_is_validated() {
        let json = serde_json::to_string(&stored("i-1")).unwrap();
        let reply: DeleteReply<Incident> = serde_json::from_str(&json).unwrap();
        let outcome = deletion_outcome(reply, "/incidents/i-1").unwrap();
        assert_eq!(outcome.record().map(|i| i.id.as_str()), Some("i-1"));
    }
}
