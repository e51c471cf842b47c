//! In-memory backend state shared by the fixture's handlers and by tests.
//!
//! Records are kept as raw JSON documents, the way the real document store
//! holds them, so the fixture never depends on the client's own decoding.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use safetrack_api::{Entity, Incident, User, Workplace};
use serde_json::Value;

/// One request as the fixture received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Raw `Authorization` header value, if any.
    pub authorization: Option<String>,
    /// Body parsed as JSON, when there was one.
    pub body: Option<Value>,
}

#[derive(Default)]
struct Inner {
    /// Collection name (`users`, `workplaces`, `incidents`) → id → document.
    collections: HashMap<String, BTreeMap<String, Value>>,
    /// User id → plain-text password.
    passwords: HashMap<String, String>,
    tokens: HashSet<String>,
    requests: Vec<RecordedRequest>,
    /// Path prefix → delay before the request reaches its handler.
    latencies: Vec<(String, Duration)>,
}

/// Thread-safe backend state.
#[derive(Default)]
pub struct Fixture {
    inner: RwLock<Inner>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("fixture lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("fixture lock poisoned")
    }

    // --- Seeding -------------------------------------------------------------

    /// Store `user` with a fresh id and `password`, bypassing HTTP.
    pub fn seed_user(&self, user: &User, password: &str) -> User {
        let stored = self.seed(user);
        self.write()
            .passwords
            .insert(stored.id.clone(), password.to_string());
        stored
    }

    pub fn seed_workplace(&self, workplace: &Workplace) -> Workplace {
        self.seed(workplace)
    }

    pub fn seed_incident(&self, incident: &Incident) -> Incident {
        self.seed(incident)
    }

    fn seed<T: Entity>(&self, record: &T) -> T {
        let doc = serde_json::to_value(record).expect("encode seed record");
        let stored = self.insert(collection_name::<T>(), doc);
        serde_json::from_value(stored).expect("decode seeded record")
    }

    // --- Documents -----------------------------------------------------------

    /// Store `doc` under a new id and return it with `_id` set.
    pub(crate) fn insert(&self, collection: &str, mut doc: Value) -> Value {
        let id = uuid::Uuid::now_v7().simple().to_string();
        doc["_id"] = Value::String(id.clone());
        self.write()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, doc.clone());
        doc
    }

    /// Replace the document wholesale; `None` if it does not exist.
    pub(crate) fn replace(&self, collection: &str, id: &str, mut doc: Value) -> Option<Value> {
        let mut inner = self.write();
        let slot = inner.collections.get_mut(collection)?.get_mut(id)?;
        doc["_id"] = Value::String(id.to_string());
        *slot = doc.clone();
        Some(doc)
    }

    pub(crate) fn remove(&self, collection: &str, id: &str) -> Option<Value> {
        self.write().collections.get_mut(collection)?.remove(id)
    }

    /// A stored document, as the backend holds it (no population).
    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.read().collections.get(collection)?.get(id).cloned()
    }

    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.read()
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    // --- Credentials ---------------------------------------------------------

    pub(crate) fn password_matches(&self, user_id: &str, password: &str) -> bool {
        self.read().passwords.get(user_id).map(String::as_str) == Some(password)
    }

    pub(crate) fn issue_token(&self) -> String {
        let token = format!("tok-{}", uuid::Uuid::now_v7().simple());
        self.write().tokens.insert(token.clone());
        token
    }

    pub(crate) fn token_valid(&self, token: &str) -> bool {
        self.read().tokens.contains(token)
    }

    /// Invalidate every issued token, as an expiry would.
    pub fn revoke_tokens(&self) {
        self.write().tokens.clear();
    }

    // --- Observation ---------------------------------------------------------

    pub(crate) fn record(&self, request: RecordedRequest) {
        self.write().requests.push(request);
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.read().requests.clone()
    }

    /// Hold every request whose path starts with `prefix` for `latency`
    /// before handling it. Token checks happen after the delay.
    pub fn set_latency(&self, prefix: &str, latency: Duration) {
        let mut inner = self.write();
        inner.latencies.retain(|(p, _)| p != prefix);
        inner.latencies.push((prefix.to_string(), latency));
    }

    pub(crate) fn latency(&self, path: &str) -> Duration {
        self.read()
            .latencies
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, latency)| *latency)
            .max()
            .unwrap_or_default()
    }
}

/// `"/incidents"` → `"incidents"`.
pub fn collection_name<T: Entity>() -> &'static str {
    T::COLLECTION.trim_start_matches('/')
}
