//! Client layer for the SafeTrack incident-reporting backend.
//!
//! Four pieces, leaf first:
//!
//! | Piece | Type | Job |
//! |---|---|---|
//! | Transport | [`TransportClient`] | Sends HTTP requests with the current credential, decodes JSON, normalises failures |
//! | Resources | [`ResourceService<T>`] | Typed list/get/create/update/delete for one collection |
//! | Session | [`AuthSession`] | Sign-in, sign-out, profile refresh, durable session entries |
//! | Permissions | [`Capabilities`] | What the signed-in role may do; also scopes incident lists |
//!
//! # Typical lifecycle
//!
//! ```text
//! let config    = ClientConfig::from_env();
//! let transport = TransportClient::new(&config)?;
//! let store     = Arc::new(FileStore::new(&config.session_file));
//! let session   = AuthSession::restore(transport.clone(), store);
//! let services  = Services::new(&transport);
//!
//! if !session.is_authenticated() {
//!     session.login("ash@example.com", "correctpw").await?;
//! }
//!
//! let caps = session.capabilities();
//! if caps.can_view_own_incidents {
//!     let mine = scope_incidents(session.identity().as_ref(), services.incidents.get_all().await?);
//! }
//! ```
//!
//! The permission model is advisory only. It keeps the interface from
//! offering actions a role cannot perform; enforcing access is the server's
//! job.

pub mod config;
pub mod credential;
pub mod error;
pub mod permissions;
pub mod resource;
pub mod session;
pub mod storage;
pub mod transport;

pub use config::ClientConfig;
pub use credential::Credential;
pub use error::{AuthError, ClientError};
pub use permissions::{route_access, scope_incidents, Access, Capabilities, Capability};
pub use resource::{Deleted, ResourceService, Services};
pub use session::{AuthSession, RefreshOutcome, SessionState};
pub use storage::{FileStore, MemoryStore, SessionStore, StoreError};
pub use transport::TransportClient;
