//! Shared helpers for the SafeTrack end-to-end test suite.
//!
//! [`spawn_server`] binds a `TcpListener` on an ephemeral port, serves an
//! in-process imitation of the SafeTrack backend from it, and returns the
//! base URL along with the [`Fixture`] behind it. Tests seed accounts
//! through the fixture and inspect what the client actually sent.

pub mod fixture;
pub mod routes;

use std::sync::Arc;

pub use fixture::{collection_name, Fixture, RecordedRequest};
pub use routes::build_router;

/// Start an ephemeral in-process backend and return `(base_url, fixture)`.
///
/// The server runs in a background `tokio` task bound to an OS-assigned
/// port on `127.0.0.1`; the returned URL looks like `http://127.0.0.1:51234`.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound or the server fails to start.
pub async fn spawn_server() -> (String, Arc<Fixture>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}");

    let fixture = Arc::new(Fixture::new());
    let router = build_router(Arc::clone(&fixture));

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("fixture server error");
    });

    tracing::debug!(%base_url, "fixture server listening");
    (base_url, fixture)
}
