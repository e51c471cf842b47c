//! Transport client, the one place HTTP requests are made.
//!
//! [`TransportClient`] holds the base address and the current bearer
//! credential. It builds the full URL, attaches the credential, sends the
//! request once, and turns the response into either a typed value or a
//! [`ClientError`]. It does not check whether anyone is signed in: the
//! sentinel credential is sent like any other, and gating is up to callers.
//!
//! Clones are cheap and share the credential, so every
//! [`ResourceService`](crate::ResourceService) sees the session's sign-in
//! and sign-out. A request reads the credential when it is built; one that
//! is already in flight when the session signs out still carries the old
//! token.

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{
    header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use safetrack_api::{error::messages, ErrorResponse, LoginReply, LoginRequest};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};
use urlencoding::encode;

use crate::{
    config::ClientConfig,
    credential::Credential,
    error::{AuthError, ClientError},
};

/// Low-level HTTP executor shared by every resource service.
#[derive(Clone)]
pub struct TransportClient {
    http: reqwest::Client,
    base: Arc<str>,
    credential: Arc<RwLock<Credential>>,
}

impl TransportClient {
    /// Build a client for `config.api_base`, bounded by `config.timeout`.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;
        Ok(Self::with_http_client(http, &config.api_base))
    }

    /// Wrap an already-configured `reqwest::Client`.
    pub fn with_http_client(http: reqwest::Client, api_base: &str) -> Self {
        Self {
            http,
            base: Arc::from(api_base.trim_end_matches('/')),
            credential: Arc::new(RwLock::new(Credential::none())),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// The credential the next request will carry.
    pub fn credential(&self) -> Credential {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Only the session's transitions call this.
    pub(crate) fn set_credential(&self, credential: Credential) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credential;
    }

    /// `{base}{path}`. The caller supplies the leading `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    // ── Requests ─────────────────────────────────────────────────────────────

    /// Send one request and decode the JSON response as `T`.
    ///
    /// A non-success status fails with [`ClientError::Transport`]. A success
    /// body that is not a `T` fails with [`ClientError::Server`] when it is
    /// the backend's `{ "message": … }` shape and [`ClientError::Decode`]
    /// otherwise.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let credential = self.credential();
        let authorization =
            HeaderValue::from_str(credential.as_str()).map_err(|_| ClientError::InvalidCredential)?;

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(%method, %url, "sending request");
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%method, %url, status = status.as_u16(), "request failed");
            return Err(ClientError::transport(status));
        }

        let bytes = response.bytes().await?;
        decode_body(&bytes, &format!("{method} {path}"))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request::<T, ()>(Method::DELETE, path, None).await
    }

    // ── Login ────────────────────────────────────────────────────────────────

    /// `POST /login/{id}` with `{ "password": … }`.
    ///
    /// Returns the issued token without installing it; the caller,
    /// [`AuthSession::login`](crate::AuthSession::login), decides whether it
    /// becomes this client's credential.
    pub(crate) async fn login(&self, id: &str, password: &str) -> Result<Credential, ClientError> {
        let path = format!("/login/{}", encode(id));
        let request = LoginRequest {
            password: password.to_string(),
        };

        match self.post::<LoginReply, _>(&path, &request).await? {
            LoginReply::Token(token) => {
                let credential = Credential::new(token);
                if !credential.is_present() {
                    warn!(user_id = id, "login returned an empty token");
                    return Err(AuthError::InvalidCredentials.into());
                }
                info!(user_id = id, "credential issued");
                Ok(credential)
            }
            LoginReply::Rejected(ErrorResponse { message }) => {
                warn!(user_id = id, %message, "login rejected");
                Err(match message.as_str() {
                    messages::INVALID_CREDENTIALS => AuthError::InvalidCredentials,
                    messages::USER_NOT_FOUND => AuthError::UserNotFound,
                    _ => AuthError::Rejected(message),
                }
                .into())
            }
        }
    }
}

impl std::fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportClient")
            .field("base", &self.base)
            .field("credential", &self.credential())
            .finish()
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Decode a success body, telling the backend's error shape apart from a
/// plain mismatch.
fn decode_body<T: DeserializeOwned>(bytes: &[u8], context: &str) -> Result<T, ClientError> {
    serde_json::from_slice(bytes).map_err(|source| {
        if let Ok(ErrorResponse { message }) = serde_json::from_slice::<ErrorResponse>(bytes) {
            warn!(context, %message, "server returned an error body");
            return ClientError::Server { message };
        }
        warn!(context, error = %source, "failed to decode response body");
        ClientError::Decode {
            context: context.to_string(),
            source,
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        id: i32,
        name: String,
    }

    fn client() -> TransportClient {
        TransportClient::new(&ClientConfig::new("http://localhost:3000/")).unwrap()
    }

    #[test]
    fn url_concatenates_base_and_path() {
        assert_eq!(client().url("/incidents/abc"), "http://localhost:3000/incidents/abc");
    }

    #[test]
    fn starts_signed_out_and_clones_share_credential() {
        let a = client();
        let b = a.clone();
        assert_eq!(a.credential(), Credential::none());

        a.set_credential(Credential::new("tok"));
        assert_eq!(b.credential().as_str(), "tok");
    }

    #[test]
    fn decode_success() {
        let sample: Sample = decode_body(br#"{"id": 1, "name": "Test"}"#, "test").unwrap();
        assert_eq!(sample, Sample { id: 1, name: "Test".into() });
    }

    #[test]
    fn decode_invalid_json() {
        let err = decode_body::<Sample>(br#"{id: 1, name: "Test"}"#, "test").unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[test]
    fn decode_error_shaped_body() {
        let err = decode_body::<Sample>(br#"{"message":"Cast to ObjectId failed"}"#, "test").unwrap_err();
        match err {
            ClientError::Server { message } => assert_eq!(message, "Cast to ObjectId failed"),
            e => panic!("wrong error type: {e:?}"),
        }
    }

    #[test]
    fn decode_null_is_a_decode_error() {
        // A lookup of a missing id answers `null` with 200.
        let err = decode_body::<Sample>(b"null", "test").unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        // Port 9 (discard) is essentially never listening on loopback.
        let t = TransportClient::new(
            &ClientConfig::new("http://127.0.0.1:9").with_timeout(std::time::Duration::from_secs(2)),
        )
        .unwrap();
        let err = t.get::<Sample>("/sample").await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn unusable_credential_is_rejected_before_sending() {
        let t = client();
        t.set_credential(Credential::new("bad\ntoken"));
        let err = t.get::<Sample>("/sample").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidCredential));
    }
}
