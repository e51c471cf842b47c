//! Axum router imitating the SafeTrack backend's HTTP surface.
//!
//! Behaviour follows the production backend where the client depends on it:
//! login always answers `200` (a bare token string or `{message}`), a fetch
//! of an unknown id answers `null`, a delete answers
//! `{"message":"Deletion successful"}`, and incident reads populate
//! `reportedBy`/`workplaceId`. Two things are stricter on purpose: every
//! route except login and the user listing demands an issued token
//! (`403 {"message":"Invalid token"}` otherwise), and `PATCH` replaces the
//! stored document with the body instead of merging into it.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use safetrack_api::{error::messages, ErrorResponse, LoginReply, LoginRequest};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::fixture::{Fixture, RecordedRequest};

type AppState = Arc<Fixture>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A handler failure; converts to the backend's `{message}` body.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the fixture router over `fixture`.
pub fn build_router(fixture: Arc<Fixture>) -> Router {
    Router::new()
        .route("/login/{id}", post(login))
        .merge(collection_routes("users", Access::OpenListing))
        .merge(collection_routes("workplaces", Access::Token))
        .merge(collection_routes("incidents", Access::Token))
        .route("/incidents/workplace/{id}", get(incidents_by_workplace))
        .layer(middleware::from_fn_with_state(Arc::clone(&fixture), record))
        .layer(TraceLayer::new_for_http())
        .with_state(fixture)
}

#[derive(Clone, Copy, PartialEq)]
enum Access {
    /// `GET /{collection}` works without a token; the sign-in flow needs it.
    OpenListing,
    Token,
}

fn collection_routes(name: &'static str, access: Access) -> Router<AppState> {
    Router::new()
        .route(
            &format!("/{name}"),
            get(move |State(fx): State<AppState>, headers: HeaderMap| async move {
                if access == Access::Token {
                    authorize(&fx, &headers)?;
                }
                list(&fx, name)
            })
            .post(
                move |State(fx): State<AppState>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    authorize(&fx, &headers)?;
                    create(&fx, name, body)
                },
            ),
        )
        .route(
            &format!("/{name}/{{id}}"),
            get(
                move |State(fx): State<AppState>, headers: HeaderMap, Path(id): Path<String>| async move {
                    authorize(&fx, &headers)?;
                    let doc = fx.document(name, &id).map(|d| populate(&fx, name, d));
                    Ok::<_, AppError>(Json(doc.unwrap_or(Value::Null)))
                },
            )
            .patch(
                move |State(fx): State<AppState>,
                      headers: HeaderMap,
                      Path(id): Path<String>,
                      Json(body): Json<Value>| async move {
                    authorize(&fx, &headers)?;
                    if !body.is_object() {
                        return Err(AppError::BadRequest("body must be a JSON object".into()));
                    }
                    fx.replace(name, &id, body)
                        .map(Json)
                        .ok_or_else(|| AppError::NotFound(format!("{name} {id} not found")))
                },
            )
            .delete(
                move |State(fx): State<AppState>, headers: HeaderMap, Path(id): Path<String>| async move {
                    authorize(&fx, &headers)?;
                    Ok::<_, AppError>(Json(delete(&fx, name, &id)))
                },
            ),
        )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /login/{id}`
async fn login(
    State(fx): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LoginRequest>,
) -> Json<LoginReply> {
    if fx.document("users", &id).is_none() {
        return Json(LoginReply::Rejected(ErrorResponse::new(messages::USER_NOT_FOUND)));
    }
    if !fx.password_matches(&id, &req.password) {
        return Json(LoginReply::Rejected(ErrorResponse::new(
            messages::INVALID_CREDENTIALS,
        )));
    }
    Json(LoginReply::Token(fx.issue_token()))
}

fn list(fx: &Fixture, name: &str) -> Result<Json<Vec<Value>>, AppError> {
    let docs = fx
        .documents(name)
        .into_iter()
        .map(|d| populate(fx, name, d))
        .collect();
    Ok(Json(docs))
}

fn create(fx: &Fixture, name: &str, mut body: Value) -> Result<Json<Value>, AppError> {
    let Some(fields) = body.as_object_mut() else {
        return Err(AppError::BadRequest("body must be a JSON object".into()));
    };
    fields.remove("_id");
    if name == "incidents" {
        if fields.get("createdAt").map_or(true, Value::is_null) {
            let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
            fields.insert("createdAt".into(), Value::String(now));
        }
        if fields.get("status").and_then(Value::as_str).map_or(true, str::is_empty) {
            fields.insert("status".into(), Value::String("Open".into()));
        }
    }
    Ok(Json(fx.insert(name, body)))
}

/// Answers `200` with a `{message}` either way, as the backend does: an
/// unknown id is still "successful", a malformed one is a cast failure.
fn delete(fx: &Fixture, name: &str, id: &str) -> ErrorResponse {
    if !is_document_id(id) {
        return ErrorResponse::new(format!(
            "Cast to ObjectId failed for value \"{id}\" (type string) at path \"_id\""
        ));
    }
    fx.remove(name, id);
    ErrorResponse::new(messages::DELETION_SUCCESSFUL)
}

/// `GET /incidents/workplace/{id}`, newest first.
async fn incidents_by_workplace(
    State(fx): State<AppState>,
    headers: HeaderMap,
    Path(workplace_id): Path<String>,
) -> Result<Json<Vec<Value>>, AppError> {
    authorize(&fx, &headers)?;
    let mut docs: Vec<Value> = fx
        .documents("incidents")
        .into_iter()
        .filter(|d| d["workplaceId"].as_str() == Some(workplace_id.as_str()))
        .collect();
    docs.sort_by(|a, b| b["createdAt"].as_str().cmp(&a["createdAt"].as_str()));
    Ok(Json(
        docs.into_iter()
            .map(|d| populate(&fx, "incidents", d))
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn authorize(fx: &Fixture, headers: &HeaderMap) -> Result<(), AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if fx.token_valid(token) {
        Ok(())
    } else {
        Err(AppError::Forbidden(messages::INVALID_TOKEN.into()))
    }
}

/// Ids the fixture hands out are 32 lowercase hex digits.
fn is_document_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Expand incident foreign keys into the referenced documents.
fn populate(fx: &Fixture, name: &str, mut doc: Value) -> Value {
    if name != "incidents" {
        return doc;
    }
    for (field, collection) in [("reportedBy", "users"), ("workplaceId", "workplaces")] {
        let referenced = doc[field]
            .as_str()
            .and_then(|id| fx.document(collection, id));
        if let Some(referenced) = referenced {
            doc[field] = referenced;
        }
    }
    doc
}

/// Record every request, then hold it for any configured latency.
async fn record(State(fx): State<AppState>, req: Request, next: Next) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| AppError::BadRequest(format!("unreadable body: {e}")))?;

    fx.record(RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        authorization: parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&bytes).ok(),
    });

    let latency = fx.latency(parts.uri.path());
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
