//! Marketplace host endpoints.
//!
//! Thin axum layer over [`EmbedFlow`]: the page that renders the iframe asks
//! for its URL, and the page's message listener forwards what the iframe
//! posts.
//!
//! The user is whoever the bearer token names (see [`crate::auth`]), so this
//! router must be mounted behind the host's identity layer.

use crate::auth::extract_bearer_token;
use crate::embed::messages::{ACCESS_TOKEN_REPLY, INTEGRATION_CREATED};
use crate::error::Error;
use crate::flow::{EmbedFlow, MessageOutcome};
use crate::oauth::TokenPair;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<EmbedFlow>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedPageResponse {
    pub iframe_url: String,
    pub connection_id: i64,
}

/// Tokens handed back to the iframe
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: Option<String>,
    pub encrypted_access_token: Option<String>,
}

impl From<TokenPair> for AccessTokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            encrypted_access_token: pair.encrypted_access_token,
        }
    }
}

/// Message for the host page to post into the iframe or display
#[derive(Serialize)]
pub struct MessageReply {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Value,
}

#[derive(Deserialize)]
pub struct ClientAuthenticatedQuery {
    #[serde(rename = "authorizationCode")]
    pub authorization_code: String,
}

/// Browser `message` event as forwarded by the host page
#[derive(Deserialize)]
pub struct ForwardedMessage {
    /// `event.origin` of the posted message
    pub origin: String,
    /// `event.data`
    pub message: Value,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create marketplace router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/marketplace", get(embed_page))
        .route(
            "/api/marketplace/client-authenticated",
            get(client_authenticated),
        )
        .route("/api/marketplace/access-token", get(access_token))
        .route("/api/marketplace/messages", post(message))
        .with_state(Arc::new(state))
}

fn current_user(headers: &HeaderMap) -> Result<String, AppError> {
    extract_bearer_token(headers).map_err(|e| AppError::Unauthorized(e.to_string()))
}

/// GET /api/marketplace - iframe URL for the current user
async fn embed_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<EmbedPageResponse>, AppError> {
    let user_id = current_user(&headers)?;
    let page = state.flow.prepare(&user_id).await?;

    Ok(Json(EmbedPageResponse {
        iframe_url: page.iframe_url,
        connection_id: page.connection_id,
    }))
}

/// GET /api/marketplace/client-authenticated?authorizationCode=..
async fn client_authenticated(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ClientAuthenticatedQuery>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let user_id = current_user(&headers)?;
    if query.authorization_code.trim().is_empty() {
        return Err(AppError::BadRequest(
            "authorizationCode must not be empty".to_string(),
        ));
    }

    let pair = state
        .flow
        .client_authenticated(&user_id, &query.authorization_code)
        .await?;
    Ok(Json(pair.into()))
}

/// GET /api/marketplace/access-token - refresh with the stored refresh token
async fn access_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let user_id = current_user(&headers)?;
    let pair = state.flow.refresh_access_token(&user_id).await?;
    Ok(Json(pair.into()))
}

/// POST /api/marketplace/messages - a `message` event forwarded by the host page
///
/// The page's listener posts `{"origin": event.origin, "message": event.data}`.
/// The request's own `Origin` header is the host page, never the iframe, so
/// the event origin travels in the body. `message` may be the raw JSON string
/// or the already-parsed object. Discarded messages answer 204.
async fn message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(forwarded): Json<ForwardedMessage>,
) -> Result<Response, AppError> {
    let user_id = current_user(&headers)?;
    let raw = match forwarded.message {
        Value::String(raw) => raw,
        other => other.to_string(),
    };

    let reply = match state
        .flow
        .handle_message(&user_id, &forwarded.origin, &raw)
        .await?
    {
        None => {
            debug!(user_id = %user_id, "Forwarded message discarded");
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
        Some(MessageOutcome::IntegrationCreated { systems }) => MessageReply {
            kind: INTEGRATION_CREATED,
            data: Value::from(systems.to_vec()),
        },
        Some(MessageOutcome::AccessToken(pair)) => MessageReply {
            kind: ACCESS_TOKEN_REPLY,
            data: pair.access_token.map(Value::String).unwrap_or(Value::Null),
        },
    };

    Ok(Json(reply).into_response())
}

/// Application error types
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    BadGateway(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        match e {
            Error::UnknownUser(_) | Error::AuthRefresh(_) => {
                warn!(kind = e.kind(), error = %e, "Marketplace request unauthorized");
                AppError::Unauthorized(e.to_string())
            }
            Error::Storage(_) => {
                error!(error = %e, "User store failure");
                AppError::InternalServerError("user store unavailable".to_string())
            }
            other => {
                error!(kind = other.kind(), error = %other, "Marketplace call failed");
                AppError::BadGateway(other.to_string())
            }
        }
    }
}
