//! Route handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use rlpa_gateway::ManagementApi;
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;

/// Header carrying the password issued with the ManageID.
pub const PASSWORD_HEADER: &str = "Password";

const TYPE_EXECUTE: u8 = 0;
const TYPE_FINISH: u8 = 1;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn ManagementApi>,
}

/// Body of `POST /shell/:id`.
#[derive(Debug, Deserialize)]
pub struct ShellRequest {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub command: String,
}

fn authorize(state: &AppState, id: &str, headers: &HeaderMap) -> Result<(), ApiError> {
    let password = headers
        .get(PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if state.api.authenticate(id, password) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

pub async fn home() -> &'static str {
    "rlpa-server\n"
}

pub async fn manifest() -> &'static str {
    "manifest\n"
}

pub async fn info(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<String, ApiError> {
    authorize(&state, &id, &headers)?;
    Ok(format!("hello {id}"))
}

pub async fn connect(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &id, &headers)?;
    state.api.acquire_lock(&id)?;
    info!(session_id = %id, "API lock acquired");
    Ok(StatusCode::OK)
}

pub async fn keepalive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &id, &headers)?;
    state.api.keepalive(&id)?;
    Ok(StatusCode::OK)
}

/// Reserved. Releasing the device is done through `/shell` finish.
pub async fn disconnect(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    authorize(&state, &id, &headers)?;
    Ok(StatusCode::OK)
}

pub async fn shell(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, String), ApiError> {
    authorize(&state, &id, &headers)?;
    state.api.check_shell(&id)?;

    let request: ShellRequest = serde_json::from_str(&body).map_err(|e| ApiError::BadRequest {
        reason: e.to_string(),
    })?;

    match request.kind {
        TYPE_FINISH => {
            state.api.finish_shell(&id).await?;
            Ok((StatusCode::OK, "Closed".to_string()))
        }
        TYPE_EXECUTE => {
            let reply = state.api.execute_shell(&id, &request.command).await?;
            Ok((StatusCode::OK, reply.into_text()))
        }
        other => Err(ApiError::BadRequest {
            reason: format!("unknown request type {other}"),
        }),
    }
}
