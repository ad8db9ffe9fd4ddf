//! Chat endpoints: one corrective-answer turn per request, plus history
//! retrieval and clearing.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::AppState;
use super::documents::stored_preferences;
use crate::error::Result;
use crate::models::Message;

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub message: String,
}

/// Runs one query through the generate/verify/reconcile pipeline. A dropped
/// query (blank, or a send already in flight for this document) answers 204.
pub async fn send(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SendRequest>,
) -> Result<Response> {
    let session = state.session(&id).await?;
    let prefs = stored_preferences(&state).await;
    match session
        .send_message(&req.message, prefs.persona, prefs.model)
        .await?
    {
        Some(message) => Ok(Json(message).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>> {
    let session = state.session(&id).await?;
    Ok(Json(session.messages().await))
}

pub async fn clear(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let session = state.session(&id).await?;
    session.clear_chat().await?;
    Ok(StatusCode::NO_CONTENT)
}
