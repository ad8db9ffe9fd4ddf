//! Document ingestion, selection, and on-upload summarization.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::documents::DocumentUpload;
use crate::error::Result;
use crate::models::{ManagedDocument, Preferences, SummaryFocus};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub suggested_questions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentList {
    pub documents: Vec<ManagedDocument>,
    pub selected: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default)]
    pub focus: SummaryFocus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub summary: String,
    pub suggested_questions: Vec<String>,
}

/// Stored preferences, falling back to defaults when the record is
/// unavailable. Handlers never fail on preference lookups.
pub(crate) async fn stored_preferences(state: &AppState) -> Preferences {
    match state.preferences.load_preferences().await {
        Ok(prefs) => prefs,
        Err(e) => {
            tracing::warn!("Failed to load preferences, using defaults: {e}");
            Preferences::default()
        }
    }
}

/// Ingests a batch of documents, selects the last of the batch, and produces
/// a summary with follow-up questions for each.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Json(uploads): Json<Vec<DocumentUpload>>,
) -> Result<Json<Vec<UploadedDocument>>> {
    let stored = state.documents.upload(uploads)?;
    let prefs = stored_preferences(&state).await;

    let mut results = Vec::with_capacity(stored.len());
    for managed in stored {
        let (summary, suggested_questions) = state
            .gateway
            .summarize_with_suggestions(
                &managed.document,
                prefs.persona,
                SummaryFocus::default(),
                prefs.model,
            )
            .await;
        results.push(UploadedDocument {
            id: managed.id,
            name: managed.name,
            summary,
            suggested_questions,
        });
    }
    Ok(Json(results))
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<DocumentList> {
    Json(DocumentList {
        documents: state.documents.list(),
        selected: state.documents.selected().map(|d| d.id),
    })
}

pub async fn select(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ManagedDocument>> {
    Ok(Json(state.documents.select(&id)?))
}

/// Removes a document along with its live session and persisted history.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.documents.delete(&id)?;
    state.evict_session(&id).await;
    if let Err(e) = state.history.clear_history(&id).await {
        tracing::warn!("Failed to clear history for deleted document {id}: {e}");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>> {
    let managed = state.documents.get(&id)?;
    let prefs = stored_preferences(&state).await;
    let (summary, suggested_questions) = state
        .gateway
        .summarize_with_suggestions(&managed.document, prefs.persona, query.focus, prefs.model)
        .await;
    Ok(Json(SummaryResponse {
        summary,
        suggested_questions,
    }))
}
