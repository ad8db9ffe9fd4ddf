//! Single-endpoint action dispatch mirroring the upstream model API, so
//! clients never hold the credential themselves.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_stream::wrappers::ReceiverStream;

use super::AppState;
use crate::error::{MedimindError, Result};
use crate::models::{ChatModel, Document, Voice};

#[derive(Debug, Deserialize)]
pub struct ProxyRequest {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummarizePayload {
    document: Document,
    system_instruction: String,
    summary_prompt: String,
    #[serde(default)]
    model_name: ChatModel,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamPayload {
    query: String,
    document: Document,
    system_instruction: String,
    #[serde(default)]
    model_name: ChatModel,
}

#[derive(Debug, Deserialize)]
struct VerifyPayload {
    answer: String,
    document: Document,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestPayload {
    summary: String,
    #[serde(default)]
    model_name: ChatModel,
}

#[derive(Debug, Deserialize)]
struct SpeechPayload {
    text: String,
    #[serde(default)]
    voice: Voice,
}

pub async fn handle(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProxyRequest>,
) -> Result<Response> {
    match req.action.as_str() {
        "summarize" => {
            let p: SummarizePayload = serde_json::from_value(req.payload)?;
            let text = state
                .gateway
                .summarize(&p.document, &p.system_instruction, &p.summary_prompt, p.model_name)
                .await?;
            Ok(Json(json!({ "text": text })).into_response())
        }
        "generateStream" => {
            let p: StreamPayload = serde_json::from_value(req.payload)?;
            let rx = state
                .gateway
                .answer_stream(&p.query, &p.document, &p.system_instruction, p.model_name)
                .await?;
            let body =
                Body::from_stream(ReceiverStream::new(rx).map(|chunk| chunk.map(axum::body::Bytes::from)));
            Ok((
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                body,
            )
                .into_response())
        }
        "verify" => {
            let p: VerifyPayload = serde_json::from_value(req.payload)?;
            let result = state.gateway.verify(&p.answer, &p.document).await?;
            Ok(Json(result).into_response())
        }
        "suggestQuestions" => {
            let p: SuggestPayload = serde_json::from_value(req.payload)?;
            let questions = state.gateway.suggest_questions(&p.summary, p.model_name).await?;
            Ok(Json(json!({ "questions": questions })).into_response())
        }
        "generateSpeech" => {
            let p: SpeechPayload = serde_json::from_value(req.payload)?;
            let audio = state.gateway.generate_speech(&p.text, p.voice).await?;
            Ok(Json(json!({ "audio": audio })).into_response())
        }
        other => Err(MedimindError::UnknownAction(other.to_string())),
    }
}
