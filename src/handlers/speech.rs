//! Speech endpoints: server-side playback toggling and WAV synthesis for
//! clients that play audio themselves.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::Result;
use crate::models::Voice;
use crate::speech::{SpeechState, decode_clip, wav_bytes};

#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Voice,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub state: SpeechState,
}

pub async fn toggle(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpeechRequest>,
) -> Json<ToggleResponse> {
    let state = state.speech.toggle(&req.text, req.voice).await;
    Json(ToggleResponse { state })
}

/// Synthesizes the text and answers the decoded clip as a WAV body.
pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpeechRequest>,
) -> Result<Response> {
    let audio = state.gateway.generate_speech(&req.text, req.voice).await?;
    let clip = decode_clip(&audio, state.config.gemini.tts_sample_rate)?;
    Ok((
        [(header::CONTENT_TYPE, "audio/wav")],
        wav_bytes(&clip),
    )
        .into_response())
}
