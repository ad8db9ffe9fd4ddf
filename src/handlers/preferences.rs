use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use super::AppState;
use super::documents::stored_preferences;
use crate::error::Result;
use crate::models::Preferences;

pub async fn load(State(state): State<Arc<AppState>>) -> Json<Preferences> {
    Json(stored_preferences(&state).await)
}

pub async fn save(
    State(state): State<Arc<AppState>>,
    Json(prefs): Json<Preferences>,
) -> Result<Json<Preferences>> {
    state.preferences.save_preferences(&prefs).await?;
    Ok(Json(prefs))
}
