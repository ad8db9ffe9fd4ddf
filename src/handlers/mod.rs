/// HTTP handler modules for the document assistant API
pub mod chat;
pub mod documents;
pub mod preferences;
pub mod proxy;
pub mod speech;

#[cfg(test)]
mod test_handlers;

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::documents::DocumentStore;
use crate::error::Result;
use crate::gateway::GeminiGateway;
use crate::rag::ChatSession;
use crate::repository_traits::{HistoryRepository, PreferencesRepository};
use crate::speech::SpeechController;

/// Shared application state behind every handler.
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<GeminiGateway>,
    pub documents: DocumentStore,
    pub history: Arc<dyn HistoryRepository>,
    pub preferences: Arc<dyn PreferencesRepository>,
    pub speech: Arc<SpeechController>,
    /// One live chat session per document, so concurrent sends against the
    /// same document share a serialization bar.
    sessions: Mutex<HashMap<String, Arc<ChatSession>>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        gateway: Arc<GeminiGateway>,
        history: Arc<dyn HistoryRepository>,
        preferences: Arc<dyn PreferencesRepository>,
        speech: Arc<SpeechController>,
    ) -> Self {
        Self {
            config,
            gateway,
            documents: DocumentStore::new(),
            history,
            preferences,
            speech,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the chat session for a document, restoring persisted history
    /// on first access.
    pub async fn session(&self, document_id: &str) -> Result<Arc<ChatSession>> {
        let managed = self.documents.get(document_id)?;
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(document_id) {
            return Ok(session.clone());
        }
        let session = Arc::new(
            ChatSession::load(
                managed.document,
                document_id,
                self.gateway.clone(),
                self.history.clone(),
            )
            .await,
        );
        sessions.insert(document_id.to_string(), session.clone());
        Ok(session)
    }

    pub async fn evict_session(&self, document_id: &str) {
        self.sessions.lock().await.remove(document_id);
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/proxy", post(proxy::handle))
        .route(
            "/api/documents",
            post(documents::upload).get(documents::list),
        )
        .route("/api/documents/:id", delete(documents::remove))
        .route("/api/documents/:id/select", put(documents::select))
        .route("/api/documents/:id/summary", get(documents::summary))
        .route("/api/documents/:id/chat", post(chat::send))
        .route(
            "/api/documents/:id/history",
            get(chat::history).delete(chat::clear),
        )
        .route(
            "/api/preferences",
            get(preferences::load).put(preferences::save),
        )
        .route("/api/speech/toggle", post(speech::toggle))
        .route("/api/speech/synthesize", post(speech::synthesize))
        .with_state(state)
}
