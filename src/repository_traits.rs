use crate::error::Result;
use crate::models::{Message, Preferences};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Durable per-document chat history, keyed by document identifier.
/// Missing or corrupted records degrade to an empty history.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HistoryRepository: Send + Sync + 'static {
    async fn load_history(&self, document_id: &str) -> Result<Vec<Message>>;

    /// Persists the full message sequence. An empty sequence removes the
    /// record entirely.
    async fn save_history(&self, document_id: &str, messages: &[Message]) -> Result<()>;

    async fn clear_history(&self, document_id: &str) -> Result<()>;
}

/// Global preference values (persona, voice, model), stored independently of
/// any document under a fixed key.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PreferencesRepository: Send + Sync + 'static {
    async fn load_preferences(&self) -> Result<Preferences>;

    async fn save_preferences(&self, prefs: &Preferences) -> Result<()>;
}
