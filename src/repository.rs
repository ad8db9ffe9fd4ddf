use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Message, Preferences};
use crate::redis::RedisManager;
use crate::repository_traits::{HistoryRepository, PreferencesRepository};

const HISTORY_KEY_PREFIX: &str = "chatHistory";
const PREFERENCES_KEY: &str = "preferences";

/// Redis implementation of the history and preferences repositories.
pub struct RedisRepository {
    redis: Arc<RedisManager>,
}

impl RedisRepository {
    pub fn new(redis: Arc<RedisManager>) -> Self {
        Self { redis }
    }

    fn history_key(document_id: &str) -> String {
        format!("{HISTORY_KEY_PREFIX}_{document_id}")
    }
}

#[async_trait]
impl HistoryRepository for RedisRepository {
    async fn load_history(&self, document_id: &str) -> Result<Vec<Message>> {
        let key = Self::history_key(document_id);
        match self.redis.get_string(&key).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(messages) => Ok(messages),
                Err(e) => {
                    // Corrupted record: degrade to an empty history.
                    tracing::warn!("Failed to parse chat history for {document_id}: {e}");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    async fn save_history(&self, document_id: &str, messages: &[Message]) -> Result<()> {
        let key = Self::history_key(document_id);
        if messages.is_empty() {
            self.redis.delete(&key).await
        } else {
            let raw = serde_json::to_string(messages)?;
            self.redis.set_string(&key, &raw).await
        }
    }

    async fn clear_history(&self, document_id: &str) -> Result<()> {
        self.redis.delete(&Self::history_key(document_id)).await
    }
}

#[async_trait]
impl PreferencesRepository for RedisRepository {
    async fn load_preferences(&self) -> Result<Preferences> {
        match self.redis.get_string(PREFERENCES_KEY).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(prefs) => Ok(prefs),
                Err(e) => {
                    tracing::warn!("Failed to parse stored preferences: {e}");
                    Ok(Preferences::default())
                }
            },
            None => Ok(Preferences::default()),
        }
    }

    async fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
        let raw = serde_json::to_string(prefs)?;
        self.redis.set_string(PREFERENCES_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_key_is_per_document() {
        assert_eq!(
            RedisRepository::history_key("report.txt-1700000000000"),
            "chatHistory_report.txt-1700000000000"
        );
        assert_ne!(
            RedisRepository::history_key("a"),
            RedisRepository::history_key("b")
        );
    }

    #[test]
    fn test_corrupted_preferences_shape_degrades() {
        // The parse-failure path itself is unit-level: a bad payload must
        // produce the default, not an error.
        let parsed: Preferences =
            serde_json::from_str("{\"persona\":\"professional\",\"voice\":\"Kore\",\"model\":\"gemini-2.5-flash\"}")
                .expect("well-formed preferences parse");
        assert_eq!(parsed, Preferences::default());
        assert!(serde_json::from_str::<Preferences>("** not json **").is_err());
    }
}
