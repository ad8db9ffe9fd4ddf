//! Corrective-answer orchestration: stream an initial answer, verify it
//! against the source document, then reconcile into a final answer + status.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::error::Result;
use crate::gateway::GeminiGateway;
use crate::models::{
    BotMessageContent, ChatModel, Document, Message, MessageContent, Persona, VerificationStatus,
};
use crate::prompts;
use crate::repository_traits::HistoryRepository;

const PLACEHOLDER_REASONING: &str = "Generating response...";
const VERIFYING_REASONING: &str = "Verifying answer for factual consistency...";

const GENERATION_FAILED_ANSWER: &str = "I'm sorry, I was unable to generate a response for your question. Please try rephrasing it, or ask something different about the document.";
const GENERATION_FAILED_REASONING: &str = "Failed to generate an initial answer.";

const NO_ANSWER_TEXT: &str =
    "I couldn't find a relevant answer in the document for your question.";
const NO_ANSWER_REASONING: &str = "The model did not generate a response.";

const VERIFY_FAILED_REASONING: &str = "I generated an answer, but a system error occurred during the verification step. Please use this response with caution and double-check critical information.";

/// Chat state for one document. A loading flag serializes sends within the
/// session: attempts while a send is in flight are dropped silently.
pub struct ChatSession {
    document: Document,
    document_id: String,
    gateway: Arc<GeminiGateway>,
    history: Arc<dyn HistoryRepository>,
    messages: Mutex<Vec<Message>>,
    loading: AtomicBool,
}

impl ChatSession {
    pub fn new(
        document: Document,
        document_id: impl Into<String>,
        gateway: Arc<GeminiGateway>,
        history: Arc<dyn HistoryRepository>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            document,
            document_id: document_id.into(),
            gateway,
            history,
            messages: Mutex::new(messages),
            loading: AtomicBool::new(false),
        }
    }

    /// Restores the persisted history for a document; a missing or corrupt
    /// record starts the session empty.
    pub async fn load(
        document: Document,
        document_id: impl Into<String>,
        gateway: Arc<GeminiGateway>,
        history: Arc<dyn HistoryRepository>,
    ) -> Self {
        let document_id = document_id.into();
        let messages = match history.load_history(&document_id).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("Failed to load chat history for {document_id}: {e}");
                Vec::new()
            }
        };
        Self::new(document, document_id, gateway, history, messages)
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    /// Drives one user query through generate -> verify -> reconcile.
    /// Returns the final bot message, or `None` when the query was dropped
    /// (blank input, or another send already in flight).
    pub async fn send_message(
        &self,
        query: &str,
        persona: Persona,
        model: ChatModel,
    ) -> Result<Option<Message>> {
        if query.trim().is_empty() {
            return Ok(None);
        }
        if self.loading.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }

        let result = self.run(query, persona, model).await;
        // Cleared on every exit path.
        self.loading.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    async fn run(&self, query: &str, persona: Persona, model: ChatModel) -> Result<Message> {
        let placeholder_id = {
            let mut messages = self.messages.lock().await;
            messages.push(Message::user(query));
            let placeholder = Message::bot(BotMessageContent {
                answer: String::new(),
                status: VerificationStatus::Unverified,
                reasoning: Some(PLACEHOLDER_REASONING.to_string()),
                is_verifying: None,
            });
            let id = placeholder.id.clone();
            messages.push(placeholder);
            id
        };
        self.persist().await;

        let mut full_answer = String::new();
        let stream = self
            .gateway
            .answer_stream(
                query,
                &self.document,
                prompts::system_instruction(persona),
                model,
            )
            .await;

        match stream {
            Ok(mut rx) => {
                let mut failed = false;
                while let Some(chunk) = rx.recv().await {
                    match chunk {
                        Ok(text) => {
                            full_answer.push_str(&text);
                            // The only place partial updates surface.
                            self.update_bot(&placeholder_id, |content| {
                                content.answer = full_answer.clone();
                            })
                            .await;
                        }
                        Err(e) => {
                            tracing::error!("Answer generation failed: {e}");
                            failed = true;
                            break;
                        }
                    }
                }
                if failed {
                    return Ok(self
                        .finalize(
                            &placeholder_id,
                            GENERATION_FAILED_ANSWER,
                            VerificationStatus::Error,
                            GENERATION_FAILED_REASONING,
                        )
                        .await);
                }
            }
            Err(e) => {
                tracing::error!("Answer generation failed: {e}");
                return Ok(self
                    .finalize(
                        &placeholder_id,
                        GENERATION_FAILED_ANSWER,
                        VerificationStatus::Error,
                        GENERATION_FAILED_REASONING,
                    )
                    .await);
            }
        }

        if full_answer.trim().is_empty() {
            // Verification is skipped: there is nothing to check.
            return Ok(self
                .finalize(
                    &placeholder_id,
                    NO_ANSWER_TEXT,
                    VerificationStatus::Error,
                    NO_ANSWER_REASONING,
                )
                .await);
        }

        self.update_bot(&placeholder_id, |content| {
            content.is_verifying = Some(true);
            content.reasoning = Some(VERIFYING_REASONING.to_string());
        })
        .await;

        match self.gateway.verify(&full_answer, &self.document).await {
            Ok(verification) => {
                let (final_answer, status) = if verification.is_consistent {
                    (full_answer, VerificationStatus::Verified)
                } else {
                    match verification.corrected_answer {
                        Some(corrected) => (corrected, VerificationStatus::Corrected),
                        None => (full_answer, VerificationStatus::Unverified),
                    }
                };
                Ok(self
                    .finalize(&placeholder_id, &final_answer, status, &verification.reasoning)
                    .await)
            }
            Err(e) => {
                tracing::error!("Answer verification failed: {e}");
                Ok(self
                    .finalize(
                        &placeholder_id,
                        &full_answer,
                        VerificationStatus::Unverified,
                        VERIFY_FAILED_REASONING,
                    )
                    .await)
            }
        }
    }

    /// Empties the chat and removes the persisted record entirely.
    pub async fn clear_chat(&self) -> Result<()> {
        self.messages.lock().await.clear();
        self.history.clear_history(&self.document_id).await
    }

    async fn update_bot<F>(&self, message_id: &str, f: F)
    where
        F: FnOnce(&mut BotMessageContent),
    {
        let mut messages = self.messages.lock().await;
        if let Some(message) = messages.iter_mut().find(|m| m.id == message_id) {
            if let MessageContent::Bot(content) = &mut message.content {
                f(content);
            }
        }
    }

    async fn finalize(
        &self,
        message_id: &str,
        answer: &str,
        status: VerificationStatus,
        reasoning: &str,
    ) -> Message {
        self.update_bot(message_id, |content| {
            content.answer = answer.to_string();
            content.status = status;
            content.reasoning = Some(reasoning.to_string());
            content.is_verifying = Some(false);
        })
        .await;
        self.persist().await;

        let messages = self.messages.lock().await;
        messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .unwrap_or_else(|| {
                // The placeholder was appended by this call; it cannot vanish.
                Message::bot(BotMessageContent {
                    answer: answer.to_string(),
                    status,
                    reasoning: Some(reasoning.to_string()),
                    is_verifying: Some(false),
                })
            })
    }

    /// Persistence failures never disturb chat state; they are logged and the
    /// in-memory session stays authoritative.
    async fn persist(&self) {
        let messages = self.messages.lock().await;
        if let Err(e) = self.history.save_history(&self.document_id, &messages).await {
            tracing::warn!("Failed to persist chat history for {}: {e}", self.document_id);
        }
    }
}
