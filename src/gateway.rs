//! The model gateway: five stateless operations, each a direct forward to a
//! hosted Gemini model with a fixed schema or modality.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::GeminiConfig;
use crate::error::{MedimindError, Result};
use crate::models::{
    ChatModel, Content, Document, GenerateContentRequest, GenerationConfig, Part, Persona,
    SummaryFocus, VerificationResult, Voice,
};
use crate::prompts;
use crate::transport::Transport;

/// Returned when the model produced no usable summary text.
pub const NO_SUMMARY_TEXT: &str = "Unable to generate a summary for this document.";
/// Returned when the summary call itself failed.
pub const SUMMARY_ERROR_TEXT: &str = "An error occurred while generating the summary.";

const MAX_SUGGESTED_QUESTIONS: usize = 3;

fn verification_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "isConsistent": { "type": "BOOLEAN" },
            "reasoning": { "type": "STRING" },
            "correctedAnswer": { "type": "STRING" },
        },
        "required": ["isConsistent", "reasoning", "correctedAnswer"],
    })
}

fn suggested_questions_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "questions": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
            }
        },
        "required": ["questions"],
    })
}

pub struct GeminiGateway {
    tx: Arc<dyn Transport>,
    verify_model: String,
    tts_model: String,
}

impl GeminiGateway {
    pub fn new(tx: Arc<dyn Transport>, cfg: &GeminiConfig) -> Self {
        Self {
            tx,
            verify_model: cfg.verify_model.clone(),
            tts_model: cfg.tts_model.clone(),
        }
    }

    pub async fn summarize(
        &self,
        document: &Document,
        system_instruction: &str,
        summary_prompt: &str,
        model: ChatModel,
    ) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![prompts::build_contents(document, summary_prompt)?],
            system_instruction: Some(Content::from_parts(vec![Part::text(system_instruction)])),
            generation_config: None,
        };

        let response = self.tx.generate(model.wire_name(), &request).await?;
        Ok(response.text().unwrap_or_else(|| NO_SUMMARY_TEXT.to_string()))
    }

    /// The only suspending/streaming operation: answers arrive as an ordered
    /// sequence of text chunks.
    pub async fn answer_stream(
        &self,
        query: &str,
        document: &Document,
        system_instruction: &str,
        model: ChatModel,
    ) -> Result<mpsc::Receiver<Result<String>>> {
        let request = GenerateContentRequest {
            contents: vec![prompts::build_contents(
                document,
                &prompts::question_prompt(query),
            )?],
            system_instruction: Some(Content::from_parts(vec![Part::text(system_instruction)])),
            generation_config: None,
        };

        self.tx.generate_stream(model.wire_name(), &request).await
    }

    /// Checks a generated answer against the source document. Always uses the
    /// configured verification model regardless of the caller's model choice.
    pub async fn verify(&self, answer: &str, document: &Document) -> Result<VerificationResult> {
        let request = GenerateContentRequest {
            contents: vec![prompts::build_contents(
                document,
                &prompts::verification_prompt(answer),
            )?],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(verification_schema()),
                ..Default::default()
            }),
        };

        let response = self.tx.generate(&self.verify_model, &request).await?;
        let text = response.text().ok_or_else(|| {
            MedimindError::SchemaMismatch("verification response contained no text".to_string())
        })?;

        let mut result: VerificationResult =
            serde_json::from_str(text.trim()).map_err(|e| {
                MedimindError::SchemaMismatch(format!("verification JSON did not parse: {e}"))
            })?;

        // Normalize an empty corrected answer to "no correction supplied".
        if result
            .corrected_answer
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            result.corrected_answer = None;
        }
        Ok(result)
    }

    /// At most three follow-up questions for a summary. A response that does
    /// not match the schema degrades to an empty list.
    pub async fn suggest_questions(
        &self,
        summary: &str,
        model: ChatModel,
    ) -> Result<Vec<String>> {
        #[derive(serde::Deserialize)]
        struct Suggestions {
            questions: Vec<String>,
        }

        let request = GenerateContentRequest {
            contents: vec![Content::from_parts(vec![Part::text(
                prompts::suggestions_prompt(summary),
            )])],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(suggested_questions_schema()),
                ..Default::default()
            }),
        };

        let response = self.tx.generate(model.wire_name(), &request).await?;
        let Some(text) = response.text() else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Suggestions>(text.trim()) {
            Ok(parsed) => {
                let mut questions = parsed.questions;
                questions.truncate(MAX_SUGGESTED_QUESTIONS);
                Ok(questions)
            }
            Err(e) => {
                tracing::warn!("Suggested questions did not match schema: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// Synthesizes speech for a text; returns base64-encoded PCM audio.
    pub async fn generate_speech(&self, text: &str, voice: Voice) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content::from_parts(vec![Part::text(text)])],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(serde_json::json!({
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice.wire_name() }
                    }
                })),
                ..Default::default()
            }),
        };

        let response = self.tx.generate(&self.tts_model, &request).await?;
        response
            .inline_data()
            .map(str::to_string)
            .ok_or_else(|| {
                MedimindError::SchemaMismatch("speech response contained no audio".to_string())
            })
    }

    /// Summary plus follow-up questions, with failures folded into fixed
    /// fallbacks so callers always get a displayable result.
    pub async fn summarize_with_suggestions(
        &self,
        document: &Document,
        persona: Persona,
        focus: SummaryFocus,
        model: ChatModel,
    ) -> (String, Vec<String>) {
        let summary = match self
            .summarize(
                document,
                prompts::system_instruction(persona),
                prompts::summary_prompt(focus),
                model,
            )
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("Summary generation failed: {e}");
                return (SUMMARY_ERROR_TEXT.to_string(), Vec::new());
            }
        };

        if summary.is_empty() || summary == NO_SUMMARY_TEXT {
            return (summary, Vec::new());
        }

        let questions = match self.suggest_questions(&summary, model).await {
            Ok(questions) => questions,
            Err(e) => {
                tracing::warn!("Suggested question generation failed: {e}");
                Vec::new()
            }
        };
        (summary, questions)
    }
}
