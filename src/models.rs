use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{MedimindError, Result};

/// Tone directive applied to every generation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    #[default]
    Professional,
    Empathetic,
    Concise,
}

/// Which aspect of the document a summary should concentrate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SummaryFocus {
    #[default]
    KeyPoints,
    TreatmentPlan,
    Diagnosis,
}

/// Chat models exposed to callers. Verification ignores this and always uses
/// the highest-capability model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ChatModel {
    #[default]
    #[serde(rename = "gemini-2.5-flash")]
    Gemini25Flash,
    #[serde(rename = "gemini-3-pro-preview")]
    Gemini3ProPreview,
}

impl ChatModel {
    pub fn wire_name(&self) -> &'static str {
        match self {
            ChatModel::Gemini25Flash => "gemini-2.5-flash",
            ChatModel::Gemini3ProPreview => "gemini-3-pro-preview",
        }
    }
}

/// Prebuilt TTS voices supported by the speech model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Voice {
    #[default]
    Kore,
    Puck,
    Charon,
    Fenrir,
    Zephyr,
}

impl Voice {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Voice::Kore => "Kore",
            Voice::Puck => "Puck",
            Voice::Charon => "Charon",
            Voice::Fenrir => "Fenrir",
            Voice::Zephyr => "Zephyr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Text,
    Image,
}

/// An ingested document. Immutable once created; image content is base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub content: String,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Document {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: DocumentKind::Text,
            content: content.into(),
            mime_type: None,
        }
    }

    /// Base64-encodes raw image bytes at ingest.
    pub fn from_image_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        use base64::Engine as _;
        Self {
            kind: DocumentKind::Image,
            content: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: Some(mime_type.into()),
        }
    }

    /// Rejects unusable documents before any network call is made.
    pub fn validate(&self) -> Result<()> {
        if self.kind == DocumentKind::Image && self.mime_type.is_none() {
            return Err(MedimindError::InvalidDocument(
                "image document is missing a MIME type".to_string(),
            ));
        }
        Ok(())
    }
}

/// A document under session management, tagged with a display name and a
/// name+timestamp identifier (practically unique, not globally unique).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedDocument {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub document: Document,
}

impl ManagedDocument {
    pub fn new(name: impl Into<String>, document: Document) -> Self {
        let name = name.into();
        let id = format!("{}-{}", name, Utc::now().timestamp_millis());
        Self { id, name, document }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageAuthor {
    User,
    Bot,
}

/// Terminal (and pre-terminal) states of a bot answer. Transitions are
/// monotonic: placeholder -> streaming -> verifying -> one of these, and a
/// terminal status is never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Corrected,
    Unverified,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotMessageContent {
    pub answer: String,
    pub status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(rename = "isVerifying", skip_serializing_if = "Option::is_none")]
    pub is_verifying: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Bot(BotMessageContent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: MessageAuthor,
    pub content: MessageContent,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author: MessageAuthor::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn bot(content: BotMessageContent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author: MessageAuthor::Bot,
            content: MessageContent::Bot(content),
        }
    }
}

/// Outcome of checking a generated answer against the source document.
/// Transient; folded into the final bot message rather than stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub is_consistent: bool,
    pub reasoning: String,
    #[serde(default)]
    pub corrected_answer: Option<String>,
}

/// Per-user settings persisted independently of any document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Preferences {
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub voice: Voice,
    #[serde(default)]
    pub model: ChatModel,
}

// ===== Gemini generateContent wire format =====

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self { role: None, parts }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }

    /// Base64 payload of the first inline-data part (TTS responses).
    pub fn inline_data(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .map(|d| d.data.as_str())
    }
}
