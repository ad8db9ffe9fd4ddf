use super::*;
use crate::error::Result;
use crate::models::{
    Candidate, Content, GenerateContentRequest, GenerateContentResponse, Message, Part,
    Preferences,
};
use crate::speech::{AudioClip, AudioSink};
use crate::transport::{GeminiTransport, Transport};

use std::collections::VecDeque;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// In-memory history and preference store.
#[derive(Default)]
struct MemoryRepo {
    histories: std::sync::Mutex<HashMap<String, Vec<Message>>>,
    prefs: std::sync::Mutex<Option<Preferences>>,
}

#[async_trait]
impl HistoryRepository for MemoryRepo {
    async fn load_history(&self, document_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .histories
            .lock()
            .unwrap()
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_history(&self, document_id: &str, messages: &[Message]) -> Result<()> {
        let mut histories = self.histories.lock().unwrap();
        if messages.is_empty() {
            histories.remove(document_id);
        } else {
            histories.insert(document_id.to_string(), messages.to_vec());
        }
        Ok(())
    }

    async fn clear_history(&self, document_id: &str) -> Result<()> {
        self.histories.lock().unwrap().remove(document_id);
        Ok(())
    }
}

#[async_trait]
impl PreferencesRepository for MemoryRepo {
    async fn load_preferences(&self) -> Result<Preferences> {
        Ok(self.prefs.lock().unwrap().unwrap_or_default())
    }

    async fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
        *self.prefs.lock().unwrap() = Some(*prefs);
        Ok(())
    }
}

/// Transport that replays scripted responses in order; streaming calls drain
/// the scripted chunk list.
#[derive(Default)]
struct ScriptedTransport {
    responses: std::sync::Mutex<VecDeque<GenerateContentResponse>>,
    chunks: std::sync::Mutex<Vec<Result<String>>>,
}

impl ScriptedTransport {
    fn respond_with(self, text: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(text_response(text));
        self
    }

    fn stream_chunks(self, chunks: Vec<&str>) -> Self {
        *self.chunks.lock().unwrap() =
            chunks.into_iter().map(|c| Ok(c.to_string())).collect();
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn generate(
        &self,
        _model: &str,
        _req: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted generate call"))
    }

    async fn generate_stream(
        &self,
        _model: &str,
        _req: &GenerateContentRequest,
    ) -> Result<mpsc::Receiver<Result<String>>> {
        let chunks: Vec<_> = self.chunks.lock().unwrap().drain(..).collect();
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

fn text_response(text: &str) -> GenerateContentResponse {
    GenerateContentResponse {
        candidates: vec![Candidate {
            content: Some(Content::from_parts(vec![Part::text(text)])),
        }],
    }
}

struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, _clip: AudioClip) -> Result<()> {
        Ok(())
    }
}

fn app(transport: Arc<dyn Transport>) -> Router {
    let config = Arc::new(Config::default());
    let gateway = Arc::new(GeminiGateway::new(transport, &config.gemini));
    let repo = Arc::new(MemoryRepo::default());
    let speech = Arc::new(SpeechController::new(
        gateway.clone(),
        Arc::new(NullSink),
        config.gemini.tts_sample_rate,
    ));
    router(Arc::new(AppState::new(
        config,
        gateway,
        repo.clone(),
        repo,
        speech,
    )))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete_req(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn text_upload(name: &str, content: &str) -> Value {
    json!([{ "kind": "text", "name": name, "content": content }])
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = app(Arc::new(ScriptedTransport::default()));
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_proxy_unknown_action_is_bad_request() {
    let app = app(Arc::new(ScriptedTransport::default()));
    let response = app
        .oneshot(post_json(
            "/api/proxy",
            json!({ "action": "frobnicate", "payload": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid action specified.");
}

#[tokio::test]
async fn test_proxy_summarize_returns_text() {
    let transport = ScriptedTransport::default().respond_with("A concise summary.");
    let app = app(Arc::new(transport));
    let response = app
        .oneshot(post_json(
            "/api/proxy",
            json!({
                "action": "summarize",
                "payload": {
                    "document": { "type": "text", "content": "Patient is stable." },
                    "systemInstruction": "You are a careful assistant.",
                    "summaryPrompt": "Summarize the document.",
                    "modelName": "gemini-2.5-flash"
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["text"], "A concise summary.");
}

#[tokio::test]
async fn test_proxy_stream_concatenates_chunks() {
    let transport = ScriptedTransport::default().stream_chunks(vec!["Hello", ", ", "world"]);
    let app = app(Arc::new(transport));
    let response = app
        .oneshot(post_json(
            "/api/proxy",
            json!({
                "action": "generateStream",
                "payload": {
                    "query": "Say hello",
                    "document": { "type": "text", "content": "irrelevant" },
                    "systemInstruction": "sys"
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(body_bytes(response).await, b"Hello, world");
}

#[tokio::test]
async fn test_proxy_without_api_key_is_server_error() {
    let transport = GeminiTransport::new("http://unused.invalid".to_string(), String::new());
    let app = app(Arc::new(transport));
    let response = app
        .oneshot(post_json(
            "/api/proxy",
            json!({
                "action": "summarize",
                "payload": {
                    "document": { "type": "text", "content": "x" },
                    "systemInstruction": "sys",
                    "summaryPrompt": "sum"
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "API key not configured on server.");
}

#[tokio::test]
async fn test_upload_summarizes_and_selects() {
    let transport = ScriptedTransport::default()
        .respond_with("Short summary.")
        .respond_with(r#"{"questions": ["What changed?", "What next?"]}"#);
    let app = app(Arc::new(transport));

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/documents",
            text_upload("note.txt", "Patient is stable."),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["name"], "note.txt");
    assert_eq!(body[0]["summary"], "Short summary.");
    assert_eq!(
        body[0]["suggestedQuestions"],
        json!(["What changed?", "What next?"])
    );
    let id = body[0]["id"].as_str().unwrap().to_string();

    let response = app.oneshot(get("/api/documents")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["documents"].as_array().unwrap().len(), 1);
    assert_eq!(body["selected"], Value::String(id));
}

#[tokio::test]
async fn test_document_delete_clears_history() {
    let transport = ScriptedTransport::default()
        .respond_with("Summary.")
        .respond_with(r#"{"questions": []}"#);
    let app = app(Arc::new(transport));

    let response = app
        .clone()
        .oneshot(post_json("/api/documents", text_upload("a.txt", "text")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let id = body[0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(delete_req(&format!("/api/documents/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The document is gone, so its history is unreachable.
    let response = app
        .oneshot(get(&format!("/api/documents/{id}/history")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_send_runs_full_pipeline() {
    let transport = ScriptedTransport::default()
        .respond_with("Summary.")
        .respond_with(r#"{"questions": []}"#)
        .respond_with(r#"{"isConsistent": true, "reasoning": "Matches the document."}"#)
        .stream_chunks(vec!["The answer", " is 42."]);
    let app = app(Arc::new(transport));

    let response = app
        .clone()
        .oneshot(post_json("/api/documents", text_upload("doc.txt", "42.")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let id = body[0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/documents/{id}/chat"),
            json!({ "message": "What is the answer?" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let message = body_json(response).await;
    assert_eq!(message["author"], "bot");
    assert_eq!(message["content"]["answer"], "The answer is 42.");
    assert_eq!(message["content"]["status"], "verified");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/documents/{id}/history")))
        .await
        .unwrap();
    let history = body_json(response).await;
    assert_eq!(history.as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(delete_req(&format!("/api/documents/{id}/history")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get(&format!("/api/documents/{id}/history")))
        .await
        .unwrap();
    let history = body_json(response).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_blank_message_is_dropped() {
    let transport = ScriptedTransport::default()
        .respond_with("Summary.")
        .respond_with(r#"{"questions": []}"#);
    let app = app(Arc::new(transport));

    let response = app
        .clone()
        .oneshot(post_json("/api/documents", text_upload("doc.txt", "text")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let id = body[0]["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(post_json(
            &format!("/api/documents/{id}/chat"),
            json!({ "message": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_preferences_roundtrip() {
    let app = app(Arc::new(ScriptedTransport::default()));

    let response = app.clone().oneshot(get("/api/preferences")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["persona"], "professional");
    assert_eq!(body["voice"], "Kore");
    assert_eq!(body["model"], "gemini-2.5-flash");

    let response = app
        .clone()
        .oneshot(put_json(
            "/api/preferences",
            json!({ "persona": "empathetic", "voice": "Puck", "model": "gemini-3-pro-preview" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/preferences")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["persona"], "empathetic");
    assert_eq!(body["voice"], "Puck");
}

#[tokio::test]
async fn test_speech_synthesize_answers_wav() {
    // Base64 of three little-endian i16 samples.
    let transport = ScriptedTransport::default();
    transport
        .responses
        .lock()
        .unwrap()
        .push_back(GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content::from_parts(vec![Part::inline_data(
                    "audio/pcm", "AQACAAMA",
                )])),
            }],
        });
    let app = app(Arc::new(transport));

    let response = app
        .oneshot(post_json(
            "/api/speech/synthesize",
            json!({ "text": "Hello there" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    let body = body_bytes(response).await;
    assert_eq!(&body[0..4], b"RIFF");
    assert_eq!(body.len(), 44 + 6);
}
