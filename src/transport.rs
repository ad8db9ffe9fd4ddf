use async_trait::async_trait;
use futures::StreamExt;
use rand::Rng;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::error::{MedimindError, Result};
use crate::models::{GenerateContentRequest, GenerateContentResponse};

const MAX_RETRIES: u8 = 5;
const MAX_RETRY_DURATION: Duration = Duration::from_secs(300);
const STREAM_CHANNEL_CAPACITY: usize = 32;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;

    /// Starts a streamed generation. Chunks arrive in send order; an `Err`
    /// item is terminal. Never retried.
    async fn generate_stream(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<mpsc::Receiver<Result<String>>>;
}

pub struct GeminiTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiTransport {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    fn require_key(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(MedimindError::MissingApiKey);
        }
        Ok(())
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        self.require_key()?;

        let url = self.endpoint(model, "generateContent");
        let start_time = Instant::now();
        let mut attempts = 0;

        while attempts < MAX_RETRIES {
            if start_time.elapsed() > MAX_RETRY_DURATION {
                return Err(MedimindError::Upstream(format!(
                    "Gemini API request timed out after {} seconds (max retry duration exceeded)",
                    MAX_RETRY_DURATION.as_secs()
                )));
            }

            attempts += 1;

            match self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .header("Content-Type", "application/json")
                .json(req)
                .send()
                .await
            {
                Ok(response) => {
                    if response.status().is_success() {
                        return response.json().await.map_err(|e| {
                            MedimindError::Upstream(format!(
                                "Failed to parse Gemini API response: {e}"
                            ))
                        });
                    }

                    if attempts >= MAX_RETRIES {
                        return Err(MedimindError::Upstream(format!(
                            "Gemini API error after {} attempts: {}",
                            attempts,
                            response
                                .text()
                                .await
                                .unwrap_or_else(|_| "Unknown error".to_string())
                        )));
                    }
                }
                Err(e) => {
                    if attempts >= MAX_RETRIES {
                        return Err(MedimindError::Upstream(format!(
                            "Failed to send request to Gemini API after {attempts} attempts: {e}"
                        )));
                    }
                }
            }

            // Exponential backoff with jitter (only if we're going to retry)
            if attempts < MAX_RETRIES {
                let base_delay =
                    Duration::from_millis(200 * 2u64.pow(attempts.saturating_sub(1) as u32));
                let jitter = rand::thread_rng().gen_range(0.8..=1.2);
                let delay = Duration::from_millis((base_delay.as_millis() as f64 * jitter) as u64);
                let final_delay = std::cmp::min(delay, Duration::from_secs(30));
                sleep(final_delay).await;
            }
        }

        Err(MedimindError::Upstream(format!(
            "Gemini API request failed after {MAX_RETRIES} attempts"
        )))
    }

    async fn generate_stream(
        &self,
        model: &str,
        req: &GenerateContentRequest,
    ) -> Result<mpsc::Receiver<Result<String>>> {
        self.require_key()?;

        let url = format!("{}?alt=sse", self.endpoint(model, "streamGenerateContent"));
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await
            .map_err(|e| MedimindError::Upstream(format!("Failed to open stream: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MedimindError::Upstream(format!(
                "Gemini API stream error ({status}): {body}"
            )));
        }

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].trim().to_string();
                            buffer.drain(..=pos);

                            let Some(data) = line.strip_prefix("data: ") else {
                                continue;
                            };
                            if data == "[DONE]" {
                                return;
                            }
                            match serde_json::from_str::<GenerateContentResponse>(data) {
                                Ok(parsed) => {
                                    if let Some(text) = parsed.text() {
                                        if tx.send(Ok(text)).await.is_err() {
                                            return; // consumer went away
                                        }
                                    }
                                }
                                Err(e) => {
                                    tracing::debug!("Skipping unparseable stream event: {e}");
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(MedimindError::Upstream(format!(
                                "Stream interrupted: {e}"
                            ))))
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Content, Part};

    #[tokio::test]
    async fn test_missing_key_rejected_before_any_call() {
        let transport = GeminiTransport::new("http://localhost:0".to_string(), String::new());
        let req = GenerateContentRequest {
            contents: vec![Content::from_parts(vec![Part::text("hi")])],
            system_instruction: None,
            generation_config: None,
        };
        assert!(matches!(
            transport.generate("gemini-2.5-flash", &req).await,
            Err(MedimindError::MissingApiKey)
        ));
        assert!(matches!(
            transport.generate_stream("gemini-2.5-flash", &req).await,
            Err(MedimindError::MissingApiKey)
        ));
    }

    #[test]
    fn test_endpoint_shape() {
        let transport = GeminiTransport::new(
            "https://generativelanguage.googleapis.com/v1beta".to_string(),
            "k".to_string(),
        );
        assert_eq!(
            transport.endpoint("gemini-2.5-flash", "generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_sse_event_parses_into_text() {
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"chunk "}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(data).expect("parse");
        assert_eq!(parsed.text().as_deref(), Some("chunk "));
    }
}
