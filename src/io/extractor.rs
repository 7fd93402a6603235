//! Image submission to the vision extraction service
//!
//! One chat-completions request per capture: the instruction text plus the
//! screenshot as a base64 data URL, sent to an OpenAI-compatible endpoint.
//! The vendor schema stays contained in this module; the rest of the system
//! only sees `ExtractNames` and `ServiceError`. No retries - failures
//! propagate to the caller immediately.

use crate::infra::config::Config;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

/// Cap on error-body detail carried into `ServiceError::Api`
const ERROR_BODY_LIMIT: usize = 300;

/// Failure modes of the extraction call, all surfaced to the user
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("API key is not set")]
    MissingCredential,
    #[error("extraction service rejected the credential (HTTP {0})")]
    Auth(u16),
    #[error("extraction service rate limit reached (HTTP 429)")]
    RateLimited,
    #[error("extraction service returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },
    #[error("request to extraction service failed: {0}")]
    Network(String),
    #[error("extraction service did not respond within {0} ms")]
    Timeout(u64),
    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),
    #[error("unsupported image payload: {0}")]
    UnsupportedImage(String),
}

/// Seam between the session and the hosted vision service
#[async_trait]
pub trait ExtractNames: Send + Sync {
    /// Submit one image; returns the raw free-text reply
    async fn extract_names(&self, image: &[u8], api_key: &str) -> Result<String, ServiceError>;
}

// Vendor request schema (chat completions with one multimodal user message)

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for the hosted vision extraction service
pub struct VisionExtractor {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    instruction: String,
    timeout_ms: u64,
}

impl VisionExtractor {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let timeout_ms = config.api_timeout_ms();
        // Create the HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base_url().trim_end_matches('/')),
            model: config.api_model().to_string(),
            max_tokens: config.api_max_tokens(),
            instruction: config.instruction().to_string(),
            timeout_ms,
        })
    }

    /// Sniff the payload's container format for the data-URL MIME type.
    /// Pass-through only - the image is never decoded or modified.
    fn sniff_mime(image: &[u8]) -> Result<&'static str, ServiceError> {
        match image::guess_format(image) {
            Ok(image::ImageFormat::Png) => Ok("image/png"),
            Ok(image::ImageFormat::Jpeg) => Ok("image/jpeg"),
            Ok(image::ImageFormat::WebP) => Ok("image/webp"),
            Ok(other) => {
                Err(ServiceError::UnsupportedImage(format!("{:?} is not a supported format", other)))
            }
            Err(_) => Err(ServiceError::UnsupportedImage(
                "payload is not a recognizable image".to_string(),
            )),
        }
    }

    fn map_request_error(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.timeout_ms)
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ExtractNames for VisionExtractor {
    async fn extract_names(&self, image: &[u8], api_key: &str) -> Result<String, ServiceError> {
        if api_key.trim().is_empty() {
            return Err(ServiceError::MissingCredential);
        }
        let mime = Self::sniff_mime(image)?;
        let image_base64 = STANDARD.encode(image);

        let request = ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: &self.instruction },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{};base64,{}", mime, image_base64),
                        },
                    },
                ],
            }],
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let detail: String =
                response.text().await.unwrap_or_default().chars().take(ERROR_BODY_LIMIT).collect();
            error!(
                status = %status.as_u16(),
                latency_ms = %latency_ms,
                "extraction_request_failed"
            );
            return Err(match status.as_u16() {
                401 | 403 => ServiceError::Auth(status.as_u16()),
                429 => ServiceError::RateLimited,
                code => ServiceError::Api { status: code, detail },
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        let raw_text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::MalformedResponse("response has no content".to_string()))?;

        info!(
            latency_ms = %latency_ms,
            image_bytes = %image.len(),
            reply_bytes = %raw_text.len(),
            model = %self.model,
            "extraction_completed"
        );

        Ok(raw_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal valid 1x1 PNG header bytes (signature + IHDR chunk start)
    const PNG_MAGIC: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    #[test]
    fn test_sniff_mime_png() {
        assert_eq!(VisionExtractor::sniff_mime(PNG_MAGIC).unwrap(), "image/png");
    }

    #[test]
    fn test_sniff_mime_jpeg() {
        assert_eq!(VisionExtractor::sniff_mime(JPEG_MAGIC).unwrap(), "image/jpeg");
    }

    #[test]
    fn test_sniff_mime_rejects_text() {
        let err = VisionExtractor::sniff_mime(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedImage(_)));
    }

    #[test]
    fn test_request_serializes_to_vendor_schema() {
        let request = ChatRequest {
            model: "gpt-4o",
            max_tokens: 1000,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: "extract names" },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: "data:image/png;base64,AAAA".to_string() },
                    },
                ],
            }],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_response_parses_first_choice() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Alice\nBob"}}]}"#,
        )
        .unwrap();
        let content = parsed.choices.into_iter().next().unwrap().message.content.unwrap();
        assert_eq!(content, "Alice\nBob");
    }

    #[tokio::test]
    async fn test_missing_credential_rejected_before_network() {
        let config = Config::default();
        let extractor = VisionExtractor::new(&config).unwrap();
        let err = extractor.extract_names(PNG_MAGIC, "  ").await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingCredential));
    }
}
