//! Vision-LLM label reader.
//!
//! Sends the photo to a hosted multimodal model with a fixed field-extraction
//! prompt and maps the JSON reply onto the same `ScanResult` the OCR path
//! produces. The HTTP client sits behind `VisionClient` so the reader can be
//! tested with scripted replies.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::types::{DeviceRecord, ScanResult, ShippingRecord};
use super::ScanError;
use crate::pipeline::fields::detect_carrier;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Vision model API rate limit hit")]
    RateLimited,

    #[error("Vision model API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Could not parse vision model response: {0}")]
    ResponseParsing(String),

    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
}

// ──────────────────────────────────────────────
// Client abstraction
// ──────────────────────────────────────────────

/// A multimodal model that answers with a JSON document.
pub trait VisionClient: Send + Sync {
    /// Returns the model's raw text reply, expected to be JSON.
    fn generate_json(
        &self,
        prompt: &str,
        image_base64: &str,
        mime_type: &str,
    ) -> Result<String, VisionError>;
}

// ──────────────────────────────────────────────
// Gemini
// ──────────────────────────────────────────────

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini `generateContent` over blocking HTTP.
/// Call only from blocking contexts (`spawn_blocking`).
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, VisionError> {
        if api_key.trim().is_empty() {
            return Err(VisionError::MissingApiKey);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| VisionError::Network(e.to_string()))?;

        Ok(Self {
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    /// Point at a different endpoint (proxies, local stubs).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn build_request<'a>(
    prompt: &'a str,
    image_base64: &'a str,
    mime_type: &'a str,
) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text { text: prompt },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type,
                        data: image_base64,
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            temperature: 0.1,
        },
    }
}

/// Text of the first part of the first candidate.
fn parse_response_text(body: &str) -> Result<String, VisionError> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| VisionError::ResponseParsing(e.to_string()))?;
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| VisionError::ResponseParsing("response has no text candidate".into()))
}

impl VisionClient for GeminiClient {
    fn generate_json(
        &self,
        prompt: &str,
        image_base64: &str,
        mime_type: &str,
    ) -> Result<String, VisionError> {
        let body = build_request(prompt, image_base64, mime_type);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    VisionError::Timeout(self.timeout_secs)
                } else {
                    VisionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(VisionError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(VisionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .map_err(|e| VisionError::ResponseParsing(e.to_string()))?;
        parse_response_text(&text)
    }
}

// ──────────────────────────────────────────────
// Retry policy
// ──────────────────────────────────────────────

/// Exponential backoff for rate-limited calls: `base_delay * 2^attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Zero-delay policy for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

// ──────────────────────────────────────────────
// Label reader
// ──────────────────────────────────────────────

const LABEL_PROMPT: &str = "\
Extract the following fields from this shipping label or device sticker image. \
Return a single JSON object with exactly these keys, using null for any field \
that is not visible:\n\
- tracking_number: the parcel tracking number\n\
- carrier: the shipping carrier (UPS, USPS, FedEx, DHL, Amazon Logistics)\n\
- recipient_name: the person the parcel is addressed to\n\
- street_address: the recipient street line, including apartment or suite\n\
- city: the recipient city\n\
- state: the two-letter recipient state code\n\
- zip: the recipient ZIP code\n\
- imei: the 15-digit device IMEI\n\
- model: the device model name, e.g. iPhone 14 Pro\n\
- storage: the storage capacity, e.g. 128GB\n\
- color: the device color\n\
Only report text you can actually read on the image.";

/// Reads a label photo through a `VisionClient` and maps the reply.
pub struct VisionLabelReader {
    client: Arc<dyn VisionClient>,
    retry: RetryPolicy,
}

impl VisionLabelReader {
    pub fn new(client: Arc<dyn VisionClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn read_label(&self, image_bytes: &[u8]) -> Result<ScanResult, ScanError> {
        let mime_type = detect_mime_type(image_bytes);
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let start = std::time::Instant::now();

        let reply = self.generate_with_retry(&image_base64, mime_type)?;
        let result = map_reply(&reply)?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            reply_len = reply.len(),
            "Vision model reply mapped"
        );
        Ok(result)
    }

    fn generate_with_retry(&self, image_base64: &str, mime_type: &str) -> Result<String, VisionError> {
        let mut attempt = 0;
        loop {
            match self.client.generate_json(LABEL_PROMPT, image_base64, mime_type) {
                Err(VisionError::RateLimited) if attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Vision model rate limited, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Map the model's JSON reply onto the result records.
///
/// An array reply uses its first element. Values may come back as strings or
/// numbers; `null`, empty strings and the literal "null" count as absent.
fn map_reply(reply: &str) -> Result<ScanResult, VisionError> {
    let parsed: Value =
        serde_json::from_str(reply).map_err(|e| VisionError::ResponseParsing(e.to_string()))?;
    let object = match parsed {
        Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
        other => other,
    };
    if !object.is_object() && !object.is_null() {
        return Err(VisionError::ResponseParsing(
            "expected a JSON object".into(),
        ));
    }

    let tracking_number = field(&object, "tracking_number")
        .map(|t| t.replace([' ', '-'], ""))
        .filter(|t| !t.is_empty());
    let carrier = field(&object, "carrier").or_else(|| {
        tracking_number
            .as_deref()
            .and_then(detect_carrier)
            .filter(|c| *c != "Unknown")
            .map(str::to_string)
    });

    Ok(ScanResult {
        device: DeviceRecord {
            imei: field(&object, "imei"),
            model: field(&object, "model"),
            storage: field(&object, "storage"),
            color: field(&object, "color"),
            ..Default::default()
        },
        shipping: ShippingRecord {
            tracking_number,
            carrier,
            recipient_name: field(&object, "recipient_name"),
            street_address: field(&object, "street_address"),
            city: field(&object, "city"),
            state: field(&object, "state"),
            zip: field(&object, "zip"),
            ..Default::default()
        },
        raw_text: reply.to_string(),
    })
}

fn field(object: &Value, key: &str) -> Option<String> {
    let text = match object.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(text)
    }
}

/// MIME type from magic bytes. Unknown formats are sent as JPEG.
fn detect_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 8 && bytes[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        "image/png"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        match &bytes[8..12] {
            b"heic" | b"heix" | b"heim" | b"heis" | b"hevc" | b"hevx" => "image/heic",
            b"mif1" | b"msf1" => "image/heif",
            _ => "image/jpeg",
        }
    } else {
        "image/jpeg"
    }
}

// ──────────────────────────────────────────────
// Mock
// ──────────────────────────────────────────────

/// Scripted `VisionClient` for tests. Replies are consumed in order; an
/// exhausted script answers with a parse error.
pub struct MockVisionClient {
    replies: Mutex<VecDeque<Result<String, VisionError>>>,
    calls: Mutex<u32>,
}

impl MockVisionClient {
    pub fn new(replies: Vec<Result<String, VisionError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        }
    }

    /// Always answers with `reply`.
    pub fn replying(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn call_count(&self) -> u32 {
        self.calls.lock().map(|c| *c).unwrap_or(0)
    }
}

impl VisionClient for MockVisionClient {
    fn generate_json(
        &self,
        _prompt: &str,
        _image_base64: &str,
        _mime_type: &str,
    ) -> Result<String, VisionError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        self.replies
            .lock()
            .map_err(|_| VisionError::ResponseParsing("mock script poisoned".into()))?
            .pop_front()
            .unwrap_or_else(|| Err(VisionError::ResponseParsing("no scripted reply".into())))
    }
}
