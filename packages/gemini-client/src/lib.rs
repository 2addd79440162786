//! Pure Gemini REST API client
//!
//! A minimal client for the Gemini `generateContent` endpoint with image output.
//! No domain-specific logic: callers supply the prompt, model and aspect ratio.
//!
//! # Example
//!
//! ```rust,ignore
//! use gemini_client::GeminiClient;
//!
//! let client = GeminiClient::new(api_key);
//!
//! let image = client
//!     .generate_image("A newspaper on a desk", "gemini-3-pro-image-preview", "16:9")
//!     .await?;
//! std::fs::write("out.png", &image.data)?;
//! ```
//!
//! The model may answer with explanatory text alongside the image (or instead
//! of it, e.g. on a safety refusal). Text parts are logged and ignored; only a
//! response without any inline image data is an error.

pub mod error;
pub mod types;

pub use error::{GeminiError, Result};
pub use types::*;

use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{header, Client};
use tracing::{debug, error, info};

/// Public Gemini models endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Image generation with search grounding is slow; allow two minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// MIME type assumed when an inline image part omits it.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Pure Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiClient {
    /// Create a new Gemini client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom base URL (proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `generateContent` URL for a model. The model id is path-escaped.
    pub fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(model)
        )
    }

    /// Generate an image from a prompt.
    ///
    /// Sends a single POST with text+image modalities and Google Search
    /// grounding enabled, then returns the first inline image in the first
    /// candidate.
    pub async fn generate_image(
        &self,
        prompt: &str,
        model: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedImage> {
        if self.api_key.trim().is_empty() {
            return Err(GeminiError::Config("Gemini API key is empty".into()));
        }

        let request = GenerateContentRequest::image(prompt, aspect_ratio);
        let body = self.generate_content(model, &request).await?;

        parse_image_response(&body)
    }

    /// POST a `generateContent` request and return the raw success body.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<String> {
        let url = self.endpoint(model);
        debug!(url = %url, model = %model, "Gemini request");

        let start = Instant::now();

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "Gemini request failed"
                );
                GeminiError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(error = %e, status = %status, "Failed to read Gemini response body");
            GeminiError::Transport(e.to_string())
        })?;

        info!(
            status = status.as_u16(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            body_len = body.len(),
            "Gemini response"
        );

        if !status.is_success() {
            error!(
                status = status.as_u16(),
                body = %truncate_chars(&body, 1000),
                "Gemini API error response"
            );
            return Err(GeminiError::Http {
                status: status.as_u16(),
                body: truncate_chars(&body, 500).to_string(),
            });
        }

        Ok(body)
    }
}

/// Extract the first inline image from a `generateContent` response body.
///
/// Text parts are logged; the first part carrying inline data wins.
pub fn parse_image_response(body: &str) -> Result<GeneratedImage> {
    let response: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "Gemini response JSON decode failed");
        GeminiError::Decode(format!("Failed to decode Gemini response: {}", e))
    })?;

    let parts = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.as_slice())
        .unwrap_or_default();

    debug!(parts = parts.len(), "Gemini response parts");

    let mut image = None;
    for (index, part) in parts.iter().enumerate() {
        if let Some(text) = &part.text {
            debug!(
                part = index,
                chars = text.chars().count(),
                text = %truncate_chars(text, 500),
                "Gemini text part"
            );
        }

        let Some(inline) = &part.inline_data else {
            continue;
        };
        let Some(data) = inline.data.as_deref() else {
            continue;
        };

        debug!(
            part = index,
            mime_type = inline.mime_type.as_deref().unwrap_or("unknown"),
            base64_chars = data.len(),
            "Gemini image part"
        );

        if image.is_none() {
            image = Some((inline.mime_type.clone(), data));
        }
    }

    let Some((mime_type, data)) = image else {
        log_missing_image(&response);
        return Err(GeminiError::NoImage);
    };

    let data = STANDARD.decode(data.trim()).map_err(|e| {
        error!(error = %e, "Gemini image payload is not valid base64");
        GeminiError::Decode(format!("Failed to decode base64 image data: {}", e))
    })?;

    Ok(GeneratedImage {
        data,
        mime_type: mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
    })
}

/// Log whatever diagnostics the provider sent when no image came back.
fn log_missing_image(response: &GenerateContentResponse) {
    error!(
        candidates = response.candidates.len(),
        "No image in Gemini response"
    );

    if let Some(candidate) = response.candidates.first() {
        if let Some(reason) = &candidate.finish_reason {
            error!(finish_reason = %reason, "Gemini finishReason");
        }
        if let Some(message) = &candidate.finish_message {
            error!(finish_message = %message, "Gemini finishMessage");
        }
        if candidate.content.is_none() {
            error!("Gemini candidate has no content");
        }
    }

    if let Some(feedback) = &response.prompt_feedback {
        error!(prompt_feedback = %feedback, "Gemini promptFeedback");
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
