// ============================================================================
// GENERATION CLIENT — the single external call behind every submission
// ============================================================================
//
// Two request families against the hosted service: a batch call that returns
// a list of generated images (text-to-image) and an edit call that returns
// one candidate which may or may not contain an inline image (image-to-image
// and draw-to-image). Both wire shapes are normalized here, at the
// orchestration boundary, into one `GenerationOutcome` so the UI never
// branches on response shape.
//
// This module is UI-free: the GUI runs it on a worker thread and joins over
// an mpsc channel; the headless CLI calls `run_request` directly.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::mpsc;
use std::time::Duration;

use crate::codec::{EncodedImage, OutputFormat};

pub const EDIT_MODEL: &str = "gemini-2.5-flash-image";
pub const BATCH_MODEL: &str = "imagen-4.0-fast-generate-001";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A fully-assembled submission, built on the GUI thread before the worker
/// spawns so the worker never touches session state.
pub enum GenerationRequest {
    /// Single call requesting `count` images at once (not `count` calls).
    Batch {
        prompt: String,
        count: u32,
        aspect_ratio: String,
        output_format: OutputFormat,
    },
    /// Single call carrying every source image, in order, plus the prompt.
    /// At most one output image is expected.
    Edit {
        prompt: String,
        images: Vec<EncodedImage>,
    },
}

/// The two wire shapes resolved into one result type.
pub enum GenerationOutcome {
    /// Uniform ordered list of displayable images.
    Images(Vec<EncodedImage>),
    /// Soft failure: the service answered but produced no image. Carries the
    /// service's own explanation when it sent one.
    NoImage { explanation: Option<String> },
}

#[derive(Debug)]
pub enum GenerateError {
    /// The request never completed (connection, TLS, timeout).
    Transport(String),
    /// The service answered with an error status.
    Service(String),
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateError::Transport(msg) | GenerateError::Service(msg) => write!(f, "{}", msg),
        }
    }
}

// ============================================================================
// Request payloads
// ============================================================================

pub fn build_edit_payload(prompt: &str, images: &[EncodedImage]) -> Value {
    let mut parts: Vec<Value> = images
        .iter()
        .map(|image| {
            json!({
                "inlineData": {
                    "mimeType": image.mime,
                    "data": BASE64.encode(&image.bytes),
                }
            })
        })
        .collect();
    parts.push(json!({ "text": prompt }));

    json!({
        "contents": [{
            "role": "user",
            "parts": parts,
        }]
    })
}

pub fn build_batch_payload(
    prompt: &str,
    count: u32,
    aspect_ratio: &str,
    output_format: OutputFormat,
) -> Value {
    json!({
        "instances": [{ "prompt": prompt }],
        "parameters": {
            "sampleCount": count.clamp(1, 4),
            "aspectRatio": aspect_ratio,
            "outputMimeType": output_format.mime(),
        }
    })
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Deserialize)]
struct EditResponse {
    #[serde(default)]
    candidates: Vec<EditCandidate>,
}

#[derive(Deserialize)]
struct EditCandidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentPart {
    #[serde(default, alias = "inline_data")]
    inline_data: Option<InlinePayload>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlinePayload {
    mime_type: Option<String>,
    data: String,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    predictions: Vec<BatchPrediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchPrediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

/// First inline image wins; any text parts become the soft-failure
/// explanation when no image arrives.
fn normalize_edit(response: EditResponse) -> Result<GenerationOutcome, GenerateError> {
    let mut explanation: Option<String> = None;

    for candidate in response.candidates {
        let Some(content) = candidate.content else {
            continue;
        };
        for part in content.parts {
            if let Some(inline) = part.inline_data {
                let bytes = BASE64
                    .decode(inline.data.as_bytes())
                    .map_err(|e| GenerateError::Service(format!("Bad image payload: {}", e)))?;
                let mime = inline.mime_type.unwrap_or_else(|| "image/png".to_string());
                return Ok(GenerationOutcome::Images(vec![EncodedImage::with_mime(
                    bytes, mime,
                )]));
            }
            if explanation.is_none()
                && let Some(text) = part.text
                && !text.trim().is_empty()
            {
                explanation = Some(text);
            }
        }
    }

    Ok(GenerationOutcome::NoImage { explanation })
}

fn normalize_batch(
    response: BatchResponse,
    output_format: OutputFormat,
) -> Result<GenerationOutcome, GenerateError> {
    let mut images = Vec::new();
    for prediction in response.predictions {
        let Some(data) = prediction.bytes_base64_encoded else {
            continue;
        };
        let bytes = BASE64
            .decode(data.as_bytes())
            .map_err(|e| GenerateError::Service(format!("Bad image payload: {}", e)))?;
        let mime = prediction
            .mime_type
            .unwrap_or_else(|| output_format.mime().to_string());
        images.push(EncodedImage::with_mime(bytes, mime));
    }

    if images.is_empty() {
        Ok(GenerationOutcome::NoImage { explanation: None })
    } else {
        Ok(GenerationOutcome::Images(images))
    }
}

/// Pull the human-readable message out of a structured error body, falling
/// back to the raw text.
fn extract_error_message(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body)
        && let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
    {
        return message.to_string();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("Request failed with status {}", status)
    } else {
        let mut snippet: String = trimmed.chars().take(200).collect();
        if snippet.len() < trimmed.len() {
            snippet.push('…');
        }
        format!("Request failed with status {}: {}", status, snippet)
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Perform the external call. Exactly one attempt — transport failures
/// surface to the user; there is no retry or backoff.
pub fn run_request(
    request: &GenerationRequest,
    api_key: &str,
) -> Result<GenerationOutcome, GenerateError> {
    let (endpoint, payload) = match request {
        GenerationRequest::Batch {
            prompt,
            count,
            aspect_ratio,
            output_format,
        } => (
            format!("{}/models/{}:predict", API_BASE, BATCH_MODEL),
            build_batch_payload(prompt, *count, aspect_ratio, *output_format),
        ),
        GenerationRequest::Edit { prompt, images } => (
            format!("{}/models/{}:generateContent", API_BASE, EDIT_MODEL),
            build_edit_payload(prompt, images),
        ),
    };

    let client = reqwest::blocking::Client::new();
    let response = client
        .post(&endpoint)
        .query(&[("key", api_key)])
        .timeout(REQUEST_TIMEOUT)
        .json(&payload)
        .send()
        .map_err(|e| GenerateError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|e| GenerateError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(GenerateError::Service(extract_error_message(&body, status)));
    }

    match request {
        GenerationRequest::Batch { output_format, .. } => {
            let parsed: BatchResponse = serde_json::from_str(&body)
                .map_err(|e| GenerateError::Service(format!("Unexpected response: {}", e)))?;
            normalize_batch(parsed, *output_format)
        }
        GenerationRequest::Edit { .. } => {
            let parsed: EditResponse = serde_json::from_str(&body)
                .map_err(|e| GenerateError::Service(format!("Unexpected response: {}", e)))?;
            normalize_edit(parsed)
        }
    }
}

/// Run the request on a background thread, reporting exactly once over the
/// channel. The GUI polls the receiving end each frame.
pub fn spawn_worker(
    request: GenerationRequest,
    api_key: String,
    sender: mpsc::Sender<Result<GenerationOutcome, GenerateError>>,
) {
    std::thread::spawn(move || {
        let outcome = run_request(&request, &api_key);
        let _ = sender.send(outcome);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_payload() -> EncodedImage {
        EncodedImage::with_mime(vec![9, 8, 7], "image/png".to_string())
    }

    #[test]
    fn edit_payload_orders_image_parts_before_the_prompt() {
        let images = vec![png_payload(), png_payload()];
        let payload = build_edit_payload("turn it green", &images);

        let parts = &payload["contents"][0]["parts"];
        assert_eq!(payload["contents"][0]["role"], "user");
        assert_eq!(parts.as_array().map(|p| p.len()), Some(3));
        assert!(parts[0]["inlineData"]["data"].is_string());
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert!(parts[1]["inlineData"].is_object());
        assert_eq!(parts[2]["text"], "turn it green");
    }

    #[test]
    fn batch_payload_carries_count_ratio_and_mime() {
        let payload = build_batch_payload("a fox", 4, "16:9", OutputFormat::Jpeg);
        assert_eq!(payload["instances"][0]["prompt"], "a fox");
        assert_eq!(payload["parameters"]["sampleCount"], 4);
        assert_eq!(payload["parameters"]["aspectRatio"], "16:9");
        assert_eq!(payload["parameters"]["outputMimeType"], "image/jpeg");
    }

    #[test]
    fn batch_payload_clamps_count_to_the_allowed_range() {
        let payload = build_batch_payload("a fox", 9, "1:1", OutputFormat::Png);
        assert_eq!(payload["parameters"]["sampleCount"], 4);
    }

    #[test]
    fn batch_of_four_normalizes_to_four_images_in_order() {
        let b64 = BASE64.encode([1u8, 2, 3]);
        let parsed: BatchResponse = serde_json::from_value(json!({
            "predictions": (0..4).map(|_| json!({
                "bytesBase64Encoded": b64,
                "mimeType": "image/png",
            })).collect::<Vec<_>>()
        }))
        .unwrap();

        match normalize_batch(parsed, OutputFormat::Png).unwrap() {
            GenerationOutcome::Images(images) => {
                assert_eq!(images.len(), 4);
                assert!(images.iter().all(|i| i.mime == "image/png"));
            }
            GenerationOutcome::NoImage { .. } => panic!("expected images"),
        }
    }

    #[test]
    fn empty_batch_is_a_soft_failure() {
        let parsed: BatchResponse = serde_json::from_value(json!({ "predictions": [] })).unwrap();
        match normalize_batch(parsed, OutputFormat::Png).unwrap() {
            GenerationOutcome::NoImage { explanation } => assert!(explanation.is_none()),
            GenerationOutcome::Images(_) => panic!("expected soft failure"),
        }
    }

    #[test]
    fn edit_response_without_image_surfaces_the_service_text() {
        let parsed: EditResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "I can't edit that image." }] }
            }]
        }))
        .unwrap();

        match normalize_edit(parsed).unwrap() {
            GenerationOutcome::NoImage { explanation } => {
                assert_eq!(explanation.as_deref(), Some("I can't edit that image."));
            }
            GenerationOutcome::Images(_) => panic!("expected soft failure"),
        }
    }

    #[test]
    fn edit_response_takes_the_first_inline_image() {
        let b64 = BASE64.encode([5u8, 6]);
        let parsed: EditResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/webp", "data": b64 } },
                    { "inlineData": { "mimeType": "image/png", "data": b64 } },
                ]}
            }]
        }))
        .unwrap();

        match normalize_edit(parsed).unwrap() {
            GenerationOutcome::Images(images) => {
                assert_eq!(images.len(), 1);
                assert_eq!(images[0].mime, "image/webp");
                assert_eq!(images[0].bytes, vec![5, 6]);
            }
            GenerationOutcome::NoImage { .. } => panic!("expected an image"),
        }
    }

    #[test]
    fn edit_response_accepts_snake_case_inline_data() {
        let b64 = BASE64.encode([1u8]);
        let parsed: EditResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [
                    { "inline_data": { "mime_type": "image/png", "data": b64 } },
                ]}
            }]
        }))
        .unwrap();
        assert!(matches!(
            normalize_edit(parsed).unwrap(),
            GenerationOutcome::Images(_)
        ));
    }

    #[test]
    fn structured_error_bodies_yield_their_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid."}}"#;
        let msg = extract_error_message(body, reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(msg, "API key not valid.");
    }

    #[test]
    fn unstructured_error_bodies_fall_back_to_status_and_text() {
        let msg = extract_error_message("gateway exploded", reqwest::StatusCode::BAD_GATEWAY);
        assert!(msg.contains("502"));
        assert!(msg.contains("gateway exploded"));
    }
}
