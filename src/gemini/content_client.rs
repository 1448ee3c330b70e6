use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    config::GeminiConfig,
    error::{Result, StudioError},
    gemini::{GenerativeBackend, UpstreamOutput, UpstreamRequest},
    logger,
    models::{
        gemini::{
            ApiErrorBody, Content, GenerateContentRequest, GenerateContentResponse,
            GenerationConfig, Part,
        },
        GeneratedImage,
    },
};

/// Transient failures are retried once, after this pause.
const MAX_RETRIES: u32 = 1;
const RETRY_DELAY: Duration = Duration::from_millis(500);

const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "IMAGE_PROHIBITED_CONTENT",
    "PROHIBITED_CONTENT",
    "RECITATION",
    "IMAGE_RECITATION",
    "BLOCKLIST",
    "SPII",
];

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StudioError::ConfigurationError(format!("HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    fn api_key(&self) -> Result<&str> {
        self.config.api_key().ok_or_else(|| {
            StudioError::ConfigurationError("GEMINI_API_KEY or GOOGLE_API_KEY is not set".into())
        })
    }

    pub fn build_body(request: &UpstreamRequest) -> GenerateContentRequest {
        let mut parts: Vec<Part> = request
            .images
            .iter()
            .map(|image| Part::inline(image.format.mime_type(), STANDARD.encode(&image.data)))
            .collect();
        parts.push(Part::text(request.prompt.clone()));

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: request.modalities.clone(),
                temperature: request.temperature,
            },
        }
    }

    async fn call_once(&self, api_key: &str, body: &GenerateContentRequest) -> Result<UpstreamOutput> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &text));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        parse_response(parsed)
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    fn ensure_configured(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    async fn generate(&self, request: &UpstreamRequest) -> Result<UpstreamOutput> {
        let api_key = self.api_key()?;
        let body = Self::build_body(request);

        log::info!(
            "🎨 Calling {} with {} image(s)",
            self.config.model,
            request.images.len()
        );
        let _timer = logger::timer("Gemini generateContent");

        let mut attempt = 0;
        loop {
            match self.call_once(api_key, &body).await {
                Ok(output) => {
                    log::debug!(
                        "Gemini returned {} image(s) and {} chars of text",
                        output.images.len(),
                        output.text.len()
                    );
                    return Ok(output);
                }
                Err(StudioError::UpstreamUnavailable(reason)) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    log::warn!(
                        "⚠️  Gemini unavailable ({}), retry {}/{} in {}ms",
                        reason,
                        attempt,
                        MAX_RETRIES,
                        RETRY_DELAY.as_millis()
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    log::error!("❌ Gemini call failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

/// Maps a non-2xx upstream answer to the local error taxonomy.
pub fn classify_status(status: u16, body: &str) -> StudioError {
    let (api_status, message) = match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => (parsed.error.status, parsed.error.message),
        Err(_) => (String::new(), body.to_string()),
    };
    let message = truncate(message.trim(), 300);
    let detail = format!("HTTP {} {}: {}", status, api_status, message);

    if status == 429 || api_status == "RESOURCE_EXHAUSTED" {
        return StudioError::UpstreamQuotaExceeded(detail);
    }
    if status == 401
        || status == 403
        || message.contains("API_KEY_INVALID")
        || message.contains("API key not valid")
    {
        return StudioError::ConfigurationError(format!("Gemini rejected the API key ({})", detail));
    }
    if matches!(status, 500 | 502 | 503 | 504) {
        return StudioError::UpstreamUnavailable(detail);
    }
    StudioError::UpstreamInvalidResponse(detail)
}

/// Collects images and text from the first candidate.
pub fn parse_response(response: GenerateContentResponse) -> Result<UpstreamOutput> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(StudioError::UpstreamInvalidResponse(format!(
            "prompt blocked: {}",
            reason
        )));
    }

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        StudioError::UpstreamInvalidResponse("no candidates in response".into())
    })?;

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    if parts.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        let msg = if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) {
            format!("content blocked: {}", reason)
        } else {
            format!("empty content (finish reason {})", reason)
        };
        return Err(StudioError::UpstreamInvalidResponse(msg));
    }

    let mut output = UpstreamOutput::default();
    for part in parts {
        if part.thought.unwrap_or(false) {
            continue;
        }
        if let Some(inline) = part.inline_data {
            if inline.data.is_empty() {
                continue;
            }
            let data = STANDARD.decode(inline.data.as_bytes()).map_err(|e| {
                StudioError::UpstreamInvalidResponse(format!("invalid base64 image: {}", e))
            })?;
            if !data.is_empty() {
                output.images.push(GeneratedImage::new(data, inline.mime_type));
            }
        } else if let Some(text) = part.text {
            output.text.push_str(&text);
        }
    }

    if output.images.is_empty() && output.text.trim().is_empty() {
        return Err(StudioError::UpstreamInvalidResponse(
            "response carried neither images nor text".into(),
        ));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageFormat, ImagePart, ResponseModality};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// How the local Gemini stand-in answers every request.
    #[derive(Clone, Copy)]
    enum Upstream {
        Reply(u16, &'static str),
        Stall,
    }

    /// Starts an HTTP/1.1 listener on a free port and counts the requests it receives.
    async fn serve(behaviour: Upstream) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let counter = counter.clone();
                tokio::spawn(async move {
                    if read_request(&mut socket).await.is_err() {
                        return;
                    }
                    counter.fetch_add(1, Ordering::SeqCst);
                    match behaviour {
                        Upstream::Reply(status, body) => {
                            let response = format!(
                                "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                                status,
                                body.len(),
                                body
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                        Upstream::Stall => tokio::time::sleep(Duration::from_secs(30)).await,
                    }
                });
            }
        });

        (format!("http://{}", addr), hits)
    }

    async fn read_request(socket: &mut TcpStream) -> std::io::Result<()> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return Ok(());
                }
            }
        }
    }

    fn client_for(base_url: &str, timeout: Duration) -> GeminiClient {
        GeminiClient::new(
            GeminiConfig::new()
                .with_api_key("test-key")
                .with_base_url(base_url)
                .with_timeout(timeout),
        )
        .unwrap()
    }

    fn text_request() -> UpstreamRequest {
        UpstreamRequest {
            prompt: "x".into(),
            images: vec![],
            modalities: vec![ResponseModality::Text],
            temperature: None,
        }
    }

    fn response(json: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_body_puts_images_before_prompt() {
        let request = UpstreamRequest {
            prompt: "combine".into(),
            images: vec![ImagePart {
                filename: "man.jpeg".into(),
                format: ImageFormat::Jpeg,
                data: vec![1, 2, 3],
            }],
            modalities: vec![ResponseModality::Image, ResponseModality::Text],
            temperature: None,
        };
        let body = serde_json::to_value(GeminiClient::build_body(&request)).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "AQID");
        assert_eq!(parts[1]["text"], "combine");
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
        assert!(body["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn test_parse_images_and_text() {
        let parsed = parse_response(response(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "Here you go. "},
                    {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}},
                    {"text": "Enjoy."}
                ]},
                "finishReason": "STOP"
            }]
        })))
        .unwrap();
        assert_eq!(parsed.images.len(), 1);
        assert_eq!(parsed.images[0].mime_type, "image/png");
        assert_eq!(parsed.images[0].data[..4], [0x89, b'P', b'N', b'G']);
        assert_eq!(parsed.text, "Here you go. Enjoy.");
    }

    #[test]
    fn test_parse_skips_thoughts() {
        let parsed = parse_response(response(serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"text": "thinking...", "thought": true},
                {"text": "{\"torso_detected\": true}"}
            ]}}]
        })))
        .unwrap();
        assert_eq!(parsed.text, "{\"torso_detected\": true}");
    }

    #[test]
    fn test_parse_failures() {
        let empty = parse_response(response(serde_json::json!({})));
        assert!(matches!(empty, Err(StudioError::UpstreamInvalidResponse(_))));

        let blocked = parse_response(response(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })));
        assert!(matches!(blocked, Err(StudioError::UpstreamInvalidResponse(m)) if m.contains("SAFETY")));

        let safety = parse_response(response(serde_json::json!({
            "candidates": [{"finishReason": "IMAGE_SAFETY"}]
        })));
        assert!(matches!(safety, Err(StudioError::UpstreamInvalidResponse(m)) if m.contains("content blocked")));

        let bad_b64 = parse_response(response(serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "***"}}
            ]}}]
        })));
        assert!(matches!(bad_b64, Err(StudioError::UpstreamInvalidResponse(_))));
    }

    #[test]
    fn test_classify_status() {
        let quota = classify_status(
            429,
            r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(quota, StudioError::UpstreamQuotaExceeded(_)));

        assert!(matches!(
            classify_status(503, "overloaded"),
            StudioError::UpstreamUnavailable(_)
        ));
        assert!(matches!(
            classify_status(403, "{}"),
            StudioError::ConfigurationError(_)
        ));
        assert!(matches!(
            classify_status(
                400,
                r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}"#
            ),
            StudioError::ConfigurationError(_)
        ));
        assert!(matches!(
            classify_status(400, r#"{"error": {"code": 400, "message": "Unable to process input image", "status": "INVALID_ARGUMENT"}}"#),
            StudioError::UpstreamInvalidResponse(m) if m.contains("Unable to process input image")
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = GeminiClient::new(GeminiConfig::new()).unwrap();
        assert!(matches!(
            client.ensure_configured(),
            Err(StudioError::ConfigurationError(_))
        ));
        let request = UpstreamRequest {
            prompt: "x".into(),
            images: vec![],
            modalities: vec![ResponseModality::Text],
            temperature: None,
        };
        assert!(matches!(
            client.generate(&request).await,
            Err(StudioError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        let config = GeminiConfig::new()
            .with_api_key("test-key")
            .with_base_url("http://127.0.0.1:1")
            .with_timeout(Duration::from_secs(2));
        let client = GeminiClient::new(config).unwrap();
        let request = UpstreamRequest {
            prompt: "x".into(),
            images: vec![],
            modalities: vec![ResponseModality::Text],
            temperature: None,
        };
        assert!(matches!(
            client.generate(&request).await,
            Err(StudioError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_is_retried_once_after_delay() {
        let (url, hits) = serve(Upstream::Reply(503, r#"{"error": {"code": 503, "message": "overloaded", "status": "UNAVAILABLE"}}"#)).await;
        let client = client_for(&url, Duration::from_secs(5));

        let started = Instant::now();
        let result = client.generate(&text_request()).await;

        assert!(matches!(result, Err(StudioError::UpstreamUnavailable(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_quota_is_not_retried() {
        let (url, hits) = serve(Upstream::Reply(429, r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#)).await;
        let client = client_for(&url, Duration::from_secs(5));

        let result = client.generate(&text_request()).await;

        assert!(matches!(result, Err(StudioError::UpstreamQuotaExceeded(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_response_is_not_retried() {
        let (url, hits) = serve(Upstream::Reply(200, "not json")).await;
        let client = client_for(&url, Duration::from_secs(5));

        let result = client.generate(&text_request()).await;

        assert!(matches!(result, Err(StudioError::UpstreamInvalidResponse(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_successful_call_reaches_stub() {
        let (url, hits) = serve(Upstream::Reply(200, r#"{"candidates": [{"content": {"parts": [{"text": "ok"}]}}]}"#)).await;
        let client = client_for(&url, Duration::from_secs(5));

        let output = client.generate(&text_request()).await.unwrap();

        assert_eq!(output.text, "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stalled_upstream_times_out_as_unavailable() {
        let (url, hits) = serve(Upstream::Stall).await;
        let client = client_for(&url, Duration::from_secs(1));

        let result = client.generate(&text_request()).await;

        assert!(matches!(result, Err(StudioError::UpstreamUnavailable(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
