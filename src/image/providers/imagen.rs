//! Imagen (Google) image generation provider.

use crate::error::{parse_retry_after, sanitize_error_message, GenStudioError, Result};
use crate::image::provider::ImageGenerator;
use crate::image::types::{GenerationRequest, ImageFormat, ImagePayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default base URL of the Generative Language API.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Imagen model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImagenModel {
    /// Imagen 4 (balanced quality and speed).
    #[default]
    Imagen4,
    /// Imagen 4 Fast (lower latency).
    Imagen4Fast,
    /// Imagen 4 Ultra (highest quality).
    Imagen4Ultra,
}

impl ImagenModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imagen4 => "imagen-4.0-generate-001",
            Self::Imagen4Fast => "imagen-4.0-fast-generate-001",
            Self::Imagen4Ultra => "imagen-4.0-ultra-generate-001",
        }
    }
}

impl std::str::FromStr for ImagenModel {
    type Err = GenStudioError;

    fn from_str(s: &str) -> Result<Self> {
        [Self::Imagen4, Self::Imagen4Fast, Self::Imagen4Ultra]
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| GenStudioError::InvalidRequest(format!("unknown Imagen model: {s}")))
    }
}

/// Builder for ImagenProvider.
#[derive(Debug, Clone, Default)]
pub struct ImagenProviderBuilder {
    api_key: Option<String>,
    model: ImagenModel,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl ImagenProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Imagen model variant.
    pub fn model(mut self, model: ImagenModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Bounds each request. Without it, requests wait indefinitely.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<ImagenProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .or_else(|| std::env::var("API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                GenStudioError::Auth("GOOGLE_API_KEY not set and no API key provided".into())
            })?;

        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }

        Ok(ImagenProvider {
            client: client.build()?,
            api_key,
            model: self.model,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: self.timeout,
        })
    }
}

/// Imagen image generation provider.
pub struct ImagenProvider {
    client: reqwest::Client,
    api_key: String,
    model: ImagenModel,
    base_url: String,
    timeout: Option<Duration>,
}

impl ImagenProvider {
    /// Creates a new `ImagenProviderBuilder`.
    pub fn builder() -> ImagenProviderBuilder {
        ImagenProviderBuilder::new()
    }

    /// Returns the model this provider calls.
    pub fn model(&self) -> ImagenModel {
        self.model
    }

    fn transport_error(&self, err: reqwest::Error) -> GenStudioError {
        match self.timeout {
            Some(timeout) if err.is_timeout() => GenStudioError::Timeout(timeout),
            _ => GenStudioError::Network(err),
        }
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> GenStudioError {
        let text = sanitize_error_message(text);
        if status == 402 {
            return GenStudioError::Billing(
                "Imagen requires billing: enable it at https://aistudio.google.com".into(),
            );
        }
        if status == 404 {
            return GenStudioError::InvalidRequest(format!(
                "Model {} not found. Verify the model name is correct.",
                self.model.as_str()
            ));
        }
        if status == 429 {
            let retry_after = parse_retry_after(headers).map(Duration::from_secs);
            return GenStudioError::RateLimited {
                retry_after,
                message: text,
            };
        }
        if status == 401 || status == 403 {
            return GenStudioError::Auth(text);
        }
        let lower = text.to_lowercase();
        if lower.contains("safety")
            || lower.contains("blocked")
            || lower.contains("responsible ai")
            || lower.contains("prohibited")
        {
            return GenStudioError::ContentBlocked(text);
        }
        GenStudioError::Api {
            status,
            message: text,
        }
    }
}

#[async_trait]
impl ImageGenerator for ImagenProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<ImagePayload> {
        let start = Instant::now();
        let url = format!("{}/models/{}:predict", self.base_url, self.model.as_str());
        let body = ImagenRequest::from_generation_request(request);

        tracing::debug!(
            model = self.model.as_str(),
            aspect_ratio = %request.aspect_ratio,
            "submitting Imagen generation request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let imagen_response: ImagenResponse =
            response.json().await.map_err(|e| self.transport_error(e))?;
        let payload = imagen_response.into_payload()?;

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Imagen generation complete"
        );
        Ok(payload)
    }

    fn name(&self) -> &str {
        "Imagen (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        match response.status().as_u16() {
            401 | 403 => Err(GenStudioError::Auth("Invalid API key".into())),
            404 => Err(GenStudioError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(GenStudioError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
struct ImagenRequest {
    instances: Vec<ImagenInstance>,
    parameters: ImagenParameters,
}

#[derive(Debug, Serialize)]
struct ImagenInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenParameters {
    sample_count: u32,
    aspect_ratio: String,
    output_mime_type: String,
}

impl ImagenRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        Self {
            instances: vec![ImagenInstance {
                prompt: req.prompt.clone(),
            }],
            parameters: ImagenParameters {
                sample_count: 1,
                aspect_ratio: req.aspect_ratio.as_str().to_string(),
                output_mime_type: req.format.mime_type().to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImagenResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagenPrediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    rai_filtered_reason: Option<String>,
}

impl ImagenResponse {
    fn into_payload(self) -> Result<ImagePayload> {
        let prediction = self.predictions.into_iter().next().ok_or_else(|| {
            GenStudioError::ContentBlocked(
                "No image was returned. The prompt may have been filtered by safety settings."
                    .into(),
            )
        })?;

        if let Some(reason) = prediction.rai_filtered_reason {
            return Err(GenStudioError::ContentBlocked(reason));
        }

        let data = prediction
            .bytes_base64_encoded
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                GenStudioError::UnexpectedResponse("No image data in Imagen response".into())
            })?;

        let mime_type = prediction
            .mime_type
            .as_deref()
            .and_then(ImageFormat::from_mime_type)
            .unwrap_or_default()
            .mime_type();

        Ok(ImagePayload::from_base64(mime_type, &data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::types::{AspectRatio, ImageCategory, ImageSize};

    fn provider() -> ImagenProvider {
        ImagenProviderBuilder::new().api_key("test-key").build().unwrap()
    }

    #[test]
    fn test_imagen_model_as_str() {
        assert_eq!(ImagenModel::Imagen4.as_str(), "imagen-4.0-generate-001");
        assert_eq!(
            ImagenModel::Imagen4Fast.as_str(),
            "imagen-4.0-fast-generate-001"
        );
        assert_eq!(ImagenModel::default(), ImagenModel::Imagen4);
        assert_eq!(
            "imagen-4.0-ultra-generate-001".parse::<ImagenModel>().unwrap(),
            ImagenModel::Imagen4Ultra
        );
        assert!("dall-e-3".parse::<ImagenModel>().is_err());
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = ImagenProviderBuilder::new()
            .api_key("test-key")
            .model(ImagenModel::Imagen4Fast)
            .base_url("http://localhost:9999/v1beta/")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(provider.model(), ImagenModel::Imagen4Fast);
        assert_eq!(provider.base_url, "http://localhost:9999/v1beta");
        assert_eq!(provider.name(), "Imagen (Google)");
    }

    #[test]
    fn test_request_construction() {
        let req =
            GenerationRequest::for_submission("a red fox", ImageSize::Banner, ImageCategory::Nature);
        let body = ImagenRequest::from_generation_request(&req);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(
            json["instances"][0]["prompt"],
            "Nature style: a red fox, high quality, detailed"
        );
        assert_eq!(json["parameters"]["sampleCount"], 1);
        assert_eq!(json["parameters"]["aspectRatio"], "16:9");
        assert_eq!(json["parameters"]["outputMimeType"], "image/jpeg");
    }

    #[test]
    fn test_request_square_ratio() {
        let req = GenerationRequest::new("a cube", AspectRatio::Square);
        let body = ImagenRequest::from_generation_request(&req);
        assert_eq!(body.parameters.aspect_ratio, "1:1");
    }

    #[test]
    fn test_response_becomes_data_url() {
        let json = r#"{
            "predictions": [{
                "bytesBase64Encoded": "/9j/4AAQ",
                "mimeType": "image/jpeg"
            }]
        }"#;
        let resp: ImagenResponse = serde_json::from_str(json).unwrap();
        let payload = resp.into_payload().unwrap();
        assert_eq!(payload.as_str(), "data:image/jpeg;base64,/9j/4AAQ");
    }

    #[test]
    fn test_response_without_predictions_is_blocked() {
        let resp: ImagenResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            resp.into_payload(),
            Err(GenStudioError::ContentBlocked(_))
        ));
    }

    #[test]
    fn test_response_with_filter_reason() {
        let json = r#"{
            "predictions": [{
                "raiFilteredReason": "The prompt violates usage guidelines."
            }]
        }"#;
        let resp: ImagenResponse = serde_json::from_str(json).unwrap();
        match resp.into_payload() {
            Err(GenStudioError::ContentBlocked(reason)) => {
                assert_eq!(reason, "The prompt violates usage guidelines.")
            }
            other => panic!("expected content block, got {other:?}"),
        }
    }

    #[test]
    fn test_response_missing_bytes() {
        let json = r#"{"predictions": [{"mimeType": "image/png"}]}"#;
        let resp: ImagenResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            resp.into_payload(),
            Err(GenStudioError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_parse_error_statuses() {
        let provider = provider();
        let mut headers = reqwest::header::HeaderMap::new();

        assert!(matches!(
            provider.parse_error(401, "bad key", &headers),
            GenStudioError::Auth(_)
        ));
        assert!(matches!(
            provider.parse_error(402, "", &headers),
            GenStudioError::Billing(_)
        ));
        assert!(matches!(
            provider.parse_error(404, "", &headers),
            GenStudioError::InvalidRequest(_)
        ));

        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());
        match provider.parse_error(429, "quota exceeded", &headers) {
            GenStudioError::RateLimited {
                retry_after,
                message,
            } => {
                assert_eq!(retry_after, Some(Duration::from_secs(12)));
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn test_quota_error_reaches_the_user() {
        let provider = provider();
        let body = r#"{"error":{"code":429,"message":"Quota exceeded for aiplatform.googleapis.com","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = provider.parse_error(429, body, &reqwest::header::HeaderMap::new());

        assert!(matches!(
            err,
            GenStudioError::RateLimited {
                retry_after: None,
                ..
            }
        ));
        assert_eq!(
            err.user_message(),
            "Quota exceeded for aiplatform.googleapis.com"
        );
        assert!(!err.to_string().contains("None"));
    }

    #[test]
    fn test_parse_error_body() {
        let provider = provider();
        let headers = reqwest::header::HeaderMap::new();

        let body = r#"{"error": {"code": 400, "message": "Image generation blocked by safety filter"}}"#;
        assert!(matches!(
            provider.parse_error(400, body, &headers),
            GenStudioError::ContentBlocked(_)
        ));

        let body = r#"{"error": {"code": 500, "message": "Internal error"}}"#;
        match provider.parse_error(500, body, &headers) {
            GenStudioError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal error");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }
}
