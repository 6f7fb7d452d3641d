//! Core types for image generation.

use crate::error::{GenStudioError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    #[default]
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Maps a MIME type back to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

}

/// Aspect ratios the generation service is asked for.
///
/// Only the ratios reachable from [`ImageSize::aspect_ratio`] exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square aspect ratio.
    #[serde(rename = "1:1")]
    Square,
    /// 16:9 landscape (widescreen) aspect ratio.
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Requested output dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageSize {
    /// 512x512 square.
    #[serde(rename = "512x512")]
    Small,
    /// 1024x1024 square.
    #[default]
    #[serde(rename = "1024x1024")]
    Medium,
    /// 1536x1536 square.
    #[serde(rename = "1536x1536")]
    Large,
    /// 1920x1080 widescreen banner.
    #[serde(rename = "1920x1080 (Banner)")]
    Banner,
}

impl ImageSize {
    /// Every size, in the order they are offered.
    pub const ALL: [ImageSize; 4] = [Self::Small, Self::Medium, Self::Large, Self::Banner];

    /// Returns the display and storage label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Small => "512x512",
            Self::Medium => "1024x1024",
            Self::Large => "1536x1536",
            Self::Banner => "1920x1080 (Banner)",
        }
    }

    /// Returns the aspect ratio the generation service is asked for.
    pub fn aspect_ratio(&self) -> AspectRatio {
        match self {
            Self::Small | Self::Medium | Self::Large => AspectRatio::Square,
            Self::Banner => AspectRatio::Landscape,
        }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ImageSize {
    type Err = GenStudioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|size| size.label() == s.trim())
            .ok_or_else(|| GenStudioError::InvalidRequest(format!("unknown image size: {s}")))
    }
}

/// Style tag applied to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageCategory {
    /// Neutral category; the prompt is sent as written.
    #[default]
    General,
    /// Landscapes, plants, outdoor scenes.
    Nature,
    /// Sci-fi and futurism.
    Futuristic,
    /// Fantasy art.
    Fantasy,
    /// Animal subjects.
    Animals,
    /// Gadgets and machinery.
    Technology,
}

impl ImageCategory {
    /// Every category, in the order they are offered.
    pub const ALL: [ImageCategory; 6] = [
        Self::General,
        Self::Nature,
        Self::Futuristic,
        Self::Fantasy,
        Self::Animals,
        Self::Technology,
    ];

    /// Returns the display and storage label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Nature => "Nature",
            Self::Futuristic => "Futuristic",
            Self::Fantasy => "Fantasy",
            Self::Animals => "Animals",
            Self::Technology => "Technology",
        }
    }

    /// Returns true for the neutral category.
    pub fn is_neutral(&self) -> bool {
        matches!(self, Self::General)
    }

    /// Builds the effective prompt sent to the generation service.
    pub fn decorate(&self, prompt: &str) -> String {
        if self.is_neutral() {
            prompt.to_string()
        } else {
            format!("{} style: {prompt}, high quality, detailed", self.label())
        }
    }
}

impl std::fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ImageCategory {
    type Err = GenStudioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GenStudioError::InvalidRequest(format!("unknown category: {s}")))
    }
}

/// A request sent to an [`ImageGenerator`](crate::image::ImageGenerator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The effective (possibly style-decorated) prompt.
    pub prompt: String,
    /// Aspect ratio to request.
    pub aspect_ratio: AspectRatio,
    /// Desired output format.
    pub format: ImageFormat,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt and aspect ratio.
    pub fn new(prompt: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio,
            format: ImageFormat::default(),
        }
    }

    /// Shapes a user submission into a request: decorates the prompt for
    /// the category and maps the size to its aspect ratio.
    pub fn for_submission(prompt: &str, size: ImageSize, category: ImageCategory) -> Self {
        Self::new(category.decorate(prompt), size.aspect_ratio())
    }
}

/// A generated image held as a self-contained `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImagePayload(String);

impl ImagePayload {
    /// Wraps an already-encoded payload string.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encodes raw image bytes as a `data:` URL.
    pub fn from_bytes(data: &[u8], format: ImageFormat) -> Self {
        Self::from_base64(
            format.mime_type(),
            &base64::engine::general_purpose::STANDARD.encode(data),
        )
    }

    /// Builds a `data:` URL from base64 text the service already returned.
    pub fn from_base64(mime_type: &str, b64: &str) -> Self {
        Self(format!("data:{mime_type};base64,{b64}"))
    }

    /// Returns the encoded payload.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the MIME type declared by the `data:` URL, if any.
    pub fn mime_type(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("data:")?;
        let end = rest.find([';', ','])?;
        Some(&rest[..end]).filter(|m| !m.is_empty())
    }

    /// Decodes the payload into raw image bytes.
    ///
    /// Bare base64 (no `data:` prefix) is accepted as well.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let b64 = match self.0.find(";base64,") {
            Some(pos) => &self.0[pos + 8..],
            None if self.0.starts_with("data:") => {
                return Err(GenStudioError::Decode(
                    "data URL is not base64 encoded".into(),
                ))
            }
            None => self.0.as_str(),
        };
        let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(&cleaned)
            .map_err(|e| GenStudioError::Decode(e.to_string()))
    }
}

impl std::fmt::Display for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
