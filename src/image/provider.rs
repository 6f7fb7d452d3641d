//! Generation client trait.

use crate::error::Result;
use crate::image::types::{GenerationRequest, ImagePayload};
use async_trait::async_trait;

/// A hosted text-to-image service.
///
/// One call is one request and one response: implementations do not retry,
/// stream, or return partial results.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates an image for the given request.
    async fn generate(&self, request: &GenerationRequest) -> Result<ImagePayload>;

    /// Returns the name of this generator for display.
    fn name(&self) -> &str;

    /// Checks if the service is reachable and authenticated.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

