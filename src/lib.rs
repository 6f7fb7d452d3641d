#![warn(missing_docs)]
//! GenStudio - text-to-image generation with a persisted history gallery.
//!
//! A prompt, a size and a style category go in; the prompt is decorated for
//! the category, the size is mapped to an aspect ratio, a hosted generation
//! service is called once, and the result is prepended to a history that
//! survives restarts.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use genstudio::{ImageCategory, ImageSize, ImagenProvider, JsonFileStore, Studio, SubmitOutcome};
//!
//! #[tokio::main]
//! async fn main() -> genstudio::Result<()> {
//!     let provider = ImagenProvider::builder().build()?;
//!     let studio = Studio::new(
//!         Arc::new(provider),
//!         Arc::new(JsonFileStore::new("history.json")),
//!     );
//!     studio.load_history();
//!
//!     let outcome = studio
//!         .submit("a red fox", ImageSize::Medium, ImageCategory::Nature)
//!         .await;
//!     if let SubmitOutcome::Generated(result) = outcome {
//!         studio.download(&result, ".")?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Pieces
//!
//! - [`ImageGenerator`]: the generation client boundary; [`ImagenProvider`]
//!   talks to Google Imagen.
//! - [`HistoryStore`]: the persistence boundary; [`JsonFileStore`] keeps the
//!   sequence in one file, [`MemoryStore`] keeps it in memory.
//! - [`Studio`]: the workflow that owns session state and history.

pub mod config;
mod error;
pub mod history;
pub mod image;
pub mod workflow;

// Re-export error types at crate root
pub use error::{GenStudioError, Result, FALLBACK_FAILURE_MESSAGE};

pub use config::StudioConfig;
pub use history::{GeneratedResult, HistoryStore, JsonFileStore, MemoryStore};
pub use image::providers::{ImagenModel, ImagenProvider, ImagenProviderBuilder};
pub use image::{
    AspectRatio, GenerationRequest, ImageCategory, ImageFormat, ImageGenerator, ImagePayload,
    ImageSize,
};
pub use workflow::{Rejection, SessionState, Studio, StudioState, SubmitOutcome};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{GenStudioError, Result};
    pub use crate::history::{GeneratedResult, HistoryStore, JsonFileStore};
    pub use crate::image::providers::ImagenProvider;
    pub use crate::image::{ImageCategory, ImageGenerator, ImageSize};
    pub use crate::workflow::{Studio, SubmitOutcome};
}
