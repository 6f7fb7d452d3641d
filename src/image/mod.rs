//! Image generation module.

mod provider;
pub mod providers;
mod types;

pub use provider::ImageGenerator;
pub use types::{
    AspectRatio, GenerationRequest, ImageCategory, ImageFormat, ImagePayload, ImageSize,
};
