//! Hosted generation services.

mod imagen;

pub use imagen::{ImagenModel, ImagenProvider, ImagenProviderBuilder, DEFAULT_API_BASE};
