//! Core domain types, content normalization, and error taxonomy
//! for template-driven PPTX population.

pub mod content;
pub mod error;
pub mod types;

pub use content::{extract_bullets, extract_embedded_image, EmbeddedImage, ImageEncoding};
pub use error::{Error, Result};
pub use types::{DocMeta, SlideRecord};
