//! Error types for template-driven PPTX population.
//!
//! Only fatal input conditions (missing or unreadable template) cross the
//! engine boundary. Per-slide faults such as undecodable image payloads or
//! missing placeholders are logged at the point of use and converted into
//! fallbacks, never raised.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading a template or emitting a presentation.
#[derive(Error, Debug)]
pub enum Error {
    /// The template path does not exist or could not be opened.
    #[error("Template file not found: {0}")]
    TemplateNotFound(PathBuf),

    /// Failed to read or write a file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error (the PPTX container).
    #[error("ZIP error: {0}")]
    Zip(String),

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// A required package part is missing or structurally invalid.
    #[error("Invalid package: {0}")]
    Package(String),
}
