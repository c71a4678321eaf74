//! Content-shape detectors for slide bodies.
//!
//! Upstream generators author slide bodies either as HTML fragments with
//! `bullet-text` wrapper divs or as comma-joined plain clauses, and may embed
//! an image as a base64 data URI inside the same field. Each detector either
//! matches (returning structured data) or declines; they are tried in a fixed
//! priority order and are independently testable.

use base64::{engine::general_purpose, Engine as _};
use regex::Regex;
use std::sync::LazyLock;

/// Matches one HTML bullet wrapper and captures its text.
static BULLET_DIV_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<div class="bullet-text">([^<]+)</div>"#).unwrap());

/// Matches an embedded base64 image marker, capturing encoding and payload.
static IMAGE_DATA_URI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"src="data:image/(jpeg|png|gif);base64,([^"]+)""#).unwrap()
});

/// Extract the ordered bullet sequence from raw slide content.
///
/// HTML bullet extraction takes precedence over comma-splitting whenever at
/// least one wrapper div matches; otherwise the content is split on commas.
/// Empty and whitespace-only candidates are discarded, order is preserved.
pub fn extract_bullets(content: &str) -> Vec<String> {
    let candidates = html_bullets(content)
        .unwrap_or_else(|| comma_bullets(content));

    candidates
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// HTML bullet detector: every `<div class="bullet-text">…</div>` segment
/// becomes one candidate. Declines (returns `None`) when no wrapper matches.
pub fn html_bullets(content: &str) -> Option<Vec<String>> {
    let matches: Vec<String> = BULLET_DIV_REGEX
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect();

    if matches.is_empty() {
        None
    } else {
        Some(matches)
    }
}

/// Comma detector: split raw content on `,`. Always matches; a content
/// string without commas yields a single candidate.
pub fn comma_bullets(content: &str) -> Vec<String> {
    content.split(',').map(|s| s.to_string()).collect()
}

/// Image encoding named by an embedded data-URI marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Jpeg,
    Png,
    Gif,
}

impl ImageEncoding {
    fn from_marker(s: &str) -> Option<Self> {
        match s {
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// File extension used for the media part.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }

    /// MIME type for the `[Content_Types].xml` default entry.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }
}

/// A decoded embedded image extracted from slide content.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Declared encoding from the data URI.
    pub encoding: ImageEncoding,
    /// Decoded image bytes.
    pub bytes: Vec<u8>,
}

/// Search content for an embedded base64 image marker and decode it.
///
/// Returns `None` when no marker is present or the payload does not decode;
/// a bad payload is a degraded condition for that slide, never an error.
pub fn extract_embedded_image(content: &str) -> Option<EmbeddedImage> {
    let captures = IMAGE_DATA_URI_REGEX.captures(content)?;
    let encoding = ImageEncoding::from_marker(&captures[1])?;

    match general_purpose::STANDARD.decode(&captures[2]) {
        Ok(bytes) => Some(EmbeddedImage { encoding, bytes }),
        Err(e) => {
            log::warn!("Embedded image payload did not decode, skipping: {}", e);
            None
        }
    }
}
