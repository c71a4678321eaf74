//! Domain types for the slide records consumed by the composer.

use serde::{Deserialize, Serialize};

/// One logical slide supplied by an upstream collaborator.
///
/// `content` carries either comma-joined plain clauses or an HTML fragment
/// with `bullet-text` wrapper divs; an embedded base64 image marker may be
/// present in the same field. `html_content` is accepted as an alias since
/// upstream producers historically split the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideRecord {
    /// Slide title, bound to the layout's title placeholder when one exists.
    pub title: String,

    /// Raw slide body: plain text, HTML bullets, and/or an image data URI.
    #[serde(alias = "html_content")]
    #[serde(default)]
    pub content: String,
}

impl SlideRecord {
    /// Create a new record.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Document-level metadata applied to the template's title slide.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocMeta {
    /// Document title for the title placeholder on slide 1.
    pub title: Option<String>,

    /// Optional summary for the subtitle placeholder. Truncated to
    /// [`DocMeta::SUBTITLE_LIMIT`] characters when longer.
    pub summary: Option<String>,
}

impl DocMeta {
    /// Maximum subtitle length before truncation.
    pub const SUBTITLE_LIMIT: usize = 300;

    /// Create metadata with a document title only.
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            summary: None,
        }
    }

    /// Subtitle text for the title slide: the summary capped at the limit,
    /// or an empty string when no summary is supplied (the template's
    /// subtitle is cleared either way).
    pub fn subtitle_text(&self) -> String {
        match &self.summary {
            Some(s) if s.chars().count() > Self::SUBTITLE_LIMIT => {
                let capped: String = s.chars().take(Self::SUBTITLE_LIMIT).collect();
                format!("{}...", capped)
            }
            Some(s) => s.clone(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserializes_html_content_alias() {
        let json = r#"{"title": "Intro", "html_content": "<div>x</div>"}"#;
        let record: SlideRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.title, "Intro");
        assert_eq!(record.content, "<div>x</div>");
    }

    #[test]
    fn test_record_content_defaults_empty() {
        let json = r#"{"title": "Bare"}"#;
        let record: SlideRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.content, "");
    }

    #[test]
    fn test_subtitle_text_empty_without_summary() {
        assert_eq!(DocMeta::with_title("Doc").subtitle_text(), "");
    }

    #[test]
    fn test_subtitle_text_truncates_long_summary() {
        let meta = DocMeta {
            title: None,
            summary: Some("x".repeat(400)),
        };
        let subtitle = meta.subtitle_text();
        assert_eq!(subtitle.chars().count(), DocMeta::SUBTITLE_LIMIT + 3);
        assert!(subtitle.ends_with("..."));
    }

    #[test]
    fn test_subtitle_text_keeps_short_summary() {
        let meta = DocMeta {
            title: None,
            summary: Some("A short summary".to_string()),
        };
        assert_eq!(meta.subtitle_text(), "A short summary");
    }
}
