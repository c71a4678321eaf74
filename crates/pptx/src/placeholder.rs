//! Placeholder classification by structural type code.
//!
//! Templates are not assumed to label their shapes consistently, so a slot's
//! role is computed from the `<p:ph>` `type` attribute every time a slide or
//! layout instance is inspected, never cached by shape name or index.

use deck_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// English Metric Units per inch, the native PPTX coordinate unit.
pub const EMU_PER_INCH: i64 = 914_400;

/// Convert inches to EMU.
pub fn inches(value: f64) -> i64 {
    (value * EMU_PER_INCH as f64) as i64
}

/// Classification of a placeholder slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderRole {
    Title,
    Subtitle,
    Body,
    Picture,
    Other,
}

impl PlaceholderRole {
    /// Classify from the `<p:ph>` `type` attribute.
    ///
    /// An absent `type` is the content/object placeholder class, which
    /// receives body text. `dt`, `ftr`, `sldNum` and the rest are Other.
    pub fn from_type_code(ph_type: Option<&str>) -> Self {
        match ph_type {
            Some("title") | Some("ctrTitle") => Self::Title,
            Some("subTitle") => Self::Subtitle,
            Some("body") | Some("obj") | None => Self::Body,
            Some("pic") | Some("media") | Some("clipArt") => Self::Picture,
            Some(_) => Self::Other,
        }
    }
}

/// Explicit shape geometry in EMU, from an `<a:xfrm>` with both offset and
/// extent present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

/// A placeholder slot scanned from slide or layout XML.
#[derive(Debug, Clone)]
pub struct Placeholder {
    /// Computed role.
    pub role: PlaceholderRole,
    /// Raw `type` attribute, carried into generated slides so the new shape
    /// inherits its formatting from the matching layout slot.
    pub ph_type: Option<String>,
    /// `idx` attribute, the layout/slide pairing key for untyped slots.
    pub idx: Option<u32>,
    /// Explicit geometry, when the source declares one.
    pub geometry: Option<Geometry>,
}

#[derive(Default)]
struct ShapeScan {
    seen_ph: bool,
    ph_type: Option<String>,
    idx: Option<u32>,
    x: Option<i64>,
    y: Option<i64>,
    cx: Option<i64>,
    cy: Option<i64>,
}

impl ShapeScan {
    fn into_placeholder(self) -> Option<Placeholder> {
        if !self.seen_ph {
            return None;
        }
        let geometry = match (self.x, self.y, self.cx, self.cy) {
            (Some(x), Some(y), Some(cx), Some(cy)) => Some(Geometry { x, y, cx, cy }),
            _ => None,
        };
        Some(Placeholder {
            role: PlaceholderRole::from_type_code(self.ph_type.as_deref()),
            ph_type: self.ph_type,
            idx: self.idx,
            geometry,
        })
    }
}

/// Scan a slide or layout part for its placeholder shapes, in document order.
pub fn scan_placeholders(xml: &str) -> Result<Vec<Placeholder>> {
    let mut placeholders = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut current: Option<ShapeScan> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"sp" => {
                        current = Some(ShapeScan::default());
                    }
                    b"ph" => {
                        if let Some(ref mut shape) = current {
                            shape.seen_ph = true;
                            for attr in e.attributes().flatten() {
                                match attr.key.as_ref() {
                                    b"type" => {
                                        shape.ph_type = Some(
                                            String::from_utf8_lossy(&attr.value).to_string(),
                                        );
                                    }
                                    b"idx" => {
                                        shape.idx = String::from_utf8_lossy(&attr.value)
                                            .parse::<u32>()
                                            .ok();
                                    }
                                    _ => {}
                                }
                            }
                        }
                    }
                    b"off" => {
                        if let Some(ref mut shape) = current {
                            for attr in e.attributes().flatten() {
                                let value = String::from_utf8_lossy(&attr.value).to_string();
                                match attr.key.as_ref() {
                                    b"x" => shape.x = value.parse().ok(),
                                    b"y" => shape.y = value.parse().ok(),
                                    _ => {}
                                }
                            }
                        }
                    }
                    b"ext" => {
                        if let Some(ref mut shape) = current {
                            for attr in e.attributes().flatten() {
                                let value = String::from_utf8_lossy(&attr.value).to_string();
                                match attr.key.as_ref() {
                                    b"cx" => shape.cx = value.parse().ok(),
                                    b"cy" => shape.cy = value.parse().ok(),
                                    _ => {}
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                if local_name(e.name().as_ref()) == b"sp" {
                    if let Some(shape) = current.take() {
                        if let Some(ph) = shape.into_placeholder() {
                            placeholders.push(ph);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!("Error scanning placeholders: {}", e)));
            }
            _ => {}
        }
    }

    Ok(placeholders)
}

/// First placeholder with the given role, if any.
pub fn find_role<'a>(
    placeholders: &'a [Placeholder],
    role: PlaceholderRole,
) -> Option<&'a Placeholder> {
    placeholders.iter().find(|p| p.role == role)
}

/// Extract the local name from a potentially namespaced XML element name.
pub fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}
