//! Image placement: placeholder-derived geometry when the layout supplies
//! one, otherwise named fallback constants.

use crate::placeholder::{inches, Geometry, Placeholder};
use std::io::Cursor;

/// Fallback geometry policy for free-floating pictures and the logo stamp.
///
/// These are policy constants, not derived values; override per run when a
/// template's proportions call for it. All values in EMU.
#[derive(Debug, Clone)]
pub struct PlacementConfig {
    /// Picture width when sharing the slide with body content.
    pub side_width: i64,
    /// Right-edge margin for the side picture.
    pub side_margin: i64,
    /// Top offset for the side picture.
    pub side_top: i64,
    /// Picture width when the slide has no body content.
    pub centered_width: i64,
    /// Vertical band the centered picture is balanced against.
    pub centered_band: i64,
    /// Logo height.
    pub logo_height: i64,
    /// Logo distance from the right slide edge.
    pub logo_right: i64,
    /// Logo distance from the bottom slide edge.
    pub logo_bottom: i64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            side_width: inches(4.0),
            side_margin: inches(0.5),
            side_top: inches(2.0),
            centered_width: inches(6.0),
            centered_band: inches(5.0),
            logo_height: inches(0.5),
            logo_right: inches(1.2),
            logo_bottom: inches(0.8),
        }
    }
}

/// Final position and size for one picture shape, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlacement {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl From<Geometry> for ImagePlacement {
    fn from(g: Geometry) -> Self {
        Self {
            x: g.x,
            y: g.y,
            cx: g.cx,
            cy: g.cy,
        }
    }
}

/// Pixel dimensions of an image payload, read from the header only.
///
/// A probe failure is degraded, not fatal; callers fall back to a 4:3
/// aspect assumption.
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let reader = image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok(dims) => Some(dims),
        Err(e) => {
            log::warn!("Could not probe image dimensions: {}", e);
            None
        }
    }
}

/// Height for a given width preserving the image's pixel aspect ratio,
/// assuming 4:3 when the dimensions are unknown.
pub fn height_for_width(width: i64, dimensions: Option<(u32, u32)>) -> i64 {
    match dimensions {
        Some((w, h)) if w > 0 => ((width as i128 * h as i128) / w as i128) as i64,
        _ => width * 3 / 4,
    }
}

/// Width for a given height preserving the aspect ratio, assuming 4:3.
pub fn width_for_height(height: i64, dimensions: Option<(u32, u32)>) -> i64 {
    match dimensions {
        Some((w, h)) if h > 0 => ((height as i128 * w as i128) / h as i128) as i64,
        _ => height * 4 / 3,
    }
}

/// Placement taken from a picture placeholder's explicit layout geometry.
/// Declines when the layout never declared one; the caller then uses the
/// fallback rule.
pub fn placeholder_placement(placeholder: &Placeholder) -> Option<ImagePlacement> {
    placeholder.geometry.map(ImagePlacement::from)
}

/// Fallback placement when no usable picture placeholder exists.
///
/// With body content present the picture sits beside it, anchored near the
/// top right; otherwise it is centered at a larger width.
pub fn fallback_placement(
    config: &PlacementConfig,
    slide_width: i64,
    slide_height: i64,
    has_body: bool,
    dimensions: Option<(u32, u32)>,
) -> ImagePlacement {
    if has_body {
        let cx = config.side_width;
        ImagePlacement {
            x: slide_width - cx - config.side_margin,
            y: config.side_top,
            cx,
            cy: height_for_width(cx, dimensions),
        }
    } else {
        let cx = config.centered_width;
        ImagePlacement {
            x: (slide_width - cx) / 2,
            y: (slide_height - config.centered_band) / 2,
            cx,
            cy: height_for_width(cx, dimensions),
        }
    }
}

/// Corner placement for the brand logo, independent of other placeholders.
pub fn logo_placement(
    config: &PlacementConfig,
    slide_width: i64,
    slide_height: i64,
    dimensions: Option<(u32, u32)>,
) -> ImagePlacement {
    let cy = config.logo_height;
    ImagePlacement {
        x: slide_width - config.logo_right,
        y: slide_height - config.logo_bottom,
        cx: width_for_height(cy, dimensions),
        cy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::{PlaceholderRole, EMU_PER_INCH};

    fn ten_by_seven_five() -> (i64, i64) {
        (10 * EMU_PER_INCH, 7 * EMU_PER_INCH + EMU_PER_INCH / 2)
    }

    #[test]
    fn test_side_placement_with_body() {
        let config = PlacementConfig::default();
        let (w, h) = ten_by_seven_five();
        let p = fallback_placement(&config, w, h, true, Some((400, 300)));

        assert_eq!(p.cx, inches(4.0));
        assert_eq!(p.x, w - inches(4.0) - inches(0.5));
        assert_eq!(p.y, inches(2.0));
        assert_eq!(p.cy, inches(3.0)); // 4:3 of 4in
    }

    #[test]
    fn test_centered_placement_without_body() {
        let config = PlacementConfig::default();
        let (w, h) = ten_by_seven_five();
        let p = fallback_placement(&config, w, h, false, Some((600, 300)));

        assert_eq!(p.cx, inches(6.0));
        assert_eq!(p.x, (w - inches(6.0)) / 2);
        assert_eq!(p.y, (h - inches(5.0)) / 2);
        assert_eq!(p.cy, inches(3.0)); // 2:1 of 6in
    }

    #[test]
    fn test_unknown_dimensions_assume_four_by_three() {
        assert_eq!(height_for_width(inches(4.0), None), inches(3.0));
        assert_eq!(width_for_height(inches(3.0), None), inches(4.0));
    }

    #[test]
    fn test_logo_placement() {
        let config = PlacementConfig::default();
        let (w, h) = ten_by_seven_five();
        let p = logo_placement(&config, w, h, Some((100, 50)));

        assert_eq!(p.cy, inches(0.5));
        assert_eq!(p.cx, inches(1.0));
        assert_eq!(p.x, w - inches(1.2));
        assert_eq!(p.y, h - inches(0.8));
    }

    #[test]
    fn test_placeholder_placement_requires_geometry() {
        let with_geometry = Placeholder {
            role: PlaceholderRole::Picture,
            ph_type: Some("pic".to_string()),
            idx: Some(2),
            geometry: Some(crate::placeholder::Geometry {
                x: 1,
                y: 2,
                cx: 3,
                cy: 4,
            }),
        };
        assert_eq!(
            placeholder_placement(&with_geometry),
            Some(ImagePlacement { x: 1, y: 2, cx: 3, cy: 4 })
        );

        let without = Placeholder {
            geometry: None,
            ..with_geometry
        };
        assert_eq!(placeholder_placement(&without), None);
    }

    #[test]
    fn test_probe_dimensions_of_generated_png() {
        let mut bytes = Vec::new();
        let img = image::RgbImage::new(8, 4);
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();

        assert_eq!(probe_dimensions(&bytes), Some((8, 4)));
    }

    #[test]
    fn test_probe_dimensions_garbage() {
        assert_eq!(probe_dimensions(b"not an image"), None);
    }
}
