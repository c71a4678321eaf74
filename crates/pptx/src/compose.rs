//! Slide assembly: re-issue the template's title slide, bind each slide
//! record to the chosen content layout, and serialize the finished package.
//!
//! Per-slide faults never stop the batch. Every fallible binding step
//! resolves to an explicit fallback (or a no-op plus a warning) and the loop
//! proceeds to the next record.

use crate::layout::{choose_content_layout, ContentLayout};
use crate::package::{
    self, next_rel_id, rels_path_for, write_relationships, ContentTypes, Relationship,
    SLIDE_CONTENT_TYPE,
};
use crate::picture::{
    fallback_placement, logo_placement, placeholder_placement, probe_dimensions, PlacementConfig,
};
use crate::placeholder::PlaceholderRole;
use crate::slidexml::{
    append_pictures, build_content_slide as build_slide_xml, max_shape_id, rewrite_title_slide,
    PictureShape,
};
use crate::template::{rewrite_slide_id_list, TemplateShell};
use deck_core::content::{extract_bullets, extract_embedded_image};
use deck_core::{DocMeta, Result, SlideRecord};
use std::path::Path;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Assembles an output presentation from slide records.
pub struct Composer {
    shell: TemplateShell,
    layout: ContentLayout,
    config: PlacementConfig,
    meta: DocMeta,
    logo: Option<Vec<u8>>,
    logo_dims: Option<(u32, u32)>,
}

/// A prepared media part: bytes plus the extension and content type it is
/// registered under.
struct MediaPart {
    file_name: String,
    extension: &'static str,
    content_type: &'static str,
    bytes: Vec<u8>,
}

/// Queue image bytes as a new `ppt/media/imageN.<ext>` part, returning the
/// file name slide rels point at.
fn push_media(
    media: &mut Vec<MediaPart>,
    seq: &mut usize,
    bytes: Vec<u8>,
    extension: &'static str,
    content_type: &'static str,
) -> String {
    let file_name = format!("image{}.{}", *seq, extension);
    *seq += 1;
    media.push(MediaPart {
        file_name: file_name.clone(),
        extension,
        content_type,
        bytes,
    });
    file_name
}

/// Queue the logo media part the first time a slide needs it, returning the
/// shared file name. No slide stamped means no part registered.
fn ensure_logo<'a>(
    bytes: &mut Option<Vec<u8>>,
    file: &'a mut Option<String>,
    media: &mut Vec<MediaPart>,
    seq: &mut usize,
) -> Option<&'a str> {
    if let Some(bytes) = bytes.take() {
        let (extension, content_type) = sniff_media_type(&bytes);
        *file = Some(push_media(media, seq, bytes, extension, content_type));
    }
    file.as_deref()
}

/// Extension and content type for logo bytes, sniffed from the image header.
fn sniff_media_type(bytes: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => ("jpeg", "image/jpeg"),
        Ok(image::ImageFormat::Gif) => ("gif", "image/gif"),
        // PNG is by far the common logo format; unknowns register as PNG
        // and still render if the viewer can decode them.
        _ => ("png", "image/png"),
    }
}

/// One finished slide waiting for package registration.
struct PendingSlide {
    xml: String,
    rels: Vec<Relationship>,
}

impl Composer {
    /// Create a composer over a loaded shell. Chooses the content layout
    /// once; the choice is deterministic for a given template.
    pub fn new(shell: TemplateShell) -> Result<Self> {
        let layout = choose_content_layout(&shell)?;
        if !layout.has(PlaceholderRole::Body) && !layout.has(PlaceholderRole::Picture) {
            log::warn!(
                "Layout {} has neither body nor picture placeholder; slide bodies will be skipped",
                layout.part_name
            );
        }
        Ok(Self {
            shell,
            layout,
            config: PlacementConfig::default(),
            meta: DocMeta::default(),
            logo: None,
            logo_dims: None,
        })
    }

    /// Document metadata for the title slide.
    pub fn with_meta(mut self, meta: DocMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Brand logo stamped on every generated slide. Pixel dimensions are
    /// probed once here so every stamp keeps the source aspect ratio.
    pub fn with_logo(mut self, logo: Vec<u8>) -> Self {
        self.logo_dims = probe_dimensions(&logo);
        self.logo = Some(logo);
        self
    }

    /// Override the fallback placement constants.
    pub fn with_config(mut self, config: PlacementConfig) -> Self {
        self.config = config;
        self
    }

    /// The chosen content layout (exposed for inspection and tests).
    pub fn content_layout(&self) -> &ContentLayout {
        &self.layout
    }

    /// Assemble all records and serialize the package to bytes.
    pub fn compose(self, records: &[SlideRecord]) -> Result<Vec<u8>> {
        self.compose_inner(records, None)
    }

    /// Assemble, and additionally persist a copy to `output`.
    pub fn compose_to_path(self, records: &[SlideRecord], output: &Path) -> Result<Vec<u8>> {
        self.compose_inner(records, Some(output))
    }

    fn compose_inner(mut self, records: &[SlideRecord], output: Option<&Path>) -> Result<Vec<u8>> {
        let mut media_seq = next_media_index(&self.shell);
        let mut pending: Vec<PendingSlide> = Vec::new();
        let mut media: Vec<MediaPart> = Vec::new();

        // The logo media part is shared by every slide that stamps it, and
        // is only registered once the first slide actually does.
        let mut logo_bytes = self.logo.take();
        let mut logo_file: Option<String> = None;

        if let Some(captured) = self.shell.title_slide.clone() {
            let logo = ensure_logo(&mut logo_bytes, &mut logo_file, &mut media, &mut media_seq);
            let slide = self.build_title_slide(&captured, logo)?;
            pending.push(slide);
        } else {
            log::debug!("Template had no slides; output will carry content slides only");
        }

        for (index, record) in records.iter().enumerate() {
            let logo = ensure_logo(&mut logo_bytes, &mut logo_file, &mut media, &mut media_seq);
            let slide = self.build_content_slide(record, logo, &mut media, &mut media_seq);
            match slide {
                Ok(slide) => pending.push(slide),
                Err(e) => {
                    // Structural slide-build faults degrade to a skipped
                    // record; the batch always runs to completion.
                    log::warn!("Slide {} failed to build, skipping: {}", index + 1, e);
                }
            }
        }

        self.register(pending, media)?;

        let bytes = self.shell.package.to_bytes()?;
        if let Some(path) = output {
            std::fs::write(path, &bytes)?;
            log::info!("Presentation written to {}", path.display());
        }
        Ok(bytes)
    }

    /// Re-issue the captured original first slide with document title bound
    /// and subtitle replaced, stamping the logo when one is supplied.
    fn build_title_slide(
        &self,
        captured: &crate::template::CapturedSlide,
        logo: Option<&str>,
    ) -> Result<PendingSlide> {
        let subtitle = self.meta.subtitle_text();
        let mut xml = rewrite_title_slide(&captured.xml, self.meta.title.as_deref(), &subtitle)?;
        let mut rels = captured.rels.clone();

        if let Some(logo_file) = logo {
            let rel_id = next_rel_id(&rels);
            let placement = logo_placement(
                &self.config,
                self.shell.slide_width,
                self.shell.slide_height,
                self.logo_dims,
            );
            let stamp = PictureShape {
                shape_id: max_shape_id(&xml) + 1,
                name: "Logo".to_string(),
                rel_id: rel_id.clone(),
                placement,
            };
            xml = append_pictures(&xml, &[stamp])?;
            rels.push(Relationship {
                id: rel_id,
                rel_type: package::reltype::IMAGE.to_string(),
                target: format!("../media/{}", logo_file),
            });
        }

        Ok(PendingSlide { xml, rels })
    }

    /// Build one content slide from a record.
    fn build_content_slide(
        &self,
        record: &SlideRecord,
        logo: Option<&str>,
        media: &mut Vec<MediaPart>,
        media_seq: &mut usize,
    ) -> Result<PendingSlide> {
        // Placeholders are classified fresh from the layout for every slide.
        let title_ph = self.layout.find(PlaceholderRole::Title);
        let body_ph = self.layout.find(PlaceholderRole::Body);
        let picture_ph = self.layout.find(PlaceholderRole::Picture);

        let bullets = extract_bullets(&record.content);
        let body = match (body_ph, bullets.is_empty()) {
            (Some(ph), false) => Some((ph, bullets.as_slice())),
            (None, false) => {
                log::warn!(
                    "No body placeholder for slide '{}'; {} bullets skipped",
                    record.title,
                    bullets.len()
                );
                None
            }
            // Empty bullet list: leave the body as the layout default.
            (_, true) => None,
        };
        let title = title_ph.map(|ph| (ph, record.title.as_str()));

        let mut rels = vec![Relationship {
            id: "rId1".to_string(),
            rel_type: package::reltype::SLIDE_LAYOUT.to_string(),
            target: layout_target(&self.layout.part_name),
        }];

        let mut next_shape_id =
            2 + title.is_some() as u32 + body.is_some() as u32;
        let mut pictures = Vec::new();

        if let Some(embedded) = extract_embedded_image(&record.content) {
            let dimensions = probe_dimensions(&embedded.bytes);
            let placement = match picture_ph.and_then(placeholder_placement) {
                Some(placement) => placement,
                None => {
                    if picture_ph.is_some() {
                        log::warn!(
                            "Picture placeholder on {} has no usable geometry; using fallback position",
                            self.layout.part_name
                        );
                    }
                    fallback_placement(
                        &self.config,
                        self.shell.slide_width,
                        self.shell.slide_height,
                        body_ph.is_some(),
                        dimensions,
                    )
                }
            };

            let file_name = push_media(
                media,
                media_seq,
                embedded.bytes,
                embedded.encoding.extension(),
                embedded.encoding.content_type(),
            );
            let rel_id = next_rel_id(&rels);
            rels.push(Relationship {
                id: rel_id.clone(),
                rel_type: package::reltype::IMAGE.to_string(),
                target: format!("../media/{}", file_name),
            });
            pictures.push(PictureShape {
                shape_id: next_shape_id,
                name: format!("Picture {}", next_shape_id - 1),
                rel_id,
                placement,
            });
            next_shape_id += 1;
        }

        if let Some(logo_file) = logo {
            let rel_id = next_rel_id(&rels);
            rels.push(Relationship {
                id: rel_id.clone(),
                rel_type: package::reltype::IMAGE.to_string(),
                target: format!("../media/{}", logo_file),
            });
            pictures.push(PictureShape {
                shape_id: next_shape_id,
                name: "Logo".to_string(),
                rel_id,
                placement: logo_placement(
                    &self.config,
                    self.shell.slide_width,
                    self.shell.slide_height,
                    self.logo_dims,
                ),
            });
        }

        let xml = build_slide_xml(title, body, &pictures)?;
        Ok(PendingSlide { xml, rels })
    }

    /// Register all pending slides and media parts with the package:
    /// parts, rels, content-type overrides, presentation rels, slide ids.
    fn register(&mut self, pending: Vec<PendingSlide>, media: Vec<MediaPart>) -> Result<()> {
        let mut content_types =
            ContentTypes::parse(&self.shell.package.part_str(CONTENT_TYPES_PART)?)?;
        let pres_rels_path = rels_path_for(PRESENTATION_PART);
        let mut pres_rels =
            package::parse_relationships(&self.shell.package.part_str(&pres_rels_path)?)?;

        for part in media {
            content_types.ensure_default(part.extension, part.content_type);
            self.shell
                .package
                .put(format!("ppt/media/{}", part.file_name), part.bytes);
        }

        let mut slide_ids = Vec::with_capacity(pending.len());
        for (index, slide) in pending.into_iter().enumerate() {
            let part_name = format!("ppt/slides/slide{}.xml", index + 1);

            self.shell
                .package
                .put(part_name.clone(), slide.xml.into_bytes());
            self.shell.package.put(
                rels_path_for(&part_name),
                write_relationships(&slide.rels)?.into_bytes(),
            );
            content_types.add_override(&part_name, SLIDE_CONTENT_TYPE);

            let rel_id = next_rel_id(&pres_rels);
            pres_rels.push(Relationship {
                id: rel_id.clone(),
                rel_type: package::reltype::SLIDE.to_string(),
                target: format!("slides/slide{}.xml", index + 1),
            });
            slide_ids.push((256 + index as u32, rel_id));
        }

        let presentation = self.shell.package.part_str(PRESENTATION_PART)?;
        self.shell.package.put(
            PRESENTATION_PART,
            rewrite_slide_id_list(&presentation, &slide_ids)?.into_bytes(),
        );
        self.shell.package.put(
            pres_rels_path,
            write_relationships(&pres_rels)?.into_bytes(),
        );
        self.shell.package.put(
            CONTENT_TYPES_PART.to_string(),
            content_types.serialize()?.into_bytes(),
        );
        Ok(())
    }
}

/// Populate a template on disk with the given records in one call.
pub fn populate_template(
    template: &Path,
    records: &[SlideRecord],
    meta: DocMeta,
    logo: Option<Vec<u8>>,
    output: Option<&Path>,
) -> Result<Vec<u8>> {
    let shell = TemplateShell::load(template)?;
    let mut composer = Composer::new(shell)?.with_meta(meta);
    if let Some(logo) = logo {
        composer = composer.with_logo(logo);
    }
    match output {
        Some(path) => composer.compose_to_path(records, path),
        None => composer.compose(records),
    }
}

/// Relationship target for the chosen layout, relative to `ppt/slides/`.
fn layout_target(layout_part: &str) -> String {
    match layout_part.strip_prefix("ppt/") {
        Some(rest) => format!("../{}", rest),
        None => format!("/{}", layout_part),
    }
}

/// Index of the next unused `ppt/media/imageN` name in the template.
fn next_media_index(shell: &TemplateShell) -> usize {
    shell
        .package
        .part_names_under("ppt/media/")
        .iter()
        .filter_map(|name| {
            let file = name.rsplit('/').next()?;
            let stem = file.strip_prefix("image")?;
            let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<usize>().ok()
        })
        .max()
        .map(|n| n + 1)
        .unwrap_or(1)
}
