//! Template loading: open a `.pptx`, capture its first slide, and strip all
//! pre-existing slides while leaving layouts, masters, and theme untouched.

use crate::package::{
    self, parse_relationships, rels_path_for, resolve_target, write_relationships, ContentTypes,
    Package, Relationship,
};
use crate::placeholder::local_name;
use deck_core::{Error, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::{Read, Seek};
use std::path::Path;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Default slide size when the template omits `<p:sldSz>` (10 × 7.5 in).
const DEFAULT_SLIDE_SIZE: (i64, i64) = (9_144_000, 6_858_000);

/// The original first slide, captured before stripping so the composer can
/// re-issue it as the title slide.
#[derive(Debug, Clone)]
pub struct CapturedSlide {
    /// The slide part XML.
    pub xml: String,
    /// The slide's relationships (layout, images, ...).
    pub rels: Vec<Relationship>,
}

/// A loaded template with all original slides removed.
///
/// Invariants: slide count is 0 immediately after load; layout parts and
/// every styling part are byte-identical to the source template.
#[derive(Debug, Clone)]
pub struct TemplateShell {
    /// The underlying part map.
    pub package: Package,
    /// Slide width in EMU.
    pub slide_width: i64,
    /// Slide height in EMU.
    pub slide_height: i64,
    /// The captured original first slide, when the template had any.
    pub title_slide: Option<CapturedSlide>,
    /// Layout part names in slide-master reference order.
    pub layouts: Vec<String>,
}

impl TemplateShell {
    /// Load a template from disk. Missing/unopenable path is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_package(Package::from_path(path)?)
    }

    /// Load a template from any seekable reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::from_package(Package::from_reader(reader)?)
    }

    /// Build the shell from an already loaded package.
    pub fn from_package(mut package: Package) -> Result<Self> {
        let presentation = package.part_str(PRESENTATION_PART)?;
        let (slide_width, slide_height) = read_slide_size(&presentation);

        let pres_rels_path = rels_path_for(PRESENTATION_PART);
        let mut pres_rels = parse_relationships(&package.part_str(&pres_rels_path)?)?;

        let mut content_types = ContentTypes::parse(&package.part_str(CONTENT_TYPES_PART)?)?;

        // Slide parts in sldIdLst order, resolved through the rels.
        let slide_rel_ids = read_slide_id_refs(&presentation)?;
        let mut title_slide = None;

        for (position, rel_id) in slide_rel_ids.iter().enumerate() {
            let Some(rel) = pres_rels.iter().find(|r| &r.id == rel_id) else {
                log::warn!("Slide id references unknown relationship {}, skipping", rel_id);
                continue;
            };
            let part_name = resolve_target("ppt", &rel.target);
            let slide_rels_path = rels_path_for(&part_name);

            if position == 0 {
                let xml = package.part_str(&part_name)?;
                let rels = match package.part(&slide_rels_path) {
                    Some(_) => parse_relationships(&package.part_str(&slide_rels_path)?)?,
                    None => Vec::new(),
                };
                title_slide = Some(CapturedSlide { xml, rels });
            }

            package.remove(&part_name);
            package.remove(&slide_rels_path);
            content_types.remove_override(&part_name);
        }

        pres_rels.retain(|r| r.rel_type != package::reltype::SLIDE);

        let stripped = rewrite_slide_id_list(&presentation, &[])?;
        package.put(PRESENTATION_PART, stripped.into_bytes());
        package.put(
            pres_rels_path.clone(),
            write_relationships(&pres_rels)?.into_bytes(),
        );
        package.put(
            CONTENT_TYPES_PART.to_string(),
            content_types.serialize()?.into_bytes(),
        );

        let layouts = enumerate_layouts(&package, &pres_rels)?;
        if layouts.is_empty() {
            return Err(Error::Package(
                "template has no slide layouts".to_string(),
            ));
        }

        log::debug!(
            "Template loaded: {} layouts, title slide {}",
            layouts.len(),
            if title_slide.is_some() { "captured" } else { "absent" }
        );

        Ok(Self {
            package,
            slide_width,
            slide_height,
            title_slide,
            layouts,
        })
    }

    /// Number of slides currently referenced by the presentation part.
    pub fn slide_count(&self) -> usize {
        self.package
            .part_str(PRESENTATION_PART)
            .ok()
            .and_then(|xml| read_slide_id_refs(&xml).ok())
            .map(|ids| ids.len())
            .unwrap_or(0)
    }

    /// Number of available layouts.
    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }
}

/// Read `<p:sldSz>` from the presentation part, with a 4:3 default.
fn read_slide_size(presentation: &str) -> (i64, i64) {
    let mut reader = Reader::from_str(presentation);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldSz" =>
            {
                let mut cx = None;
                let mut cy = None;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"cx" => cx = value.parse::<i64>().ok(),
                        b"cy" => cy = value.parse::<i64>().ok(),
                        _ => {}
                    }
                }
                if let (Some(cx), Some(cy)) = (cx, cy) {
                    return (cx, cy);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    log::warn!("Template declares no slide size, assuming 10x7.5in");
    DEFAULT_SLIDE_SIZE
}

/// Relationship ids referenced by `<p:sldId>` entries, in list order.
fn read_slide_id_refs(presentation: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(presentation);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"r:id" {
                        ids.push(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!("Error reading slide ids: {}", e)));
            }
            _ => {}
        }
    }

    Ok(ids)
}

/// Rewrite the presentation part with the given `(slide id, rel id)` entries
/// in its `<p:sldIdLst>`. An empty slice strips the list.
///
/// When the template has no `<p:sldIdLst>` at all, one is injected before
/// `<p:sldSz>` to keep the schema's element order.
pub fn rewrite_slide_id_list(presentation: &str, entries: &[(u32, String)]) -> Result<String> {
    let mut reader = Reader::from_str(presentation);
    let mut writer = Writer::new(Vec::new());
    let mut skipping_list = false;
    let mut wrote_list = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::Xml(format!("Error rewriting presentation: {}", e)))?;
        match event {
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"sldIdLst" => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                write_slide_id_list(&mut writer, &name, entries)?;
                wrote_list = true;
                skipping_list = true;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"sldIdLst" => {
                skipping_list = false;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"sldIdLst" => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                write_slide_id_list(&mut writer, &name, entries)?;
                wrote_list = true;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if !wrote_list
                    && !entries.is_empty()
                    && local_name(e.name().as_ref()) == b"sldSz" =>
            {
                write_slide_id_list(&mut writer, "p:sldIdLst", entries)?;
                wrote_list = true;
                writer.write_event(event.clone()).map_err(package::xml_err)?;
            }
            Event::Eof => break,
            other => {
                if !skipping_list {
                    writer.write_event(other).map_err(package::xml_err)?;
                }
            }
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|_| Error::Xml("Presentation output is not UTF-8".to_string()))
}

fn write_slide_id_list(
    writer: &mut Writer<Vec<u8>>,
    list_name: &str,
    entries: &[(u32, String)],
) -> Result<()> {
    if entries.is_empty() {
        writer
            .write_event(Event::Empty(BytesStart::new(list_name)))
            .map_err(package::xml_err)?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(BytesStart::new(list_name)))
        .map_err(package::xml_err)?;
    for (id, rel_id) in entries {
        let mut e = BytesStart::new("p:sldId");
        let id_attr = id.to_string();
        e.push_attribute(("id", id_attr.as_str()));
        e.push_attribute(("r:id", rel_id.as_str()));
        writer.write_event(Event::Empty(e)).map_err(package::xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(list_name)))
        .map_err(package::xml_err)?;
    Ok(())
}

/// Layout part names in the order the slide masters reference them, with a
/// numeric part-name fallback when masters or their rels are missing.
fn enumerate_layouts(package: &Package, pres_rels: &[Relationship]) -> Result<Vec<String>> {
    let mut layouts = Vec::new();

    for master_rel in pres_rels
        .iter()
        .filter(|r| r.rel_type == package::reltype::SLIDE_MASTER)
    {
        let master_part = resolve_target("ppt", &master_rel.target);
        let Ok(master_xml) = package.part_str(&master_part) else {
            continue;
        };
        let Ok(master_rels_xml) = package.part_str(&rels_path_for(&master_part)) else {
            continue;
        };
        let master_rels = parse_relationships(&master_rels_xml)?;
        let master_dir = master_part.rsplit_once('/').map(|(d, _)| d).unwrap_or("ppt");

        for rel_id in read_layout_id_refs(&master_xml)? {
            if let Some(rel) = master_rels.iter().find(|r| r.id == rel_id) {
                let part = resolve_target(master_dir, &rel.target);
                if !layouts.contains(&part) {
                    layouts.push(part);
                }
            }
        }
    }

    if layouts.is_empty() {
        // No master bookkeeping; fall back to numeric part-name order.
        let mut named: Vec<String> = package
            .part_names_under("ppt/slideLayouts/")
            .into_iter()
            .filter(|n| n.ends_with(".xml") && !n.contains("_rels"))
            .collect();
        named.sort_by_key(|n| extract_part_number(n).unwrap_or(usize::MAX));
        layouts = named;
    }

    Ok(layouts)
}

/// Relationship ids referenced by `<p:sldLayoutId>` entries, in list order.
fn read_layout_id_refs(master: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(master);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldLayoutId" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"r:id" {
                        ids.push(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!("Error reading layout ids: {}", e)));
            }
            _ => {}
        }
    }

    Ok(ids)
}

/// Extract a part number from a name like "slideLayout3.xml".
fn extract_part_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml");
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}
