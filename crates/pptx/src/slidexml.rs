//! Slide XML synthesis and rewriting.
//!
//! Generated slides carry minimal placeholder shapes: a `<p:ph>` matching
//! the layout slot by type and index, no explicit geometry. PowerPoint
//! resolves position and formatting through layout inheritance, which is
//! what keeps the template's branding intact. Pictures are the exception:
//! they always carry an explicit transform.

use crate::picture::ImagePlacement;
use crate::placeholder::{local_name, Placeholder, PlaceholderRole};
use deck_core::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::package::xml_err;

const XMLNS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const XMLNS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XMLNS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

/// A picture shape to be written into a slide's shape tree.
#[derive(Debug, Clone)]
pub struct PictureShape {
    /// Unique shape id within the slide.
    pub shape_id: u32,
    /// Shape name shown in selection panes.
    pub name: String,
    /// Relationship id of the image part in the slide's rels.
    pub rel_id: String,
    /// Explicit position and size.
    pub placement: ImagePlacement,
}

/// Build a complete content-slide part.
///
/// `title` and `body` each pair a layout placeholder (whose `type`/`idx` the
/// new shape mirrors) with the text to bind. Pictures are appended after the
/// placeholder shapes.
pub fn build_content_slide(
    title: Option<(&Placeholder, &str)>,
    body: Option<(&Placeholder, &[String])>,
    pictures: &[PictureShape],
) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(xml_err)?;

    let mut sld = BytesStart::new("p:sld");
    sld.push_attribute(("xmlns:a", XMLNS_A));
    sld.push_attribute(("xmlns:r", XMLNS_R));
    sld.push_attribute(("xmlns:p", XMLNS_P));
    writer.write_event(Event::Start(sld)).map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("p:cSld")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("p:spTree")))
        .map_err(xml_err)?;

    // Group shape header required by the schema.
    writer
        .write_event(Event::Start(BytesStart::new("p:nvGrpSpPr")))
        .map_err(xml_err)?;
    let mut cnvpr = BytesStart::new("p:cNvPr");
    cnvpr.push_attribute(("id", "1"));
    cnvpr.push_attribute(("name", ""));
    writer.write_event(Event::Empty(cnvpr)).map_err(xml_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("p:cNvGrpSpPr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("p:nvPr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("p:nvGrpSpPr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("p:grpSpPr")))
        .map_err(xml_err)?;

    let mut shape_id = 2u32;
    if let Some((placeholder, text)) = title {
        write_placeholder_shape(
            &mut writer,
            shape_id,
            "Title",
            placeholder,
            &[text.to_string()],
        )?;
        shape_id += 1;
    }
    if let Some((placeholder, paragraphs)) = body {
        write_placeholder_shape(&mut writer, shape_id, "Content", placeholder, paragraphs)?;
    }
    for picture in pictures {
        write_picture_shape(&mut writer, picture)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("p:spTree")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("p:cSld")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("p:clrMapOvr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("a:masterClrMapping")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("p:clrMapOvr")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::End(BytesEnd::new("p:sld")))
        .map_err(xml_err)?;

    String::from_utf8(writer.into_inner())
        .map_err(|_| Error::Xml("Slide output is not UTF-8".to_string()))
}

/// Write one `<p:sp>` bound to a layout placeholder.
fn write_placeholder_shape(
    writer: &mut Writer<Vec<u8>>,
    shape_id: u32,
    base_name: &str,
    placeholder: &Placeholder,
    paragraphs: &[String],
) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("p:sp")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("p:nvSpPr")))
        .map_err(xml_err)?;
    let mut cnvpr = BytesStart::new("p:cNvPr");
    let id = shape_id.to_string();
    let name = format!("{} {}", base_name, shape_id - 1);
    cnvpr.push_attribute(("id", id.as_str()));
    cnvpr.push_attribute(("name", name.as_str()));
    writer.write_event(Event::Empty(cnvpr)).map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("p:cNvSpPr")))
        .map_err(xml_err)?;
    let mut locks = BytesStart::new("a:spLocks");
    locks.push_attribute(("noGrp", "1"));
    writer.write_event(Event::Empty(locks)).map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("p:cNvSpPr")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("p:nvPr")))
        .map_err(xml_err)?;
    let mut ph = BytesStart::new("p:ph");
    if let Some(ph_type) = &placeholder.ph_type {
        ph.push_attribute(("type", ph_type.as_str()));
    }
    if let Some(idx) = placeholder.idx {
        let idx = idx.to_string();
        ph.push_attribute(("idx", idx.as_str()));
    }
    writer.write_event(Event::Empty(ph)).map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("p:nvPr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("p:nvSpPr")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Empty(BytesStart::new("p:spPr")))
        .map_err(xml_err)?;

    write_text_body(writer, "p:txBody", paragraphs)?;

    writer
        .write_event(Event::End(BytesEnd::new("p:sp")))
        .map_err(xml_err)?;
    Ok(())
}

/// Write a `<p:txBody>` (or layout equivalent) with one level-0 paragraph
/// per entry. The schema requires at least one paragraph, so an empty list
/// produces a single empty one.
fn write_text_body(
    writer: &mut Writer<Vec<u8>>,
    element: &str,
    paragraphs: &[String],
) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(element)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("a:bodyPr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("a:lstStyle")))
        .map_err(xml_err)?;

    if paragraphs.is_empty() {
        writer
            .write_event(Event::Empty(BytesStart::new("a:p")))
            .map_err(xml_err)?;
    }
    for text in paragraphs {
        writer
            .write_event(Event::Start(BytesStart::new("a:p")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("a:r")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Start(BytesStart::new("a:t")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("a:t")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("a:r")))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new("a:p")))
            .map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(element)))
        .map_err(xml_err)?;
    Ok(())
}

/// Write a `<p:pic>` with an explicit transform.
fn write_picture_shape(writer: &mut Writer<Vec<u8>>, picture: &PictureShape) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("p:pic")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("p:nvPicPr")))
        .map_err(xml_err)?;
    let mut cnvpr = BytesStart::new("p:cNvPr");
    let id = picture.shape_id.to_string();
    cnvpr.push_attribute(("id", id.as_str()));
    cnvpr.push_attribute(("name", picture.name.as_str()));
    writer.write_event(Event::Empty(cnvpr)).map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("p:cNvPicPr")))
        .map_err(xml_err)?;
    let mut locks = BytesStart::new("a:picLocks");
    locks.push_attribute(("noChangeAspect", "1"));
    writer.write_event(Event::Empty(locks)).map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("p:cNvPicPr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("p:nvPr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("p:nvPicPr")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("p:blipFill")))
        .map_err(xml_err)?;
    let mut blip = BytesStart::new("a:blip");
    blip.push_attribute(("r:embed", picture.rel_id.as_str()));
    writer.write_event(Event::Empty(blip)).map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("a:stretch")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("a:fillRect")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("a:stretch")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("p:blipFill")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("p:spPr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("a:xfrm")))
        .map_err(xml_err)?;
    let mut off = BytesStart::new("a:off");
    let (x, y) = (picture.placement.x.to_string(), picture.placement.y.to_string());
    off.push_attribute(("x", x.as_str()));
    off.push_attribute(("y", y.as_str()));
    writer.write_event(Event::Empty(off)).map_err(xml_err)?;
    let mut ext = BytesStart::new("a:ext");
    let (cx, cy) = (picture.placement.cx.to_string(), picture.placement.cy.to_string());
    ext.push_attribute(("cx", cx.as_str()));
    ext.push_attribute(("cy", cy.as_str()));
    writer.write_event(Event::Empty(ext)).map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("a:xfrm")))
        .map_err(xml_err)?;
    let mut geom = BytesStart::new("a:prstGeom");
    geom.push_attribute(("prst", "rect"));
    writer.write_event(Event::Start(geom)).map_err(xml_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("a:avLst")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("a:prstGeom")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("p:spPr")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::End(BytesEnd::new("p:pic")))
        .map_err(xml_err)?;
    Ok(())
}

/// Rewrite the captured title slide: bind the document title into the Title
/// placeholder (when supplied), and replace the Subtitle placeholder's text
/// with the given subtitle (empty string clears it).
///
/// Placeholders the slide does not have are simply skipped.
pub fn rewrite_title_slide(
    xml: &str,
    title: Option<&str>,
    subtitle: &str,
) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());

    let mut current_role: Option<PlaceholderRole> = None;
    let mut skipping_tx_body = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::Xml(format!("Error rewriting title slide: {}", e)))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e)
                if local_name(e.name().as_ref()) == b"ph" =>
            {
                let mut ph_type = None;
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"type" {
                        ph_type = Some(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
                current_role = Some(PlaceholderRole::from_type_code(ph_type.as_deref()));
                writer.write_event(event.clone()).map_err(xml_err)?;
            }
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"txBody" => {
                let element = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let replacement = match current_role {
                    Some(PlaceholderRole::Title) => title.map(|t| vec![t.to_string()]),
                    Some(PlaceholderRole::Subtitle) => {
                        if subtitle.is_empty() {
                            Some(Vec::new())
                        } else {
                            Some(vec![subtitle.to_string()])
                        }
                    }
                    _ => None,
                };
                match replacement {
                    Some(paragraphs) => {
                        write_text_body(&mut writer, &element, &paragraphs)?;
                        skipping_tx_body = true;
                    }
                    None => {
                        writer.write_event(event.clone()).map_err(xml_err)?;
                    }
                }
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"txBody" => {
                if skipping_tx_body {
                    skipping_tx_body = false;
                } else {
                    writer.write_event(event.clone()).map_err(xml_err)?;
                }
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"sp" => {
                current_role = None;
                writer.write_event(event.clone()).map_err(xml_err)?;
            }
            Event::Eof => break,
            other => {
                if !skipping_tx_body {
                    writer.write_event(other).map_err(xml_err)?;
                }
            }
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|_| Error::Xml("Title slide output is not UTF-8".to_string()))
}

/// Append picture shapes to an existing slide's shape tree.
pub fn append_pictures(xml: &str, pictures: &[PictureShape]) -> Result<String> {
    if pictures.is_empty() {
        return Ok(xml.to_string());
    }

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::Xml(format!("Error appending pictures: {}", e)))?;
        match event {
            Event::End(ref e) if local_name(e.name().as_ref()) == b"spTree" => {
                for picture in pictures {
                    write_picture_shape(&mut writer, picture)?;
                }
                writer.write_event(event.clone()).map_err(xml_err)?;
            }
            Event::Eof => break,
            other => {
                writer.write_event(other).map_err(xml_err)?;
            }
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|_| Error::Xml("Slide output is not UTF-8".to_string()))
}

/// Highest shape id currently used in a slide, for allocating new ids.
pub fn max_shape_id(xml: &str) -> u32 {
    let mut max = 1;
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if local_name(e.name().as_ref()) == b"cNvPr" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"id" {
                        if let Ok(id) = String::from_utf8_lossy(&attr.value).parse::<u32>() {
                            max = max.max(id);
                        }
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholder::scan_placeholders;

    fn title_placeholder() -> Placeholder {
        Placeholder {
            role: PlaceholderRole::Title,
            ph_type: Some("title".to_string()),
            idx: None,
            geometry: None,
        }
    }

    fn body_placeholder() -> Placeholder {
        Placeholder {
            role: PlaceholderRole::Body,
            ph_type: None,
            idx: Some(1),
            geometry: None,
        }
    }

    /// Collect `<a:t>` runs per paragraph from slide XML.
    fn paragraph_texts(xml: &str) -> Vec<String> {
        let mut reader = Reader::from_str(xml);
        let mut texts = Vec::new();
        let mut in_t = false;
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) if local_name(e.name().as_ref()) == b"t" => in_t = true,
                Ok(Event::End(ref e)) if local_name(e.name().as_ref()) == b"t" => in_t = false,
                Ok(Event::Text(ref e)) if in_t => {
                    texts.push(e.unescape().unwrap_or_default().to_string());
                }
                Ok(Event::Eof) => break,
                Err(_) => break,
                _ => {}
            }
        }
        texts
    }

    #[test]
    fn test_build_content_slide_binds_title_and_body() {
        let title = title_placeholder();
        let body = body_placeholder();
        let paragraphs = vec!["x".to_string(), "y".to_string()];
        let xml =
            build_content_slide(Some((&title, "Intro")), Some((&body, &paragraphs)), &[]).unwrap();

        assert_eq!(paragraph_texts(&xml), vec!["Intro", "x", "y"]);
        assert!(xml.contains(r#"<p:ph type="title"/>"#));
        assert!(xml.contains(r#"<p:ph idx="1"/>"#));

        // The generated part scans back to the same placeholder roles.
        let placeholders = scan_placeholders(&xml).unwrap();
        assert_eq!(placeholders.len(), 2);
        assert_eq!(placeholders[0].role, PlaceholderRole::Title);
        assert_eq!(placeholders[1].role, PlaceholderRole::Body);
    }

    #[test]
    fn test_build_content_slide_escapes_text() {
        let title = title_placeholder();
        let xml = build_content_slide(Some((&title, "A & B <ok>")), None, &[]).unwrap();
        assert!(xml.contains("A &amp; B &lt;ok&gt;"));
        assert_eq!(paragraph_texts(&xml), vec!["A & B <ok>"]);
    }

    #[test]
    fn test_build_content_slide_with_picture() {
        let picture = PictureShape {
            shape_id: 4,
            name: "Picture 3".to_string(),
            rel_id: "rId2".to_string(),
            placement: ImagePlacement { x: 10, y: 20, cx: 300, cy: 400 },
        };
        let xml = build_content_slide(None, None, &[picture]).unwrap();

        assert!(xml.contains(r#"<a:blip r:embed="rId2"/>"#));
        assert!(xml.contains(r#"<a:off x="10" y="20"/>"#));
        assert!(xml.contains(r#"<a:ext cx="300" cy="400"/>"#));
    }

    const TITLE_SLIDE: &str = r#"<?xml version="1.0"?>
<p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>
<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr><p:ph type="ctrTitle"/></p:nvPr></p:nvSpPr><p:spPr/>
<p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:t>Template Title</a:t></a:r></a:p></p:txBody></p:sp>
<p:sp><p:nvSpPr><p:cNvPr id="3" name="Subtitle 2"/><p:cNvSpPr/><p:nvPr><p:ph type="subTitle" idx="1"/></p:nvPr></p:nvSpPr><p:spPr/>
<p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:t>Template Subtitle</a:t></a:r></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_rewrite_title_slide_sets_title_and_clears_subtitle() {
        let xml = rewrite_title_slide(TITLE_SLIDE, Some("My Document"), "").unwrap();
        let texts = paragraph_texts(&xml);
        assert_eq!(texts, vec!["My Document"]);
        assert!(!xml.contains("Template Subtitle"));
    }

    #[test]
    fn test_rewrite_title_slide_keeps_default_without_doc_title() {
        let xml = rewrite_title_slide(TITLE_SLIDE, None, "").unwrap();
        let texts = paragraph_texts(&xml);
        assert_eq!(texts, vec!["Template Title"]);
    }

    #[test]
    fn test_rewrite_title_slide_writes_subtitle_summary() {
        let xml = rewrite_title_slide(TITLE_SLIDE, Some("Doc"), "A summary").unwrap();
        assert_eq!(paragraph_texts(&xml), vec!["Doc", "A summary"]);
    }

    #[test]
    fn test_append_pictures() {
        let picture = PictureShape {
            shape_id: 9,
            name: "Logo".to_string(),
            rel_id: "rId9".to_string(),
            placement: ImagePlacement { x: 1, y: 2, cx: 3, cy: 4 },
        };
        let xml = append_pictures(TITLE_SLIDE, &[picture]).unwrap();
        assert!(xml.contains(r#"<a:blip r:embed="rId9"/>"#));
        // Appended inside the shape tree, before its close.
        assert!(xml.rfind("<p:pic>").unwrap() < xml.rfind("</p:spTree>").unwrap());
    }

    #[test]
    fn test_max_shape_id() {
        assert_eq!(max_shape_id(TITLE_SLIDE), 3);
        assert_eq!(max_shape_id("<p:sld/>"), 1);
    }
}
