//! In-memory OOXML package: a map of part name to bytes, loaded from and
//! serialized to a ZIP archive, plus relationship and content-type plumbing.

use deck_core::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Relationship type URIs used by the engine.
pub mod reltype {
    pub const SLIDE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
    pub const SLIDE_LAYOUT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
    pub const SLIDE_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
}

/// Content type for a slide part override.
pub const SLIDE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

/// An OOXML package held fully in memory as part name → bytes.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    /// Load a package from a `.pptx` file on disk.
    ///
    /// A missing or unopenable path is the fatal `TemplateNotFound`
    /// condition; the engine must not be invoked without a template.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::TemplateNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)
            .map_err(|_| Error::TemplateNotFound(path.to_path_buf()))?;
        Self::from_reader(file)
    }

    /// Load a package from any seekable reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::Zip(format!("Failed to open ZIP: {}", e)))?;

        let mut parts = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| Error::Zip(format!("Failed to read ZIP entry: {}", e)))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)
                .map_err(|e| Error::Zip(format!("Failed to read '{}': {}", name, e)))?;
            parts.insert(name, bytes);
        }

        Ok(Self { parts })
    }

    /// Raw bytes of a part, if present.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(|b| b.as_slice())
    }

    /// A part decoded as UTF-8, failing when the part is absent or not text.
    pub fn part_str(&self, name: &str) -> Result<String> {
        let bytes = self
            .parts
            .get(name)
            .ok_or_else(|| Error::Package(format!("Missing part: {}", name)))?;
        String::from_utf8(bytes.clone())
            .map_err(|_| Error::Package(format!("Part is not UTF-8: {}", name)))
    }

    /// Insert or replace a part.
    pub fn put(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    /// Remove a part. Removing an absent part is a no-op.
    pub fn remove(&mut self, name: &str) {
        self.parts.remove(name);
    }

    /// Whether a part exists.
    pub fn has(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Part names matching a directory prefix.
    pub fn part_names_under(&self, prefix: &str) -> Vec<String> {
        self.parts
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Serialize the package back into ZIP bytes.
    ///
    /// Media parts are stored uncompressed; deflating already-compressed
    /// image data wastes CPU for no size gain.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, bytes) in &self.parts {
            let options = if is_precompressed(name) { stored } else { deflated };
            zip.start_file(name, options)
                .map_err(|e| Error::Zip(format!("Failed to start '{}': {}", name, e)))?;
            zip.write_all(bytes)
                .map_err(|e| Error::Zip(format!("Failed to write '{}': {}", name, e)))?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| Error::Zip(format!("Failed to finalize ZIP: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

/// Whether a part's extension marks already-compressed media.
fn is_precompressed(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".png")
        || lower.ends_with(".jpeg")
        || lower.ends_with(".jpg")
        || lower.ends_with(".gif")
}

/// One entry from a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// Parse a relationships part into its entries.
pub fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut rels = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut id = String::new();
                let mut rel_type = String::new();
                let mut target = String::new();

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Type" => rel_type = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }

                rels.push(Relationship { id, rel_type, target });
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!("Error parsing relationships: {}", e)));
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// Serialize relationship entries into a `.rels` part.
pub fn write_relationships(rels: &[Relationship]) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(xml_err)?;

    let mut root = BytesStart::new("Relationships");
    root.push_attribute((
        "xmlns",
        "http://schemas.openxmlformats.org/package/2006/relationships",
    ));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    for rel in rels {
        let mut e = BytesStart::new("Relationship");
        e.push_attribute(("Id", rel.id.as_str()));
        e.push_attribute(("Type", rel.rel_type.as_str()));
        e.push_attribute(("Target", rel.target.as_str()));
        writer.write_event(Event::Empty(e)).map_err(xml_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("Relationships")))
        .map_err(xml_err)?;

    String::from_utf8(writer.into_inner())
        .map_err(|_| Error::Xml("Relationships output is not UTF-8".to_string()))
}

/// Allocate the next free `rId<N>` given existing entries.
pub fn next_rel_id(rels: &[Relationship]) -> String {
    let max = rels
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

/// Resolve a relationship target against the directory of its source part.
///
/// Targets come in three shapes: package-absolute (`/ppt/...`), parent
/// relative (`../slideLayouts/...`), and sibling relative.
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// The `.rels` part name for a given part.
pub fn rels_path_for(part_name: &str) -> String {
    match part_name.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part_name),
    }
}

/// Parsed `[Content_Types].xml`: extension defaults and part overrides.
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    pub defaults: Vec<(String, String)>,
    pub overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// Parse the content-types part.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut types = Self::default();
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    match e.name().as_ref() {
                        b"Default" => {
                            let (mut ext, mut ct) = (String::new(), String::new());
                            for attr in e.attributes().flatten() {
                                match attr.key.as_ref() {
                                    b"Extension" => {
                                        ext = String::from_utf8_lossy(&attr.value).to_string()
                                    }
                                    b"ContentType" => {
                                        ct = String::from_utf8_lossy(&attr.value).to_string()
                                    }
                                    _ => {}
                                }
                            }
                            types.defaults.push((ext, ct));
                        }
                        b"Override" => {
                            let (mut part, mut ct) = (String::new(), String::new());
                            for attr in e.attributes().flatten() {
                                match attr.key.as_ref() {
                                    b"PartName" => {
                                        part = String::from_utf8_lossy(&attr.value).to_string()
                                    }
                                    b"ContentType" => {
                                        ct = String::from_utf8_lossy(&attr.value).to_string()
                                    }
                                    _ => {}
                                }
                            }
                            types.overrides.push((part, ct));
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!("Error parsing content types: {}", e)));
                }
                _ => {}
            }
        }

        Ok(types)
    }

    /// Remove the override for a part (name without leading slash).
    pub fn remove_override(&mut self, part_name: &str) {
        let absolute = format!("/{}", part_name);
        self.overrides.retain(|(p, _)| p != &absolute);
    }

    /// Add an override for a part (name without leading slash).
    pub fn add_override(&mut self, part_name: &str, content_type: &str) {
        let absolute = format!("/{}", part_name);
        if !self.overrides.iter().any(|(p, _)| p == &absolute) {
            self.overrides.push((absolute, content_type.to_string()));
        }
    }

    /// Ensure a default entry exists for an extension.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) {
        if !self.defaults.iter().any(|(e, _)| e == extension) {
            self.defaults
                .push((extension.to_string(), content_type.to_string()));
        }
    }

    /// Serialize back into the content-types part.
    pub fn serialize(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_err)?;

        let mut root = BytesStart::new("Types");
        root.push_attribute((
            "xmlns",
            "http://schemas.openxmlformats.org/package/2006/content-types",
        ));
        writer.write_event(Event::Start(root)).map_err(xml_err)?;

        for (ext, ct) in &self.defaults {
            let mut e = BytesStart::new("Default");
            e.push_attribute(("Extension", ext.as_str()));
            e.push_attribute(("ContentType", ct.as_str()));
            writer.write_event(Event::Empty(e)).map_err(xml_err)?;
        }
        for (part, ct) in &self.overrides {
            let mut e = BytesStart::new("Override");
            e.push_attribute(("PartName", part.as_str()));
            e.push_attribute(("ContentType", ct.as_str()));
            writer.write_event(Event::Empty(e)).map_err(xml_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("Types")))
            .map_err(xml_err)?;

        String::from_utf8(writer.into_inner())
            .map_err(|_| Error::Xml("Content-types output is not UTF-8".to_string()))
    }
}

pub(crate) fn xml_err(e: quick_xml::Error) -> Error {
    Error::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
</Relationships>"#;

    #[test]
    fn test_parse_relationships() {
        let rels = parse_relationships(RELS).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].id, "rId1");
        assert_eq!(rels[1].target, "slides/slide1.xml");
        assert!(rels[1].rel_type.ends_with("/slide"));
    }

    #[test]
    fn test_relationships_round_trip() {
        let rels = parse_relationships(RELS).unwrap();
        let xml = write_relationships(&rels).unwrap();
        assert_eq!(parse_relationships(&xml).unwrap(), rels);
    }

    #[test]
    fn test_next_rel_id() {
        let rels = parse_relationships(RELS).unwrap();
        assert_eq!(next_rel_id(&rels), "rId3");
        assert_eq!(next_rel_id(&[]), "rId1");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("ppt", "slides/slide1.xml"),
            "ppt/slides/slide1.xml"
        );
        assert_eq!(
            resolve_target("ppt/slides", "../slideLayouts/slideLayout2.xml"),
            "ppt/slideLayouts/slideLayout2.xml"
        );
        assert_eq!(
            resolve_target("ppt/slides", "/ppt/media/image1.png"),
            "ppt/media/image1.png"
        );
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(
            rels_path_for("ppt/slides/slide1.xml"),
            "ppt/slides/_rels/slide1.xml.rels"
        );
        assert_eq!(
            rels_path_for("ppt/presentation.xml"),
            "ppt/_rels/presentation.xml.rels"
        );
    }

    #[test]
    fn test_content_types_round_trip() {
        let xml = r#"<?xml version="1.0"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>
</Types>"#;
        let mut types = ContentTypes::parse(xml).unwrap();
        assert_eq!(types.defaults.len(), 1);
        assert_eq!(types.overrides.len(), 1);

        types.remove_override("ppt/slides/slide1.xml");
        assert!(types.overrides.is_empty());

        types.add_override("ppt/slides/slide2.xml", SLIDE_CONTENT_TYPE);
        types.ensure_default("png", "image/png");
        types.ensure_default("xml", "application/xml"); // already present

        let out = types.serialize().unwrap();
        let reparsed = ContentTypes::parse(&out).unwrap();
        assert_eq!(reparsed.defaults.len(), 2);
        assert_eq!(reparsed.overrides[0].0, "/ppt/slides/slide2.xml");
    }

    #[test]
    fn test_package_zip_round_trip() {
        let mut package = Package::default();
        package.put("ppt/presentation.xml", b"<p:presentation/>".to_vec());
        package.put("ppt/media/image1.png", vec![0x89, 0x50, 0x4E, 0x47]);

        let bytes = package.to_bytes().unwrap();
        let reloaded = Package::from_reader(Cursor::new(bytes)).unwrap();

        assert_eq!(reloaded.part("ppt/presentation.xml"), Some(&b"<p:presentation/>"[..]));
        assert!(reloaded.has("ppt/media/image1.png"));
        assert!(!reloaded.has("ppt/missing.xml"));
    }

    #[test]
    fn test_missing_template_path() {
        let err = Package::from_path(Path::new("/nonexistent/deck.pptx")).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(_)));
    }
}
