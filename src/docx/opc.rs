//! OPC (Open Packaging Conventions) package reader.
//!
//! Reads the ZIP container of an Office Open XML document and exposes its
//! parts, content types, and relationships. Part names are normalized to a
//! leading-slash form ("/word/document.xml") regardless of how the archive
//! spells them.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

use super::error::DocxError;
use super::types::{ContentType, PackagePart, Relationship, RelationshipType};

/// OPC package reader.
#[derive(Debug, Clone, Default)]
pub struct OpcPackage {
    /// All parts in the package indexed by normalized part name
    pub parts: HashMap<String, PackagePart>,
    /// Content type overrides indexed by normalized part name
    pub overrides: HashMap<String, ContentType>,
    /// Default content types indexed by file extension
    pub defaults: HashMap<String, ContentType>,
    /// Root relationships (_rels/.rels)
    pub root_relationships: Vec<Relationship>,
    /// Relationships indexed by normalized source part name
    pub relationships: HashMap<String, Vec<Relationship>>,
}

impl OpcPackage {
    /// Open an OPC package from raw ZIP bytes.
    pub fn new(file_data: &[u8]) -> Result<Self, DocxError> {
        let reader = Cursor::new(file_data);
        let mut archive = ZipArchive::new(reader)?;

        let mut package = OpcPackage::default();
        package.parse_content_types(&mut archive);
        package.parse_root_relationships(&mut archive);
        package.parse_all_relationships(&mut archive)?;
        package.extract_parts(&mut archive)?;

        Ok(package)
    }

    /// Normalize an archive entry name to a part name with a leading slash.
    fn normalize_part_name(name: &str) -> String {
        if name.starts_with('/') {
            name.to_string()
        } else {
            format!("/{}", name)
        }
    }

    /// Read a file from the archive, tolerating a leading-slash variant.
    fn read_file_from_archive<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        path: &str,
    ) -> Option<Vec<u8>> {
        for candidate in [path.trim_start_matches('/'), path] {
            if let Ok(mut file) = archive.by_name(candidate) {
                let mut data = Vec::new();
                if file.read_to_end(&mut data).is_ok() {
                    return Some(data);
                }
            }
        }
        None
    }

    /// Parse [Content_Types].xml into the override and default maps.
    fn parse_content_types<R: Read + Seek>(&mut self, archive: &mut ZipArchive<R>) {
        if let Some(xml_data) = Self::read_file_from_archive(archive, "[Content_Types].xml") {
            self.parse_content_types_xml(&xml_data);
        }
    }

    fn parse_content_types_xml(&mut self, xml_data: &[u8]) {
        let xml_str = String::from_utf8_lossy(xml_data);

        // <Override PartName="/word/document.xml" ContentType="application/..."/>
        let override_pattern =
            regex::Regex::new(r#"<Override\s+PartName="([^"]+)"\s+ContentType="([^"]+)"\s*/>"#)
                .unwrap();
        for cap in override_pattern.captures_iter(&xml_str) {
            let part_name = Self::normalize_part_name(&cap[1]);
            self.overrides
                .insert(part_name, ContentType::from_string(&cap[2]));
        }

        // <Default Extension="rels" ContentType="application/..."/>
        let default_pattern =
            regex::Regex::new(r#"<Default\s+Extension="([^"]+)"\s+ContentType="([^"]+)"\s*/>"#)
                .unwrap();
        for cap in default_pattern.captures_iter(&xml_str) {
            self.defaults
                .insert(cap[1].to_ascii_lowercase(), ContentType::from_string(&cap[2]));
        }
    }

    /// Parse _rels/.rels for root package relationships.
    fn parse_root_relationships<R: Read + Seek>(&mut self, archive: &mut ZipArchive<R>) {
        if let Some(xml_data) = Self::read_file_from_archive(archive, "_rels/.rels") {
            self.root_relationships = Self::parse_relationships_xml(&xml_data);
        }
    }

    /// Parse one relationships part.
    fn parse_relationships_xml(xml_data: &[u8]) -> Vec<Relationship> {
        let xml_str = String::from_utf8_lossy(xml_data);
        let mut relationships = Vec::new();

        // <Relationship Id="rId1" Type="..." Target="word/document.xml"/>
        let rel_pattern = regex::Regex::new(
            r#"<Relationship\s+Id="([^"]+)"\s+Type="([^"]+)"\s+Target="([^"]+)"(?:\s+TargetMode="([^"]+)")?\s*/>"#,
        )
        .unwrap();

        for cap in rel_pattern.captures_iter(&xml_str) {
            relationships.push(Relationship {
                id: cap[1].to_string(),
                relationship_type: RelationshipType::from_string(&cap[2]),
                target: cap[3].to_string(),
                target_mode: cap.get(4).map(|m| m.as_str().to_string()),
            });
        }

        relationships
    }

    /// Parse every *.rels entry and index it by its source part.
    fn parse_all_relationships<R: Read + Seek>(
        &mut self,
        archive: &mut ZipArchive<R>,
    ) -> Result<(), DocxError> {
        let mut rel_entries = Vec::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            if name == "_rels/.rels" || !name.ends_with(".rels") {
                continue;
            }
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            rel_entries.push((name, data));
        }

        for (name, data) in rel_entries {
            let relationships = Self::parse_relationships_xml(&data);
            if relationships.is_empty() {
                continue;
            }
            // "word/_rels/document.xml.rels" describes "/word/document.xml".
            let source_part = Self::normalize_part_name(
                &name
                    .strip_suffix(".rels")
                    .unwrap_or(&name)
                    .replace("_rels/", ""),
            );
            self.relationships.insert(source_part, relationships);
        }

        Ok(())
    }

    /// Extract all parts from the archive.
    fn extract_parts<R: Read + Seek>(&mut self, archive: &mut ZipArchive<R>) -> Result<(), DocxError> {
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let raw_name = file.name().to_string();
            if raw_name == "[Content_Types].xml" || raw_name.ends_with('/') {
                continue;
            }

            let name = Self::normalize_part_name(&raw_name);
            let content_type = self.content_type_for(&name);

            let mut data = Vec::new();
            file.read_to_end(&mut data)?;

            self.parts.insert(
                name.clone(),
                PackagePart {
                    name,
                    content_type,
                    data,
                },
            );
        }

        Ok(())
    }

    /// Resolve a part's content type: override first, extension default second.
    fn content_type_for(&self, name: &str) -> ContentType {
        if let Some(ct) = self.overrides.get(name) {
            return ct.clone();
        }
        let extension = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        if let Some(ct) = self.defaults.get(&extension) {
            return ct.clone();
        }
        ContentType::Unknown(String::new())
    }

    /// Get a part by normalized name.
    pub fn get_part(&self, name: &str) -> Option<&PackagePart> {
        self.parts.get(name)
    }

    /// Get relationships for a source part.
    pub fn get_relationships(&self, source: &str) -> Option<&Vec<Relationship>> {
        self.relationships.get(source)
    }

    /// Name of the main document part, resolved through the root
    /// officeDocument relationship with a conventional fallback.
    pub fn main_document_part_name(&self) -> String {
        self.root_relationships
            .iter()
            .find(|rel| rel.relationship_type == RelationshipType::OfficeDocument)
            .map(|rel| Self::normalize_part_name(&rel.target))
            .unwrap_or_else(|| "/word/document.xml".to_string())
    }

    /// Resolve a relationship of the main document part by ID, returning the
    /// target part. Targets are relative to the word/ directory.
    pub fn resolve_document_target(&self, rel_id: &str) -> Option<&PackagePart> {
        let main_part = self.main_document_part_name();
        let rels = self.get_relationships(&main_part)?;
        let rel = rels.iter().find(|r| r.id == rel_id)?;
        let base = main_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let target = if rel.target.starts_with('/') {
            rel.target.clone()
        } else {
            format!("{}/{}", base, rel.target)
        };
        self.get_part(&target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relationships_xml() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
    <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="word/styles.xml"/>
</Relationships>"#;

        let relationships = OpcPackage::parse_relationships_xml(xml.as_bytes());
        assert_eq!(relationships.len(), 2);
        assert_eq!(relationships[0].id, "rId1");
        assert_eq!(
            relationships[0].relationship_type,
            RelationshipType::OfficeDocument
        );
        assert_eq!(relationships[0].target, "word/document.xml");
    }

    #[test]
    fn test_parse_relationship_with_target_mode() {
        let xml = r#"<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="https://example.com/x.png" TargetMode="External"/>"#;
        let relationships = OpcPackage::parse_relationships_xml(xml.as_bytes());
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships[0].target_mode.as_deref(), Some("External"));
    }

    #[test]
    fn test_content_types_override_and_default() {
        let mut package = OpcPackage::default();
        package.parse_content_types_xml(
            br#"<Types>
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="png" ContentType="image/png"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#,
        );

        assert_eq!(
            package.content_type_for("/word/document.xml"),
            ContentType::MainDocument
        );
        assert_eq!(
            package.content_type_for("/word/media/image1.png"),
            ContentType::ImagePng
        );
        assert_eq!(
            package.content_type_for("/word/unknown.bin"),
            ContentType::Unknown(String::new())
        );
    }

    #[test]
    fn test_new_rejects_non_zip_data() {
        assert!(OpcPackage::new(b"this is not a zip file").is_err());
        assert!(OpcPackage::new(&[]).is_err());
    }

    #[test]
    fn test_main_document_part_name_fallback() {
        let package = OpcPackage::default();
        assert_eq!(package.main_document_part_name(), "/word/document.xml");
    }
}
