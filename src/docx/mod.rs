pub mod model;
pub mod package;
pub mod xml;

#[cfg(test)]
pub(crate) mod testutil;

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

use self::model::Document;
use self::package::{DocxPackage, DOCUMENT_PART};
use self::xml::{parse_xml_part, write_xml_part};

/// A DOCX template: the zip package plus the editable body of `word/document.xml`.
pub struct TemplateDocument {
    package: DocxPackage,
    pub document: Document,
}

impl TemplateDocument {
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let package = DocxPackage::from_bytes(bytes)?;
        let part = parse_xml_part(DOCUMENT_PART, package.part(DOCUMENT_PART)?)
            .context("parse word/document.xml")?;
        Ok(Self {
            package,
            document: Document::parse(part),
        })
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("open docx: {}", path.display()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(self) -> anyhow::Result<Vec<u8>> {
        let part = self.document.into_part();
        let mut replacements = HashMap::new();
        replacements.insert(
            DOCUMENT_PART.to_string(),
            write_xml_part(&part).context("serialize word/document.xml")?,
        );
        self.package.to_bytes_with_replacements(&replacements)
    }

    pub fn save(self, path: &Path) -> anyhow::Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).with_context(|| format!("write docx: {}", path.display()))
    }
}
