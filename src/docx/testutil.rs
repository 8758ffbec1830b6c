//! In-memory DOCX fixtures for unit tests.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::model::Document;
use super::package::DOCUMENT_PART;
use super::xml::parse_xml_part;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    )
}

/// One paragraph, one run per element of `runs`.
pub fn para_xml(runs: &[&str]) -> String {
    let mut out = String::from("<w:p>");
    for r in runs {
        out.push_str(&format!(
            r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#,
            escape(r)
        ));
    }
    out.push_str("</w:p>");
    out
}

pub fn cell_xml(text: &str) -> String {
    if text.is_empty() {
        "<w:tc><w:p/></w:tc>".to_string()
    } else {
        format!("<w:tc>{}</w:tc>", para_xml(&[text]))
    }
}

pub fn table_xml(rows: &[&[&str]]) -> String {
    let mut out = String::from("<w:tbl>");
    for row in rows {
        out.push_str("<w:tr>");
        for c in row.iter() {
            out.push_str(&cell_xml(c));
        }
        out.push_str("</w:tr>");
    }
    out.push_str("</w:tbl>");
    out
}

pub fn document(body: &str) -> Document {
    let part = parse_xml_part(DOCUMENT_PART, document_xml(body).as_bytes()).expect("parse fixture");
    Document::parse(part)
}

pub fn docx_bytes(body: &str) -> Vec<u8> {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    let files = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        (DOCUMENT_PART, document_xml(body)),
        ("word/styles.xml", STYLES.to_string()),
    ];
    for (name, data) in files {
        zout.start_file(name, opts).expect("start file");
        zout.write_all(data.as_bytes()).expect("write file");
    }
    zout.finish().expect("finish zip").into_inner()
}
