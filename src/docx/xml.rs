use anyhow::Context;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;

/// One lossless XML event. Attribute values are kept as raw (already escaped) text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Decl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    CData {
        text: String,
    },
    Comment {
        text: String,
    },
    PI {
        content: String,
    },
    DocType {
        text: String,
    },
}

impl XmlEvent {
    pub fn start(name: &str, attrs: &[(&str, &str)]) -> Self {
        Self::Start {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn end(name: &str) -> Self {
        Self::End {
            name: name.to_string(),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::Text {
            text: text.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
}

pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlPart> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader
            .read_event_into(&mut buf)
            .with_context(|| format!("read xml event in {name}"))?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().context("decl version")?);
                let encoding = d
                    .encoding()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                let standalone = d
                    .standalone()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                events.push(XmlEvent::Decl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => events.push(XmlEvent::Start {
                name: bytes_to_string(s.name().as_ref()),
                attrs: collect_attrs(&s)?,
            }),
            Event::End(e) => events.push(XmlEvent::End {
                name: bytes_to_string(e.name().as_ref()),
            }),
            Event::Empty(s) => events.push(XmlEvent::Empty {
                name: bytes_to_string(s.name().as_ref()),
                attrs: collect_attrs(&s)?,
            }),
            Event::Text(t) => {
                let text = t.unescape().context("unescape text")?.into_owned();
                events.push(XmlEvent::Text { text });
            }
            Event::CData(t) => events.push(XmlEvent::CData {
                text: bytes_to_string(t.into_inner()),
            }),
            Event::Comment(t) => events.push(XmlEvent::Comment {
                text: bytes_to_string(t.into_inner()),
            }),
            Event::PI(t) => {
                let target = bytes_to_string(t.target());
                let content = bytes_to_string(t.content());
                events.push(XmlEvent::PI {
                    content: format!("{target}{content}"),
                });
            }
            Event::DocType(t) => events.push(XmlEvent::DocType {
                text: bytes_to_string(t.into_inner()),
            }),
        }
    }

    Ok(XmlPart {
        name: name.to_string(),
        events,
    })
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        // Raw bytes: unescaping character references here would not survive write-back.
        attrs.push((
            bytes_to_string(a.key.as_ref()),
            bytes_to_string(a.value.as_ref()),
        ));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

pub fn set_attr(attrs: &mut Vec<(String, String)>, key: &str, value: &str) {
    if let Some((_, v)) = attrs.iter_mut().find(|(k, _)| k == key) {
        *v = value.to_string();
    } else {
        attrs.push((key.to_string(), value.to_string()));
    }
}

pub fn write_xml_part(part: &XmlPart) -> anyhow::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();

    fn escape_text_into(out: &mut Vec<u8>, text: &str) {
        for ch in text.chars() {
            match ch {
                '&' => out.extend_from_slice(b"&amp;"),
                '<' => out.extend_from_slice(b"&lt;"),
                '>' => out.extend_from_slice(b"&gt;"),
                _ => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
    }

    fn write_start_like(out: &mut Vec<u8>, name: &str, attrs: &[(String, String)], empty: bool) {
        out.push(b'<');
        out.extend_from_slice(name.as_bytes());
        for (k, v) in attrs {
            out.push(b' ');
            out.extend_from_slice(k.as_bytes());
            out.extend_from_slice(b"=\"");
            out.extend_from_slice(v.as_bytes());
            out.push(b'"');
        }
        if empty {
            out.extend_from_slice(b"/>");
        } else {
            out.push(b'>');
        }
    }

    for ev in &part.events {
        match ev {
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                let d =
                    BytesDecl::new(version.as_str(), encoding.as_deref(), standalone.as_deref());
                let mut writer = quick_xml::Writer::new(Vec::new());
                writer.write_event(Event::Decl(d)).context("write decl")?;
                out.extend_from_slice(&writer.into_inner());
            }
            XmlEvent::Start { name, attrs } => write_start_like(&mut out, name, attrs, false),
            XmlEvent::End { name } => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(name.as_bytes());
                out.push(b'>');
            }
            XmlEvent::Empty { name, attrs } => write_start_like(&mut out, name, attrs, true),
            XmlEvent::Text { text } => escape_text_into(&mut out, text),
            XmlEvent::CData { text } => {
                out.extend_from_slice(b"<![CDATA[");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"]]>");
            }
            XmlEvent::Comment { text } => {
                out.extend_from_slice(b"<!--");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"-->");
            }
            XmlEvent::PI { content } => {
                out.extend_from_slice(b"<?");
                out.extend_from_slice(content.as_bytes());
                out.extend_from_slice(b"?>");
            }
            XmlEvent::DocType { text } => {
                out.extend_from_slice(b"<!DOCTYPE");
                out.extend_from_slice(text.as_bytes());
                out.push(b'>');
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_preserves_attr_entity_refs() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?><root xmlns:o="urn:test" o:gfxdata="A&#xD;&#xA;B"/>"#;
        let part = parse_xml_part("test.xml", xml).expect("parse xml");
        let s = String::from_utf8(write_xml_part(&part).expect("write xml")).expect("utf8");

        assert!(s.contains(r#"o:gfxdata="A&#xD;&#xA;B""#));
        assert!(!s.contains(r#"o:gfxdata="A&amp;#xD;"#));
    }

    #[test]
    fn text_is_unescaped_on_read_and_escaped_on_write() {
        let xml = b"<w:t>&lt;Vorname&gt; &amp; Co</w:t>";
        let part = parse_xml_part("test.xml", xml).expect("parse xml");
        assert_eq!(part.events[1], XmlEvent::text("<Vorname> & Co"));
        assert_eq!(write_xml_part(&part).expect("write"), xml.to_vec());
    }

    #[test]
    fn set_attr_replaces_or_appends() {
        let mut attrs = vec![("w:val".to_string(), "1".to_string())];
        set_attr(&mut attrs, "w:val", "2");
        set_attr(&mut attrs, "xml:space", "preserve");
        assert_eq!(find_attr(&attrs, "w:val"), Some("2"));
        assert_eq!(find_attr(&attrs, "xml:space"), Some("preserve"));
        assert_eq!(attrs.len(), 2);
    }
}
