//! DOCX export: a minimal OOXML package written with `zip` and `quick-xml`.
//!
//! Only three parts are needed for a valid word-processing document:
//! `[Content_Types].xml`, the package relationships, and the document body.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;

use super::{ExportError, paragraphs};

const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>
"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>
"#;

pub fn render_docx(title: &str, text: &str) -> Result<Vec<u8>, ExportError> {
    let document_xml = build_document_xml(title, text)?;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", PACKAGE_RELS.as_bytes()),
        ("word/document.xml", document_xml.as_slice()),
    ] {
        zip.start_file(name, options.clone())
            .map_err(|e| ExportError::Docx(format!("{name}: {e}")))?;
        zip.write_all(content)
            .map_err(|e| ExportError::Docx(format!("{name}: {e}")))?;
    }

    let cursor = zip.finish().map_err(|e| ExportError::Docx(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn xml_err<E: std::fmt::Display>(e: E) -> ExportError {
    ExportError::Docx(e.to_string())
}

fn build_document_xml(title: &str, text: &str) -> Result<Vec<u8>, ExportError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(xml_err)?;

    let mut document = BytesStart::new("w:document");
    document.push_attribute(("xmlns:w", WORDML_NS));
    writer
        .write_event(Event::Start(document))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("w:body")))
        .map_err(xml_err)?;

    write_heading(&mut writer, title)?;
    for para in paragraphs(text) {
        write_paragraph(&mut writer, para)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("w:body")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:document")))
        .map_err(xml_err)?;

    Ok(writer.into_inner().into_inner())
}

fn write_heading<W: Write>(writer: &mut Writer<W>, title: &str) -> Result<(), ExportError> {
    writer
        .write_event(Event::Start(BytesStart::new("w:p")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("w:r")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("w:rPr")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Empty(BytesStart::new("w:b")))
        .map_err(xml_err)?;
    let mut size = BytesStart::new("w:sz");
    size.push_attribute(("w:val", "32"));
    writer.write_event(Event::Empty(size)).map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:rPr")))
        .map_err(xml_err)?;
    write_text_run(writer, title)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:r")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:p")))
        .map_err(xml_err)
}

fn write_paragraph<W: Write>(writer: &mut Writer<W>, para: &str) -> Result<(), ExportError> {
    writer
        .write_event(Event::Start(BytesStart::new("w:p")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("w:r")))
        .map_err(xml_err)?;
    write_text_run(writer, para)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:r")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:p")))
        .map_err(xml_err)
}

fn write_text_run<W: Write>(writer: &mut Writer<W>, text: &str) -> Result<(), ExportError> {
    let mut t = BytesStart::new("w:t");
    t.push_attribute(("xml:space", "preserve"));
    writer.write_event(Event::Start(t)).map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("w:t")))
        .map_err(xml_err)
}

/// Pull the visible text back out of a DOCX package, one line per `w:p`.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExportError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExportError::Docx(format!("Failed to open DOCX: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ExportError::Docx(format!("Failed to find document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExportError::Docx(format!("Failed to read document.xml: {e}")))?;

    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut text = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text_element = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_element => {
                if let Ok(decoded) = e.decode() {
                    if let Ok(unescaped) = quick_xml::escape::unescape(&decoded) {
                        text.push_str(&unescaped);
                    }
                }
            }
            Ok(Event::GeneralRef(e)) if in_text_element => {
                if let Ok(Some(c)) = e.resolve_char_ref() {
                    text.push(c);
                } else if let Ok(name) = e.decode() {
                    if let Some(resolved) = quick_xml::escape::resolve_xml_entity(&name) {
                        text.push_str(resolved);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExportError::Docx(format!("XML parsing error: {e}"))),
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn package_contains_required_parts() {
        let bytes = render_docx("Transcription", "hello world").unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes[..])).unwrap();

        for name in ["[Content_Types].xml", "_rels/.rels", "word/document.xml"] {
            assert!(archive.by_name(name).is_ok(), "missing part {name}");
        }
    }

    #[test]
    fn round_trip_preserves_text() {
        let source = "first paragraph of speech\n\nsecond paragraph, still talking";
        let bytes = render_docx("Transcription", source).unwrap();
        let extracted = extract_text(&bytes).unwrap();

        assert!(extracted.contains("first paragraph of speech"));
        assert!(normalize(&extracted).contains(&normalize(source)));
    }

    #[test]
    fn xml_special_characters_survive() {
        let source = "a < b && b > c \"quoted\"";
        let bytes = render_docx("Transcription", source).unwrap();
        let extracted = extract_text(&bytes).unwrap();
        eprintln!("DEBUG extracted={extracted:?}");
        assert!(extracted.contains(source));
    }

    #[test]
    fn heading_comes_before_body_text() {
        let bytes = render_docx("Transcription", "body text").unwrap();
        let extracted = extract_text(&bytes).unwrap();
        let title_pos = extracted.find("Transcription").unwrap();
        let body_pos = extracted.find("body text").unwrap();
        assert!(title_pos < body_pos);
    }
}
