//! PDF export built directly on `lopdf` objects.
//!
//! One text column in Helvetica, title line in bold, body lines wrapped to a
//! fixed width and paginated.

use lopdf::{Document, Object, Stream, dictionary};

use super::{ExportError, paragraphs};

/// Letter-size page body capacity at 14pt leading.
const LINES_PER_PAGE: usize = 46;
/// Conservative wrap width for 11pt Helvetica on a 512pt column.
const WRAP_COLUMNS: usize = 90;

pub fn render_pdf(title: &str, text: &str) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let body_font_id = doc.new_object_id();
    let title_font_id = doc.new_object_id();
    let resources_id = doc.new_object_id();

    doc.objects.insert(
        body_font_id,
        Object::Dictionary(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        }),
    );
    doc.objects.insert(
        title_font_id,
        Object::Dictionary(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        }),
    );
    doc.objects.insert(
        resources_id,
        Object::Dictionary(dictionary! {
            "Font" => dictionary! {
                "F1" => body_font_id,
                "F2" => title_font_id,
            },
        }),
    );

    let lines = wrap_text(text);
    let mut page_ids = Vec::new();

    for (page_num, page_lines) in lines.chunks(LINES_PER_PAGE).enumerate() {
        let content_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        let content = page_content(if page_num == 0 { Some(title) } else { None }, page_lines);
        doc.objects.insert(
            content_id,
            Object::Stream(Stream::new(dictionary! {}, content.into_bytes())),
        );

        doc.objects.insert(
            page_id,
            Object::Dictionary(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            }),
        );

        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;

    Ok(buffer)
}

/// Template paragraphs wrapped to the column width, with a blank line between
/// paragraphs. Always yields at least one line so an empty transcript still
/// produces a one-page document.
fn wrap_text(text: &str) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, para) in paragraphs(text).iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        for raw_line in para.lines() {
            let mut current = String::new();
            for word in raw_line.split_whitespace() {
                if !current.is_empty() && current.len() + 1 + word.len() > WRAP_COLUMNS {
                    lines.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn page_content(title: Option<&str>, lines: &[String]) -> String {
    let mut content = String::new();
    content.push_str("BT\n");
    content.push_str("50 742 Td\n");
    content.push_str("14 TL\n");

    if let Some(title) = title {
        content.push_str("/F2 16 Tf\n");
        content.push_str(&format!("({}) Tj T*\nT*\n", escape_pdf_string(title)));
    }

    content.push_str("/F1 11 Tf\n");
    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", escape_pdf_string(line)));
    }

    content.push_str("ET\n");
    content
}

fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            c if c.is_ascii() && !c.is_control() => c.to_string(),
            _ => " ".to_string(),
        })
        .collect()
}
