//! HTML export: a self-contained page with the transcript as paragraphs.

use std::fmt::Write as FmtWrite;

use super::paragraphs;

pub fn render_html(title: &str, text: &str) -> String {
    let mut body = String::new();
    for para in paragraphs(text) {
        let _ = writeln!(body, "        <p>{}</p>", escape_html(para));
    }

    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
             <meta charset=\"utf-8\">\n\
             <title>{title}</title>\n\
             <style>\n\
                 body {{ font-family: Arial, sans-serif; line-height: 1.6; max-width: 800px; margin: 0 auto; padding: 20px; }}\n\
                 h1 {{ color: #333; text-align: center; }}\n\
                 p {{ margin-bottom: 16px; }}\n\
             </style>\n\
         </head>\n\
         <body>\n\
             <h1>{title}</h1>\n{body}\
         </body>\n\
         </html>\n",
        title = escape_html(title),
        body = body,
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
