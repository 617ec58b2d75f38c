//! Self-contained HTML renderer.

use crate::domain::document::{Block, Document};

use super::{RenderError, Renderer};

/// Renders every block kind; charts degrade to a placeholder figure.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, doc: &Document) -> Result<Vec<u8>, RenderError> {
        Ok(render_html(doc).into_bytes())
    }
}

pub fn render_html(doc: &Document) -> String {
    let title = escape(&doc.title);
    let mut out = vec![
        format!("<html><head><meta charset='utf-8'><title>{title}</title></head><body>"),
        format!("<h1>{title}</h1>"),
    ];
    for section in &doc.sections {
        out.push(format!(
            "<section id=\"{}\"><h2>{}</h2>",
            escape(&section.id),
            escape(&section.heading)
        ));
        for block in &section.blocks {
            render_block(block, &mut out);
        }
        out.push("</section>".to_string());
    }
    out.push("</body></html>".to_string());
    out.join("\n")
}

fn render_block(block: &Block, out: &mut Vec<String>) {
    match block {
        Block::Paragraph { text, .. } => out.push(format!("<p>{}</p>", escape(text))),
        Block::List { items } => {
            out.push("<ul>".to_string());
            out.extend(items.iter().map(|item| format!("<li>{}</li>", escape(item))));
            out.push("</ul>".to_string());
        }
        Block::Table { rows } => {
            out.push("<table>".to_string());
            for row in rows {
                let cells: String = row
                    .iter()
                    .map(|cell| format!("<td>{}</td>", escape(cell)))
                    .collect();
                out.push(format!("<tr>{cells}</tr>"));
            }
            out.push("</table>".to_string());
        }
        Block::Chart { .. } => {
            out.push("<figure class=\"chart\"><figcaption>Chart not rendered</figcaption></figure>".to_string());
        }
    }
}

/// Escape text for element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
