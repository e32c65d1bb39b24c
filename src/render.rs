//! HTML rendering of source documents for the citation view.
//!
//! Word documents become one `<p>` per paragraph, spreadsheets become
//! tables (one `<h3>` per sheet), and anything else is shown as `<pre>`.
//! If a structured rendering fails the extracted text is shown as `<pre>`.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::extract::{read_csv_rows, read_docx_paragraphs, read_xlsx_sheets, DocumentFormat, ExtractError};

const PAGE_STYLE: &str = "\
body { font-family: Helvetica, Arial, sans-serif; background: #fff; color: #001f1f; }
h3 { color: #007c41; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #e6e6e6; padding: 6px 8px; text-align: left; }
mark { background:#e6f4ea; }";

/// Render `bytes` as an HTML fragment. `text` is the extracted text, used
/// for plain formats and as the fallback.
pub fn render_document(format: DocumentFormat, bytes: &[u8], text: &str) -> String {
    let rendered = match format {
        DocumentFormat::Docx => render_docx(bytes),
        DocumentFormat::Xlsx => render_xlsx(bytes),
        DocumentFormat::Csv => read_csv_rows(bytes).map(|rows| render_table(&rows)),
        DocumentFormat::Txt => Ok(render_pre(text)),
    };
    rendered.unwrap_or_else(|e| {
        tracing::warn!(format = format.extension(), error = %e, "structured rendering failed, showing plain text");
        render_pre(text)
    })
}

fn render_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    Ok(read_docx_paragraphs(bytes)?
        .iter()
        .map(|p| format!("<p>{}</p>", encode_text(p)))
        .collect::<Vec<_>>()
        .join("\n"))
}

fn render_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    Ok(read_xlsx_sheets(bytes)?
        .iter()
        .map(|sheet| format!("<h3>Sheet: {}</h3>{}", encode_text(&sheet.name), render_table(&sheet.rows)))
        .collect())
}

fn render_pre(text: &str) -> String {
    format!("<pre>{}</pre>", encode_text(text))
}

/// First row is the header.
fn render_table(rows: &[Vec<String>]) -> String {
    let mut html = String::from("<table>\n");
    let mut iter = rows.iter();
    if let Some(header) = iter.next() {
        html.push_str("<thead><tr>");
        for cell in header {
            html.push_str(&format!("<th>{}</th>", encode_text(cell)));
        }
        html.push_str("</tr></thead>\n");
    }
    html.push_str("<tbody>\n");
    for row in iter {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", encode_text(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>");
    html
}

/// Wrap a rendered (and highlighted) body in a standalone page titled with
/// the source id. `anchor` is the fragment to scroll to on load.
pub fn render_page(source_id: &str, body: &str, anchor: Option<&str>) -> String {
    let script = anchor
        .map(|a| {
            format!(
                "<script>window.addEventListener('load',function(){{var e=document.getElementById(\"{}\");if(e)e.scrollIntoView();}});</script>\n",
                encode_double_quoted_attribute(a)
            )
        })
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset='utf-8'/>\n<title>{title}</title>\n<style>\n{style}\n</style>\n{script}</head>\n<body>\n<h2 style=\"margin-top:0\">{title}</h2>\n{body}\n</body>\n</html>\n",
        title = encode_text(source_id),
        style = PAGE_STYLE,
        script = script,
        body = body,
    )
}
