//! Export the latest answer as a Word document.
//!
//! Produces a minimal `.docx` package: a "DocChat Summary" heading followed
//! by one paragraph per line of the answer. An empty answer is written as
//! "(empty)".

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::answer::load_latest_answer;

pub const SUMMARY_HEADING: &str = "DocChat Summary";
pub const SUMMARY_FILE: &str = "summary.docx";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style></w:styles>"#;

fn xml_text(s: &str) -> String {
    html_escape::encode_text(s).into_owned()
}

fn document_xml(text: &str) -> String {
    let body = if text.is_empty() { "(empty)" } else { text };
    let paragraphs: String = body
        .lines()
        .map(|line| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", xml_text(line)))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>\
         <w:p><w:pPr><w:pStyle w:val=\"Heading1\"/></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>\
         {}\
         </w:body></w:document>",
        xml_text(SUMMARY_HEADING),
        paragraphs
    )
}

/// Build the `.docx` bytes for a summary of `text` (trimmed).
pub fn summary_docx(text: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", PACKAGE_RELS.to_string()),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
            ("word/styles.xml", STYLES.to_string()),
            ("word/document.xml", document_xml(text.trim())),
        ] {
            zip.start_file(name, SimpleFileOptions::default())
                .with_context(|| format!("Failed to add {} to summary", name))?;
            zip.write_all(body.as_bytes())?;
        }
        zip.finish().context("Failed to finish summary document")?;
    }
    Ok(buf)
}

/// Write the latest answer to `output` (default `<index_dir>/summary.docx`).
///
/// Fails if nothing has been answered yet.
pub fn export_summary(index_dir: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let Some(text) = load_latest_answer(index_dir).context("Failed to read latest answer")? else {
        bail!("No summary to export yet. Ask a question first.");
    };

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| index_dir.join(SUMMARY_FILE));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, summary_docx(&text)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "exported summary");
    Ok(path)
}
