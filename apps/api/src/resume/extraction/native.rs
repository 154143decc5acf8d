//! Native text extraction: PDF text layer, DOCX document XML, plain text.

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;

use super::{Document, DocumentKind, ExtractionError, ExtractionStage};

pub struct NativeStage;

#[async_trait]
impl ExtractionStage for NativeStage {
    fn name(&self) -> &'static str {
        "native"
    }

    fn supports(&self, kind: DocumentKind) -> bool {
        matches!(kind, DocumentKind::Pdf | DocumentKind::Docx | DocumentKind::Text)
    }

    async fn extract(&self, doc: &Document) -> Result<String, ExtractionError> {
        match doc.kind {
            DocumentKind::Pdf => extract_pdf(doc.bytes.to_vec()).await,
            DocumentKind::Docx => extract_docx(doc.bytes.clone()).await,
            DocumentKind::Text => Ok(decode_text(&doc.bytes)),
            other => Err(ExtractionError::Failed(format!(
                "native extraction does not handle {other:?}"
            ))),
        }
    }
}

/// pdf-extract is CPU-bound and may panic on malformed input; both stay on the blocking pool.
async fn extract_pdf(bytes: Vec<u8>) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractionError::Failed(format!("PDF parser aborted: {e}")))?
        .map_err(|e| ExtractionError::Failed(format!("PDF parse error: {e}")))
}

/// Upper bound on the inflated `word/document.xml`; uploads are capped well below this.
const MAX_DOCX_XML_BYTES: u64 = 32 * 1024 * 1024;

async fn extract_docx(bytes: Bytes) -> Result<String, ExtractionError> {
    tokio::task::spawn_blocking(move || read_document_xml(&bytes, MAX_DOCX_XML_BYTES))
        .await
        .map_err(|e| ExtractionError::Failed(format!("DOCX reader aborted: {e}")))?
        .map(|xml| docx_xml_to_text(&xml))
}

fn read_document_xml(bytes: &[u8], limit: u64) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Failed(format!("not a DOCX container: {e}")))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractionError::Failed(format!("DOCX has no document body: {e}")))?;
    if entry.size() > limit {
        return Err(too_large(limit));
    }
    // Declared sizes are untrusted.
    let mut xml = String::new();
    entry
        .take(limit + 1)
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::Failed(format!("DOCX body unreadable: {e}")))?;
    if xml.len() as u64 > limit {
        return Err(too_large(limit));
    }
    Ok(xml)
}

fn too_large(limit: u64) -> ExtractionError {
    ExtractionError::Failed(format!("DOCX document body exceeds {limit} bytes"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag regex"))
}

fn break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>").expect("break regex"))
}

fn tab_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<w:tab\s*/>").expect("tab regex"))
}

/// Paragraph ends and breaks become newlines, tabs stay tabs, all other markup is dropped.
pub fn docx_xml_to_text(xml: &str) -> String {
    let with_breaks = break_re().replace_all(xml, "\n");
    let with_tabs = tab_re().replace_all(&with_breaks, "\t");
    let stripped = tag_re().replace_all(&with_tabs, "");
    decode_entities(&stripped)
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", FileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer
            .start_file("word/document.xml", FileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn doc(kind: DocumentKind, bytes: Vec<u8>) -> Document {
        Document {
            bytes: Bytes::from(bytes),
            kind,
            file_name: "cv".into(),
        }
    }

    #[test]
    fn test_docx_xml_paragraphs_become_lines() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>
            <w:p><w:r><w:t>Rust</w:t></w:r><w:r><w:tab/><w:t>Go &amp; C++</w:t></w:r></w:p>
            <w:p><w:r><w:t>Line</w:t><w:br/><w:t>break</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = docx_xml_to_text(xml);
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["Jane Doe", "Rust\tGo & C++", "Line", "break"]);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &#233; &#x41; &bogus; & c"), "a <b> é A &bogus; & c");
    }

    #[tokio::test]
    async fn test_docx_extraction() {
        let bytes = build_docx("<w:p><w:r><w:t>Senior Engineer</w:t></w:r></w:p>");
        let text = NativeStage.extract(&doc(DocumentKind::Docx, bytes)).await.unwrap();
        assert_eq!(text.trim(), "Senior Engineer");
    }

    #[test]
    fn test_oversized_document_body_rejected() {
        let body = format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", "A".repeat(4096));
        let bytes = build_docx(&body);
        // Highly compressible, so the archive itself stays small.
        assert!(bytes.len() < 1024);

        let err = read_document_xml(&bytes, 1024).unwrap_err();
        assert!(err.to_string().contains("exceeds 1024 bytes"));
        assert!(read_document_xml(&bytes, body.len() as u64).is_ok());
    }

    #[tokio::test]
    async fn test_zip_without_document_fails() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("other.txt", FileOptions::default()).unwrap();
        writer.write_all(b"x").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = NativeStage.extract(&doc(DocumentKind::Docx, bytes)).await.unwrap_err();
        assert!(err.to_string().contains("no document body"));
    }

    #[tokio::test]
    async fn test_plain_text_strips_bom_and_tolerates_bad_utf8() {
        let mut bytes = b"\xEF\xBB\xBFJane ".to_vec();
        bytes.push(0xFF);
        let text = NativeStage.extract(&doc(DocumentKind::Text, bytes)).await.unwrap();
        assert_eq!(text, "Jane \u{FFFD}");
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_an_error() {
        let result = NativeStage
            .extract(&doc(DocumentKind::Pdf, b"%PDF-1.4 not really".to_vec()))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_images_not_supported() {
        assert!(!NativeStage.supports(DocumentKind::Png));
        assert!(NativeStage.supports(DocumentKind::Docx));
    }
}
