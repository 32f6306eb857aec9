//! File format detection and text extraction (PDF, DOCX, plain text).
//!
//! The format is chosen by content signature first and by filename extension
//! second. Unknown extensions are decoded as UTF-8 text instead of failing.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use triage_shared::{Result, TriageError};

/// Leading bytes of every PDF file.
const PDF_SIGNATURE: &[u8] = b"%PDF";

/// Maximum decompressed bytes read from the DOCX body (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Text-bearing formats we know how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Docx,
    PlainText,
}

/// Pick a format from the leading bytes, then from the extension.
pub fn detect_format(filename: &str, bytes: &[u8]) -> FileFormat {
    if bytes.starts_with(PDF_SIGNATURE) {
        return FileFormat::Pdf;
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => FileFormat::Pdf,
        Some("docx") => FileFormat::Docx,
        _ => FileFormat::PlainText,
    }
}

/// Extract plain text from file bytes.
pub fn extract_file(filename: &str, bytes: &[u8]) -> Result<String> {
    let format = detect_format(filename, bytes);
    debug!(filename, ?format, size = bytes.len(), "extracting file");

    match format {
        FileFormat::Pdf => extract_pdf(bytes),
        FileFormat::Docx => extract_docx(bytes),
        FileFormat::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    if !bytes.starts_with(b"%PDF-") {
        let header = String::from_utf8_lossy(&bytes[..bytes.len().min(8)]).into_owned();
        return Err(TriageError::extraction(format!(
            "invalid PDF header {header:?}, not a valid PDF file"
        )));
    }

    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| TriageError::extraction(format!("failed to extract PDF content: {e}")))?;

    if text.trim().is_empty() {
        return Err(TriageError::extraction(
            "PDF extraction returned empty text, possibly a scanned or image-only PDF",
        ));
    }
    Ok(text)
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| TriageError::extraction(format!("failed to open DOCX archive: {e}")))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| TriageError::extraction(format!("DOCX has no word/document.xml: {e}")))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| TriageError::extraction(format!("failed to read DOCX body: {e}")))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(TriageError::extraction(
            "word/document.xml exceeds size limit",
        ));
    }

    docx_paragraphs(&xml)
}

/// Collect `<w:t>` runs, one line per `<w:p>` paragraph.
fn docx_paragraphs(xml: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    let mut paragraph = String::new();
    let mut paragraphs: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut paragraph)),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => paragraph.push('\t'),
                b"br" => paragraph.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| TriageError::extraction(format!("DOCX text decode failed: {e}")))?;
                paragraph.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TriageError::extraction(format!(
                    "DOCX XML parse failed: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    if !paragraph.is_empty() {
        paragraphs.push(paragraph);
    }
    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn signature_beats_extension() {
        assert_eq!(detect_format("notes.txt", b"%PDF-1.7 ..."), FileFormat::Pdf);
        assert_eq!(detect_format("Report.PDF", b"garbage"), FileFormat::Pdf);
        assert_eq!(detect_format("memo.docx", b"PK\x03\x04"), FileFormat::Docx);
        assert_eq!(detect_format("data.csv", b"a,b,c"), FileFormat::PlainText);
        assert_eq!(detect_format("no_extension", b"hello"), FileFormat::PlainText);
    }

    #[test]
    fn unknown_extension_decodes_as_utf8() {
        let text = extract_file("script.rs", "fn main() {}".as_bytes()).unwrap();
        assert_eq!(text, "fn main() {}");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let text = extract_file("blob.bin", &[b'o', b'k', 0xff]).unwrap();
        assert!(text.starts_with("ok"));
    }

    #[test]
    fn pdf_extension_with_bad_header_fails() {
        let err = extract_file("paper.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, TriageError::Extraction { .. }));
        assert!(err.to_string().contains("invalid PDF header"));
    }

    #[test]
    fn sniffed_pdf_with_bad_header_fails() {
        let err = extract_file("notes.txt", b"%PDFnope").unwrap_err();
        assert!(err.to_string().contains("invalid PDF header"));
    }

    #[test]
    fn docx_paragraphs_are_lines() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>First</w:t></w:r><w:r><w:t xml:space="preserve"> paragraph</w:t></w:r></w:p>
    <w:p><w:r><w:t>Fish &amp; chips</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = extract_file("memo.docx", &docx_with_body(body)).unwrap();
        assert_eq!(text, "First paragraph\nFish & chips");
    }

    #[test]
    fn docx_that_is_not_a_zip_fails() {
        let err = extract_file("memo.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, TriageError::Extraction { .. }));
    }
}
