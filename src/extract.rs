//! Text extraction for uploaded business documents.
//!
//! Dispatches on the file extension (pdf, docx, doc, txt, csv) and returns a
//! single line of plain UTF-8 text with every whitespace run collapsed to one
//! space. Callers check the extension with [`allowed_file`] first; anything
//! else reaching [`extract_text`] is reported as unsupported.

use std::io::Read;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Returned for legacy `.doc` files whose bytes contain no readable text.
pub const DOC_LIMITED_MARKER: &str = "[Content extraction for .doc format is limited]";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("CSV extraction failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Lowercased extension after the last `.`, if any.
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Whether `filename` carries one of the `allowed` extensions (case-insensitive).
pub fn allowed_file(filename: &str, allowed: &[String]) -> bool {
    match file_extension(filename) {
        Some(ext) => allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Reduce a client-supplied filename to a safe basename.
///
/// Directory components are dropped, spaces become underscores, anything
/// outside `[A-Za-z0-9._-]` is removed and leading dots/underscores are
/// stripped. May return an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    cleaned.trim_start_matches(|c: char| c == '.' || c == '_').to_string()
}

/// Sanitized name for an accepted upload that keeps its extension.
///
/// Falls back to `document.<ext>` when sanitizing would lose the extension.
pub fn stored_filename(raw: &str) -> String {
    let sanitized = sanitize_filename(raw);
    let ext = file_extension(raw).unwrap_or_default();
    if file_extension(&sanitized).as_deref() == Some(ext.as_str()) {
        sanitized
    } else {
        format!("document.{}", ext)
    }
}

/// Extract plain text from an uploaded file's bytes.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    let ext = file_extension(filename).unwrap_or_default();
    let raw = match ext.as_str() {
        "pdf" => extract_pdf(bytes)?,
        "docx" => extract_docx(bytes)?,
        "doc" => extract_doc(bytes, filename),
        "txt" => String::from_utf8_lossy(bytes).into_owned(),
        "csv" => extract_csv(bytes)?,
        _ => return Err(ExtractError::Unsupported(filename.to_string())),
    };
    Ok(normalize_whitespace(&raw))
}

/// Collapse every whitespace run to a single space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// pdf-extract panics on some malformed inputs.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser panicked on malformed PDF".to_string())),
    }
}

// Legacy binary .doc: keep whatever decodes as text.
fn extract_doc(bytes: &[u8], filename: &str) -> String {
    tracing::warn!(filename, "legacy .doc file, extraction may be limited");
    let text: String = String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect();
    if text.trim().is_empty() {
        DOC_LIMITED_MARKER.to_string()
    } else {
        text
    }
}

fn extract_csv(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut out = String::new();
    for record in reader.byte_records() {
        let record = record?;
        let cells: Vec<String> = record
            .iter()
            .map(|cell| String::from_utf8_lossy(cell).trim().to_string())
            .filter(|cell| !cell.is_empty())
            .collect();
        out.push_str(&cells.join(" "));
        out.push('\n');
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    extract_paragraphs(&doc_xml)
}

/// Concatenate `w:t` runs, one line per `w:p` paragraph.
fn extract_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"p" => out.push('\n'),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
