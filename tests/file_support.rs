//! Multi-format upload tests: PDF, DOCX, DOC and CSV documents go through
//! the library extractor and the `bizdesk ingest` command.

use bizdesk::extract::{extract_text, ExtractError, DOC_LIMITED_MARKER};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn bizdesk_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("bizdesk");
    path
}

/// Minimal valid PDF showing `phrase` on one page.
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(
        b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n",
    );
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn minimal_docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn setup_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("files")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/bizdesk.sqlite"

[vector_store]
path = "{root}/data/vectors.sqlite"

[upload]
max_bytes = 4096

[embedding]
provider = "disabled"

[llm]
provider = "disabled"
"#,
        root = root.display()
    );
    let config_path = root.join("config").join("bizdesk.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn ingest(config_path: &Path, file: &Path, name: &str) -> (String, String, bool) {
    let output = Command::new(bizdesk_binary())
        .arg("--config")
        .arg(config_path)
        .args(["ingest", file.to_str().unwrap(), "--name", name])
        .env_remove("OPENAI_API_KEY")
        .env_remove("BIZDESK_ALLOWED_EXTENSIONS")
        .env_remove("BIZDESK_MAX_UPLOAD_BYTES")
        .output()
        .unwrap();
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_pdf_text_extracted() {
    let text = extract_text(&minimal_pdf_with_phrase("fresh bread daily"), "menu.pdf").unwrap();
    assert!(text.contains("fresh bread daily"), "got: {:?}", text);
    assert!(!text.contains('\n'));
}

#[test]
fn test_corrupt_pdf_is_an_error() {
    let mut pdf = minimal_pdf_with_phrase("fresh bread daily");
    pdf.truncate(30);
    assert!(matches!(extract_text(&pdf, "menu.pdf"), Err(ExtractError::Pdf(_))));
}

#[test]
fn test_docx_paragraphs_joined() {
    let docx = minimal_docx_with_paragraphs(&["Acme Bakery", "Open   7am to 3pm"]);
    let text = extract_text(&docx, "about.DOCX").unwrap();
    assert_eq!(text, "Acme Bakery Open 7am to 3pm");
}

#[test]
fn test_docx_without_document_xml() {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        zip.finish().unwrap();
    }
    let err = extract_text(&buf, "about.docx").unwrap_err();
    assert!(err.to_string().contains("word/document.xml"));
}

#[test]
fn test_binary_doc_marker() {
    let text = extract_text(&[0xD0, 0xCF, 0x11, 0xE0, 0x00, 0x01], "old.doc").unwrap();
    assert_eq!(text, DOC_LIMITED_MARKER);
}

#[test]
fn test_ingest_pdf_via_cli() {
    let (tmp, config_path) = setup_env();
    let pdf_path = tmp.path().join("files").join("menu.pdf");
    fs::write(&pdf_path, minimal_pdf_with_phrase("fresh bread daily")).unwrap();

    let (stdout, stderr, success) = ingest(&config_path, &pdf_path, "Acme");
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Ingested 'menu.pdf' for Acme"));
    assert!(stdout.contains("chunks:      1"));
}

#[test]
fn test_ingest_docx_with_spaces_in_name() {
    let (tmp, config_path) = setup_env();
    let docx_path = tmp.path().join("files").join("About Us.docx");
    fs::write(&docx_path, minimal_docx_with_paragraphs(&["We sell pies."])).unwrap();

    let (stdout, stderr, success) = ingest(&config_path, &docx_path, "Acme");
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Ingested 'About_Us.docx' for Acme"));
}

#[test]
fn test_ingest_rejects_oversized_file() {
    let (tmp, config_path) = setup_env();
    let big = tmp.path().join("files").join("big.txt");
    fs::write(&big, "x ".repeat(4000)).unwrap();

    let (_, stderr, success) = ingest(&config_path, &big, "Acme");
    assert!(!success);
    assert!(stderr.contains("too large"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_corrupt_pdf_leaves_no_business() {
    let (tmp, config_path) = setup_env();
    let pdf_path = tmp.path().join("files").join("broken.pdf");
    fs::write(&pdf_path, b"%PDF-1.4\nthis is not a real pdf").unwrap();

    let (_, stderr, success) = ingest(&config_path, &pdf_path, "Acme");
    assert!(!success);
    assert!(stderr.contains("Could not extract valid text"), "stderr: {}", stderr);
}
