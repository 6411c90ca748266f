//! Source document loading.
//!
//! PDFs go through `pdf-extract` page by page, one [`Document`] per page;
//! every other file is read as UTF-8 text into a single document.
//! Extraction never panics: failures come back as [`ExtractError`] and the
//! ingestion pipeline decides whether to skip the file.

use std::path::Path;

use crate::models::Document;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";

/// Extensions picked up when a configured source is a directory.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("{0} is not valid UTF-8 text")]
    NotUtf8(String),
}

/// Content type inferred from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => MIME_PDF,
        _ => MIME_TEXT,
    }
}

/// Extract plain text from raw bytes of the given content type.
pub fn extract_text(bytes: &[u8], content_type: &str, name: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        _ => String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::NotUtf8(name.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// One document per non-blank page, numbered from zero in file order.
pub fn page_documents(id: &str, pages: Vec<String>) -> Vec<Document> {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(page, text)| Document {
            id: id.to_string(),
            page: Some(page),
            text,
        })
        .collect()
}

/// Load a file into documents whose id is the file name: one per page for
/// PDFs, a single document otherwise.
pub fn load_documents(path: &Path) -> Result<Vec<Document>, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    if content_type_for(path) == MIME_PDF {
        let pages = extract_pdf_pages(&bytes)?;
        tracing::debug!(document = %id, pages = pages.len(), "extracted PDF pages");
        return Ok(page_documents(&id, pages));
    }

    let text = extract_text(&bytes, MIME_TEXT, &id)?;
    Ok(vec![Document {
        id,
        page: None,
        text,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type_for(Path::new("a/DSM5.PDF")), MIME_PDF);
        assert_eq!(content_type_for(Path::new("notes.md")), MIME_TEXT);
        assert_eq!(content_type_for(Path::new("README")), MIME_TEXT);
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", MIME_PDF, "x.pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_utf8_text_returns_error() {
        let err = extract_text(&[0xff, 0xfe, 0x00], MIME_TEXT, "x.txt").unwrap_err();
        assert!(matches!(err, ExtractError::NotUtf8(_)));
    }

    #[test]
    fn load_text_document_uses_file_name_as_id() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("ghi-chu.txt");
        std::fs::write(&path, "Rối loạn lo âu lan tỏa").unwrap();
        let docs = load_documents(&path).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "ghi-chu.txt");
        assert_eq!(docs[0].page, None);
        assert_eq!(docs[0].text, "Rối loạn lo âu lan tỏa");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_documents(Path::new("/nonexistent/dsm5.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn corrupt_pdf_file_is_pdf_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("dsm5.pdf");
        std::fs::write(&path, b"%PDF-1.4 truncated").unwrap();
        let err = load_documents(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn pages_become_separate_documents() {
        let pages = vec![
            "Trang bìa".to_string(),
            "  \n".to_string(),
            "Rối loạn trầm cảm chủ yếu".to_string(),
        ];
        let docs = page_documents("dsm5.pdf", pages);
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.id == "dsm5.pdf"));
        assert_eq!(docs[0].page, Some(0));
        assert_eq!(docs[1].page, Some(2));
        assert_eq!(docs[1].text, "Rối loạn trầm cảm chủ yếu");
    }
}
