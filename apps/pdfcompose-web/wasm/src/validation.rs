//! PDF validation and info extraction
//!
//! Validates uploaded files before they join a session and extracts the
//! metadata shown next to each file.

use lopdf::Document;
use pdfcompose_core::{ComposeError, DocumentId, SourceDocument};
use serde::Serialize;

/// PDF file information extracted during validation
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct PdfInfo {
    /// Number of pages in the document
    pub page_count: usize,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    /// File size in bytes
    pub size_bytes: usize,
    /// Document title from metadata (if available)
    pub title: Option<String>,
    /// Document author from metadata (if available)
    pub author: Option<String>,
}

impl PdfInfo {
    pub fn from_source(source: &SourceDocument, bytes: &[u8]) -> Self {
        let (title, author) = extract_metadata(source.document());
        Self {
            page_count: source.page_count(),
            version: extract_version(bytes),
            size_bytes: bytes.len(),
            title,
            author,
        }
    }
}

/// Parse a PDF and extract basic info.
///
/// Fails with `SourceLoad` for anything the engine could not compose from,
/// including encrypted documents.
pub fn validate_pdf(bytes: &[u8]) -> Result<PdfInfo, ComposeError> {
    let source = SourceDocument::load(DocumentId(0), bytes)?;
    Ok(PdfInfo::from_source(&source, bytes))
}

/// Extract PDF version from header
fn extract_version(bytes: &[u8]) -> String {
    // Header format: %PDF-1.7
    if bytes.len() >= 8 && bytes.starts_with(b"%PDF-") {
        if let Ok(version) = std::str::from_utf8(&bytes[5..8]) {
            return version.trim().to_string();
        }
    }
    "1.4".to_string()
}

/// Extract title and author from the Info dictionary
fn extract_metadata(document: &Document) -> (Option<String>, Option<String>) {
    let info = document
        .trailer
        .get(b"Info")
        .and_then(|obj| obj.as_reference())
        .and_then(|id| document.get_dictionary(id));

    let Ok(info) = info else {
        return (None, None);
    };

    let field = |key: &[u8]| {
        info.get(key)
            .and_then(|obj| obj.as_str())
            .ok()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .filter(|text| !text.is_empty())
    };

    (field(b"Title"), field(b"Author"))
}

/// Quick validation without full parsing (for large files)
pub fn quick_validate(bytes: &[u8]) -> Result<(), ComposeError> {
    let reject = |reason: &str| ComposeError::SourceLoad {
        document: DocumentId(0),
        reason: reason.to_string(),
    };

    if bytes.len() < 8 {
        return Err(reject("file too small to be a valid PDF"));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(reject("missing %PDF- header"));
    }

    // Check for EOF marker (should be near the end)
    let tail = &bytes[bytes.len().saturating_sub(1024)..];
    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err(reject("PDF appears truncated (missing %%EOF marker)"));
    }

    Ok(())
}
