use serde::Serialize;
use thiserror::Error;

use crate::plan::DocumentId;

pub type Result<T> = std::result::Result<T, ComposeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComposeError {
    #[error("Invalid page range \"{clause}\": {reason}")]
    InvalidRangeSyntax { clause: String, reason: String },

    #[error("Page {page} in \"{clause}\" is out of bounds (document has {total} pages)")]
    OutOfBounds {
        clause: String,
        page: u64,
        total: usize,
    },

    #[error("Selection contains no pages")]
    EmptySelection,

    #[error("Failed to load {document}: {reason}")]
    SourceLoad { document: DocumentId, reason: String },

    #[error("Page index {index} is not valid for {document} ({page_count} pages)")]
    PageIndex {
        document: DocumentId,
        index: usize,
        page_count: usize,
    },

    #[error("Cannot embed overlay image on page {page}: unsupported format {format}")]
    UnsupportedOverlayFormat { page: usize, format: String },

    #[error("Rotation of {0} degrees is not a multiple of 90")]
    UnsupportedRotation(i64),

    #[error("Invalid overlay: {0}")]
    InvalidOverlay(String),

    #[error("Page {page} is listed more than once")]
    DuplicatePage { page: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Stable machine-readable error codes for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidRangeSyntax,
    OutOfBounds,
    EmptySelection,
    SourceLoadError,
    PageIndexError,
    UnsupportedOverlayFormat,
    UnsupportedRotation,
    InvalidOverlay,
    DuplicatePage,
    Cancelled,
    SerializationError,
}

impl ComposeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ComposeError::InvalidRangeSyntax { .. } => ErrorKind::InvalidRangeSyntax,
            ComposeError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            ComposeError::EmptySelection => ErrorKind::EmptySelection,
            ComposeError::SourceLoad { .. } => ErrorKind::SourceLoadError,
            ComposeError::PageIndex { .. } => ErrorKind::PageIndexError,
            ComposeError::UnsupportedOverlayFormat { .. } => ErrorKind::UnsupportedOverlayFormat,
            ComposeError::UnsupportedRotation(_) => ErrorKind::UnsupportedRotation,
            ComposeError::InvalidOverlay(_) => ErrorKind::InvalidOverlay,
            ComposeError::DuplicatePage { .. } => ErrorKind::DuplicatePage,
            ComposeError::Cancelled => ErrorKind::Cancelled,
            ComposeError::Serialization(_) => ErrorKind::SerializationError,
        }
    }

    /// Whether the user can fix the input and retry.
    ///
    /// `PageIndex` means the caller built a plan it never validated.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ComposeError::PageIndex { .. } | ComposeError::Serialization(_)
        )
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            recoverable: self.is_recoverable(),
        }
    }
}

/// Error shape handed to the UI layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub recoverable: bool,
}
