//! Error types for the vetdoc library

use thiserror::Error;

/// Result type alias using DocError
pub type Result<T> = std::result::Result<T, DocError>;

/// Document-level errors. These are fatal to the call that raised them;
/// per-widget failures during probe/fill are recovered internally and
/// never surface here.
#[derive(Debug, Error)]
pub enum DocError {
    /// Error from the underlying lopdf library
    #[error("PDF operation failed: {0}")]
    Pdf(#[from] lopdf::Error),

    /// I/O failure while serializing the finished document
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The renderer could not produce a document at all
    #[error("Layout failed: {0}")]
    Layout(String),

    /// Malformed input buffer on load
    #[error("Malformed document: {0}")]
    Format(String),
}

/// Per-widget failure during probing or filling. Always caught at the
/// widget boundary: a probe failure degrades that entry to the error
/// kind, a fill failure skips that name.
#[derive(Debug, Error)]
pub(crate) enum FieldError {
    /// The widget does not support the attempted kind of access
    #[error("widget does not support this access")]
    Incompatible,

    /// The supplied value's shape does not match the widget's kind
    #[error("value shape does not match widget kind")]
    ValueShape,

    /// The widget dictionary is structurally broken
    #[error("malformed widget: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_convert_into_doc_error() {
        let err = DocError::from(std::io::Error::other("sink closed"));
        assert!(matches!(err, DocError::Io(_)));
    }
}
