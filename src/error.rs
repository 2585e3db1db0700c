use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SourceUnavailable,
    RenderFailure,
    LayoutFailure,
    EncodeFailure,
}

/// Terminal failure of a single export call.
///
/// Every variant carries a message that is safe to show to the user. The
/// inputs of the failed call stay untouched, so the caller may retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("source image unavailable: {0}")]
    SourceUnavailable(String),

    #[error("failed to render overlay: {0}")]
    RenderFailure(String),

    #[error("failed to lay out report: {0}")]
    LayoutFailure(String),

    #[error("failed to encode export: {0}")]
    EncodeFailure(String),
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            ExportError::RenderFailure(_) => ErrorKind::RenderFailure,
            ExportError::LayoutFailure(_) => ErrorKind::LayoutFailure,
            ExportError::EncodeFailure(_) => ErrorKind::EncodeFailure,
        }
    }
}
