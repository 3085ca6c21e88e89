use thiserror::Error;

/// Errors that can occur while turning bitmaps into a font.
///
/// `InvalidInput` and `TracingFailure` are per-glyph conditions: the
/// pipeline records them in the batch outcome instead of aborting.
/// The remaining variants abort the whole request.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FontError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("tracing failed: {0}")]
    TracingFailure(String),

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("font encoding inconsistency: {0}")]
    EncodingConsistency(String),

    #[error("failed to load image: {0}")]
    ImageLoad(String),

    #[error("worker pool: {0}")]
    WorkerPool(String),
}

impl FontError {
    /// True for errors that only affect a single glyph.
    pub fn is_per_glyph(&self) -> bool {
        matches!(self, FontError::InvalidInput(_) | FontError::TracingFailure(_))
    }
}
