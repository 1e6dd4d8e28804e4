//! Error taxonomy of the preview pipeline.
//!
//! Every failure of a single preview is expressed as a [`PreviewError`]. The
//! pipeline only ever needs to make one decision about an error: was the
//! transfer cancelled by the user (stop silently) or did something else go
//! wrong (show the failure colour and keep rendering)?

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreviewError {
    /// The transfer failed before any response headers arrived. Browsers report
    /// user-initiated aborts (navigating away, pressing stop) this way.
    #[error("transfer aborted before any response headers arrived")]
    Aborted,

    #[error("server answered {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("network failure while reading {url}: {message}")]
    Network { url: String, message: String },

    #[error("could not read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("geometry could not be parsed: {0}")]
    Geometry(tobj::LoadError),

    #[error("archive decoding finished without handing over its entries")]
    Incomplete,
}

impl PreviewError {
    /// Whether the error stands for a user-initiated cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PreviewError::Aborted)
    }
}
