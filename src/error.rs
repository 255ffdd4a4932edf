//! Pipeline error types.

use bstr::BString;
use thiserror::Error;

/// Errors that abort the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error while reading input")]
    Io(#[from] std::io::Error),

    #[error("record without a key/value separator: {0:?}")]
    MalformedRecord(BString),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
