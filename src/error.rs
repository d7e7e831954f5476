use std::path::PathBuf;

use thiserror::Error;

use crate::{BatchMode, Precision};

/// Fatal harness errors.
///
/// Every variant aborts the run. A kernel result that deviates from the
/// reference is *not* an error; it is recorded by [`crate::ErrorAccumulator`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("kernel dispatch failed for {precision} ({batch})")]
    DispatchFailed { precision: Precision, batch: BatchMode },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
