//! Error types for media session operations
//!
//! Refresh failures inside the observer never surface as one of these;
//! they are absorbed there. Everything else (initialization, one-shot
//! fetch, thumbnail resolution) hands them back to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    /// The platform call itself failed (session closed mid-query, COM error, ...)
    #[error("platform media call failed: {0}")]
    Platform(String),

    /// The completion callback was dropped without ever firing
    #[error("platform dropped the pending operation without completing it")]
    Abandoned,

    #[error("media sessions are not supported on this OS")]
    Unsupported,

    #[error("failed to decode thumbnail: {0}")]
    Decode(#[from] image::ImageError),

    #[error("thumbnail is {size} bytes, limit is {limit} bytes")]
    ThumbnailTooLarge { size: usize, limit: usize },

    /// `initialize()` was not awaited from inside a tokio runtime
    #[error("observer must be initialized from inside a tokio runtime")]
    NoRuntime,

    #[error("observer used before initialize()")]
    NotInitialized,

    /// `get_blocking` was called from a thread that is already driving a runtime
    #[error("blocking fetch called from inside an async runtime")]
    BlockingInAsyncContext,

    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

#[cfg(target_os = "windows")]
impl From<windows::core::Error> for MediaError {
    fn from(e: windows::core::Error) -> Self {
        MediaError::Platform(e.message().to_string())
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
