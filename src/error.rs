use std::time::Duration;

use thiserror::Error;

/// A page request to the photo source did not produce a usable page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request never completed (connect failure, timeout, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The source answered with a non-success HTTP status.
    #[error("photo source responded with status {0}")]
    Status(u16),

    /// The body could not be parsed as a page of photos.
    #[error("malformed photo page: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// An artwork's image resource never became renderable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreloadFailed {
    /// The record did not reach a terminal state within the bounded wait.
    #[error("image not ready after {0:?}")]
    TimedOut(Duration),

    /// The resource load failed, now or on an earlier attempt; failures are sticky.
    #[error("image failed to load")]
    Failed,
}

/// Server-side configuration problems surfaced by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("photo API credential is not configured (set {0})")]
    MissingCredential(String),
}

/// Terminal conditions of the gallery as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GalleryError {
    /// The initial fill produced no record that could be displayed.
    #[error("no displayable photos were loaded")]
    NoPhotos,

    #[error(transparent)]
    Fetch(#[from] FetchError),
}
