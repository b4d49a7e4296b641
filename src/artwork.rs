//! Artwork records and their preload lifecycle.

use reqwest::Url;
use tokio::sync::watch;

/// Readiness of an artwork's image resource.
///
/// Transitions only move forward: `Pending -> Loading -> {Ready | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadState {
    Pending,
    Loading,
    Ready,
    Failed,
}

impl PreloadState {
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Loading => 1,
            Self::Ready | Self::Failed => 2,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

/// One fetched photo plus its metadata and preload status.
///
/// Everything except the preload state is fixed at construction.
#[derive(Debug)]
pub struct ArtworkRecord {
    pub image_ref: Url,
    pub title: String,
    pub attribution_text: String,
    pub attribution_ref: Option<Url>,
    state: watch::Sender<PreloadState>,
}

impl ArtworkRecord {
    pub const UNTITLED: &'static str = "Untitled";
    pub const UNKNOWN_AUTHOR: &'static str = "Unknown photographer";

    pub fn new(
        image_ref: Url,
        title: impl Into<String>,
        attribution_text: impl Into<String>,
        attribution_ref: Option<Url>,
    ) -> Self {
        let (state, _) = watch::channel(PreloadState::Pending);
        Self {
            image_ref,
            title: title.into(),
            attribution_text: attribution_text.into(),
            attribution_ref,
            state,
        }
    }

    #[must_use]
    pub fn preload_state(&self) -> PreloadState {
        *self.state.borrow()
    }

    /// Moves the state forward to `to`. Returns `false` (and changes nothing)
    /// when `to` would not be a forward step.
    pub(crate) fn advance_state(&self, to: PreloadState) -> bool {
        self.state.send_if_modified(|current| {
            if to.rank() > current.rank() {
                *current = to;
                true
            } else {
                false
            }
        })
    }

    /// Suspends until the state is `Ready` or `Failed` and returns it.
    pub async fn wait_terminal(&self) -> PreloadState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            // The sender lives in `self`, so this only happens if it was dropped mid-wait.
            Err(_) => self.preload_state(),
        }
    }

    /// Caption line shown under the photo.
    #[must_use]
    pub fn credit_line(&self) -> String {
        format!("Photo by {}", self.attribution_text)
    }
}
