//! Renderer collaborator.

use crate::artwork::ArtworkRecord;
use crate::events::{RenderMode, Slot};
use tracing::{error, info};

/// Paints artwork into display slots. Implementations own slot identity and
/// all animation; the controller only says what belongs where.
pub trait Renderer: Send + Sync {
    /// Paint `record` into `slot`, or clear the slot when `None`.
    fn show(&self, slot: Slot, record: Option<&ArtworkRecord>, mode: RenderMode);

    /// Animate back to the resting position of the current slot.
    fn snap_back(&self);

    /// Enter the terminal error display.
    fn show_error(&self, message: &str);
}

/// Renderer that reports instructions through `tracing`, used by the terminal driver.
#[derive(Debug, Default)]
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn show(&self, slot: Slot, record: Option<&ArtworkRecord>, mode: RenderMode) {
        match (record, mode) {
            (None, _) => info!(?slot, "clear"),
            (Some(_), RenderMode::Loading) => info!(?slot, "Loading..."),
            (Some(rec), RenderMode::Normal) => info!(
                ?slot,
                title = %rec.title,
                credit = %rec.credit_line(),
                image = %rec.image_ref,
                "show"
            ),
        }
    }

    fn snap_back(&self) {
        info!("snap back");
    }

    fn show_error(&self, message: &str) {
        error!(message, "gallery unavailable");
    }
}
