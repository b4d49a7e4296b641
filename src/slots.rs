//! Maps a position in the buffer to the three records on screen.

use std::sync::Arc;

use crate::artwork::ArtworkRecord;
use crate::buffer::ArtworkBuffer;
use crate::events::Slot;

#[derive(Debug, Clone, Default)]
pub struct SlotView {
    pub prev: Option<Arc<ArtworkRecord>>,
    pub current: Option<Arc<ArtworkRecord>>,
    pub next: Option<Arc<ArtworkRecord>>,
}

impl SlotView {
    #[must_use]
    pub fn at(buffer: &ArtworkBuffer, current_index: usize) -> Self {
        Self {
            prev: current_index.checked_sub(1).and_then(|i| buffer.get(i)),
            current: buffer.get(current_index),
            next: current_index.checked_add(1).and_then(|i| buffer.get(i)),
        }
    }

    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&Arc<ArtworkRecord>> {
        match slot {
            Slot::Prev => self.prev.as_ref(),
            Slot::Current => self.current.as_ref(),
            Slot::Next => self.next.as_ref(),
        }
    }
}
