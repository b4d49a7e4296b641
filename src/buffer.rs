//! Append-only, lazily filled sequence of artwork records.

use std::ops::Range;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::artwork::ArtworkRecord;
use crate::error::FetchError;
use crate::fetcher::PageFetcher;

#[derive(Debug)]
struct BufferState {
    records: Vec<Arc<ArtworkRecord>>,
    next_page: u32,
    exhausted: bool,
    filling: bool,
    error: Option<FetchError>,
}

/// Point-in-time view of the buffer's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferStatus {
    pub len: usize,
    pub next_page: u32,
    pub exhausted: bool,
    pub filling: bool,
    pub error: Option<FetchError>,
}

impl From<&BufferState> for BufferStatus {
    fn from(state: &BufferState) -> Self {
        Self {
            len: state.records.len(),
            next_page: state.next_page,
            exhausted: state.exhausted,
            filling: state.filling,
            error: state.error.clone(),
        }
    }
}

/// How an [`ArtworkBuffer::ensure_filled`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillReport {
    /// Another fill was already running; this call collapsed into it.
    InFlight,
    /// The requested length is reached.
    Filled { appended: usize },
    /// The source ran out of pages before the requested length was reached.
    Exhausted { appended: usize },
}

/// Shared handle to the growing artwork sequence.
///
/// Records are never reordered or removed. Only [`ensure_filled`] appends, and
/// at most one fill runs at a time per buffer.
///
/// [`ensure_filled`]: ArtworkBuffer::ensure_filled
#[derive(Clone)]
pub struct ArtworkBuffer {
    fetcher: PageFetcher,
    state: Arc<watch::Sender<BufferState>>,
}

impl ArtworkBuffer {
    pub fn new(fetcher: PageFetcher, start_page: u32) -> Self {
        let (state, _) = watch::channel(BufferState {
            records: Vec::new(),
            next_page: start_page,
            exhausted: false,
            filling: false,
            error: None,
        });
        Self {
            fetcher,
            state: Arc::new(state),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Arc<ArtworkRecord>> {
        self.state.borrow().records.get(index).cloned()
    }

    /// Records whose indices fall in `range`, clipped to the current length.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Vec<Arc<ArtworkRecord>> {
        let state = self.state.borrow();
        let end = range.end.min(state.records.len());
        let start = range.start.min(end);
        state.records[start..end].to_vec()
    }

    #[must_use]
    pub fn status(&self) -> BufferStatus {
        BufferStatus::from(&*self.state.borrow())
    }

    #[must_use]
    pub fn is_filling(&self) -> bool {
        self.state.borrow().filling
    }

    /// Observe status changes (appends, exhaustion, errors, fill start/end).
    #[must_use]
    pub fn watch(&self) -> BufferWatch {
        BufferWatch(self.state.subscribe())
    }

    /// `true` when fewer than `lookahead` records remain from `current_index` on.
    #[must_use]
    pub fn low_watermark_check(&self, current_index: usize, lookahead: usize) -> bool {
        self.len().saturating_sub(current_index) < lookahead
    }

    /// Fetches pages until at least `target` records are buffered, the source
    /// is exhausted, or a fetch fails.
    ///
    /// Concurrent calls collapse into the one already running. After a failure
    /// the error is sticky: later calls return it without touching the source.
    pub async fn ensure_filled(&self, target: usize) -> Result<FillReport, FetchError> {
        let mut refusal = None;
        self.state.send_if_modified(|state| {
            if let Some(err) = &state.error {
                refusal = Some(Err(err.clone()));
                false
            } else if state.filling {
                refusal = Some(Ok(FillReport::InFlight));
                false
            } else if state.exhausted {
                refusal = Some(Ok(FillReport::Exhausted { appended: 0 }));
                false
            } else {
                state.filling = true;
                true
            }
        });
        if let Some(result) = refusal {
            debug!(target, ?result, "fill skipped");
            return result;
        }
        let _guard = FillGuard(&self.state);

        let mut appended = 0;
        loop {
            let (len, page) = {
                let state = self.state.borrow();
                (state.records.len(), state.next_page)
            };
            if len >= target {
                return Ok(FillReport::Filled { appended });
            }

            match self.fetcher.fetch_page(page).await {
                Ok(fetched) => {
                    let count = fetched.records.len();
                    let is_empty = fetched.is_empty;
                    self.state.send_modify(|state| {
                        state
                            .records
                            .extend(fetched.records.into_iter().map(Arc::new));
                        state.next_page = page.saturating_add(1);
                        if is_empty {
                            state.exhausted = true;
                        }
                    });
                    appended += count;
                    if is_empty {
                        info!(page, len, "photo source exhausted");
                        return Ok(FillReport::Exhausted { appended });
                    }
                    info!(page, count, len = len + count, "buffered photo page");
                }
                Err(err) => {
                    warn!(page, error = %err, "photo page fetch failed; stopping fill");
                    self.state
                        .send_modify(|state| state.error = Some(err.clone()));
                    return Err(err);
                }
            }
        }
    }
}

/// Clears the in-progress flag even if the fill future is dropped mid-fetch.
struct FillGuard<'a>(&'a watch::Sender<BufferState>);

impl Drop for FillGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|state| state.filling = false);
    }
}

/// Receiver side of [`ArtworkBuffer::watch`].
pub struct BufferWatch(watch::Receiver<BufferState>);

impl BufferWatch {
    /// Waits for the next change. Returns `false` once the buffer is gone.
    pub async fn changed(&mut self) -> bool {
        self.0.changed().await.is_ok()
    }

    #[must_use]
    pub fn status(&self) -> BufferStatus {
        BufferStatus::from(&*self.0.borrow())
    }
}
