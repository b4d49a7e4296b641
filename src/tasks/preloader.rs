//! Warms image resources ahead of display and tracks their readiness.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::select;
use tokio::sync::{Semaphore, watch};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::artwork::{ArtworkRecord, PreloadState};
use crate::buffer::ArtworkBuffer;
use crate::error::PreloadFailed;
use crate::events::{NavigationPhase, NavigationSnapshot};

/// Fetches an image resource until it is ready to paint.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn load(&self, uri: &Url) -> Result<()>;
}

/// Downloads the image and decodes it once so a broken file is caught before
/// it reaches the screen.
#[derive(Debug, Clone)]
pub struct HttpImageLoader {
    client: Client,
}

impl HttpImageLoader {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl ResourceLoader for HttpImageLoader {
    async fn load(&self, uri: &Url) -> Result<()> {
        let bytes = self
            .client
            .get(uri.clone())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let (width, height) = tokio::task::spawn_blocking(move || decode_dimensions(&bytes))
            .await
            .context("decode task panicked")??;
        debug!(%uri, width, height, "image decoded");
        Ok(())
    }
}

fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()? // sniff based on content
        .decode()?;
    Ok((img.width(), img.height()))
}

/// Drives records from `Pending` to `Ready`/`Failed`, at most one load per record.
#[derive(Clone)]
pub struct Preloader {
    loader: Arc<dyn ResourceLoader>,
    permits: Arc<Semaphore>,
    ready_timeout: Duration,
}

impl Preloader {
    pub fn new(loader: Arc<dyn ResourceLoader>, max_in_flight: usize, ready_timeout: Duration) -> Self {
        Self {
            loader,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            ready_timeout,
        }
    }

    /// Starts loading `record` unless it is already loading or done.
    ///
    /// Returns `true` when this call started a load.
    pub fn preload(&self, record: &Arc<ArtworkRecord>) -> bool {
        if !record.advance_state(PreloadState::Loading) {
            return false;
        }
        let loader = self.loader.clone();
        let permits = self.permits.clone();
        let record = record.clone();
        tokio::spawn(async move {
            // The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();
            match loader.load(&record.image_ref).await {
                Ok(()) => {
                    record.advance_state(PreloadState::Ready);
                    debug!(image = %record.image_ref, "preloaded");
                }
                Err(err) => {
                    record.advance_state(PreloadState::Failed);
                    warn!(image = %record.image_ref, error = %err, "preload failed");
                }
            }
        });
        true
    }

    /// Waits until `record` is `Ready` or `Failed`, bounded by the configured
    /// timeout. A record that times out is marked `Failed`.
    pub async fn await_ready(&self, record: &ArtworkRecord) -> Result<(), PreloadFailed> {
        match timeout(self.ready_timeout, record.wait_terminal()).await {
            Ok(PreloadState::Ready) => Ok(()),
            Ok(_) => Err(PreloadFailed::Failed),
            Err(_) => {
                record.advance_state(PreloadState::Failed);
                // The load may have finished between the deadline and the mark.
                if record.preload_state() == PreloadState::Ready {
                    Ok(())
                } else {
                    warn!(image = %record.image_ref, timeout = ?self.ready_timeout, "preload timed out");
                    Err(PreloadFailed::TimedOut(self.ready_timeout))
                }
            }
        }
    }

    /// Starts loads for every `Pending` record in `[start, start + window)`.
    /// Does nothing while the buffer is being filled.
    pub fn sweep(&self, buffer: &ArtworkBuffer, start: usize, window: usize) -> usize {
        if buffer.is_filling() {
            trace!("fill in progress; sweep suppressed");
            return 0;
        }
        buffer
            .slice(start..start.saturating_add(window))
            .iter()
            .filter(|record| record.preload_state() == PreloadState::Pending)
            .filter(|record| self.preload(record))
            .count()
    }
}

/// Periodic sweep around the controller's current position.
#[instrument(skip_all, fields(window = window))]
pub async fn run_sweep(
    preloader: Preloader,
    buffer: ArtworkBuffer,
    position: watch::Receiver<NavigationSnapshot>,
    window: usize,
    every: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let snapshot = *position.borrow();
                if snapshot.phase == NavigationPhase::Error {
                    continue;
                }
                let start = snapshot.current_index.unwrap_or(0);
                let started = preloader.sweep(&buffer, start, window);
                if started > 0 {
                    debug!(start, started, "sweep started preloads");
                }
            }
        }
    }
    Ok(())
}
