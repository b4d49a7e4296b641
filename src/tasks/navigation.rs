//! Navigation state machine: owns the current position and serialises
//! intents against buffer state and preload readiness.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::artwork::PreloadState;
use crate::buffer::ArtworkBuffer;
use crate::error::{FetchError, GalleryError};
use crate::events::{
    Intent, IntentOutcome, NavigationPhase, NavigationSnapshot, Rejection, RenderMode, Slot,
};
use crate::render::Renderer;
use crate::slots::SlotView;
use crate::tasks::preloader::Preloader;

pub const NO_PHOTOS_MESSAGE: &str = "Could not load any photos.";
pub const FETCH_FAILED_MESSAGE: &str = "Could not connect to the photo service.";

#[derive(Debug, Clone)]
pub struct NavigationSettings {
    pub initial_fill: usize,
    pub lookahead: usize,
    pub refill_chunk: usize,
    /// Delay that lets the renderer's animation finish before slots are refreshed.
    pub transition: Duration,
    pub seed: Option<u64>,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            initial_fill: 5,
            lookahead: 3,
            refill_chunk: 5,
            transition: Duration::from_millis(400),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Adjacent,
    Jump,
}

pub struct NavigationController {
    buffer: ArtworkBuffer,
    preloader: Preloader,
    renderer: Arc<dyn Renderer>,
    settings: NavigationSettings,
    rng: StdRng,
    phase: NavigationPhase,
    current: Option<usize>,
    published: watch::Sender<NavigationSnapshot>,
}

impl NavigationController {
    pub fn new(
        buffer: ArtworkBuffer,
        preloader: Preloader,
        renderer: Arc<dyn Renderer>,
        settings: NavigationSettings,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let (published, _) = watch::channel(NavigationSnapshot {
            phase: NavigationPhase::Uninitialized,
            current_index: None,
        });
        Self {
            buffer,
            preloader,
            renderer,
            settings,
            rng,
            phase: NavigationPhase::Uninitialized,
            current: None,
            published,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> NavigationSnapshot {
        NavigationSnapshot {
            phase: self.phase,
            current_index: self.current,
        }
    }

    /// Follow phase and position changes from outside the controller.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NavigationSnapshot> {
        self.published.subscribe()
    }

    #[must_use]
    pub fn buffer(&self) -> &ArtworkBuffer {
        &self.buffer
    }

    fn set_phase(&mut self, phase: NavigationPhase) {
        self.phase = phase;
        let snapshot = self.snapshot();
        self.published.send_replace(snapshot);
    }

    fn commit(&mut self, index: usize) {
        self.current = Some(index);
        let snapshot = self.snapshot();
        self.published.send_replace(snapshot);
    }

    fn enter_error(&mut self, message: &str) {
        if self.phase == NavigationPhase::Error {
            return;
        }
        warn!(message, "entering terminal error state");
        self.set_phase(NavigationPhase::Error);
        self.renderer.show_error(message);
    }

    /// Reacts to a fill failure reported by the buffer.
    pub fn on_fetch_error(&mut self, err: &FetchError) {
        debug!(error = %err, "buffer reported fetch failure");
        self.enter_error(FETCH_FAILED_MESSAGE);
    }

    /// Fills the initial buffer and shows the first displayable record.
    pub async fn initialize(&mut self) -> Result<usize, GalleryError> {
        match self.phase {
            NavigationPhase::Uninitialized => {}
            NavigationPhase::Error => return Err(GalleryError::NoPhotos),
            NavigationPhase::Idle | NavigationPhase::Transitioning => {
                if let Some(index) = self.current {
                    return Ok(index);
                }
            }
        }

        if let Err(err) = self.buffer.ensure_filled(self.settings.initial_fill).await {
            self.enter_error(FETCH_FAILED_MESSAGE);
            return Err(err.into());
        }
        let len = self.buffer.len();
        if len == 0 {
            self.enter_error(NO_PHOTOS_MESSAGE);
            return Err(GalleryError::NoPhotos);
        }

        for index in 0..len {
            let Some(record) = self.buffer.get(index) else {
                break;
            };
            self.preloader.preload(&record);
            match self.preloader.await_ready(&record).await {
                Ok(()) => {
                    self.commit(index);
                    self.set_phase(NavigationPhase::Idle);
                    self.render_all(index);
                    self.refill_if_low(index);
                    info!(index, len, "gallery initialised");
                    return Ok(index);
                }
                Err(cause) => warn!(index, %cause, "initial photo unusable; trying next"),
            }
        }
        self.enter_error(NO_PHOTOS_MESSAGE);
        Err(GalleryError::NoPhotos)
    }

    /// Handles one intent to completion.
    pub async fn handle(&mut self, intent: Intent) -> IntentOutcome {
        if intent == Intent::CancelReturn {
            // Only meaningful while a record is on screen.
            return match (self.phase, self.current) {
                (NavigationPhase::Error, _) => IntentOutcome::Rejected(Rejection::Errored),
                (_, None) => IntentOutcome::Rejected(Rejection::NotInitialized),
                (_, Some(_)) => {
                    self.renderer.snap_back();
                    IntentOutcome::SnappedBack
                }
            };
        }
        match self.phase {
            NavigationPhase::Uninitialized => {
                return IntentOutcome::Rejected(Rejection::NotInitialized);
            }
            NavigationPhase::Error => return IntentOutcome::Rejected(Rejection::Errored),
            NavigationPhase::Transitioning => return IntentOutcome::Busy,
            NavigationPhase::Idle => {}
        }
        if let Some(err) = self.buffer.status().error {
            self.on_fetch_error(&err);
            return IntentOutcome::Rejected(Rejection::Errored);
        }
        let Some(current) = self.current else {
            return IntentOutcome::Rejected(Rejection::NotInitialized);
        };

        let plan = match intent {
            Intent::Advance => self.neighbour(current, true).map(|t| (t, Move::Adjacent)),
            Intent::Retreat => self.neighbour(current, false).map(|t| (t, Move::Adjacent)),
            Intent::JumpTo(index) => {
                validate_jump(index, current, self.buffer.len()).map(|t| (t, Move::Jump))
            }
            Intent::Shuffle => self.random_target(current).map(|t| (t, Move::Jump)),
            Intent::CancelReturn => return IntentOutcome::SnappedBack,
        };
        match plan {
            Ok((target, kind)) => self.transition(current, target, kind).await,
            Err(rejection) => {
                debug!(?intent, ?rejection, "intent rejected");
                IntentOutcome::Rejected(rejection)
            }
        }
    }

    /// Nearest index in the given direction whose record has not already failed.
    fn neighbour(&self, current: usize, forward: bool) -> Result<usize, Rejection> {
        let usable = |i: &usize| {
            self.buffer
                .get(*i)
                .is_some_and(|r| r.preload_state() != PreloadState::Failed)
        };
        if forward {
            (current + 1..self.buffer.len())
                .find(usable)
                .ok_or(Rejection::AtEnd)
        } else {
            (0..current).rev().find(usable).ok_or(Rejection::AtStart)
        }
    }

    fn random_target(&mut self, current: usize) -> Result<usize, Rejection> {
        let len = self.buffer.len();
        if len < 2 {
            return Err(Rejection::TooFewRecords);
        }
        let mut pick = self.rng.random_range(0..len - 1);
        if pick >= current {
            pick += 1;
        }
        Ok(pick)
    }

    async fn transition(&mut self, from: usize, to: usize, kind: Move) -> IntentOutcome {
        let (Some(shown), Some(target)) = (self.buffer.get(from), self.buffer.get(to)) else {
            return IntentOutcome::Rejected(Rejection::OutOfRange {
                index: to,
                len: self.buffer.len(),
            });
        };
        self.set_phase(NavigationPhase::Transitioning);
        self.renderer
            .show(Slot::Current, Some(shown.as_ref()), RenderMode::Loading);

        self.preloader.preload(&target);
        let ready = self.preloader.await_ready(&target).await;

        let outcome = match ready {
            Ok(()) => {
                match kind {
                    Move::Adjacent => {
                        self.renderer
                            .show(Slot::Current, Some(shown.as_ref()), RenderMode::Normal);
                        self.commit(to);
                        sleep(self.settings.transition).await;
                        self.render_all(to);
                    }
                    Move::Jump => {
                        self.renderer.show(Slot::Current, None, RenderMode::Normal);
                        sleep(self.settings.transition).await;
                        self.commit(to);
                        self.render_all(to);
                    }
                }
                self.refill_if_low(to);
                debug!(from, to, ?kind, "transition committed");
                IntentOutcome::Committed { from, to }
            }
            Err(cause) => {
                warn!(from, to, %cause, "target not ready; restoring view");
                self.renderer
                    .show(Slot::Current, Some(shown.as_ref()), RenderMode::Normal);
                if kind == Move::Adjacent {
                    self.renderer.snap_back();
                }
                IntentOutcome::Restored { index: from, cause }
            }
        };
        self.set_phase(NavigationPhase::Idle);
        outcome
    }

    fn render_all(&self, index: usize) {
        let view = SlotView::at(&self.buffer, index);
        for slot in [Slot::Prev, Slot::Current, Slot::Next] {
            self.renderer
                .show(slot, view.get(slot).map(|r| &**r), RenderMode::Normal);
        }
    }

    fn refill_if_low(&self, index: usize) {
        if !self
            .buffer
            .low_watermark_check(index, self.settings.lookahead)
        {
            return;
        }
        let target = self.buffer.len() + self.settings.refill_chunk;
        let buffer = self.buffer.clone();
        debug!(index, target, "low watermark; refilling");
        tokio::spawn(async move {
            // Failures are recorded on the buffer and picked up by the run loop.
            if let Err(err) = buffer.ensure_filled(target).await {
                debug!(error = %err, "background refill failed");
            }
        });
    }
}

fn validate_jump(index: usize, current: usize, len: usize) -> Result<usize, Rejection> {
    if index >= len {
        return Err(Rejection::OutOfRange { index, len });
    }
    if len < 2 {
        return Err(Rejection::TooFewRecords);
    }
    if index == current {
        return Err(Rejection::AlreadyCurrent);
    }
    Ok(index)
}

/// Polls `fut` to completion while discarding intents that arrive meanwhile.
/// Returns `None` if cancelled first.
async fn drive<F: Future>(
    fut: F,
    intents: &mut Receiver<Intent>,
    cancel: &CancellationToken,
) -> Option<F::Output> {
    tokio::pin!(fut);
    loop {
        select! {
            _ = cancel.cancelled() => return None,
            out = &mut fut => return Some(out),
            Some(intent) = intents.recv() => {
                debug!(?intent, "dropped; transition in flight");
            }
        }
    }
}

/// Runs the controller: initialises, then serves intents one at a time.
///
/// Intents received while a transition (or initialisation) is in flight are
/// dropped rather than queued. A fetch failure observed on the buffer moves
/// the controller into its terminal error state.
#[instrument(skip_all)]
pub async fn run(
    mut controller: NavigationController,
    mut intents: Receiver<Intent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut buffer_watch = controller.buffer.watch();

    if controller.phase == NavigationPhase::Uninitialized {
        match drive(controller.initialize(), &mut intents, &cancel).await {
            None => return Ok(()),
            Some(Ok(index)) => debug!(index, "initialised"),
            Some(Err(err)) => warn!(error = %err, "initialisation failed"),
        }
    }

    let mut watching = true;
    loop {
        select! {
            _ = cancel.cancelled() => break,

            changed = buffer_watch.changed(), if watching => {
                if !changed {
                    watching = false;
                    continue;
                }
                if let Some(err) = buffer_watch.status().error {
                    controller.on_fetch_error(&err);
                }
            }

            maybe_intent = intents.recv() => {
                let Some(intent) = maybe_intent else {
                    info!("input closed; navigation stopping");
                    break;
                };
                match drive(controller.handle(intent), &mut intents, &cancel).await {
                    Some(outcome) => debug!(?intent, ?outcome, "intent handled"),
                    None => break,
                }
            }
        }
    }
    Ok(())
}
