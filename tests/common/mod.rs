#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use photo_swiper::artwork::ArtworkRecord;
use photo_swiper::buffer::ArtworkBuffer;
use photo_swiper::error::FetchError;
use photo_swiper::events::{RenderMode, Slot};
use photo_swiper::fetcher::PageFetcher;
use photo_swiper::render::Renderer;
use photo_swiper::source::{PhotoDescriptor, PhotoSource};
use photo_swiper::tasks::navigation::{NavigationController, NavigationSettings};
use photo_swiper::tasks::preloader::{Preloader, ResourceLoader};
use reqwest::Url;
use tokio::sync::Notify;

pub fn image_url(n: usize) -> String {
    format!("https://images.example/{n}.jpg")
}

/// `count` photos numbered from `first`.
pub fn photos(first: usize, count: usize) -> Vec<PhotoDescriptor> {
    (first..first + count)
        .map(|n| PhotoDescriptor {
            image_url: Some(image_url(n)),
            alt_text: Some(format!("photo {n}")),
            photographer_name: Some("Ada".to_string()),
            photographer_url: Some("https://people.example/ada".to_string()),
        })
        .collect()
}

/// Replays scripted pages in order; an exhausted script yields empty pages.
#[derive(Default)]
pub struct ScriptedSource {
    pages: Mutex<VecDeque<Result<Vec<PhotoDescriptor>, FetchError>>>,
    pub requested: Mutex<Vec<u32>>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<Result<Vec<PhotoDescriptor>, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into()),
            requested: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

#[async_trait]
impl PhotoSource for ScriptedSource {
    async fn fetch_page(&self, page: u32, _: u32) -> Result<Vec<PhotoDescriptor>, FetchError> {
        self.requested.lock().unwrap().push(page);
        tokio::task::yield_now().await;
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Clone)]
pub enum Behavior {
    Succeed,
    Fail,
    Wait(Arc<Notify>),
}

/// Resource loader whose outcome is chosen per image URL. Unlisted URLs succeed.
#[derive(Default)]
pub struct ScriptedLoader {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<HashMap<String, usize>>,
    pub total: AtomicUsize,
}

impl ScriptedLoader {
    pub fn set(&self, n: usize, behavior: Behavior) {
        self.behaviors.lock().unwrap().insert(image_url(n), behavior);
    }

    pub fn calls_for(&self, n: usize) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&image_url(n))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ResourceLoader for ScriptedLoader {
    async fn load(&self, uri: &Url) -> Result<()> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(uri.to_string())
            .or_default() += 1;
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(uri.as_str())
            .cloned()
            .unwrap_or(Behavior::Succeed);
        match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => anyhow::bail!("broken image"),
            Behavior::Wait(gate) => {
                gate.notified().await;
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    Show {
        slot: Slot,
        image: Option<String>,
        mode: RenderMode,
    },
    SnapBack,
    Error(String),
}

#[derive(Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Renderer for RecordingRenderer {
    fn show(&self, slot: Slot, record: Option<&ArtworkRecord>, mode: RenderMode) {
        self.calls.lock().unwrap().push(RenderCall::Show {
            slot,
            image: record.map(|r| r.image_ref.to_string()),
            mode,
        });
    }

    fn snap_back(&self) {
        self.calls.lock().unwrap().push(RenderCall::SnapBack);
    }

    fn show_error(&self, message: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(RenderCall::Error(message.to_string()));
    }
}

pub fn show(slot: Slot, n: Option<usize>, mode: RenderMode) -> RenderCall {
    RenderCall::Show {
        slot,
        image: n.map(image_url),
        mode,
    }
}

pub struct Harness {
    pub source: Arc<ScriptedSource>,
    pub loader: Arc<ScriptedLoader>,
    pub renderer: Arc<RecordingRenderer>,
    pub buffer: ArtworkBuffer,
    pub preloader: Preloader,
}

impl Harness {
    pub fn new(pages: Vec<Result<Vec<PhotoDescriptor>, FetchError>>) -> Self {
        let source = ScriptedSource::new(pages);
        let loader = Arc::new(ScriptedLoader::default());
        let renderer = Arc::new(RecordingRenderer::default());
        let buffer = ArtworkBuffer::new(PageFetcher::new(source.clone(), 15), 1);
        let preloader = Preloader::new(loader.clone(), 4, Duration::from_secs(2));
        Self {
            source,
            loader,
            renderer,
            buffer,
            preloader,
        }
    }

    pub fn settings() -> NavigationSettings {
        NavigationSettings {
            initial_fill: 5,
            lookahead: 3,
            refill_chunk: 5,
            transition: Duration::ZERO,
            seed: Some(7),
        }
    }

    pub fn controller(&self) -> NavigationController {
        NavigationController::new(
            self.buffer.clone(),
            self.preloader.clone(),
            self.renderer.clone(),
            Self::settings(),
        )
    }
}

/// Polls `check` every few milliseconds until it holds or `limit` elapses.
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
