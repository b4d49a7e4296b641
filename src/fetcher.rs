//! Turns one page request into normalised artwork records.

use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, warn};

use crate::artwork::ArtworkRecord;
use crate::error::FetchError;
use crate::source::{PhotoDescriptor, PhotoSource};

/// Result of a successful page fetch.
#[derive(Debug)]
pub struct FetchedPage {
    pub records: Vec<ArtworkRecord>,
    /// The source returned no items at all (exhaustion), as opposed to items
    /// that were all filtered out.
    pub is_empty: bool,
}

/// Thin wrapper over a [`PhotoSource`]. Never retries.
#[derive(Clone)]
pub struct PageFetcher {
    source: Arc<dyn PhotoSource>,
    per_page: u32,
}

impl PageFetcher {
    pub fn new(source: Arc<dyn PhotoSource>, per_page: u32) -> Self {
        Self { source, per_page }
    }

    pub async fn fetch_page(&self, page: u32) -> Result<FetchedPage, FetchError> {
        let photos = self.source.fetch_page(page, self.per_page).await?;
        let is_empty = photos.is_empty();
        let total = photos.len();
        let records: Vec<ArtworkRecord> = photos.into_iter().filter_map(normalise).collect();
        if records.len() < total {
            debug!(page, dropped = total - records.len(), "skipped photos without an image");
        }
        Ok(FetchedPage { records, is_empty })
    }
}

fn normalise(photo: PhotoDescriptor) -> Option<ArtworkRecord> {
    let raw = photo.image_url?;
    let image_ref = match Url::parse(&raw) {
        Ok(url) => url,
        Err(err) => {
            warn!(url = %raw, error = %err, "unusable image reference");
            return None;
        }
    };
    let title = photo
        .alt_text
        .filter(|alt| !alt.trim().is_empty())
        .unwrap_or_else(|| ArtworkRecord::UNTITLED.to_string());
    let author = photo
        .photographer_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| ArtworkRecord::UNKNOWN_AUTHOR.to_string());
    let author_ref = photo.photographer_url.and_then(|u| Url::parse(&u).ok());
    Some(ArtworkRecord::new(image_ref, title, author, author_ref))
}
