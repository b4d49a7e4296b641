//! Photo source collaborators.
//!
//! Both the direct Pexels endpoint and the relay speak the same JSON shape,
//! so a single HTTP client type covers both; only the URL and the optional
//! `Authorization` header differ.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;

/// A photo as described by the source, before normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoDescriptor {
    pub image_url: Option<String>,
    pub alt_text: Option<String>,
    pub photographer_name: Option<String>,
    pub photographer_url: Option<String>,
}

/// Anything that can hand out numbered pages of photos.
///
/// An empty `Vec` means the source has no more pages.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn fetch_page(&self, page: u32, per_page: u32)
    -> Result<Vec<PhotoDescriptor>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct CuratedPage {
    #[serde(default)]
    photos: Vec<CuratedPhoto>,
}

#[derive(Debug, Deserialize)]
struct CuratedPhoto {
    #[serde(default)]
    src: Option<CuratedSrc>,
    #[serde(default)]
    alt: Option<String>,
    #[serde(default)]
    photographer: Option<String>,
    #[serde(default)]
    photographer_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CuratedSrc {
    #[serde(default)]
    large: Option<String>,
}

impl From<CuratedPhoto> for PhotoDescriptor {
    fn from(photo: CuratedPhoto) -> Self {
        Self {
            image_url: photo.src.and_then(|src| src.large),
            alt_text: photo.alt,
            photographer_name: photo.photographer,
            photographer_url: photo.photographer_url,
        }
    }
}

/// Parses a curated-photos response body.
pub fn parse_page(body: &[u8]) -> Result<Vec<PhotoDescriptor>, FetchError> {
    let page: CuratedPage =
        serde_json::from_slice(body).map_err(|err| FetchError::Decode(err.to_string()))?;
    Ok(page.photos.into_iter().map(PhotoDescriptor::from).collect())
}

/// HTTP-backed [`PhotoSource`], either the upstream API or the relay.
#[derive(Debug, Clone)]
pub struct HttpPhotoSource {
    client: Client,
    endpoint: Url,
    credential: Option<String>,
}

impl HttpPhotoSource {
    /// Talks to the upstream API directly, sending `credential` as `Authorization`.
    pub fn direct(endpoint: Url, credential: String, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint,
            credential: Some(credential),
        })
    }

    /// Talks to the relay, which injects the credential server-side.
    pub fn relay(endpoint: Url, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint,
            credential: None,
        })
    }

    fn page_url(&self, page: u32, per_page: u32) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());
        url
    }
}

#[async_trait]
impl PhotoSource for HttpPhotoSource {
    async fn fetch_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PhotoDescriptor>, FetchError> {
        let url = self.page_url(page, per_page);
        debug!(%url, "requesting photo page");
        let mut request = self.client.get(url);
        if let Some(key) = &self.credential {
            request = request.header(reqwest::header::AUTHORIZATION, key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        parse_page(&body)
    }
}
