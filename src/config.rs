use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use rand::Rng;
use reqwest::Url;
use serde::Deserialize;

use crate::tasks::navigation::NavigationSettings;

pub const DEFAULT_CACHE_CONTROL: &str = "s-maxage=3600, stale-while-revalidate";
const UPSTREAM_CURATED: &str = "https://api.pexels.com/v1/curated";
const DEFAULT_KEY_ENV: &str = "PEXELS_API_KEY";

/// Where photo pages come from.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum SourceConfig {
    /// Through the relay, which holds the credential.
    Relay {
        #[serde(default = "SourceConfig::default_relay_url")]
        url: String,
    },
    /// Straight to the photo API with a locally held credential.
    Direct {
        #[serde(default = "SourceConfig::default_endpoint")]
        endpoint: String,
        #[serde(default = "SourceConfig::default_key_env")]
        api_key_env: String,
    },
}

impl SourceConfig {
    fn default_relay_url() -> String {
        "http://127.0.0.1:3000/api/pexels".to_string()
    }

    fn default_endpoint() -> String {
        UPSTREAM_CURATED.to_string()
    }

    /// The URL pages are requested from.
    pub fn url(&self) -> Result<Url> {
        match self {
            Self::Relay { url } => parse_url(url, "source.url"),
            Self::Direct { endpoint, .. } => parse_url(endpoint, "source.endpoint"),
        }
    }

    fn default_key_env() -> String {
        DEFAULT_KEY_ENV.to_string()
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Relay {
            url: Self::default_relay_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct BufferConfig {
    /// Records fetched before the first photo is shown.
    pub initial_fill: usize,
    /// Refill once fewer than this many records remain ahead of the current one.
    pub lookahead: usize,
    /// Extra records requested per refill.
    pub refill_chunk: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            initial_fill: 5,
            lookahead: 3,
            refill_chunk: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PreloadConfig {
    /// Records from the current one onward that the sweep keeps warm.
    pub window: usize,
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Upper bound on waiting for a single image to become ready.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub max_in_flight: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            window: 3,
            sweep_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(15),
            max_in_flight: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct NavigationConfig {
    #[serde(with = "humantime_serde")]
    pub transition_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
    /// Fixes the random-jump sequence.
    pub seed: Option<u64>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            transition_duration: Duration::from_millis(400),
            debounce: Duration::from_millis(800),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    pub upstream: String,
    pub api_key_env: String,
    pub per_page: u32,
    pub cache_control: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            upstream: UPSTREAM_CURATED.to_string(),
            api_key_env: DEFAULT_KEY_ENV.to_string(),
            per_page: 15,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    pub source: SourceConfig,
    pub per_page: u32,
    /// First page requested. When unset a page in 1..=100 is picked at random.
    pub start_page: Option<u32>,
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
    pub buffer: BufferConfig,
    pub preload: PreloadConfig,
    pub navigation: NavigationConfig,
    pub relay: RelayConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            per_page: 15,
            start_page: None,
            http_timeout: Duration::from_secs(10),
            buffer: BufferConfig::default(),
            preload: PreloadConfig::default(),
            navigation: NavigationConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_yaml_slice(&data)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn from_yaml_slice(data: &[u8]) -> Result<Self> {
        // An empty document means "all defaults".
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_slice(data)?)
    }

    pub fn validated(self) -> Result<Self> {
        ensure!(self.per_page >= 1, "per-page must be at least 1");
        ensure!(
            self.start_page.is_none_or(|page| page >= 1),
            "start-page must be at least 1"
        );
        ensure!(!self.http_timeout.is_zero(), "http-timeout must be positive");
        ensure!(
            self.buffer.initial_fill >= 1,
            "buffer.initial-fill must be at least 1"
        );
        ensure!(self.buffer.lookahead >= 1, "buffer.lookahead must be at least 1");
        ensure!(
            self.buffer.refill_chunk >= 1,
            "buffer.refill-chunk must be at least 1"
        );
        ensure!(self.preload.window >= 1, "preload.window must be at least 1");
        ensure!(
            !self.preload.sweep_interval.is_zero(),
            "preload.sweep-interval must be positive"
        );
        ensure!(!self.preload.timeout.is_zero(), "preload.timeout must be positive");
        ensure!(
            self.preload.max_in_flight >= 1,
            "preload.max-in-flight must be at least 1"
        );
        ensure!(self.relay.per_page >= 1, "relay.per-page must be at least 1");
        self.source.url()?;
        parse_url(&self.relay.upstream, "relay.upstream")?;
        Ok(self)
    }

    /// The configured start page, or a random one in 1..=100.
    pub fn resolve_start_page(&self) -> u32 {
        self.start_page
            .unwrap_or_else(|| rand::rng().random_range(1..=100))
    }

    pub fn navigation_settings(&self) -> NavigationSettings {
        NavigationSettings {
            initial_fill: self.buffer.initial_fill,
            lookahead: self.buffer.lookahead,
            refill_chunk: self.buffer.refill_chunk,
            transition: self.navigation.transition_duration,
            seed: self.navigation.seed,
        }
    }
}

pub fn parse_url(raw: &str, key: &str) -> Result<Url> {
    Url::parse(raw).with_context(|| format!("{key} is not a valid URL: {raw:?}"))
}
