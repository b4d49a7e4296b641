//! Binary entrypoint for photo-swiper.
//!
//! `browse` drives the gallery from the terminal; `relay` runs the
//! credential-injecting HTTP relay.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use photo_swiper::buffer::ArtworkBuffer;
use photo_swiper::config::{Configuration, SourceConfig};
use photo_swiper::error::ConfigError;
use photo_swiper::events::Intent;
use photo_swiper::fetcher::PageFetcher;
use photo_swiper::relay;
use photo_swiper::render::LogRenderer;
use photo_swiper::source::{HttpPhotoSource, PhotoSource};
use photo_swiper::tasks::navigation::{self, NavigationController};
use photo_swiper::tasks::preloader::{self, HttpImageLoader, Preloader};
use photo_swiper::tasks::input;

#[derive(Debug, Parser)]
#[command(
    name = "photo-swiper",
    version,
    about = "Paginated photo gallery with preloading navigation"
)]
struct Cli {
    /// Path to YAML config file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Browse from the terminal: n(ext), p(rev), r(andom), g(oto) N, c(ancel), q(uit)
    Browse,
    /// Serve the photo API relay
    Relay {
        /// Override relay.bind
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
    },
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("photo_swiper={level}").parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = match &cli.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Configuration::default(),
    }
    .validated()
    .context("invalid configuration values")?;

    match cli.mode {
        Mode::Browse => {
            // One logical thread: navigation, preloads and fills interleave cooperatively.
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("building runtime")?;
            let result = runtime.block_on(browse(cfg));
            // stdin reads sit on the blocking pool and would otherwise hold shutdown.
            runtime.shutdown_timeout(Duration::from_millis(200));
            result
        }
        Mode::Relay { bind } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("building runtime")?;
            runtime.block_on(serve_relay(cfg, bind))
        }
    }
}

fn build_source(cfg: &Configuration) -> Result<Arc<dyn PhotoSource>> {
    let url = cfg.source.url()?;
    let source = match &cfg.source {
        SourceConfig::Relay { .. } => HttpPhotoSource::relay(url, cfg.http_timeout)?,
        SourceConfig::Direct { api_key_env, .. } => {
            let key = std::env::var(api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingCredential(api_key_env.clone()))?;
            HttpPhotoSource::direct(url, key, cfg.http_timeout)?
        }
    };
    Ok(Arc::new(source))
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("ctrl-c handler failed: {err}");
            return;
        }
        info!("ctrl-c received; initiating shutdown");
        cancel.cancel();
    });
}

async fn browse(cfg: Configuration) -> Result<()> {
    let start_page = cfg.resolve_start_page();
    info!(start_page, source = ?cfg.source, "starting gallery");

    let buffer = ArtworkBuffer::new(PageFetcher::new(build_source(&cfg)?, cfg.per_page), start_page);
    let loader = HttpImageLoader::new(cfg.http_timeout).context("building image loader")?;
    let preloader = Preloader::new(
        Arc::new(loader),
        cfg.preload.max_in_flight,
        cfg.preload.timeout,
    );
    let controller = NavigationController::new(
        buffer.clone(),
        preloader.clone(),
        Arc::new(LogRenderer),
        cfg.navigation_settings(),
    );
    let position = controller.subscribe();

    // Channels (small/bounded)
    let (raw_tx, raw_rx) = mpsc::channel::<Intent>(16); // Terminal -> Debounce
    let (intent_tx, intent_rx) = mpsc::channel::<Intent>(16); // Debounce -> Navigation

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    let mut tasks = JoinSet::new();

    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            input::read_commands(BufReader::new(tokio::io::stdin()), raw_tx, cancel)
                .await
                .context("terminal input task failed")
        }
    });

    tasks.spawn({
        let cancel = cancel.clone();
        let debounce = cfg.navigation.debounce;
        async move {
            input::run(raw_rx, intent_tx, debounce, cancel)
                .await
                .context("debounce task failed")
        }
    });

    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            navigation::run(controller, intent_rx, cancel)
                .await
                .context("navigation task failed")
        }
    });

    tasks.spawn({
        let cancel = cancel.clone();
        let window = cfg.preload.window;
        let every = cfg.preload.sweep_interval;
        async move {
            preloader::run_sweep(preloader, buffer, position, window, every, cancel)
                .await
                .context("preload sweep failed")
        }
    });

    // Any task ending takes the rest down with it.
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        cancel.cancel();
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!("{err:?}");
                first_error.get_or_insert(err);
            }
            Err(err) => error!("task panicked: {err}"),
        }
    }
    first_error.map_or(Ok(()), Err)
}

async fn serve_relay(cfg: Configuration, bind: Option<SocketAddr>) -> Result<()> {
    let addr = bind.unwrap_or(cfg.relay.bind);
    let router = relay::router(
        &cfg.relay,
        relay::credential_from_env(&cfg.relay),
        cfg.http_timeout,
    )?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind relay on {addr}"))?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());
    relay::serve(listener, router, cancel).await
}
