//! Server-side relay that injects the photo API credential so it never
//! reaches the browser.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{RelayConfig, parse_url};
use crate::error::ConfigError;

pub const ROUTE: &str = "/api/pexels";

#[derive(Clone)]
struct RelayState {
    client: Client,
    upstream: Url,
    credential: Option<String>,
    key_env: String,
    per_page: u32,
    cache_control: HeaderValue,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    /// Requested page; absent or blank means the first.
    fn page(&self) -> Result<u32, String> {
        match self.page.as_deref().map(str::trim) {
            None | Some("") => Ok(1),
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|page| *page >= 1)
                .ok_or_else(|| format!("page must be a positive integer, got {raw:?}")),
        }
    }
}

/// Reads the credential from the configured environment variable. Blank counts as unset.
pub fn credential_from_env(cfg: &RelayConfig) -> Option<String> {
    std::env::var(&cfg.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

pub fn router(cfg: &RelayConfig, credential: Option<String>, timeout: Duration) -> Result<Router> {
    if credential.is_none() {
        warn!(env = %cfg.api_key_env, "no photo API credential; relay will answer 412");
    }
    let state = RelayState {
        client: Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build relay HTTP client")?,
        upstream: parse_url(&cfg.upstream, "relay.upstream")?,
        credential,
        key_env: cfg.api_key_env.clone(),
        per_page: cfg.per_page,
        cache_control: HeaderValue::from_str(&cfg.cache_control)
            .context("relay.cache-control is not a valid header value")?,
    };
    Ok(Router::new()
        .route(ROUTE, get(relay_page))
        .with_state(state))
}

/// Serves `router` on `listener` until `cancel` fires.
pub async fn serve(listener: TcpListener, router: Router, cancel: CancellationToken) -> Result<()> {
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    info!(?addr, route = ROUTE, "relay listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("relay server exited")?;
    Ok(())
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn relay_page(State(state): State<RelayState>, Query(query): Query<PageQuery>) -> Response {
    let Some(key) = state.credential.as_deref() else {
        let err = ConfigError::MissingCredential(state.key_env.clone());
        return json_error(StatusCode::PRECONDITION_FAILED, err.to_string());
    };
    let page = match query.page() {
        Ok(page) => page,
        Err(message) => return json_error(StatusCode::BAD_REQUEST, message),
    };
    let mut url = state.upstream.clone();
    url.query_pairs_mut()
        .append_pair("page", &page.to_string())
        .append_pair("per_page", &state.per_page.to_string());

    let upstream = match state
        .client
        .get(url)
        .header(reqwest::header::AUTHORIZATION, key)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(err) => {
            warn!(page, error = %err, "upstream request failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    let code = upstream.status().as_u16();
    if !upstream.status().is_success() {
        warn!(page, status = code, "upstream rejected request");
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY);
        return json_error(status, format!("Pexels API responded with {code}"));
    }

    match upstream.json::<serde_json::Value>().await {
        Ok(body) => {
            debug!(page, "relayed page");
            (
                [(header::CACHE_CONTROL, state.cache_control.clone())],
                Json(body),
            )
                .into_response()
        }
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}
