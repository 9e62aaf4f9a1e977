use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::api::{HTTP_ATTRIBUTION_ROUTE, IGNORE_PARAM};

/// `AttributionServer` counts partner attribution pings.
///
/// Every request to the attribution route answers the current count as plain text. Requests
/// carrying the `ignore` query parameter only read the counter, all others increment it first.
///
/// # Methods
/// - `bind(port)` binds the listener; port `0` picks a free port.
/// - `endpoint()` is the base URL clients on this host should use.
/// - `run()` serves until the task is dropped or the listener fails.
pub struct AttributionServer {
    listener: TcpListener,
    hits: Arc<AtomicU64>,
}

impl AttributionServer {
    pub async fn bind(port: u16) -> Result<AttributionServer> {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
            .await
            .context("TCP Listener binding")?;
        debug!(
            "HTTP attribution endpoint listening on {}",
            listener.local_addr()?
        );
        Ok(AttributionServer {
            listener,
            hits: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("attribution listener address")
    }

    pub fn endpoint(&self) -> Result<String> {
        Ok(format!("http://127.0.0.1:{}", self.local_addr()?.port()))
    }

    pub async fn run(self) -> Result<()> {
        let state = ServerState { hits: self.hits };
        let app = Router::new()
            .route(HTTP_ATTRIBUTION_ROUTE, get(attribution))
            .with_state(state);
        axum::serve(self.listener, app)
            .await
            .context("HTTP attribution serving")?;
        Ok(())
    }
}

async fn attribution(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let hits = if params.contains_key(IGNORE_PARAM) {
        state.hits.load(Ordering::SeqCst)
    } else {
        let hits = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
        info!(hits, "attribution recorded");
        hits
    };
    (StatusCode::OK, hits.to_string())
}

#[derive(Clone)]
pub struct ServerState {
    pub hits: Arc<AtomicU64>,
}
