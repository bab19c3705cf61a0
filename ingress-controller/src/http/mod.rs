//! Health and metrics endpoint. The controller is healthy iff a loopback
//! probe of the proxy status vhost answers 200.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use http::StatusCode;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{Result, metrics};

const PROXY_STATUS_URL: &str = "http://127.0.0.1:18080/healthz";
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct HealthState {
    client: reqwest::Client,
    status_url: String,
}

impl HealthState {
    pub fn new() -> Result<Self> {
        Self::with_url(PROXY_STATUS_URL.into())
    }

    pub fn with_url(status_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| crate::Error::InvalidConfiguration(e.to_string()))?;
        Ok(Self { client, status_url })
    }

    pub async fn probe(&self) -> bool {
        match self.client.get(&self.status_url).send().await {
            Ok(res) => res.status().is_success(),
            Err(_) => false,
        }
    }
}

pub async fn serve(addr: SocketAddr, state: HealthState, cancel: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("health and metrics listening on {addr}");

    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(cancel))
        .await?;
    Ok(())
}

fn router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_text))
        .with_state(state)
}

async fn healthz(State(state): State<HealthState>) -> Response {
    if state.probe().await {
        (StatusCode::OK, "ok").into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ingress controller is not healthy",
        )
            .into_response()
    }
}

async fn metrics_text() -> String {
    metrics::encode()
}

async fn shutdown(cancel: CancellationToken) {
    cancel.cancelled().await;
}
