//! Stand-in ingestion endpoint.
//!
//! Decodes every wire shape and keeps per-shape receive counts so tests can
//! check what actually arrived on the other side of the socket.
use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::{counter, histogram};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use telesim_core::{Payload, Shape, ShapeCounts};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Requests seen by the mock, whatever status it answered with.
#[derive(Debug, Default)]
pub struct Received {
    total: AtomicU64,
    per_shape: [AtomicU64; Shape::COUNT],
    rejected: AtomicU64,
}

impl Received {
    fn record(&self, shape: Shape) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.per_shape[shape.index()].fetch_add(1, Ordering::Relaxed);
        counter!("mock-service.received", "shape" => shape.name()).increment(1);
    }

    fn reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn per_shape(&self) -> ShapeCounts {
        ShapeCounts(std::array::from_fn(|i| {
            self.per_shape[i].load(Ordering::Relaxed)
        }))
    }
}

#[derive(Clone, Default)]
struct AppState {
    received: Arc<Received>,
    limiters: Arc<RwLock<HashMap<u32, Arc<DefaultDirectRateLimiter>>>>,
}

pub fn router(received: Arc<Received>) -> Router {
    let state = AppState {
        received,
        ..Default::default()
    };

    Router::new()
        .route("/api/data", post(ingest))
        .route("/status/:code/api/data", post(status))
        .route("/delay/ms/:delay_ms/api/data", post(delay))
        .route("/limited/:max_tps/api/data", post(limited))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves on `addr` until the process exits.
pub async fn run(addr: SocketAddr, received: Arc<Received>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(received)).await?;
    Ok(())
}

/// Serves on an ephemeral loopback port in the background.
pub async fn spawn() -> anyhow::Result<(SocketAddr, Arc<Received>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let received = Arc::new(Received::default());
    let app = router(received.clone());

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });

    Ok((addr, received))
}

#[debug_handler]
async fn ingest(State(state): State<AppState>, Json(payload): Json<Payload>) -> StatusCode {
    state.received.record(payload.shape());
    StatusCode::OK
}

#[debug_handler]
async fn status(
    State(state): State<AppState>,
    Path(code): Path<u16>,
    Json(payload): Json<Payload>,
) -> StatusCode {
    state.received.record(payload.shape());
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if !status.is_success() {
        state.received.reject();
    }
    status
}

#[debug_handler]
async fn delay(
    State(state): State<AppState>,
    Path(delay_ms): Path<u64>,
    Json(payload): Json<Payload>,
) -> StatusCode {
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    state.received.record(payload.shape());
    StatusCode::OK
}

#[debug_handler]
async fn limited(
    State(state): State<AppState>,
    Path(max_tps): Path<u32>,
    Json(payload): Json<Payload>,
) -> StatusCode {
    state.received.record(payload.shape());

    let Some(max_tps) = NonZeroU32::new(max_tps) else {
        state.received.reject();
        return StatusCode::TOO_MANY_REQUESTS;
    };

    let read = state.limiters.read().ok().and_then(|map| map.get(&max_tps.get()).cloned());
    let limiter = match read {
        Some(limiter) => limiter,
        None => {
            let limiter = Arc::new(rate_limiter(max_tps));
            match state.limiters.write() {
                Ok(mut map) => map.entry(max_tps.get()).or_insert(limiter).clone(),
                Err(_) => limiter,
            }
        }
    };

    match limiter.check() {
        Ok(_) => StatusCode::OK,
        Err(_) => {
            debug!("MOCK SERVER ___ THROTTLED");
            state.received.reject();
            StatusCode::TOO_MANY_REQUESTS
        }
    }
}

/** Utils **/

pub fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}

/** TPS Printer **/

pub async fn tps_measure_task(received: Arc<Received>) {
    let mut last = 0;
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let total = received.total();
        println!("{} TPS (total {total}, rejected {})", total - last, received.rejected());
        histogram!("mock-service.tps").record((total - last) as f64);
        last = total;
    }
}
