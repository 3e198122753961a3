mod assets;

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{broadcast, Mutex},
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{info, warn};

use crate::{
    cluster::{Cluster, ClusterId},
    error::ClusterError,
    grid::TilePos,
    map::TileMap,
    tile::TileKind,
};

/// Pushed to browsers so they can drop highlights of depleted clusters.
#[derive(Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClusterEvent {
    Removed {
        id: ClusterId,
        kind: TileKind,
        points: usize,
    },
}

pub struct AppState {
    map: Mutex<TileMap>,
    events: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(map: TileMap) -> Arc<Self> {
        let (events, _) = broadcast::channel::<String>(256);
        Arc::new(Self {
            map: Mutex::new(map),
            events,
        })
    }
}

pub struct WebServerConfig {
    pub map: TileMap,
    pub host: String,
    pub port: u16,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/app.js", get(script))
        .route("/api/grid", get(grid))
        .route("/api/clusters", get(summary))
        .route("/api/clusters/:x/:y", get(cluster_at))
        .route("/api/clusters/:x/:y/deplete", post(deplete))
        .route("/api/events", get(stream_events))
        .with_state(state)
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig { map, host, port } = config;
    let state = AppState::new(map);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    info!("tileworld UI live at http://{addr} (Ctrl+C to stop)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down web UI");
}

async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}

async fn script() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        assets::APP_JS,
    )
}

#[derive(Serialize)]
struct GridResponse {
    tile_set_id: Option<String>,
    width: u32,
    height: u32,
    rows: Vec<String>,
}

async fn grid(State(state): State<Arc<AppState>>) -> Json<GridResponse> {
    let map = state.map.lock().await;
    Json(GridResponse {
        tile_set_id: map.engine().tile_set_id().map(str::to_string),
        width: map.grid().width(),
        height: map.grid().height(),
        rows: map.grid().to_rows(),
    })
}

#[derive(Serialize)]
struct SummaryResponse {
    tile_set_id: Option<String>,
    playable: bool,
    total: usize,
    counts: Vec<(TileKind, usize)>,
}

async fn summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    let map = state.map.lock().await;
    let clusters = map.engine().clusters();
    Json(SummaryResponse {
        tile_set_id: map.engine().tile_set_id().map(str::to_string),
        playable: map.is_playable(),
        total: clusters.len(),
        counts: clusters.counts(),
    })
}

async fn cluster_at(
    State(state): State<Arc<AppState>>,
    Path((x, y)): Path<(u32, u32)>,
) -> Response {
    let map = state.map.lock().await;
    cluster_response(map.cluster_at(TilePos::new(x, y)))
}

async fn deplete(State(state): State<Arc<AppState>>, Path((x, y)): Path<(u32, u32)>) -> Response {
    let mut map = state.map.lock().await;
    match map.deplete_at(TilePos::new(x, y)).await {
        Ok(Some(removed)) => {
            let event = ClusterEvent::Removed {
                id: removed.id,
                kind: removed.kind,
                points: removed.len(),
            };
            if let Ok(payload) = serde_json::to_string(&event) {
                let _ = state.events.send(payload);
            }
            cluster_response(Some(removed))
        }
        Ok(None) => cluster_response(None),
        Err(err) => {
            warn!(x, y, error = %err, "depletion failed");
            let status = match err {
                ClusterError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::CONFLICT,
            };
            (status, err.to_string()).into_response()
        }
    }
}

fn cluster_response(cluster: Option<Cluster>) -> Response {
    match cluster {
        Some(cluster) => Json(cluster).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
