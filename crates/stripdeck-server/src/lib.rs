//! Simulated LED effect controller.
//!
//! Serves the controller's HTTP API (effect list, statistics and the
//! mutation endpoints) from an in-memory [`EffectManager`], so the client can
//! be exercised without hardware. Like the firmware, mutation endpoints
//! answer 200 even when the index is out of range; the request is logged and
//! ignored.

pub mod manager;
pub mod stats;

use std::sync::Arc;

use axum::{
    Form, Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::Mutex;

use stripdeck_core::clock::Clock;

pub use manager::{DEFAULT_EFFECTS, DEFAULT_INTERVAL_MS, EffectManager};
pub use stats::StatsSimulator;

/// Shared server state.
struct AppState {
    manager: Mutex<EffectManager>,
    stats: Mutex<StatsSimulator>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EffectIndexForm {
    effect_index: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentEffectForm {
    current_effect_index: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsForm {
    effect_interval: Option<String>,
}

/// Parse a numeric form field; absent or garbled values are ignored.
fn parse_param(name: &str, raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring non-numeric {name}={raw:?}");
            None
        }
    }
}

fn ok() -> Response {
    (
        StatusCode::OK,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"))],
    )
        .into_response()
}

fn json_ok(body: serde_json::Value) -> Response {
    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"))],
        Json(body),
    )
        .into_response()
}

async fn handle_effect_list(State(state): State<Arc<AppState>>) -> Response {
    let body = state.manager.lock().await.effect_list_json();
    json_ok(body)
}

async fn handle_statistics(State(state): State<Arc<AppState>>) -> Response {
    let body = state.stats.lock().await.sample();
    json_ok(body)
}

async fn handle_next(State(state): State<Arc<AppState>>) -> Response {
    state.manager.lock().await.next();
    ok()
}

async fn handle_previous(State(state): State<Arc<AppState>>) -> Response {
    state.manager.lock().await.previous();
    ok()
}

async fn handle_set_current(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CurrentEffectForm>,
) -> Response {
    if let Some(index) = parse_param("currentEffectIndex", form.current_effect_index) {
        state.manager.lock().await.select(index as usize);
    }
    ok()
}

async fn handle_enable(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EffectIndexForm>,
) -> Response {
    if let Some(index) = parse_param("effectIndex", form.effect_index) {
        state.manager.lock().await.enable(index as usize);
    }
    ok()
}

async fn handle_disable(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EffectIndexForm>,
) -> Response {
    if let Some(index) = parse_param("effectIndex", form.effect_index) {
        state.manager.lock().await.disable(index as usize);
    }
    ok()
}

async fn handle_settings(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SettingsForm>,
) -> Response {
    if let Some(interval) = parse_param("effectInterval", form.effect_interval) {
        log::info!("effect interval set to {interval} ms");
        state.manager.lock().await.set_interval(interval);
    }
    ok()
}

/// Build the axum router, with every route under `base_path`.
pub fn build_router(manager: EffectManager, base_path: &str) -> Router {
    let state = Arc::new(AppState {
        manager: Mutex::new(manager),
        stats: Mutex::new(StatsSimulator::default()),
    });

    let api = Router::new()
        .route("/getEffectList", get(handle_effect_list))
        .route("/getStatistics", get(handle_statistics))
        .route("/nextEffect", post(handle_next))
        .route("/previousEffect", post(handle_previous))
        .route("/setCurrentEffectIndex", post(handle_set_current))
        .route("/enableEffect", post(handle_enable))
        .route("/disableEffect", post(handle_disable))
        .route("/settings", post(handle_settings))
        .with_state(state);

    let prefix = base_path.trim_matches('/');
    if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{prefix}"), api)
    }
}

/// Serve a default effect list on `listener` until the task is dropped.
pub async fn serve(
    listener: tokio::net::TcpListener,
    clock: Arc<dyn Clock>,
    base_path: &str,
) -> std::io::Result<()> {
    let app = build_router(EffectManager::with_default_effects(clock), base_path);
    axum::serve(listener, app).await
}

/// Run the simulated controller on `host:port`.
pub async fn run_server(
    host: &str,
    port: u16,
    clock: Arc<dyn Clock>,
    base_path: &str,
) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("simulated controller listening on {}", listener.local_addr()?);
    serve(listener, clock, base_path).await
}
