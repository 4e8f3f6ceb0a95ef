use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use egress_core::{route, Error};
use egress_types::{
    ApiResponse, DeviceResult, DeviceUpdateRequest, Reading, SegmentPair, StateUpdate, WifiDevice,
};
use serde_json::{json, Value};
use socketioxide::extract::SocketRef;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ─── Router ───────────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(process_update))
        .route("/result/:device_tag", get(get_result))
        .route("/exit/:device_tag", post(free_exit))
        .route("/unsafe", post(mark_unsafe).get(list_unsafe))
        .route("/state", get(get_state))
        .route("/sync", get(time_sync))
        .route("/health", get(health))
        .with_state(state)
}

// ─── Socket.IO ────────────────────────────────────────────────────────────────

pub async fn on_connect(socket: SocketRef, state: AppState) {
    let socket_id = socket.id.to_string();
    info!("Client connected: {socket_id}");

    socket.on_disconnect(move |_: SocketRef| async move {
        info!("Client disconnected: {socket_id}");
    });

    let _ = socket.emit("update", &state.state_update());
}

// ─── Device updates ───────────────────────────────────────────────────────────

/// Keep readings from configured anchors with a numeric signal.
fn known_readings(state: &AppState, wifi_devices: &[WifiDevice]) -> Vec<Reading> {
    wifi_devices
        .iter()
        .filter_map(WifiDevice::reading)
        .filter(|r| state.localizer.is_anchor(&r.anchor))
        .collect()
}

async fn process_update(
    State(state): State<AppState>,
    payload: Result<Json<DeviceUpdateRequest>, JsonRejection>,
) -> ApiResult<DeviceResult> {
    let Json(req) = payload.map_err(|e| {
        debug!("Malformed update: {e}");
        ApiError::bad_request("Invalid input data")
    })?;
    if req.device_tag.trim().is_empty() {
        return Err(ApiError::bad_request("Invalid input data"));
    }

    let readings = known_readings(&state, &req.wifi_devices);
    let anchors: BTreeSet<&str> = readings.iter().map(|r| r.anchor.as_str()).collect();
    if anchors.len() < 2 {
        debug!(
            "{}: only {} known routers in {} readings",
            req.device_tag,
            anchors.len(),
            req.wifi_devices.len()
        );
        return Err(ApiError::bad_request("Need at least 2 known routers"));
    }

    let fix = state.localizer.locate(&readings, &state.graph)?;
    info!(
        "{}: ({:.2}, {:.2}) via {:?} → {}",
        req.device_tag, fix.position.x, fix.position.y, fix.strategy, fix.node
    );

    let excluded = state.unsafe_segments.snapshot();
    let session = state.admission.assign(&req.device_tag, &fix.node, Some(fix.position), |exit| {
        route(&state.graph, &fix.node, exit, &excluded)
    })?;

    state.broadcast();
    Ok(Json(ApiResponse::success(session.to_result())))
}

async fn get_result(
    State(state): State<AppState>,
    Path(device_tag): Path<String>,
) -> ApiResult<DeviceResult> {
    match state.admission.session(&device_tag) {
        Ok(session) => Ok(Json(ApiResponse::success(session.to_result()))),
        Err(Error::UnknownDevice(_)) => {
            Err(ApiError::bad_request("No result available for the given device tag"))
        }
        Err(e) => Err(e.into()),
    }
}

async fn free_exit(
    State(state): State<AppState>,
    Path(device_tag): Path<String>,
) -> ApiResult<String> {
    let exit = match state.admission.release(&device_tag) {
        Ok(exit) => exit,
        Err(Error::UnknownDevice(_)) => return Err(ApiError::bad_request("Device tag not found")),
        Err(e) => return Err(e.into()),
    };
    state.broadcast();
    Ok(Json(ApiResponse::success(format!("Exit {exit} is now free"))))
}

// ─── Unsafe segments ──────────────────────────────────────────────────────────

async fn mark_unsafe(
    State(state): State<AppState>,
    payload: Result<Json<SegmentPair>, JsonRejection>,
) -> ApiResult<Vec<SegmentPair>> {
    let Json(pair) = payload.map_err(|_| ApiError::bad_request("Invalid input data"))?;
    if state.unsafe_segments.mark(&state.graph, &pair.from, &pair.to)? {
        state.broadcast();
    }
    Ok(Json(ApiResponse::success(state.unsafe_segments.snapshot().to_pairs())))
}

async fn list_unsafe(State(state): State<AppState>) -> Json<ApiResponse<Vec<SegmentPair>>> {
    Json(ApiResponse::success(state.unsafe_segments.snapshot().to_pairs()))
}

// ─── Inspection ───────────────────────────────────────────────────────────────

async fn get_state(State(state): State<AppState>) -> Json<ApiResponse<StateUpdate>> {
    Json(ApiResponse::success(state.state_update()))
}

async fn time_sync() -> Json<Value> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    Json(json!({ "serverTime": now }))
}

async fn health() -> &'static str {
    "OK"
}
