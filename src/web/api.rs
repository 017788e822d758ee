use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::bridges::BridgeId;
use crate::vessel::VesselSnapshot;

/// Current device-facing output, published by the tracking task.
#[derive(Debug, Clone, Default)]
pub struct BridgeStatus {
    pub bridge_text: String,
    pub alarm_generic: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub status_rx: watch::Receiver<BridgeStatus>,
    pub vessels_rx: watch::Receiver<Vec<VesselSnapshot>>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub bridge_text: String,
    pub alarm_generic: bool,
    pub vessel_count: usize,
}

#[derive(Debug, Serialize)]
pub struct VesselResponse {
    pub mmsi: String,
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub sog: f64,
    pub cog: Option<f64>,
    pub status: String,
    pub target_bridge: Option<&'static str>,
    pub current_bridge: Option<&'static str>,
    pub eta_minutes: Option<f64>,
}

fn bridge_name(bridge: Option<BridgeId>) -> Option<&'static str> {
    bridge.map(|b| b.name())
}

impl From<&VesselSnapshot> for VesselResponse {
    fn from(v: &VesselSnapshot) -> Self {
        Self {
            mmsi: v.mmsi.clone(),
            name: v.name.clone(),
            lat: v.lat,
            lon: v.lon,
            sog: v.sog,
            cog: v.cog,
            status: v.status.as_str().to_string(),
            target_bridge: bridge_name(v.target_bridge),
            current_bridge: bridge_name(v.current_bridge),
            eta_minutes: v.eta_minutes,
        }
    }
}

pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatusResponse>>, StatusCode> {
    info!("GET /api/status called");
    let status = state.status_rx.borrow().clone();
    let vessel_count = state.vessels_rx.borrow().len();
    Ok(Json(ApiResponse::ok(StatusResponse {
        bridge_text: status.bridge_text,
        alarm_generic: status.alarm_generic,
        vessel_count,
    })))
}

pub async fn get_vessels(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<VesselResponse>>>, StatusCode> {
    info!("GET /api/vessels called");
    let vessels: Vec<VesselResponse> = state.vessels_rx.borrow().iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(vessels)))
}

pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/vessels", get(get_vessels))
        .with_state(state)
}
