use std::collections::VecDeque;

use serde::Serialize;

use crate::bridges::BridgeId;
use crate::gps_analyzer::MovementAnalysis;

/// Movement below this is treated as position noise, not travel.
pub const MINIMUM_MOVEMENT_M: f64 = 10.0;

const SPEED_HISTORY_MAX_ENTRIES: usize = 10;
const SPEED_HISTORY_MAX_AGE_MS: i64 = 5 * 60 * 1000;

/// Per-vessel user-facing state, in ascending announcement priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VesselStatus {
    Unknown,
    EnRoute,
    Approaching,
    Waiting,
    StallbackaWaiting,
    UnderBridge,
    Passed,
}

impl VesselStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VesselStatus::Unknown => "unknown",
            VesselStatus::EnRoute => "en-route",
            VesselStatus::Approaching => "approaching",
            VesselStatus::Waiting => "waiting",
            VesselStatus::StallbackaWaiting => "stallbacka-waiting",
            VesselStatus::UnderBridge => "under-bridge",
            VesselStatus::Passed => "passed",
        }
    }

    /// Priority used when choosing the leading vessel for a bridge sentence.
    pub fn announcement_priority(&self) -> u8 {
        match self {
            VesselStatus::Passed => 6,
            VesselStatus::UnderBridge => 5,
            VesselStatus::StallbackaWaiting => 4,
            VesselStatus::Waiting => 3,
            VesselStatus::Approaching => 2,
            VesselStatus::EnRoute => 1,
            VesselStatus::Unknown => 0,
        }
    }
}

/// Validate a latitude field. Anything non-finite or out of range becomes None.
pub fn sanitize_lat(lat: f64) -> Option<f64> {
    if lat.is_finite() && lat.abs() <= 90.0 { Some(lat) } else { None }
}

/// Validate a longitude field. Anything non-finite or out of range becomes None.
pub fn sanitize_lon(lon: f64) -> Option<f64> {
    if lon.is_finite() && lon.abs() <= 180.0 { Some(lon) } else { None }
}

/// Validate a speed-over-ground field in knots.
pub fn sanitize_sog(sog: f64) -> f64 {
    if sog.is_finite() && sog >= 0.0 { sog } else { 0.0 }
}

/// Validate a course-over-ground field in degrees.
pub fn sanitize_cog(cog: f64) -> Option<f64> {
    if cog.is_finite() && (0.0..=360.0).contains(&cog) { Some(cog) } else { None }
}

/// Mutable vessel record. Owned and mutated exclusively by the vessel
/// registry; everything else sees [`VesselSnapshot`] copies.
#[derive(Debug, Clone)]
pub struct Vessel {
    pub mmsi: String,
    pub name: Option<String>,
    /// Last update, epoch milliseconds.
    pub timestamp: i64,

    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub sog: f64,
    pub cog: Option<f64>,

    pub last_position: Option<(f64, f64)>,
    pub last_position_change: i64,
    pub position_analysis: Option<MovementAnalysis>,
    pub gps_jump_detected: bool,
    pub position_uncertain: bool,

    pub target_bridge: Option<BridgeId>,
    pub current_bridge: Option<BridgeId>,
    pub distance_to_current: Option<f64>,
    /// Nearest bridge while inside the approach radius.
    pub near_bridge: Option<BridgeId>,

    pub status: VesselStatus,
    pub is_waiting: bool,
    pub is_approaching: bool,

    pub passed_bridges: Vec<BridgeId>,
    pub last_passed_bridge: Option<BridgeId>,
    pub last_passed_bridge_time: Option<i64>,
    #[allow(dead_code)]
    pub was_close_to_target: Option<BridgeId>,

    pub under_bridge_latched: bool,
    pub last_target_for_hysteresis: Option<BridgeId>,
    pub last_current_for_hysteresis: Option<BridgeId>,
    /// A detected target passage whose transition is still held back by the
    /// 200 m block around the span.
    pub pending_target_advance: bool,

    pub speed_below_threshold_since: Option<i64>,
    pub wait_since: Option<i64>,
    pub speed_history: VecDeque<(f64, i64)>,
    #[allow(dead_code)]
    pub max_recent_speed: f64,

    pub eta_minutes: Option<f64>,

    /// Epoch ms after which the cleanup sweep may remove this vessel.
    pub cleanup_deadline: i64,
}

impl Vessel {
    pub fn new(mmsi: String, now: i64) -> Self {
        Self {
            mmsi,
            name: None,
            timestamp: now,
            lat: None,
            lon: None,
            sog: 0.0,
            cog: None,
            last_position: None,
            last_position_change: now,
            position_analysis: None,
            gps_jump_detected: false,
            position_uncertain: false,
            target_bridge: None,
            current_bridge: None,
            distance_to_current: None,
            near_bridge: None,
            status: VesselStatus::Unknown,
            is_waiting: false,
            is_approaching: false,
            passed_bridges: Vec::new(),
            last_passed_bridge: None,
            last_passed_bridge_time: None,
            was_close_to_target: None,
            under_bridge_latched: false,
            last_target_for_hysteresis: None,
            last_current_for_hysteresis: None,
            pending_target_advance: false,
            speed_below_threshold_since: None,
            wait_since: None,
            speed_history: VecDeque::new(),
            max_recent_speed: 0.0,
            eta_minutes: None,
            cleanup_deadline: i64::MAX,
        }
    }

    pub fn has_valid_position(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Append a speed sample and prune the history to its bounds.
    pub fn push_speed_sample(&mut self, sog: f64, now: i64) {
        self.speed_history.push_back((sog, now));
        while self.speed_history.len() > SPEED_HISTORY_MAX_ENTRIES {
            self.speed_history.pop_front();
        }
        let cutoff = now - SPEED_HISTORY_MAX_AGE_MS;
        while let Some(&(_, ts)) = self.speed_history.front() {
            if ts < cutoff {
                self.speed_history.pop_front();
            } else {
                break;
            }
        }
        self.max_recent_speed = self
            .speed_history
            .iter()
            .map(|&(s, _)| s)
            .fold(0.0, f64::max);
    }

    pub fn recently_passed(&self, now: i64, window_ms: i64) -> bool {
        self.last_passed_bridge_time
            .map(|t| now - t < window_ms)
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> VesselSnapshot {
        VesselSnapshot {
            mmsi: self.mmsi.clone(),
            name: self.name.clone(),
            timestamp: self.timestamp,
            lat: self.lat,
            lon: self.lon,
            sog: self.sog,
            cog: self.cog,
            status: self.status,
            target_bridge: self.target_bridge,
            current_bridge: self.current_bridge,
            distance_to_current: self.distance_to_current,
            near_bridge: self.near_bridge,
            last_passed_bridge: self.last_passed_bridge,
            last_passed_bridge_time: self.last_passed_bridge_time,
            eta_minutes: self.eta_minutes,
            is_waiting: self.is_waiting,
            is_approaching: self.is_approaching,
            gps_jump_detected: self.gps_jump_detected,
            position_uncertain: self.position_uncertain,
        }
    }
}

/// Read-only copy handed to the bridge-text composer, triggers, and the web API.
#[derive(Debug, Clone, Serialize)]
pub struct VesselSnapshot {
    pub mmsi: String,
    pub name: Option<String>,
    pub timestamp: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub sog: f64,
    pub cog: Option<f64>,
    pub status: VesselStatus,
    pub target_bridge: Option<BridgeId>,
    pub current_bridge: Option<BridgeId>,
    pub distance_to_current: Option<f64>,
    pub near_bridge: Option<BridgeId>,
    pub last_passed_bridge: Option<BridgeId>,
    pub last_passed_bridge_time: Option<i64>,
    pub eta_minutes: Option<f64>,
    pub is_waiting: bool,
    pub is_approaching: bool,
    pub gps_jump_detected: bool,
    pub position_uncertain: bool,
}

impl VesselSnapshot {
    #[allow(dead_code)]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.mmsi)
    }

    pub fn has_valid_position(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }
}
