use std::collections::HashMap;

use crate::bridges::{Bridge, BridgeId};
use crate::geometry::{angle_diff, canal_axis_projection, haversine_distance_m};

/// How long a passage stays user-visible as "precis passerat".
pub const PASSAGE_DISPLAY_WINDOW_MS: i64 = 60_000;

const LINE_CROSS_ENDPOINT_MAX_M: f64 = 250.0;
const LINE_CROSS_ENDPOINT_RELAXED_M: f64 = 300.0;
const LINE_CROSS_RELAXED_MOVEMENT_M: f64 = 100.0;

const GRACE_FAST_SOG_KN: f64 = 5.0;
const GRACE_FAST_MS: i64 = 120_000;
const GRACE_SLOW_MS: i64 = 60_000;

const DYNAMIC_WINDOW_MIN_MS: i64 = 90_000;
const DYNAMIC_WINDOW_MAX_MS: i64 = 300_000;

const MPS_PER_KNOT: f64 = 1852.0 / 3600.0;

#[derive(Debug, Clone, Copy)]
pub struct PassageSample {
    pub lat: f64,
    pub lon: f64,
    pub cog: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PassageDetection {
    pub passed: bool,
    pub method: &'static str,
    pub confidence: f64,
    pub prev_distance: f64,
    pub curr_distance: f64,
}

impl PassageDetection {
    fn none(method: &'static str) -> Self {
        Self {
            passed: false,
            method,
            confidence: 0.0,
            prev_distance: 0.0,
            curr_distance: 0.0,
        }
    }

    fn hit(method: &'static str, confidence: f64, prev: f64, curr: f64) -> Self {
        Self {
            passed: true,
            method,
            confidence,
            prev_distance: prev,
            curr_distance: curr,
        }
    }
}

/// Multi-method bridge passage detection.
///
/// Methods are tried in order; the first match wins. Distances are from the
/// bridge point, the line-crossing test projects onto the canal axis in a
/// local metric frame centered on the bridge.
pub fn detect_bridge_passage(
    curr: PassageSample,
    prev: PassageSample,
    bridge: &Bridge,
) -> PassageDetection {
    if !curr.lat.is_finite() || !curr.lon.is_finite() || !prev.lat.is_finite() || !prev.lon.is_finite()
    {
        return PassageDetection::none("invalid_coordinates");
    }

    let prev_dist = haversine_distance_m(prev.lat, prev.lon, bridge.lat, bridge.lon);
    let curr_dist = haversine_distance_m(curr.lat, curr.lon, bridge.lat, bridge.lon);
    if !prev_dist.is_finite() || !curr_dist.is_finite() {
        return PassageDetection::none("invalid_input");
    }

    // 1. Traditional close passage: was under the span, now opening distance.
    if prev_dist <= 50.0 && curr_dist > prev_dist && curr_dist > 60.0 {
        return PassageDetection::hit("close_passage", 0.95, prev_dist, curr_dist);
    }

    // 2. Enhanced line crossing: projection onto the canal axis changes sign.
    let movement = haversine_distance_m(prev.lat, prev.lon, curr.lat, curr.lon);
    let endpoint_max = if movement > LINE_CROSS_RELAXED_MOVEMENT_M {
        LINE_CROSS_ENDPOINT_RELAXED_M
    } else {
        LINE_CROSS_ENDPOINT_MAX_M
    };
    let prev_proj = canal_axis_projection(prev.lat, prev.lon, bridge.lat, bridge.lon, bridge.axis_bearing);
    let curr_proj = canal_axis_projection(curr.lat, curr.lon, bridge.lat, bridge.lon, bridge.axis_bearing);
    if let (Some(p0), Some(p1)) = (prev_proj, curr_proj) {
        let crossed = p0.signum() != p1.signum() && p0 != 0.0 && p1 != 0.0;
        let endpoint_close = prev_dist <= endpoint_max || curr_dist <= endpoint_max;
        let moving_away = curr_dist > prev_dist;
        if crossed && endpoint_close && moving_away {
            return PassageDetection::hit("line_crossing", 0.85, prev_dist, curr_dist);
        }
    }

    // 3. Progressive distance: clear monotone retreat from a near position.
    if prev_dist <= 200.0 && curr_dist > prev_dist + 10.0 && curr_dist > 80.0 {
        return PassageDetection::hit("progressive_distance", 0.75, prev_dist, curr_dist);
    }

    // 4. Direction change right at the bridge.
    if let (Some(ccog), Some(pcog)) = (curr.cog, prev.cog) {
        if prev_dist <= 250.0
            && angle_diff(ccog, pcog).abs() > 60.0
            && curr_dist > prev_dist - 10.0
            && curr_dist > 60.0
        {
            return PassageDetection::hit("direction_change", 0.70, prev_dist, curr_dist);
        }
    }

    // 5. Stallbackabron special: the high bridge never requires an opening,
    // so the pass is announced earlier and with looser retreat evidence.
    if bridge.id == BridgeId::Stallbackabron
        && prev_dist <= 120.0
        && curr_dist > prev_dist - 5.0
        && curr_dist > 50.0
    {
        return PassageDetection::hit("stallbacka_special", 0.80, prev_dist, curr_dist);
    }

    PassageDetection::none("no_passage")
}

/// Internal grace: a fresh passage of the same bridge is suppressed for this long.
pub fn internal_grace_ms(sog: f64) -> i64 {
    if sog > GRACE_FAST_SOG_KN { GRACE_FAST_MS } else { GRACE_SLOW_MS }
}

/// Window for inter-bridge computations, scaled to the time the vessel needs
/// to cover the gap, clamped to [90 s, 300 s].
#[allow(dead_code)]
pub fn dynamic_window_ms(gap_m: f64, sog: f64) -> i64 {
    let speed_mps = (sog * MPS_PER_KNOT).max(0.1);
    let travel_ms = gap_m / speed_mps * 1000.0;
    ((1.5 * travel_ms) as i64).clamp(DYNAMIC_WINDOW_MIN_MS, DYNAMIC_WINDOW_MAX_MS)
}

/// Remembers recent passages per vessel and bridge.
///
/// Blocks a re-detected passage of the same bridge during the internal grace
/// period and blocks re-entering `waiting` at a just-passed bridge for the
/// display window.
#[derive(Debug, Default)]
pub struct PassageLatch {
    passages: HashMap<(String, BridgeId), i64>,
}

impl PassageLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, mmsi: &str, bridge: BridgeId, now: i64) {
        self.passages.insert((mmsi.to_string(), bridge), now);
    }

    pub fn last_passage(&self, mmsi: &str, bridge: BridgeId) -> Option<i64> {
        self.passages.get(&(mmsi.to_string(), bridge)).copied()
    }

    /// A fresh passage of the same bridge is suppressed during the grace period.
    pub fn is_passage_blocked(&self, mmsi: &str, bridge: BridgeId, sog: f64, now: i64) -> bool {
        match self.last_passage(mmsi, bridge) {
            Some(t) => now - t < internal_grace_ms(sog),
            None => false,
        }
    }

    /// Waiting at a just-passed bridge is suppressed for the display window.
    pub fn blocks_waiting(&self, mmsi: &str, bridge: BridgeId, now: i64) -> bool {
        match self.last_passage(mmsi, bridge) {
            Some(t) => now - t < PASSAGE_DISPLAY_WINDOW_MS,
            None => false,
        }
    }

    pub fn clear_vessel(&mut self, mmsi: &str) {
        self.passages.retain(|(m, _), _| m != mmsi);
    }
}
