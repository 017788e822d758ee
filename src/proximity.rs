use std::collections::HashMap;

use crate::bridges::{BridgeId, BridgeRegistry};
use crate::geometry::{angle_diff, haversine_distance_m, initial_bearing};
use crate::vessel::Vessel;

/// Radius inside which a vessel interacts with a bridge.
pub const APPROACH_RADIUS_M: f64 = 300.0;
/// Radius inside which a vessel counts as approaching a bridge.
pub const APPROACHING_RADIUS_M: f64 = 500.0;
/// Under-bridge Schmitt trigger: set at 50 m, clear at 70 m.
pub const UNDER_BRIDGE_SET_M: f64 = 50.0;
pub const UNDER_BRIDGE_CLEAR_M: f64 = 70.0;
/// Vessels inside this ring around any bridge are protected from cleanup.
pub const PROTECTION_ZONE_M: f64 = 300.0;

const SLOW_VESSEL_SOG_KN: f64 = 0.5;
const APPROACH_BEARING_TOLERANCE_DEG: f64 = 90.0;

#[derive(Debug, Clone)]
pub struct ProximityAnalysis {
    pub bridge_distances: HashMap<BridgeId, f64>,
    pub nearest_bridge: Option<BridgeId>,
    pub nearest_distance: Option<f64>,
    #[allow(dead_code)]
    pub under_bridge: bool,
    pub within_protection_zone: bool,
    pub is_approaching: bool,
}

impl ProximityAnalysis {
    fn empty() -> Self {
        Self {
            bridge_distances: HashMap::new(),
            nearest_bridge: None,
            nearest_distance: None,
            under_bridge: false,
            within_protection_zone: false,
            is_approaching: false,
        }
    }

    pub fn distance_to(&self, bridge: BridgeId) -> Option<f64> {
        self.bridge_distances.get(&bridge).copied()
    }
}

/// Under-bridge Schmitt trigger over nearest distance.
pub fn schmitt_under_bridge(distance: f64, latched: bool) -> bool {
    if latched {
        distance < UNDER_BRIDGE_CLEAR_M
    } else {
        distance <= UNDER_BRIDGE_SET_M
    }
}

/// Compute per-bridge distances and the derived proximity flags for a vessel.
///
/// A vessel without a valid position yields an empty analysis; it never
/// contributes to passage detection or bridge text.
pub fn analyze_vessel_proximity(vessel: &Vessel, bridges: &BridgeRegistry) -> ProximityAnalysis {
    let (lat, lon) = match vessel.position() {
        Some(p) => p,
        None => return ProximityAnalysis::empty(),
    };

    let mut distances = HashMap::new();
    let mut nearest: Option<(BridgeId, f64)> = None;
    for id in bridges.all_bridge_ids() {
        let b = bridges.get_bridge(id);
        let d = haversine_distance_m(lat, lon, b.lat, b.lon);
        if !d.is_finite() {
            continue;
        }
        distances.insert(id, d);
        if nearest.map(|(_, nd)| d < nd).unwrap_or(true) {
            nearest = Some((id, d));
        }
    }

    let (nearest_bridge, nearest_distance) = match nearest {
        Some((id, d)) => (Some(id), Some(d)),
        None => (None, None),
    };

    let within_protection_zone = distances.values().any(|d| *d <= PROTECTION_ZONE_M);
    let under_bridge = nearest_distance
        .map(|d| schmitt_under_bridge(d, vessel.under_bridge_latched))
        .unwrap_or(false);

    let is_approaching = match (nearest_bridge, nearest_distance) {
        (Some(id), Some(d)) if d <= APPROACHING_RADIUS_M => {
            if vessel.sog < SLOW_VESSEL_SOG_KN {
                // Slow vessels get the benefit of the doubt: their COG is
                // often noise while drifting toward an opening.
                true
            } else {
                match vessel.cog {
                    Some(cog) => {
                        let b = bridges.get_bridge(id);
                        let bearing = initial_bearing(lat, lon, b.lat, b.lon);
                        angle_diff(cog, bearing).abs() <= APPROACH_BEARING_TOLERANCE_DEG
                    }
                    None => false,
                }
            }
        }
        _ => false,
    };

    ProximityAnalysis {
        bridge_distances: distances,
        nearest_bridge,
        nearest_distance,
        under_bridge,
        within_protection_zone,
        is_approaching,
    }
}
