use tracing::{debug, warn};

use crate::proximity::{ProximityAnalysis, APPROACH_RADIUS_M};
use crate::vessel::Vessel;

/// Clear hysteresis: a current bridge is dropped only beyond this distance.
pub const CURRENT_BRIDGE_CLEAR_M: f64 = 450.0;
/// A just-passed bridge is released as current bridge past this distance.
const PASSED_CLEARANCE_M: f64 = 50.0;

/// Assign or update the bridge a vessel is interacting with right now.
///
/// Rules apply in order: a just-passed bridge more than 50 m behind is
/// released first; otherwise the nearest bridge within 300 m becomes current,
/// an existing assignment survives until 450 m (the asymmetric pair keeps it
/// from flapping at the boundary), and a missing distance is repaired from
/// the proximity data.
pub fn update_current_bridge(vessel: &mut Vessel, proximity: &ProximityAnalysis) {
    vessel.near_bridge = match (proximity.nearest_bridge, proximity.nearest_distance) {
        (Some(id), Some(d)) if d <= APPROACH_RADIUS_M => Some(id),
        _ => None,
    };

    // 1. Passed clearance
    if let Some(current) = vessel.current_bridge {
        if Some(current) == vessel.last_passed_bridge {
            let fresh = proximity.distance_to(current).or(vessel.distance_to_current);
            if fresh.map(|d| d > PASSED_CLEARANCE_M).unwrap_or(false) {
                debug!(mmsi = %vessel.mmsi, bridge = current.name(), "releasing passed bridge as current");
                vessel.current_bridge = None;
                vessel.distance_to_current = None;
                return;
            }
        }
    }

    match (proximity.nearest_bridge, proximity.nearest_distance) {
        // 2. Set within the approach radius
        (Some(nearest), Some(d)) if d <= APPROACH_RADIUS_M => {
            vessel.current_bridge = Some(nearest);
            vessel.distance_to_current = Some(d);
        }
        _ => {
            if let Some(current) = vessel.current_bridge {
                let fresh = proximity.distance_to(current);
                match fresh.or(vessel.distance_to_current) {
                    // 3. Clear beyond the hysteresis distance
                    Some(d) if d > CURRENT_BRIDGE_CLEAR_M => {
                        vessel.current_bridge = None;
                        vessel.distance_to_current = None;
                    }
                    // 4. Refresh the tracked distance
                    Some(d) => {
                        vessel.distance_to_current = Some(d);
                    }
                    None => {}
                }
            }
        }
    }

    // 5. Repair a current bridge with a missing or zeroed distance
    if let Some(current) = vessel.current_bridge {
        let stale = vessel
            .distance_to_current
            .map(|d| !d.is_finite() || d == 0.0)
            .unwrap_or(true);
        if stale {
            match proximity.distance_to(current) {
                Some(d) if d > CURRENT_BRIDGE_CLEAR_M => {
                    warn!(
                        mmsi = %vessel.mmsi,
                        bridge = current.name(),
                        distance = d,
                        "current bridge distance was stale and out of range, clearing"
                    );
                    vessel.current_bridge = None;
                    vessel.distance_to_current = None;
                }
                Some(d) => {
                    vessel.distance_to_current = Some(d);
                }
                None => {
                    vessel.current_bridge = None;
                    vessel.distance_to_current = None;
                }
            }
        }
    }
}
