use tracing::debug;

use crate::bridges::BridgeRegistry;
use crate::proximity::ProximityAnalysis;
use crate::vessel::{Vessel, VesselStatus};

pub const ETA_MIN_MINUTES: f64 = 0.1;
pub const ETA_MAX_MINUTES: f64 = 120.0;
/// A waiting vessel never reports an opening further out than this.
pub const WAITING_STATUS_MAX_ETA_MINUTES: f64 = 15.0;

const EFFECTIVE_SPEED_FLOOR_KN: f64 = 0.5;
const MPS_PER_KNOT: f64 = 1852.0 / 3600.0;

/// ETA in minutes to the vessel's target bridge.
///
/// Direct when the nearest bridge is the target; otherwise composed from the
/// leg to the nearest bridge plus the inter-bridge segments along the canal.
/// A waiting vessel's ETA is clamped so it never grows while the boat idles
/// in front of the span.
pub fn calculate_progressive_eta(
    vessel: &Vessel,
    proximity: &ProximityAnalysis,
    bridges: &BridgeRegistry,
) -> Option<f64> {
    let target = vessel.target_bridge?;
    vessel.position()?;
    let nearest = proximity.nearest_bridge?;
    let nearest_distance = proximity.nearest_distance?;
    if !nearest_distance.is_finite() {
        return None;
    }

    let speed_mps = vessel.sog.max(EFFECTIVE_SPEED_FLOOR_KN) * MPS_PER_KNOT;

    let total_distance = if nearest == target {
        nearest_distance
    } else {
        nearest_distance + bridges.route_distance(nearest, target)
    };
    if !total_distance.is_finite() || total_distance < 0.0 {
        debug!(mmsi = %vessel.mmsi, "eta distance computation failed");
        return None;
    }

    let minutes = total_distance / speed_mps / 60.0;
    if !minutes.is_finite() {
        return None;
    }
    let mut eta = minutes.clamp(ETA_MIN_MINUTES, ETA_MAX_MINUTES);

    if vessel.status == VesselStatus::Waiting {
        eta = eta.min(WAITING_STATUS_MAX_ETA_MINUTES);
        if let Some(prev) = vessel.eta_minutes {
            eta = eta.min(prev);
        }
    }

    Some(eta)
}
