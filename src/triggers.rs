use std::collections::HashSet;

use crate::bridges::BridgeId;
use crate::vessel::{VesselSnapshot, VesselStatus};

/// Fire-and-forget notification for the automation host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoatNearTrigger {
    pub mmsi: String,
    pub bridge: &'static str,
}

/// Arms the `boat_near` trigger once per vessel, target, and approach.
///
/// The trigger fires when a vessel enters `approaching` toward a target
/// bridge and is re-armed only after the status leaves `approaching`.
#[derive(Debug, Default)]
pub struct TriggerGuard {
    fired: HashSet<(String, BridgeId)>,
}

impl TriggerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_status(&mut self, snapshot: &VesselSnapshot) -> Option<BoatNearTrigger> {
        if snapshot.status == VesselStatus::Approaching {
            let target = snapshot.target_bridge?;
            let key = (snapshot.mmsi.clone(), target);
            if self.fired.insert(key) {
                return Some(BoatNearTrigger {
                    mmsi: snapshot.mmsi.clone(),
                    bridge: target.name(),
                });
            }
        } else {
            self.fired.retain(|(mmsi, _)| mmsi != &snapshot.mmsi);
        }
        None
    }

    pub fn clear_vessel(&mut self, mmsi: &str) {
        self.fired.retain(|(m, _)| m != mmsi);
    }
}
