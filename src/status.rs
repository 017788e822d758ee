use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::bridges::{BridgeId, BridgeRegistry};
use crate::passage::{PassageLatch, PASSAGE_DISPLAY_WINDOW_MS};
use crate::proximity::{schmitt_under_bridge, ProximityAnalysis, APPROACHING_RADIUS_M, APPROACH_RADIUS_M};
use crate::vessel::{Vessel, VesselStatus};

/// A vessel counts as holding for an opening below this speed.
pub const WAITING_SOG_THRESHOLD_KN: f64 = 0.20;
/// How long the speed must stay below the threshold before `waiting`.
pub const WAITING_HOLD_MS: i64 = 120_000;

const STABILIZER_HISTORY_MAX_AGE_MS: i64 = 5 * 60 * 1000;
const STABILIZER_HISTORY_MAX_ENTRIES: usize = 20;
const GPS_JUMP_HOLD_MS: i64 = 30_000;
const UNCERTAIN_CONSISTENT_READINGS: u32 = 2;

/// Track the low-speed timer that gates the `waiting` status.
pub fn update_waiting_timer(vessel: &mut Vessel, now: i64) {
    if vessel.sog <= WAITING_SOG_THRESHOLD_KN {
        if vessel.speed_below_threshold_since.is_none() {
            vessel.speed_below_threshold_since = Some(now);
        }
    } else {
        vessel.speed_below_threshold_since = None;
        vessel.wait_since = None;
    }
}

fn waiting_timer_ready(vessel: &Vessel, now: i64) -> bool {
    vessel
        .speed_below_threshold_since
        .map(|since| now - since >= WAITING_HOLD_MS)
        .unwrap_or(false)
}

/// Clear the under-bridge latch when its reference frame changed.
///
/// Any of: GPS jump, any target bridge change, current bridge change from one
/// bridge to a different one, invalid position. Also refreshes the hysteresis
/// bookkeeping fields.
pub fn reset_latches_if_needed(vessel: &mut Vessel) {
    let target_changed = vessel.last_target_for_hysteresis != vessel.target_bridge;
    let current_changed = vessel.last_current_for_hysteresis != vessel.current_bridge
        && vessel.last_current_for_hysteresis.is_some()
        && vessel.current_bridge.is_some();

    if vessel.gps_jump_detected || target_changed || current_changed || !vessel.has_valid_position()
    {
        vessel.under_bridge_latched = false;
    }
    vessel.last_target_for_hysteresis = vessel.target_bridge;
    vessel.last_current_for_hysteresis = vessel.current_bridge;
}

/// Evaluate the status priority ladder for one vessel.
///
/// Returns the proposed status and the rule that produced it; the stabilizer
/// decides whether the proposal is actually adopted.
pub fn determine_status(
    vessel: &mut Vessel,
    proximity: &ProximityAnalysis,
    bridges: &BridgeRegistry,
    latch: &PassageLatch,
    now: i64,
) -> (VesselStatus, &'static str) {
    if !vessel.has_valid_position() {
        return (VesselStatus::Unknown, "no_valid_position");
    }

    update_waiting_timer(vessel, now);

    // 1. Recently passed a bridge
    if vessel.recently_passed(now, PASSAGE_DISPLAY_WINDOW_MS) {
        return (VesselStatus::Passed, "recently_passed");
    }

    // 2. Under a bridge span. The target bridge distance counts, as does the
    // current bridge distance, except at Stallbackabron whose span is high
    // enough that boats never wait under it.
    let mut under_basis: Option<f64> = None;
    if let Some(target) = vessel.target_bridge {
        under_basis = proximity.distance_to(target);
    }
    if let Some(current) = vessel.current_bridge {
        if current != BridgeId::Stallbackabron {
            let d = vessel.distance_to_current.or(proximity.distance_to(current));
            under_basis = match (under_basis, d) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
    }
    if let Some(d) = under_basis {
        if schmitt_under_bridge(d, vessel.under_bridge_latched) {
            vessel.under_bridge_latched = true;
            return (VesselStatus::UnderBridge, "under_bridge");
        }
        vessel.under_bridge_latched = false;
    }

    // 3. Waiting at the target bridge
    if let Some(target) = vessel.target_bridge {
        if let Some(d) = proximity.distance_to(target) {
            if d <= APPROACH_RADIUS_M
                && waiting_timer_ready(vessel, now)
                && vessel.last_passed_bridge != Some(target)
                && !latch.blocks_waiting(&vessel.mmsi, target, now)
            {
                if vessel.wait_since.is_none() {
                    vessel.wait_since = Some(now);
                }
                return (VesselStatus::Waiting, "waiting_at_target");
            }
        }
    }

    // 4. Waiting at an opening intermediate bridge
    if let (Some(nearest), Some(d)) = (proximity.nearest_bridge, proximity.nearest_distance) {
        let opening_intermediate =
            nearest == BridgeId::Olidebron || nearest == BridgeId::Jarnvagsbron;
        if opening_intermediate
            && d <= APPROACH_RADIUS_M
            && waiting_timer_ready(vessel, now)
            && vessel.last_passed_bridge != Some(nearest)
            && !latch.blocks_waiting(&vessel.mmsi, nearest, now)
        {
            vessel.current_bridge = Some(nearest);
            vessel.distance_to_current = Some(d);
            if vessel.wait_since.is_none() {
                vessel.wait_since = Some(now);
            }
            return (VesselStatus::Waiting, "waiting_at_intermediate");
        }
    }

    // 5. About to pass under Stallbackabron
    if let Some(d) = proximity.distance_to(BridgeId::Stallbackabron) {
        if d <= APPROACH_RADIUS_M && !vessel.passed_bridges.contains(&BridgeId::Stallbackabron) {
            return (VesselStatus::StallbackaWaiting, "stallbacka_waiting");
        }
    }

    // 6. Approaching the target or an eligible intermediate bridge
    if let Some(target) = vessel.target_bridge {
        if let Some(d) = proximity.distance_to(target) {
            if d <= APPROACHING_RADIUS_M {
                return (VesselStatus::Approaching, "approaching_target");
            }
        }
    }
    if proximity.is_approaching {
        if let (Some(nearest), Some(d)) = (proximity.nearest_bridge, proximity.nearest_distance) {
            let is_target = bridges.get_bridge(nearest).is_target;
            if !is_target && d <= APPROACHING_RADIUS_M {
                return (VesselStatus::Approaching, "approaching_intermediate");
            }
        }
    }

    // 7. En route
    (VesselStatus::EnRoute, "en_route")
}

#[derive(Debug, Clone)]
pub struct StabilizedStatus {
    pub status: VesselStatus,
    pub confidence: f64,
    pub stabilized: bool,
    pub reason: &'static str,
    pub coordination_applied: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct StabilizeInput<'a> {
    pub mmsi: &'a str,
    pub proposed: VesselStatus,
    pub previous: VesselStatus,
    pub gps_jump: bool,
    pub uncertain: bool,
    pub sog: f64,
    pub nearest_distance: Option<f64>,
}

/// Damps status flicker and rides out GPS events.
///
/// Keeps a short status history per vessel; on a GPS jump the previous
/// status is held for up to 30 s (longer when the coordinator escalates), on
/// uncertain positions a change needs two consistent readings, and rapid
/// back-and-forth resolves to the most common recent status.
#[derive(Debug, Default)]
pub struct StatusStabilizer {
    history: HashMap<String, VecDeque<(VesselStatus, i64)>>,
    hold_until: HashMap<String, (VesselStatus, i64)>,
    pending_change: HashMap<String, (VesselStatus, u32)>,
}

impl StatusStabilizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stabilize(
        &mut self,
        input: StabilizeInput<'_>,
        extension_ms: i64,
        now: i64,
    ) -> StabilizedStatus {
        let history = self.history.entry(input.mmsi.to_string()).or_default();
        history.push_back((input.proposed, now));
        while history.len() > STABILIZER_HISTORY_MAX_ENTRIES {
            history.pop_front();
        }
        let cutoff = now - STABILIZER_HISTORY_MAX_AGE_MS;
        while let Some(&(_, ts)) = history.front() {
            if ts < cutoff {
                history.pop_front();
            } else {
                break;
            }
        }

        let mut confidence: f64 = 1.0;
        if input.gps_jump {
            confidence *= 0.3;
        }
        if input.uncertain {
            confidence *= 0.7;
        }
        if input.sog < 0.5 {
            confidence *= 0.8;
        }
        if input.nearest_distance.map(|d| d > APPROACHING_RADIUS_M).unwrap_or(true) {
            confidence *= 0.9;
        }
        let confidence = confidence.clamp(0.1, 1.0);

        // Active hold from an earlier GPS event
        if let Some(&(held, until)) = self.hold_until.get(input.mmsi) {
            if now < until && input.proposed != held {
                return StabilizedStatus {
                    status: held,
                    confidence,
                    stabilized: true,
                    reason: "gps_jump_hold",
                    coordination_applied: extension_ms > 0,
                };
            }
            if now >= until {
                self.hold_until.remove(input.mmsi);
            }
        }

        // A fresh GPS jump freezes the previous status
        if input.gps_jump && input.proposed != input.previous {
            let until = now + GPS_JUMP_HOLD_MS + extension_ms;
            self.hold_until
                .insert(input.mmsi.to_string(), (input.previous, until));
            debug!(mmsi = input.mmsi, held = input.previous.as_str(), "holding status through gps jump");
            return StabilizedStatus {
                status: input.previous,
                confidence,
                stabilized: true,
                reason: "gps_jump_hold",
                coordination_applied: extension_ms > 0,
            };
        }

        // Uncertain position: require two consistent readings before a change
        if input.uncertain && input.proposed != input.previous {
            let entry = self
                .pending_change
                .entry(input.mmsi.to_string())
                .or_insert((input.proposed, 0));
            if entry.0 == input.proposed {
                entry.1 += 1;
            } else {
                *entry = (input.proposed, 1);
            }
            if entry.1 < UNCERTAIN_CONSISTENT_READINGS {
                return StabilizedStatus {
                    status: input.previous,
                    confidence,
                    stabilized: true,
                    reason: "awaiting_consistent_reading",
                    coordination_applied: false,
                };
            }
            self.pending_change.remove(input.mmsi);
        } else {
            self.pending_change.remove(input.mmsi);
        }

        // Flicker: two or more reversals within the last three proposals
        let recent: Vec<VesselStatus> = self
            .history
            .get(input.mmsi)
            .map(|h| h.iter().rev().take(3).map(|&(s, _)| s).rev().collect())
            .unwrap_or_default();
        if recent.len() == 3 {
            let changes = recent.windows(2).filter(|w| w[0] != w[1]).count();
            if changes >= 2 {
                let last5: Vec<VesselStatus> = self
                    .history
                    .get(input.mmsi)
                    .map(|h| h.iter().rev().take(5).map(|&(s, _)| s).collect())
                    .unwrap_or_default();
                let mut counts: HashMap<VesselStatus, usize> = HashMap::new();
                for s in &last5 {
                    *counts.entry(*s).or_insert(0) += 1;
                }
                let best = counts
                    .iter()
                    .max_by_key(|(s, c)| (**c, s.announcement_priority()))
                    .map(|(s, _)| *s);
                if let Some(winner) = best {
                    if winner != input.proposed {
                        return StabilizedStatus {
                            status: winner,
                            confidence,
                            stabilized: true,
                            reason: "flicker_damped",
                            coordination_applied: false,
                        };
                    }
                }
            }
        }

        StabilizedStatus {
            status: input.proposed,
            confidence,
            stabilized: false,
            reason: "accepted",
            coordination_applied: false,
        }
    }

    pub fn clear_vessel(&mut self, mmsi: &str) {
        self.history.remove(mmsi);
        self.hold_until.remove(mmsi);
        self.pending_change.remove(mmsi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proximity::analyze_vessel_proximity;

    fn vessel_with_target(lat_offset: f64, sog: f64) -> (Vessel, BridgeRegistry) {
        let bridges = BridgeRegistry::new();
        let b = bridges.get_bridge(BridgeId::Stridsbergsbron);
        let mut v = Vessel::new("265000001".into(), 0);
        v.lat = Some(b.lat + lat_offset);
        v.lon = Some(b.lon);
        v.sog = sog;
        v.cog = Some(0.0);
        v.target_bridge = Some(BridgeId::Stridsbergsbron);
        (v, bridges)
    }

    #[test]
    fn test_waiting_requires_two_minutes_below_threshold() {
        // ~150 m south of the target
        let (mut v, bridges) = vessel_with_target(-0.00135, 0.1);
        let latch = PassageLatch::new();

        let p = analyze_vessel_proximity(&v, &bridges);
        let (s, _) = determine_status(&mut v, &p, &bridges, &latch, 0);
        assert_eq!(s, VesselStatus::Approaching);

        let (s, _) = determine_status(&mut v, &p, &bridges, &latch, 119_000);
        assert_eq!(s, VesselStatus::Approaching);

        let (s, reason) = determine_status(&mut v, &p, &bridges, &latch, 121_000);
        assert_eq!(s, VesselStatus::Waiting);
        assert_eq!(reason, "waiting_at_target");
        assert!(v.wait_since.is_some());
    }

    #[test]
    fn test_speed_above_threshold_resets_waiting_timer() {
        let (mut v, bridges) = vessel_with_target(-0.00135, 0.1);
        let latch = PassageLatch::new();
        let p = analyze_vessel_proximity(&v, &bridges);
        determine_status(&mut v, &p, &bridges, &latch, 0);

        v.sog = 1.5;
        determine_status(&mut v, &p, &bridges, &latch, 60_000);
        assert!(v.speed_below_threshold_since.is_none());

        v.sog = 0.1;
        let (s, _) = determine_status(&mut v, &p, &bridges, &latch, 90_000);
        assert_eq!(s, VesselStatus::Approaching);
        let (s, _) = determine_status(&mut v, &p, &bridges, &latch, 211_000);
        assert_eq!(s, VesselStatus::Waiting);
    }

    #[test]
    fn test_under_bridge_schmitt_latch() {
        // 40 m from the target: under-bridge sets
        let (mut v, bridges) = vessel_with_target(-0.00036, 2.0);
        let latch = PassageLatch::new();
        let p = analyze_vessel_proximity(&v, &bridges);
        let (s, _) = determine_status(&mut v, &p, &bridges, &latch, 0);
        assert_eq!(s, VesselStatus::UnderBridge);
        assert!(v.under_bridge_latched);

        // 60 m: still latched under
        let b = bridges.get_bridge(BridgeId::Stridsbergsbron);
        v.lat = Some(b.lat + 0.00054);
        let p = analyze_vessel_proximity(&v, &bridges);
        let (s, _) = determine_status(&mut v, &p, &bridges, &latch, 10_000);
        assert_eq!(s, VesselStatus::UnderBridge);

        // 100 m: cleared
        v.lat = Some(b.lat + 0.0009);
        let p = analyze_vessel_proximity(&v, &bridges);
        let (s, _) = determine_status(&mut v, &p, &bridges, &latch, 20_000);
        assert_ne!(s, VesselStatus::UnderBridge);
        assert!(!v.under_bridge_latched);
    }

    #[test]
    fn test_recently_passed_wins() {
        let (mut v, bridges) = vessel_with_target(-0.00036, 2.0);
        let latch = PassageLatch::new();
        v.last_passed_bridge = Some(BridgeId::Klaffbron);
        v.last_passed_bridge_time = Some(100_000);
        let p = analyze_vessel_proximity(&v, &bridges);
        let (s, reason) = determine_status(&mut v, &p, &bridges, &latch, 130_000);
        assert_eq!(s, VesselStatus::Passed);
        assert_eq!(reason, "recently_passed");
    }

    #[test]
    fn test_stallbacka_never_under_bridge() {
        let bridges = BridgeRegistry::new();
        let b = bridges.get_bridge(BridgeId::Stallbackabron);
        let mut v = Vessel::new("265000001".into(), 0);
        // 30 m from Stallbackabron
        v.lat = Some(b.lat + 0.00027);
        v.lon = Some(b.lon);
        v.sog = 4.0;
        v.cog = Some(200.0);
        v.target_bridge = Some(BridgeId::Stridsbergsbron);
        v.current_bridge = Some(BridgeId::Stallbackabron);
        v.distance_to_current = Some(30.0);
        let latch = PassageLatch::new();
        let p = analyze_vessel_proximity(&v, &bridges);
        let (s, _) = determine_status(&mut v, &p, &bridges, &latch, 0);
        assert_eq!(s, VesselStatus::StallbackaWaiting);
    }

    #[test]
    fn test_stallbacka_waiting_within_300m() {
        let bridges = BridgeRegistry::new();
        let b = bridges.get_bridge(BridgeId::Stallbackabron);
        let mut v = Vessel::new("265000001".into(), 0);
        // ~280 m south
        v.lat = Some(b.lat - 0.00252);
        v.lon = Some(b.lon);
        v.sog = 4.0;
        v.cog = Some(20.0);
        v.target_bridge = Some(BridgeId::Stridsbergsbron);
        let latch = PassageLatch::new();
        let p = analyze_vessel_proximity(&v, &bridges);
        let (s, reason) = determine_status(&mut v, &p, &bridges, &latch, 0);
        assert_eq!(s, VesselStatus::StallbackaWaiting);
        assert_eq!(reason, "stallbacka_waiting");
    }

    #[test]
    fn test_stallbacka_waiting_not_after_passage() {
        let bridges = BridgeRegistry::new();
        let b = bridges.get_bridge(BridgeId::Stallbackabron);
        let mut v = Vessel::new("265000001".into(), 0);
        v.lat = Some(b.lat - 0.00252);
        v.lon = Some(b.lon);
        v.sog = 4.0;
        v.cog = Some(200.0);
        v.passed_bridges.push(BridgeId::Stallbackabron);
        let latch = PassageLatch::new();
        let p = analyze_vessel_proximity(&v, &bridges);
        let (s, _) = determine_status(&mut v, &p, &bridges, &latch, 0);
        assert_ne!(s, VesselStatus::StallbackaWaiting);
    }

    #[test]
    fn test_waiting_blocked_at_just_passed_target() {
        let (mut v, bridges) = vessel_with_target(-0.002, 0.1);
        let mut latch = PassageLatch::new();
        v.speed_below_threshold_since = Some(0);
        v.last_passed_bridge = Some(BridgeId::Stridsbergsbron);
        // Outside the display window so rule 1 does not fire, but waiting at
        // the just-passed target must still be blocked
        v.last_passed_bridge_time = Some(0);
        latch.record("265000001", BridgeId::Stridsbergsbron, 0);
        let p = analyze_vessel_proximity(&v, &bridges);
        let (s, _) = determine_status(&mut v, &p, &bridges, &latch, 150_000);
        assert_ne!(s, VesselStatus::Waiting);
    }

    #[test]
    fn test_latch_reset_on_gps_jump() {
        let (mut v, _) = vessel_with_target(-0.00036, 2.0);
        v.under_bridge_latched = true;
        v.gps_jump_detected = true;
        reset_latches_if_needed(&mut v);
        assert!(!v.under_bridge_latched);
    }

    #[test]
    fn test_latch_reset_on_fresh_target_assignment() {
        // Latch carried over from a stale prior frame; a null -> non-null
        // target change clears it
        let (mut v, _) = vessel_with_target(-0.00036, 2.0);
        v.under_bridge_latched = true;
        v.last_target_for_hysteresis = None;
        reset_latches_if_needed(&mut v);
        assert!(!v.under_bridge_latched);
        assert_eq!(v.last_target_for_hysteresis, Some(BridgeId::Stridsbergsbron));
    }

    #[test]
    fn test_latch_reset_on_target_cleared() {
        let (mut v, _) = vessel_with_target(-0.00036, 2.0);
        v.under_bridge_latched = true;
        v.last_target_for_hysteresis = v.target_bridge;
        v.target_bridge = None;
        reset_latches_if_needed(&mut v);
        assert!(!v.under_bridge_latched);
        assert_eq!(v.last_target_for_hysteresis, None);
    }

    #[test]
    fn test_latch_kept_when_nothing_changed() {
        let (mut v, _) = vessel_with_target(-0.00036, 2.0);
        v.under_bridge_latched = true;
        v.last_target_for_hysteresis = v.target_bridge;
        v.last_current_for_hysteresis = None;
        reset_latches_if_needed(&mut v);
        assert!(v.under_bridge_latched);
    }

    #[test]
    fn test_latch_reset_on_current_bridge_change() {
        let (mut v, _) = vessel_with_target(-0.00036, 2.0);
        v.under_bridge_latched = true;
        v.last_current_for_hysteresis = Some(BridgeId::Klaffbron);
        v.current_bridge = Some(BridgeId::Jarnvagsbron);
        reset_latches_if_needed(&mut v);
        assert!(!v.under_bridge_latched);
        assert_eq!(v.last_current_for_hysteresis, Some(BridgeId::Jarnvagsbron));
    }

    fn input<'a>(proposed: VesselStatus, previous: VesselStatus) -> StabilizeInput<'a> {
        StabilizeInput {
            mmsi: "265000001",
            proposed,
            previous,
            gps_jump: false,
            uncertain: false,
            sog: 3.0,
            nearest_distance: Some(200.0),
        }
    }

    #[test]
    fn test_stabilizer_accepts_clean_change() {
        let mut st = StatusStabilizer::new();
        let out = st.stabilize(input(VesselStatus::Approaching, VesselStatus::EnRoute), 0, 0);
        assert_eq!(out.status, VesselStatus::Approaching);
        assert!(!out.stabilized);
    }

    #[test]
    fn test_stabilizer_holds_previous_on_gps_jump() {
        let mut st = StatusStabilizer::new();
        let mut inp = input(VesselStatus::Passed, VesselStatus::Waiting);
        inp.gps_jump = true;
        let out = st.stabilize(inp, 0, 0);
        assert_eq!(out.status, VesselStatus::Waiting);
        assert!(out.stabilized);
        assert_eq!(out.reason, "gps_jump_hold");

        // Still held shortly after, even if the proposal persists
        let out = st.stabilize(input(VesselStatus::Passed, VesselStatus::Waiting), 0, 10_000);
        assert_eq!(out.status, VesselStatus::Waiting);

        // Hold expires after 30 s
        let out = st.stabilize(input(VesselStatus::Passed, VesselStatus::Waiting), 0, 31_000);
        assert_eq!(out.status, VesselStatus::Passed);
    }

    #[test]
    fn test_stabilizer_coordination_extension() {
        let mut st = StatusStabilizer::new();
        let mut inp = input(VesselStatus::Passed, VesselStatus::Waiting);
        inp.gps_jump = true;
        let out = st.stabilize(inp, 30_000, 0);
        assert!(out.coordination_applied);
        // Held past the base 30 s thanks to the extension
        let out = st.stabilize(input(VesselStatus::Passed, VesselStatus::Waiting), 0, 45_000);
        assert_eq!(out.status, VesselStatus::Waiting);
        let out = st.stabilize(input(VesselStatus::Passed, VesselStatus::Waiting), 0, 61_000);
        assert_eq!(out.status, VesselStatus::Passed);
    }

    #[test]
    fn test_stabilizer_uncertain_needs_two_readings() {
        let mut st = StatusStabilizer::new();
        let mut inp = input(VesselStatus::Waiting, VesselStatus::Approaching);
        inp.uncertain = true;
        let out = st.stabilize(inp, 0, 0);
        assert_eq!(out.status, VesselStatus::Approaching);
        assert!(out.stabilized);

        let mut inp = input(VesselStatus::Waiting, VesselStatus::Approaching);
        inp.uncertain = true;
        let out = st.stabilize(inp, 0, 1_000);
        assert_eq!(out.status, VesselStatus::Waiting);
    }

    #[test]
    fn test_stabilizer_damps_flicker() {
        let mut st = StatusStabilizer::new();
        // A stable run of approaching, then a waiting/approaching reversal
        st.stabilize(input(VesselStatus::Approaching, VesselStatus::EnRoute), 0, 0);
        st.stabilize(input(VesselStatus::Approaching, VesselStatus::Approaching), 0, 1_000);
        st.stabilize(input(VesselStatus::Waiting, VesselStatus::Approaching), 0, 2_000);
        let out = st.stabilize(input(VesselStatus::Approaching, VesselStatus::Waiting), 0, 3_000);
        // Reversal detected; the most common recent status wins
        assert_eq!(out.status, VesselStatus::Approaching);
    }

    #[test]
    fn test_stabilizer_single_transition_not_flicker() {
        let mut st = StatusStabilizer::new();
        st.stabilize(input(VesselStatus::Approaching, VesselStatus::EnRoute), 0, 0);
        st.stabilize(input(VesselStatus::Approaching, VesselStatus::Approaching), 0, 1_000);
        let out = st.stabilize(input(VesselStatus::Waiting, VesselStatus::Approaching), 0, 2_000);
        assert_eq!(out.status, VesselStatus::Waiting);
        assert!(!out.stabilized);
    }

    #[test]
    fn test_confidence_multipliers() {
        let mut st = StatusStabilizer::new();
        let mut inp = input(VesselStatus::EnRoute, VesselStatus::EnRoute);
        inp.gps_jump = true;
        inp.sog = 0.2;
        inp.nearest_distance = Some(900.0);
        let out = st.stabilize(inp, 0, 0);
        // 1.0 * 0.3 * 0.8 * 0.9
        assert!((out.confidence - 0.216).abs() < 1e-9);
    }
}
