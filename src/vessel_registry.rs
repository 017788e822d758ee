use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::ais::{PositionReport, ShipStaticData};
use crate::bridges::{BridgeId, BridgeRegistry};
use crate::coordinator::SystemCoordinator;
use crate::current_bridge::update_current_bridge;
use crate::eta::calculate_progressive_eta;
use crate::events::{EventBus, TrackerEvent};
use crate::geometry::haversine_distance_m;
use crate::gps_analyzer::{analyze_movement, Kinematics, MovementAction, MovementAnalysis};
use crate::passage::{detect_bridge_passage, internal_grace_ms, PassageLatch, PassageSample};
use crate::proximity::{analyze_vessel_proximity, ProximityAnalysis, APPROACH_RADIUS_M};
use crate::status::{determine_status, reset_latches_if_needed, StabilizeInput, StatusStabilizer};
use crate::vessel::{
    sanitize_cog, sanitize_lat, sanitize_lon, sanitize_sog, Vessel, VesselSnapshot, VesselStatus,
    MINIMUM_MOVEMENT_M,
};

/// MMSIs carrying this marker bypass GPS jump detection (test hook).
const GPS_DETECTION_BYPASS_MARKER: &str = "265CONTROL";

// Target assignment eligibility, stratified by distance to the nearest bridge.
const FAR_ASSIGN_DISTANCE_M: f64 = 500.0;
const FAR_ASSIGN_MIN_SOG_KN: f64 = 0.7;
const MID_ASSIGN_MIN_SOG_KN: f64 = 0.1;
/// Minimum distance-made-good between two readings to count as approaching.
const MIN_APPROACH_DISTANCE_M: f64 = 5.0;
/// Two-readings check needs at least this much time between fixes.
const APPROACH_CHECK_MIN_ELAPSED_MS: i64 = 15_000;
/// A target change is blocked while still this close to the current target.
const TARGET_CHANGE_BLOCK_M: f64 = 200.0;

// Target bridge protection.
const PROTECTION_MAX_MS: i64 = 5 * 60 * 1000;
const PROTECTION_RECENT_PASSAGE_MS: i64 = 60_000;
const PROTECTION_MOVEMENT_M: f64 = 200.0;
const PROTECTION_MANEUVER_COG_DEG: f64 = 45.0;
const PROTECTION_MANEUVER_SOG_KN: f64 = 2.0;

// Intermediate passages defer to a target passage this recent.
const TARGET_PASSAGE_PRECEDENCE_MS: i64 = 60_000;

// Cleanup scheduling, zone-dependent.
const CLEANUP_NEAR_MS: i64 = 20 * 60 * 1000;
const CLEANUP_MID_MS: i64 = 10 * 60 * 1000;
const CLEANUP_FAR_MS: i64 = 2 * 60 * 1000;
const CLEANUP_MID_ZONE_M: f64 = 600.0;
const CLEANUP_SLOW_SOG_KN: f64 = 0.5;
const CLEANUP_RESCHEDULE_MS: i64 = 10 * 60 * 1000;
const STALE_STATIONARY_MS: i64 = 15 * 60 * 1000;
const STALE_MOVING_MS: i64 = 5 * 60 * 1000;

/// Reverse index membership radius.
const BRIDGE_INDEX_RADIUS_M: f64 = 500.0;

#[derive(Debug, Clone)]
pub struct ProtectionRecord {
    pub is_active: bool,
    #[allow(dead_code)]
    pub reason: &'static str,
    pub start_time: i64,
    pub target_bridge: BridgeId,
    #[allow(dead_code)]
    pub confidence: f64,
    pub gps_event_detected: bool,
    #[allow(dead_code)]
    pub close_to_target: bool,
    #[allow(dead_code)]
    pub maneuver_detected: bool,
    #[allow(dead_code)]
    pub distance_to_target: Option<f64>,
}

/// In-memory vessel registry: the single owner of all vessel records.
///
/// Everything that mutates a vessel goes through [`update_vessel`] /
/// [`remove_vessel`]; other components get [`VesselSnapshot`] copies.
pub struct VesselRegistry {
    vessels: HashMap<String, Vessel>,
    bridges: BridgeRegistry,
    bridge_index: HashMap<BridgeId, HashSet<String>>,
    protections: HashMap<String, ProtectionRecord>,
    latch: PassageLatch,
    stabilizer: StatusStabilizer,
    events: EventBus,
}

impl VesselRegistry {
    pub fn new(bridges: BridgeRegistry, events: EventBus) -> Self {
        Self {
            vessels: HashMap::new(),
            bridges,
            bridge_index: HashMap::new(),
            protections: HashMap::new(),
            latch: PassageLatch::new(),
            stabilizer: StatusStabilizer::new(),
            events,
        }
    }

    pub fn bridges(&self) -> &BridgeRegistry {
        &self.bridges
    }

    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    pub fn vessel(&self, mmsi: &str) -> Option<&Vessel> {
        self.vessels.get(mmsi)
    }

    /// Active protection record for a vessel, if any - for diagnostics
    #[allow(dead_code)]
    pub fn protection(&self, mmsi: &str) -> Option<&ProtectionRecord> {
        self.protections.get(mmsi)
    }

    pub fn snapshots(&self) -> Vec<VesselSnapshot> {
        self.vessels.values().map(|v| v.snapshot()).collect()
    }

    #[allow(dead_code)]
    pub fn vessels_near_bridge(&self, bridge: BridgeId) -> Vec<String> {
        self.bridge_index
            .get(&bridge)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Merge a static-data record into an already known vessel.
    pub fn update_static(&mut self, rec: &ShipStaticData, now: i64) {
        if let Some(vessel) = self.vessels.get_mut(&rec.mmsi) {
            if rec.name.is_some() {
                vessel.name = rec.name.clone();
            }
            vessel.timestamp = now;
        }
    }

    /// The central write path: apply one position report to a vessel record.
    pub fn update_vessel(
        &mut self,
        rec: &PositionReport,
        coordinator: &mut SystemCoordinator,
        now: i64,
    ) -> Option<VesselSnapshot> {
        if rec.mmsi.is_empty() {
            return None;
        }

        let is_new = !self.vessels.contains_key(&rec.mmsi);
        let mut vessel = self
            .vessels
            .remove(&rec.mmsi)
            .unwrap_or_else(|| Vessel::new(rec.mmsi.clone(), now));

        // 1. Coordinate sanitization. Invalid values never overwrite a
        // previously valid position.
        let lat = sanitize_lat(rec.lat);
        let lon = sanitize_lon(rec.lon);
        let sog = sanitize_sog(rec.sog);
        let cog = sanitize_cog(rec.cog);
        let new_pos = match (lat, lon) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        };

        let prev_pos = vessel.position();
        let prev_kin = Kinematics {
            sog: vessel.sog,
            cog: vessel.cog.unwrap_or(0.0),
            ts: vessel.timestamp,
        };
        let prev_cog = vessel.cog;
        let prev_sog = vessel.sog;
        let prev_status = vessel.status;

        // 2. GPS jump detection
        let analysis: Option<MovementAnalysis> =
            if rec.mmsi.contains(GPS_DETECTION_BYPASS_MARKER) {
                None
            } else {
                new_pos.map(|np| {
                    analyze_movement(
                        np,
                        prev_pos,
                        Kinematics { sog, cog: cog.unwrap_or(0.0), ts: now },
                        prev_pos.map(|_| prev_kin),
                    )
                })
            };
        let gps_jump = analysis.as_ref().map(|a| a.is_gps_jump).unwrap_or(false);
        let uncertain = analysis
            .as_ref()
            .map(|a| a.action == MovementAction::AcceptWithCaution)
            .unwrap_or(false);
        if let Some(a) = &analysis {
            if a.is_gps_jump || a.action == MovementAction::AcceptWithCaution {
                debug!(
                    mmsi = %rec.mmsi,
                    reason = a.reason,
                    distance = a.movement_distance,
                    legitimate = a.is_legitimate_movement,
                    confidence = ?a.confidence,
                    cog_change = a.analysis.cog_change,
                    bearing_consistency = a.analysis.bearing_consistency,
                    speed_consistency = a.analysis.speed_consistency,
                    sog_change = a.analysis.sog_change,
                    "suspicious movement"
                );
            }
        }
        vessel.gps_jump_detected = gps_jump;
        vessel.position_uncertain = uncertain;
        vessel.position_analysis = analysis.clone();

        // 3. System coordination
        if let Some(a) = &analysis {
            coordinator.coordinate_position_update(&rec.mmsi, a, now);
        }

        // 4. Carry-forward construction: refresh kinematics and timers,
        // preserve status, targets, and passage history.
        if let Some((la, lo)) = new_pos {
            if let Some((pla, plo)) = prev_pos {
                let moved = haversine_distance_m(pla, plo, la, lo);
                if moved > MINIMUM_MOVEMENT_M {
                    vessel.last_position_change = now;
                }
                vessel.last_position = prev_pos;
            } else {
                vessel.last_position_change = now;
            }
            vessel.lat = Some(la);
            vessel.lon = Some(lo);
        }
        vessel.sog = sog;
        vessel.cog = cog;
        if rec.name.is_some() {
            vessel.name = rec.name.clone();
        }
        vessel.timestamp = now;
        vessel.push_speed_sample(sog, now);

        let proximity = analyze_vessel_proximity(&vessel, &self.bridges);

        // 5-8. Target bridge assignment, transition, and protection
        self.handle_target_bridge(
            &mut vessel,
            prev_pos,
            prev_cog,
            prev_sog,
            prev_kin.ts,
            &proximity,
            now,
        );

        // 9. Intermediate bridge passages
        if !gps_jump {
            self.detect_intermediate_passages(&mut vessel, prev_pos, prev_cog, now);
        }

        // Current bridge assignment with hysteresis
        update_current_bridge(&mut vessel, &proximity);

        // Status ladder and stabilization
        reset_latches_if_needed(&mut vessel);
        let (proposed, status_reason) =
            determine_status(&mut vessel, &proximity, &self.bridges, &self.latch, now);
        let stabilized = self.stabilizer.stabilize(
            StabilizeInput {
                mmsi: &vessel.mmsi,
                proposed,
                previous: prev_status,
                gps_jump,
                uncertain,
                sog,
                nearest_distance: proximity.nearest_distance,
            },
            coordinator.stabilization_extension_ms(&vessel.mmsi),
            now,
        );
        vessel.status = stabilized.status;
        vessel.is_waiting = vessel.status == VesselStatus::Waiting;
        vessel.is_approaching = vessel.status == VesselStatus::Approaching;
        if vessel.status != VesselStatus::Waiting {
            vessel.wait_since = None;
        }

        // Progressive ETA
        vessel.eta_minutes = calculate_progressive_eta(&vessel, &proximity, &self.bridges);
        if vessel.eta_minutes.is_none()
            && vessel.target_bridge.is_some()
            && vessel.has_valid_position()
        {
            self.events.emit(TrackerEvent::EtaCalculationError { mmsi: vessel.mmsi.clone() });
        }

        // Cleanup scheduling
        vessel.cleanup_deadline = now + cleanup_timeout_ms(proximity.nearest_distance, sog);

        // 10. Reverse index
        self.update_bridge_index(&vessel.mmsi, &proximity);

        // 11. Events
        let snapshot = vessel.snapshot();
        if vessel.status != prev_status {
            debug!(
                mmsi = %vessel.mmsi,
                old = prev_status.as_str(),
                new = vessel.status.as_str(),
                reason = status_reason,
                stabilized = stabilized.stabilized,
                stabilizer = stabilized.reason,
                confidence = stabilized.confidence,
                coordination = stabilized.coordination_applied,
                "vessel status changed"
            );
            self.events.emit(TrackerEvent::StatusChanged {
                vessel: snapshot.clone(),
                old_status: prev_status,
                new_status: vessel.status,
                reason: status_reason,
                stabilized: stabilized.stabilized,
            });
        }
        self.vessels.insert(rec.mmsi.clone(), vessel);
        if is_new {
            info!(mmsi = %rec.mmsi, "vessel entered tracking");
            self.events.emit(TrackerEvent::VesselEntered { vessel: snapshot.clone() });
        } else {
            self.events.emit(TrackerEvent::VesselUpdated { vessel: snapshot.clone() });
        }
        Some(snapshot)
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_target_bridge(
        &mut self,
        vessel: &mut Vessel,
        prev_pos: Option<(f64, f64)>,
        prev_cog: Option<f64>,
        prev_sog: f64,
        prev_ts: i64,
        proximity: &ProximityAnalysis,
        now: i64,
    ) {
        let protected_target = self
            .protections
            .get(&vessel.mmsi)
            .filter(|p| p.is_active && now - p.start_time <= PROTECTION_MAX_MS)
            .map(|p| p.target_bridge);

        // 7. Target passage and transition
        let mut passage_advanced = false;
        if let Some(target) = vessel.target_bridge {
            let mut passage_now = false;
            if !vessel.gps_jump_detected
                && !self.latch.is_passage_blocked(&vessel.mmsi, target, vessel.sog, now)
            {
                if let (Some(curr), Some(prev)) = (vessel.position(), prev_pos) {
                    let bridge = self.bridges.get_bridge(target);
                    let detection = detect_bridge_passage(
                        PassageSample { lat: curr.0, lon: curr.1, cog: vessel.cog },
                        PassageSample { lat: prev.0, lon: prev.1, cog: prev_cog },
                        bridge,
                    );
                    if detection.passed {
                        info!(
                            mmsi = %vessel.mmsi,
                            bridge = bridge.name,
                            method = detection.method,
                            confidence = detection.confidence,
                            prev_distance = detection.prev_distance,
                            curr_distance = detection.curr_distance,
                            "target bridge passage detected"
                        );
                        self.latch.record(&vessel.mmsi, target, now);
                        vessel.last_passed_bridge = Some(target);
                        vessel.last_passed_bridge_time = Some(now);
                        if !vessel.passed_bridges.contains(&target) {
                            vessel.passed_bridges.push(target);
                        }
                        passage_now = true;
                    }
                }
            }

            // Advance to the next target once the vessel is clear of the
            // 200 m block around the span, or its grace window has elapsed.
            if passage_now || (vessel.pending_target_advance && vessel.last_passed_bridge == Some(target)) {
                let dist = proximity.distance_to(target);
                let beyond_block = dist.map(|d| d > TARGET_CHANGE_BLOCK_M).unwrap_or(true);
                let grace_elapsed = !passage_now
                    && vessel
                        .last_passed_bridge_time
                        .map(|t| now - t >= internal_grace_ms(vessel.sog))
                        .unwrap_or(true);
                if beyond_block || grace_elapsed {
                    let northbound = is_heading_northbound(vessel);
                    let next = self.bridges.next_target_along(target, northbound);
                    debug!(
                        mmsi = %vessel.mmsi,
                        from = target.name(),
                        to = next.map(|b| b.name()).unwrap_or("none"),
                        "advancing target bridge after passage"
                    );
                    vessel.target_bridge = next;
                    vessel.pending_target_advance = false;
                    self.protections.remove(&vessel.mmsi);
                } else {
                    vessel.pending_target_advance = true;
                }
                passage_advanced = true;
            }
        }

        // 5. Keep-or-drop for an existing target: two-readings approach check.
        // Skipped on suspect positions so a spike cannot strip the target.
        if !passage_advanced && !vessel.gps_jump_detected && !vessel.position_uncertain {
            if let Some(target) = vessel.target_bridge {
                if let (Some(curr), Some(prev)) = (vessel.position(), prev_pos) {
                    let b = self.bridges.get_bridge(target);
                    let prev_d = haversine_distance_m(prev.0, prev.1, b.lat, b.lon);
                    let curr_d = haversine_distance_m(curr.0, curr.1, b.lat, b.lon);
                    let made_good = prev_d - curr_d;
                    if curr_d > APPROACH_RADIUS_M
                        && now - prev_ts >= APPROACH_CHECK_MIN_ELAPSED_MS
                        && made_good < MIN_APPROACH_DISTANCE_M
                    {
                        debug!(
                            mmsi = %vessel.mmsi,
                            bridge = b.name,
                            made_good,
                            "dropping target: vessel is not approaching"
                        );
                        vessel.target_bridge = None;
                        vessel.pending_target_advance = false;
                    }
                }
            }
        }

        // 6. Fresh assignment when eligible and unassigned
        if vessel.target_bridge.is_none() && !passage_advanced {
            if self.target_assignment_eligible(vessel, proximity) {
                vessel.target_bridge = self.compute_target(vessel);
                if let Some(t) = vessel.target_bridge {
                    vessel.pending_target_advance = false;
                    debug!(mmsi = %vessel.mmsi, target = t.name(), "target bridge assigned");
                }
            }
        }

        // 8a. Protection enforcement: a protected target can only change
        // through a passage of the protected bridge itself.
        if let Some(pt) = protected_target {
            if !passage_advanced && vessel.target_bridge != Some(pt) {
                debug!(
                    mmsi = %vessel.mmsi,
                    restored = pt.name(),
                    "target bridge protection rejected a change"
                );
                vessel.target_bridge = Some(pt);
            }
        }

        if let Some(target) = vessel.target_bridge {
            if proximity.distance_to(target).map(|d| d <= APPROACH_RADIUS_M).unwrap_or(false) {
                vessel.was_close_to_target = Some(target);
            }
        }

        // 8b. Protection evaluation for the (possibly new) target
        self.evaluate_protection(vessel, prev_cog, prev_sog, proximity, now);
    }

    fn evaluate_protection(
        &mut self,
        vessel: &Vessel,
        prev_cog: Option<f64>,
        prev_sog: f64,
        proximity: &ProximityAnalysis,
        now: i64,
    ) {
        // Expire a protection past its hard cap
        if let Some(p) = self.protections.get(&vessel.mmsi) {
            if now - p.start_time > PROTECTION_MAX_MS {
                self.protections.remove(&vessel.mmsi);
            }
        }

        let Some(target) = vessel.target_bridge else {
            return;
        };
        if self.protections.get(&vessel.mmsi).map(|p| p.is_active).unwrap_or(false) {
            return;
        }

        let distance_to_target = proximity.distance_to(target);
        let close_to_target = distance_to_target.map(|d| d <= APPROACH_RADIUS_M).unwrap_or(false);

        let movement = vessel
            .position_analysis
            .as_ref()
            .map(|a| a.movement_distance)
            .unwrap_or(0.0);
        let gps_event = vessel.gps_jump_detected
            || vessel.position_uncertain
            || movement > PROTECTION_MOVEMENT_M;

        let cog_swing = match (vessel.cog, prev_cog) {
            (Some(c), Some(p)) => crate::geometry::angle_diff(c, p).abs(),
            _ => 0.0,
        };
        let maneuver = cog_swing > PROTECTION_MANEUVER_COG_DEG
            || (vessel.sog - prev_sog).abs() > PROTECTION_MANEUVER_SOG_KN;

        let recent_passage = vessel.recently_passed(now, PROTECTION_RECENT_PASSAGE_MS);

        let conditions = [close_to_target, gps_event, maneuver, recent_passage];
        let met = conditions.iter().filter(|c| **c).count();
        if met == 0 {
            return;
        }

        let reason = if gps_event {
            "gps_event"
        } else if close_to_target {
            "close_to_target"
        } else if maneuver {
            "maneuver"
        } else {
            "recent_passage"
        };

        debug!(
            mmsi = %vessel.mmsi,
            target = target.name(),
            reason,
            confidence = met as f64 / conditions.len() as f64,
            "target bridge protection activated"
        );
        self.protections.insert(
            vessel.mmsi.clone(),
            ProtectionRecord {
                is_active: true,
                reason,
                start_time: now,
                target_bridge: target,
                confidence: met as f64 / conditions.len() as f64,
                gps_event_detected: gps_event,
                close_to_target,
                maneuver_detected: maneuver,
                distance_to_target,
            },
        );
    }

    fn detect_intermediate_passages(
        &mut self,
        vessel: &mut Vessel,
        prev_pos: Option<(f64, f64)>,
        prev_cog: Option<f64>,
        now: i64,
    ) {
        let (curr, prev) = match (vessel.position(), prev_pos) {
            (Some(c), Some(p)) => (c, p),
            _ => return,
        };

        // Target passages outrank intermediate ones for display purposes.
        let target_pass_recent = vessel
            .last_passed_bridge
            .map(|b| self.bridges.get_bridge(b).is_target)
            .unwrap_or(false)
            && vessel.recently_passed(now, TARGET_PASSAGE_PRECEDENCE_MS);

        for id in self.bridges.all_bridge_ids() {
            if Some(id) == vessel.target_bridge || self.bridges.get_bridge(id).is_target {
                continue;
            }
            if self.latch.is_passage_blocked(&vessel.mmsi, id, vessel.sog, now) {
                continue;
            }
            let bridge = self.bridges.get_bridge(id);
            let detection = detect_bridge_passage(
                PassageSample { lat: curr.0, lon: curr.1, cog: vessel.cog },
                PassageSample { lat: prev.0, lon: prev.1, cog: prev_cog },
                bridge,
            );
            if detection.passed {
                info!(
                    mmsi = %vessel.mmsi,
                    bridge = bridge.name,
                    method = detection.method,
                    "intermediate bridge passage detected"
                );
                self.latch.record(&vessel.mmsi, id, now);
                if !vessel.passed_bridges.contains(&id) {
                    vessel.passed_bridges.push(id);
                }
                if !target_pass_recent {
                    vessel.last_passed_bridge = Some(id);
                    vessel.last_passed_bridge_time = Some(now);
                }
            }
        }
    }

    fn target_assignment_eligible(&self, vessel: &Vessel, proximity: &ProximityAnalysis) -> bool {
        if !vessel.has_valid_position() {
            return false;
        }
        let nearest = proximity.nearest_distance.unwrap_or(f64::INFINITY);
        if nearest > FAR_ASSIGN_DISTANCE_M {
            vessel.sog > FAR_ASSIGN_MIN_SOG_KN && vessel.cog.is_some()
        } else if nearest > APPROACH_RADIUS_M {
            vessel.sog > MID_ASSIGN_MIN_SOG_KN
        } else {
            if vessel.cog.is_none() || vessel.cog == Some(0.0) {
                warn!(mmsi = %vessel.mmsi, "assigning target with missing or zero COG near bridge");
            }
            true
        }
    }

    fn compute_target(&self, vessel: &Vessel) -> Option<BridgeId> {
        let cog = vessel.cog?;
        let lat = vessel.lat?;
        let klaffbron_lat = self.bridges.get_bridge(BridgeId::Klaffbron).lat;
        let stridsbergsbron_lat = self.bridges.get_bridge(BridgeId::Stridsbergsbron).lat;

        if cog >= 315.0 || cog <= 45.0 {
            // Northbound
            if lat > stridsbergsbron_lat {
                None
            } else if lat < klaffbron_lat {
                Some(BridgeId::Klaffbron)
            } else {
                Some(BridgeId::Stridsbergsbron)
            }
        } else if (135.0..=225.0).contains(&cog) {
            // Southbound
            if lat < klaffbron_lat {
                None
            } else if lat > stridsbergsbron_lat {
                Some(BridgeId::Stridsbergsbron)
            } else {
                Some(BridgeId::Klaffbron)
            }
        } else {
            None
        }
    }

    fn update_bridge_index(&mut self, mmsi: &str, proximity: &ProximityAnalysis) {
        for set in self.bridge_index.values_mut() {
            set.remove(mmsi);
        }
        if let (Some(nearest), Some(d)) = (proximity.nearest_bridge, proximity.nearest_distance) {
            if d <= BRIDGE_INDEX_RADIUS_M {
                self.bridge_index
                    .entry(nearest)
                    .or_default()
                    .insert(mmsi.to_string());
            }
        }
    }

    /// Remove a vessel, honoring the protection zone for timeout removals.
    pub fn remove_vessel(
        &mut self,
        mmsi: &str,
        reason: &'static str,
        coordinator: &mut SystemCoordinator,
        now: i64,
    ) -> bool {
        let Some(vessel) = self.vessels.get(mmsi) else {
            // A late timer for a vessel that is already gone is a no-op.
            return false;
        };

        if reason == "timeout" {
            let proximity = analyze_vessel_proximity(vessel, &self.bridges);
            let stale_threshold = if vessel.sog <= CLEANUP_SLOW_SOG_KN {
                STALE_STATIONARY_MS
            } else {
                STALE_MOVING_MS
            };
            let fresh = now - vessel.last_position_change < stale_threshold;
            if proximity.within_protection_zone && fresh {
                debug!(mmsi, "vessel in protection zone, rescheduling cleanup");
                if let Some(v) = self.vessels.get_mut(mmsi) {
                    v.cleanup_deadline = now + CLEANUP_RESCHEDULE_MS;
                }
                return false;
            }
        }

        self.vessels.remove(mmsi);
        self.latch.clear_vessel(mmsi);
        self.stabilizer.clear_vessel(mmsi);
        self.protections.remove(mmsi);
        coordinator.clear_vessel(mmsi);
        for set in self.bridge_index.values_mut() {
            set.remove(mmsi);
        }
        info!(mmsi, reason, "vessel removed");
        self.events.emit(TrackerEvent::VesselRemoved { mmsi: mmsi.to_string(), reason });
        true
    }

    /// Periodic sweep for vessels whose cleanup deadline has elapsed.
    /// Returns the MMSIs that were actually removed.
    pub fn sweep(&mut self, coordinator: &mut SystemCoordinator, now: i64) -> Vec<String> {
        let due: Vec<String> = self
            .vessels
            .iter()
            .filter(|(_, v)| now >= v.cleanup_deadline)
            .map(|(m, _)| m.clone())
            .collect();
        let mut removed = Vec::new();
        for mmsi in due {
            if self.remove_vessel(&mmsi, "timeout", coordinator, now) {
                removed.push(mmsi);
            }
        }
        coordinator.prune_stale(now);
        removed
    }
}

/// Zone-dependent cleanup timeout: vessels parked at a bridge are kept much
/// longer than vessels far out on the river.
fn cleanup_timeout_ms(nearest_distance: Option<f64>, sog: f64) -> i64 {
    match nearest_distance {
        Some(d) if d <= APPROACH_RADIUS_M => CLEANUP_NEAR_MS,
        Some(d) if d <= CLEANUP_MID_ZONE_M => {
            if sog <= CLEANUP_SLOW_SOG_KN {
                CLEANUP_NEAR_MS
            } else {
                CLEANUP_MID_MS
            }
        }
        _ => CLEANUP_FAR_MS,
    }
}

fn is_heading_northbound(vessel: &Vessel) -> bool {
    if let Some(cog) = vessel.cog {
        return !(90.0..270.0).contains(&cog);
    }
    // Without a course, fall back to the latitude trend of the last fix.
    match (vessel.last_position, vessel.position()) {
        (Some(prev), Some(curr)) => curr.0 >= prev.0,
        _ => true,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::initial_bearing;

    const MMSI: &str = "265001000";

    fn registry() -> (VesselRegistry, SystemCoordinator) {
        (
            VesselRegistry::new(BridgeRegistry::new(), EventBus::new()),
            SystemCoordinator::new(),
        )
    }

    fn report(mmsi: &str, lat: f64, lon: f64, sog: f64, cog: f64) -> PositionReport {
        PositionReport {
            mmsi: mmsi.to_string(),
            name: None,
            lat,
            lon,
            sog,
            cog,
            true_heading: None,
            nav_status: None,
            ts_utc: None,
        }
    }

    #[test]
    fn test_first_update_creates_vessel() {
        let (mut reg, mut coord) = registry();
        let snap = reg.update_vessel(&report(MMSI, 58.3050, 12.2750, 5.0, 20.0), &mut coord, 0);
        assert!(snap.is_some());
        assert_eq!(reg.len(), 1);
        assert!(reg.vessel(MMSI).unwrap().has_valid_position());
    }

    #[test]
    fn test_invalid_coordinates_never_overwrite_valid_ones() {
        let (mut reg, mut coord) = registry();
        reg.update_vessel(&report(MMSI, 58.3050, 12.2750, 5.0, 20.0), &mut coord, 0);
        reg.update_vessel(&report(MMSI, f64::NAN, 200.0, 4.0, 25.0), &mut coord, 30_000);
        let v = reg.vessel(MMSI).unwrap();
        assert_eq!(v.lat, Some(58.3050));
        assert_eq!(v.lon, Some(12.2750));
        // Kinematics still refresh
        assert_eq!(v.sog, 4.0);
    }

    #[test]
    fn test_empty_mmsi_rejected() {
        let (mut reg, mut coord) = registry();
        assert!(reg.update_vessel(&report("", 58.3050, 12.2750, 5.0, 20.0), &mut coord, 0).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_control_mmsi_bypasses_jump_detection() {
        let (mut reg, mut coord) = registry();
        let mmsi = "265CONTROL7";
        reg.update_vessel(&report(mmsi, 58.3050, 12.2750, 3.0, 0.0), &mut coord, 0);
        // Teleport 1.3 km sideways: would normally be flagged
        reg.update_vessel(&report(mmsi, 58.3050, 12.2970, 3.0, 0.0), &mut coord, 30_000);
        let v = reg.vessel(mmsi).unwrap();
        assert!(!v.gps_jump_detected);
        assert!(v.position_analysis.is_none());
    }

    #[test]
    fn test_target_assigned_northbound_south_of_klaffbron() {
        let (mut reg, mut coord) = registry();
        reg.update_vessel(&report(MMSI, 58.3050, 12.2750, 5.0, 20.0), &mut coord, 0);
        assert_eq!(reg.vessel(MMSI).unwrap().target_bridge, Some(BridgeId::Klaffbron));
    }

    #[test]
    fn test_target_assigned_southbound_north_of_stridsbergsbron() {
        let (mut reg, mut coord) = registry();
        reg.update_vessel(&report(MMSI, 58.3300, 12.3000, 5.0, 200.0), &mut coord, 0);
        assert_eq!(reg.vessel(MMSI).unwrap().target_bridge, Some(BridgeId::Stridsbergsbron));
    }

    #[test]
    fn test_target_between_bridges_northbound() {
        let (mut reg, mut coord) = registry();
        // Between Klaffbron and Stridsbergsbron, heading north
        reg.update_vessel(&report(MMSI, 58.3150, 12.2875, 4.0, 20.0), &mut coord, 0);
        assert_eq!(reg.vessel(MMSI).unwrap().target_bridge, Some(BridgeId::Stridsbergsbron));
    }

    #[test]
    fn test_northbound_north_of_stridsbergsbron_no_target() {
        let (mut reg, mut coord) = registry();
        reg.update_vessel(&report(MMSI, 58.3300, 12.3000, 5.0, 20.0), &mut coord, 0);
        assert_eq!(reg.vessel(MMSI).unwrap().target_bridge, None);
    }

    #[test]
    fn test_anchored_far_vessel_never_gets_target() {
        // Scenario: ~860 m from the nearest bridge, 0.5 kn, stable course
        let (mut reg, mut coord) = registry();
        for i in 0..10 {
            reg.update_vessel(
                &report(MMSI, 58.2920, 12.2700, 0.5, 15.0),
                &mut coord,
                i * 30_000,
            );
        }
        assert_eq!(reg.vessel(MMSI).unwrap().target_bridge, None);
    }

    #[test]
    fn test_crossing_vessel_ineligible_course_gets_no_target() {
        let (mut reg, mut coord) = registry();
        // Heading due east: neither northbound nor southbound
        reg.update_vessel(&report(MMSI, 58.3050, 12.2750, 5.0, 90.0), &mut coord, 0);
        assert_eq!(reg.vessel(MMSI).unwrap().target_bridge, None);
    }

    fn canal_path() -> Vec<(f64, f64)> {
        let waypoints = [
            (58.3050, 12.2750),
            (58.3118, 12.2845), // Klaffbron
            (58.3168, 12.2890), // Järnvägsbron
            (58.3203, 12.2917), // Stridsbergsbron
            (58.3260, 12.2960),
        ];
        let steps = [12usize, 8, 6, 9];
        let mut pts = vec![waypoints[0]];
        for (i, &n) in steps.iter().enumerate() {
            let (a, b) = (waypoints[i], waypoints[i + 1]);
            for k in 1..=n {
                let f = k as f64 / n as f64;
                pts.push((a.0 + (b.0 - a.0) * f, a.1 + (b.1 - a.1) * f));
            }
        }
        pts
    }

    #[test]
    fn test_scenario_northbound_transit() {
        let (mut reg, mut coord) = registry();
        let path = canal_path();

        let mut seen_targets: Vec<Option<BridgeId>> = Vec::new();
        for (i, window) in path.windows(2).enumerate() {
            let (lat, lon) = window[1];
            let cog = initial_bearing(window[0].0, window[0].1, lat, lon);
            let now = (i as i64 + 1) * 30_000;
            reg.update_vessel(&report(MMSI, lat, lon, 5.0, cog), &mut coord, now);
            let t = reg.vessel(MMSI).unwrap().target_bridge;
            if seen_targets.last() != Some(&t) {
                seen_targets.push(t);
            }
        }

        // Target progression: Klaffbron -> Stridsbergsbron -> none
        assert_eq!(
            seen_targets,
            vec![Some(BridgeId::Klaffbron), Some(BridgeId::Stridsbergsbron), None]
        );

        let v = reg.vessel(MMSI).unwrap();
        let passed = &v.passed_bridges;
        let klaff_idx = passed.iter().position(|b| *b == BridgeId::Klaffbron);
        let strids_idx = passed.iter().position(|b| *b == BridgeId::Stridsbergsbron);
        assert!(klaff_idx.is_some(), "Klaffbron must be recorded as passed");
        assert!(strids_idx.is_some(), "Stridsbergsbron must be recorded as passed");
        assert!(klaff_idx < strids_idx);
        let target_passes = passed
            .iter()
            .filter(|b| reg.bridges().get_bridge(**b).is_target)
            .count();
        assert_eq!(target_passes, 2);
    }

    #[test]
    fn test_scenario_gps_spike_near_target() {
        let (mut reg, mut coord) = registry();
        // ~400 m south of Klaffbron, heading north at 3 kn
        let base_lat = 58.3118 - 0.0036;
        let lon = 12.2845;
        reg.update_vessel(&report(MMSI, base_lat, lon, 3.0, 0.0), &mut coord, 0);
        reg.update_vessel(&report(MMSI, base_lat + 0.0004, lon, 3.0, 0.0), &mut coord, 30_000);
        assert_eq!(reg.vessel(MMSI).unwrap().target_bridge, Some(BridgeId::Klaffbron));
        let status_before = reg.vessel(MMSI).unwrap().status;

        // 750 m lateral jump
        reg.update_vessel(
            &report(MMSI, base_lat + 0.0004, lon + 0.0131, 3.0, 0.0),
            &mut coord,
            60_000,
        );
        let v = reg.vessel(MMSI).unwrap();
        assert!(v.gps_jump_detected);
        assert_eq!(v.target_bridge, Some(BridgeId::Klaffbron));
        assert_ne!(v.status, VesselStatus::Passed);
        assert_eq!(v.status, status_before, "status must be held through the jump");

        let protection = reg.protection(MMSI).expect("protection should be active");
        assert!(protection.is_active);
        assert!(protection.gps_event_detected);
        assert_eq!(protection.target_bridge, BridgeId::Klaffbron);

        // Bridge text is debounced for at least 5 s after the jump
        let debounce = coord.should_debounce_bridge_text(61_000);
        assert!(debounce.should_debounce);
        assert!(debounce.remaining_ms >= 5_000);

        // Jump returns to the true track: target still intact
        reg.update_vessel(&report(MMSI, base_lat + 0.0008, lon, 3.0, 0.0), &mut coord, 90_000);
        assert_eq!(reg.vessel(MMSI).unwrap().target_bridge, Some(BridgeId::Klaffbron));
        assert_ne!(reg.vessel(MMSI).unwrap().status, VesselStatus::Passed);
    }

    #[test]
    fn test_protection_expires_after_cap() {
        let (mut reg, mut coord) = registry();
        let base_lat = 58.3118 - 0.0036;
        let lon = 12.2845;
        reg.update_vessel(&report(MMSI, base_lat, lon, 3.0, 0.0), &mut coord, 0);
        reg.update_vessel(&report(MMSI, base_lat + 0.0004, lon, 3.0, 0.0), &mut coord, 30_000);
        reg.update_vessel(
            &report(MMSI, base_lat + 0.0004, lon + 0.0131, 3.0, 0.0),
            &mut coord,
            60_000,
        );
        assert!(reg.protection(MMSI).is_some());
        let start = reg.protection(MMSI).unwrap().start_time;

        // Six minutes later, a calm update expires the protection record
        reg.update_vessel(
            &report(MMSI, base_lat + 0.0012, lon, 3.0, 0.0),
            &mut coord,
            start + 6 * 60 * 1000,
        );
        let p = reg.protection(MMSI);
        assert!(p.is_none() || p.unwrap().start_time != start);
    }

    #[test]
    fn test_cleanup_timeout_zones() {
        assert_eq!(cleanup_timeout_ms(Some(100.0), 3.0), CLEANUP_NEAR_MS);
        assert_eq!(cleanup_timeout_ms(Some(450.0), 3.0), CLEANUP_MID_MS);
        // Slow vessels in the mid zone get the long timeout
        assert_eq!(cleanup_timeout_ms(Some(450.0), 0.2), CLEANUP_NEAR_MS);
        assert_eq!(cleanup_timeout_ms(Some(900.0), 3.0), CLEANUP_FAR_MS);
        assert_eq!(cleanup_timeout_ms(None, 3.0), CLEANUP_FAR_MS);
    }

    #[test]
    fn test_timeout_removal_rescheduled_in_protection_zone() {
        let (mut reg, mut coord) = registry();
        // 150 m south of Klaffbron
        reg.update_vessel(&report(MMSI, 58.3118 - 0.00135, 12.2845, 0.1, 0.0), &mut coord, 0);
        let removed = reg.remove_vessel(MMSI, "timeout", &mut coord, 60_000);
        assert!(!removed);
        let v = reg.vessel(MMSI).unwrap();
        assert_eq!(v.cleanup_deadline, 60_000 + CLEANUP_RESCHEDULE_MS);
    }

    #[test]
    fn test_shutdown_removal_ignores_protection_zone() {
        let (mut reg, mut coord) = registry();
        reg.update_vessel(&report(MMSI, 58.3118 - 0.00135, 12.2845, 0.1, 0.0), &mut coord, 0);
        assert!(reg.remove_vessel(MMSI, "shutdown", &mut coord, 60_000));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_remove_unknown_vessel_is_noop() {
        let (mut reg, mut coord) = registry();
        assert!(!reg.remove_vessel("999999999", "timeout", &mut coord, 0));
    }

    #[test]
    fn test_sweep_removes_expired_far_vessel() {
        let (mut reg, mut coord) = registry();
        // Far from all bridges: 2 minute timeout
        reg.update_vessel(&report(MMSI, 58.2920, 12.2700, 3.0, 15.0), &mut coord, 0);
        assert!(reg.sweep(&mut coord, 60_000).is_empty());
        assert_eq!(reg.sweep(&mut coord, 3 * 60 * 1000), vec![MMSI.to_string()]);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_bridge_index_tracks_nearby_vessels() {
        let (mut reg, mut coord) = registry();
        reg.update_vessel(&report(MMSI, 58.3118 - 0.002, 12.2845, 3.0, 0.0), &mut coord, 0);
        assert_eq!(reg.vessels_near_bridge(BridgeId::Klaffbron), vec![MMSI.to_string()]);
        // Vessel moves far away: index entry is dropped
        reg.update_vessel(&report(MMSI, 58.2920, 12.2700, 3.0, 200.0), &mut coord, 30_000);
        assert!(reg.vessels_near_bridge(BridgeId::Klaffbron).is_empty());
    }

    #[test]
    fn test_update_static_sets_name() {
        let (mut reg, mut coord) = registry();
        reg.update_vessel(&report(MMSI, 58.3050, 12.2750, 5.0, 20.0), &mut coord, 0);
        reg.update_static(
            &ShipStaticData { mmsi: MMSI.to_string(), name: Some("M/S JUNO".into()), call_sign: None },
            1_000,
        );
        assert_eq!(reg.vessel(MMSI).unwrap().name.as_deref(), Some("M/S JUNO"));
    }

    #[test]
    fn test_events_emitted_on_enter_and_remove() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let mut reg = VesselRegistry::new(BridgeRegistry::new(), bus);
        let mut coord = SystemCoordinator::new();
        reg.update_vessel(&report(MMSI, 58.3050, 12.2750, 5.0, 20.0), &mut coord, 0);
        reg.remove_vessel(MMSI, "shutdown", &mut coord, 1_000);

        let mut saw_entered = false;
        let mut saw_removed = false;
        while let Ok(ev) = rx.try_recv() {
            match ev {
                TrackerEvent::VesselEntered { .. } => saw_entered = true,
                TrackerEvent::VesselRemoved { .. } => saw_removed = true,
                _ => {}
            }
        }
        assert!(saw_entered);
        assert!(saw_removed);
    }
}
