use crate::geometry::{angle_diff, haversine_distance_m, initial_bearing};

const NORMAL_MOVEMENT_MAX_M: f64 = 100.0;
const MEDIUM_MOVEMENT_MAX_M: f64 = 500.0;
const BEARING_TOLERANCE_DEG: f64 = 45.0;
const SPEED_TOLERANCE_KN: f64 = 5.0;
const MANEUVER_SOG_CHANGE_KN: f64 = 2.0;
const LEGITIMATE_SCORE: f64 = 0.7;
const UNCERTAIN_SCORE: f64 = 0.4;
const KNOTS_PER_MPS: f64 = 3600.0 / 1852.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementAction {
    Accept,
    AcceptWithCaution,
    GpsJumpDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Per-factor numbers behind a large-movement verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementFactors {
    pub cog_change: f64,
    pub sog_change: f64,
    pub bearing_consistency: f64,
    pub speed_consistency: f64,
}

#[derive(Debug, Clone)]
pub struct MovementAnalysis {
    pub action: MovementAction,
    pub reason: &'static str,
    pub is_gps_jump: bool,
    pub is_legitimate_movement: bool,
    pub confidence: Confidence,
    pub movement_distance: f64,
    pub analysis: MovementFactors,
}

impl MovementAnalysis {
    fn accept(reason: &'static str, confidence: Confidence, distance: f64) -> Self {
        Self {
            action: MovementAction::Accept,
            reason,
            is_gps_jump: false,
            is_legitimate_movement: false,
            confidence,
            movement_distance: distance,
            analysis: MovementFactors::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Kinematics {
    pub sog: f64,
    pub cog: f64,
    pub ts: i64,
}

/// Classify one position delta as normal movement, uncertain movement, or a
/// likely GPS jump.
///
/// Movements above 500 m are scored on four factors (direction change,
/// bearing consistency, implied-vs-reported speed, maneuver evidence); the
/// normalized score decides between acceptance, caution, and rejection.
pub fn analyze_movement(
    curr_pos: (f64, f64),
    prev_pos: Option<(f64, f64)>,
    curr: Kinematics,
    prev: Option<Kinematics>,
) -> MovementAnalysis {
    let (prev_pos, prev) = match (prev_pos, prev) {
        (Some(p), Some(k)) => (p, k),
        _ => return MovementAnalysis::accept("no_previous_data", Confidence::High, 0.0),
    };

    let distance = haversine_distance_m(prev_pos.0, prev_pos.1, curr_pos.0, curr_pos.1);
    if !distance.is_finite() {
        return MovementAnalysis::accept("no_previous_data", Confidence::Low, 0.0);
    }

    if distance <= NORMAL_MOVEMENT_MAX_M {
        return MovementAnalysis::accept("normal_movement", Confidence::High, distance);
    }
    if distance <= MEDIUM_MOVEMENT_MAX_M {
        return MovementAnalysis::accept("medium_movement", Confidence::Medium, distance);
    }

    // Large movement: build a legitimacy score in [0, 1] from four factors.
    let cog_change = angle_diff(curr.cog, prev.cog).abs();
    let sog_change = (curr.sog - prev.sog).abs();

    let mut score_sum: f64 = 0.0;
    let factors: f64 = 4.0;

    if cog_change > 90.0 {
        score_sum += 0.4;
    } else if cog_change > 45.0 {
        score_sum += 0.2;
    }

    let actual_bearing = initial_bearing(prev_pos.0, prev_pos.1, curr_pos.0, curr_pos.1);
    let bearing_error = angle_diff(actual_bearing, curr.cog).abs();
    let bearing_consistency = if bearing_error <= BEARING_TOLERANCE_DEG { 0.3 } else { -0.2 };
    score_sum += bearing_consistency;

    let elapsed_s = ((curr.ts - prev.ts).max(1000) as f64) / 1000.0;
    let implied_speed_kn = distance / elapsed_s * KNOTS_PER_MPS;
    let speed_tolerance = SPEED_TOLERANCE_KN.max(curr.sog * 0.5);
    let speed_consistency = if (implied_speed_kn - curr.sog).abs() <= speed_tolerance {
        0.3
    } else {
        -0.3
    };
    score_sum += speed_consistency;

    if sog_change > MANEUVER_SOG_CHANGE_KN {
        score_sum += 0.1;
    }

    let score = (score_sum / factors + 0.5).clamp(0.0, 1.0);
    let analysis = MovementFactors {
        cog_change,
        sog_change,
        bearing_consistency,
        speed_consistency,
    };

    if score >= LEGITIMATE_SCORE {
        MovementAnalysis {
            action: MovementAction::Accept,
            reason: "legitimate_direction_change",
            is_gps_jump: false,
            is_legitimate_movement: true,
            confidence: Confidence::Medium,
            movement_distance: distance,
            analysis,
        }
    } else if score >= UNCERTAIN_SCORE {
        MovementAnalysis {
            action: MovementAction::AcceptWithCaution,
            reason: "uncertain_movement",
            is_gps_jump: false,
            is_legitimate_movement: false,
            confidence: Confidence::Low,
            movement_distance: distance,
            analysis,
        }
    } else {
        MovementAnalysis {
            action: MovementAction::GpsJumpDetected,
            reason: "likely_gps_error",
            is_gps_jump: true,
            is_legitimate_movement: false,
            confidence: Confidence::Medium,
            movement_distance: distance,
            analysis,
        }
    }
}
