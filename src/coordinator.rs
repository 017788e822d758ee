use std::collections::HashMap;

use tracing::debug;

use crate::gps_analyzer::{MovementAction, MovementAnalysis};

const GPS_JUMP_DEBOUNCE_MS: i64 = 10_000;
const UNCERTAIN_DEBOUNCE_MS: i64 = 5_000;
const STABILIZATION_EXTENSION_MS: i64 = 30_000;
const STATE_RETENTION_MS: i64 = 10 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CoordinationLevel {
    Normal,
    Moderate,
    Enhanced,
    SystemWide,
}

#[derive(Debug, Clone)]
pub struct CoordinationState {
    pub level: CoordinationLevel,
    #[allow(dead_code)]
    pub protection: bool,
    pub bridge_text_debounce_until: i64,
    pub last_update: i64,
}

#[derive(Debug, Clone)]
pub struct CoordinationDecision {
    pub should_activate_protection: bool,
    pub should_debounce_text: bool,
    pub stabilization_level: CoordinationLevel,
}

#[derive(Debug, Clone)]
pub struct DebounceDecision {
    pub should_debounce: bool,
    pub remaining_ms: i64,
    pub active_debounces: usize,
}

/// Cross-module damping policy driven by the GPS jump analyzer's verdict.
///
/// Hands out a per-vessel coordination level, asks for target protection on
/// suspicious movement, and gates bridge-text regeneration while a jump is
/// being ridden out.
#[derive(Debug, Default)]
pub struct SystemCoordinator {
    states: HashMap<String, CoordinationState>,
}

impl SystemCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coordinate_position_update(
        &mut self,
        mmsi: &str,
        analysis: &MovementAnalysis,
        now: i64,
    ) -> CoordinationDecision {
        let (level, protection, debounce_ms) = match analysis.action {
            MovementAction::GpsJumpDetected => {
                (CoordinationLevel::Enhanced, true, GPS_JUMP_DEBOUNCE_MS)
            }
            MovementAction::AcceptWithCaution => {
                (CoordinationLevel::Moderate, true, UNCERTAIN_DEBOUNCE_MS)
            }
            MovementAction::Accept => (CoordinationLevel::Normal, false, 0),
        };

        let debounce_until = if debounce_ms > 0 { now + debounce_ms } else { 0 };
        let prev_until = self
            .states
            .get(mmsi)
            .map(|s| s.bridge_text_debounce_until)
            .unwrap_or(0);

        if protection {
            debug!(
                mmsi,
                reason = analysis.reason,
                ?level,
                "coordination damping engaged"
            );
        }

        self.states.insert(
            mmsi.to_string(),
            CoordinationState {
                level,
                protection,
                // An existing debounce is never shortened by a calmer update.
                bridge_text_debounce_until: debounce_until.max(prev_until),
                last_update: now,
            },
        );

        CoordinationDecision {
            should_activate_protection: protection,
            should_debounce_text: debounce_ms > 0,
            stabilization_level: level,
        }
    }

    pub fn level_for(&self, mmsi: &str) -> CoordinationLevel {
        self.states
            .get(mmsi)
            .map(|s| s.level)
            .unwrap_or(CoordinationLevel::Normal)
    }

    /// Extra stabilization window granted when the coordination level is
    /// enhanced or higher. The status stabilizer tags such holds as
    /// coordination-applied.
    pub fn stabilization_extension_ms(&self, mmsi: &str) -> i64 {
        if self.level_for(mmsi) >= CoordinationLevel::Enhanced {
            STABILIZATION_EXTENSION_MS
        } else {
            0
        }
    }

    /// Consulted by the bridge text service before regenerating output.
    pub fn should_debounce_bridge_text(&self, now: i64) -> DebounceDecision {
        let mut remaining = 0;
        let mut active = 0;
        for state in self.states.values() {
            let left = state.bridge_text_debounce_until - now;
            if left > 0 {
                active += 1;
                remaining = remaining.max(left);
            }
        }
        DebounceDecision {
            should_debounce: active > 0,
            remaining_ms: remaining,
            active_debounces: active,
        }
    }

    pub fn clear_vessel(&mut self, mmsi: &str) {
        self.states.remove(mmsi);
    }

    /// Drop coordination state that has not been refreshed for a while.
    pub fn prune_stale(&mut self, now: i64) {
        self.states
            .retain(|_, s| now - s.last_update < STATE_RETENTION_MS);
    }
}
