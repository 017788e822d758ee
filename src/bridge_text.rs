use std::collections::BTreeMap;

use tracing::debug;

use crate::bridges::{BridgeId, BridgeRegistry};
use crate::coordinator::SystemCoordinator;
use crate::vessel::{VesselSnapshot, VesselStatus};

/// Emitted when no vessel is relevant to either target bridge.
pub const IDLE_TEXT: &str = "Inga båtar är i närheten av Klaffbron eller Stridsbergsbron";

/// Vessels slower than this are only announced while holding for an opening.
const SUITABILITY_MIN_SOG_KN: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct BridgeTextOutput {
    pub text: String,
    pub alarm: bool,
    pub changed: bool,
    pub debounced: bool,
}

/// Composes the single Swedish status string for the target bridges.
///
/// Owns the cache of the last emitted string; while the system coordinator
/// asks for a debounce the cached string is re-emitted unchanged.
pub struct BridgeTextService {
    last_text: Option<String>,
    last_alarm: bool,
}

impl BridgeTextService {
    pub fn new() -> Self {
        Self { last_text: None, last_alarm: false }
    }

    pub fn last_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    pub fn generate(
        &mut self,
        vessels: &[VesselSnapshot],
        bridges: &BridgeRegistry,
        coordinator: &SystemCoordinator,
        now: i64,
    ) -> BridgeTextOutput {
        let debounce = coordinator.should_debounce_bridge_text(now);
        if debounce.should_debounce {
            if let Some(cached) = &self.last_text {
                debug!(
                    remaining_ms = debounce.remaining_ms,
                    active = debounce.active_debounces,
                    "bridge text debounced, re-emitting cached string"
                );
                return BridgeTextOutput {
                    text: cached.clone(),
                    alarm: self.last_alarm,
                    changed: false,
                    debounced: true,
                };
            }
        }

        let candidates: Vec<&VesselSnapshot> = vessels
            .iter()
            .filter(|v| is_bridge_text_candidate(v, bridges))
            .collect();

        let text = compose_text(&candidates, bridges);
        let alarm = candidates.iter().any(|v| {
            matches!(
                v.status,
                VesselStatus::Waiting
                    | VesselStatus::UnderBridge
                    | VesselStatus::StallbackaWaiting
                    | VesselStatus::Passed
            )
        });

        let changed = self.last_text.as_deref() != Some(text.as_str()) || self.last_alarm != alarm;
        self.last_text = Some(text.clone());
        self.last_alarm = alarm;

        BridgeTextOutput { text, alarm, changed, debounced: false }
    }
}

impl Default for BridgeTextService {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_mmsi(mmsi: &str) -> bool {
    mmsi.len() >= 7 && mmsi.chars().all(|c| c.is_ascii_digit())
}

fn is_bridge_text_candidate(v: &VesselSnapshot, bridges: &BridgeRegistry) -> bool {
    let valid_target = v
        .target_bridge
        .map(|t| bridges.is_valid_target_bridge(t.name()))
        .unwrap_or(false);
    if !valid_target || !v.has_valid_position() || !is_valid_mmsi(&v.mmsi) {
        return false;
    }
    let holding = matches!(
        v.status,
        VesselStatus::Waiting
            | VesselStatus::UnderBridge
            | VesselStatus::StallbackaWaiting
            | VesselStatus::Passed
    );
    if v.sog < SUITABILITY_MIN_SOG_KN && !holding {
        return false;
    }
    matches!(
        v.status,
        VesselStatus::Approaching
            | VesselStatus::Waiting
            | VesselStatus::UnderBridge
            | VesselStatus::StallbackaWaiting
            | VesselStatus::Passed
            | VesselStatus::EnRoute
    )
}

fn compose_text(candidates: &[&VesselSnapshot], bridges: &BridgeRegistry) -> String {
    if candidates.is_empty() {
        return IDLE_TEXT.to_string();
    }

    // Group by target bridge, in canal order for a deterministic output.
    let mut groups: BTreeMap<BridgeId, Vec<&VesselSnapshot>> = BTreeMap::new();
    for v in candidates {
        if let Some(target) = v.target_bridge {
            groups.entry(target).or_default().push(v);
        }
    }

    let mut sentences = Vec::new();
    for (target, mut group) in groups {
        group.sort_by(|a, b| {
            b.status
                .announcement_priority()
                .cmp(&a.status.announcement_priority())
                .then(
                    a.eta_minutes
                        .unwrap_or(f64::MAX)
                        .partial_cmp(&b.eta_minutes.unwrap_or(f64::MAX))
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.mmsi.cmp(&b.mmsi))
        });
        sentences.push(sentence_for_group(target, &group, bridges));
    }
    sentences.join("; ")
}

fn sentence_for_group(
    target: BridgeId,
    group: &[&VesselSnapshot],
    bridges: &BridgeRegistry,
) -> String {
    let leader = group[0];
    let eta = leader.eta_minutes;
    let target_name = target.name();

    // The bridge the leader is physically interacting with, when it is not
    // the target itself.
    let context_bridge = leader
        .current_bridge
        .or(leader.near_bridge)
        .filter(|b| *b != target && !bridges.get_bridge(*b).is_target);

    // ETA clauses always trail the whole sentence, after any "ytterligare"
    // count. Intermediate under-bridge openings name the target bridge in
    // their clause; the other forms use the plain one.
    let eta_clause = eta.map(|m| format!("beräknad broöppning {}", format_eta(m)));
    let eta_of_target_clause =
        eta.map(|m| format!("beräknad broöppning av {} {}", target_name, format_eta(m)));

    let (mut sentence, trailing_eta) = match leader.status {
        VesselStatus::Passed => {
            let passed = leader.last_passed_bridge.unwrap_or(target);
            if passed == target {
                (format!("En båt har precis passerat {}", passed.name()), None)
            } else {
                (
                    format!(
                        "En båt har precis passerat {} på väg mot {}",
                        passed.name(),
                        target_name
                    ),
                    eta_clause,
                )
            }
        }
        VesselStatus::UnderBridge => match context_bridge {
            Some(intermediate) => (
                format!(
                    "Broöppning pågår vid {} på väg mot {}",
                    intermediate.name(),
                    target_name
                ),
                eta_of_target_clause,
            ),
            None => (format!("Broöppning pågår vid {}", target_name), None),
        },
        VesselStatus::StallbackaWaiting => (
            format!("En båt åker strax under Stallbackabron på väg mot {}", target_name),
            eta_clause,
        ),
        VesselStatus::Waiting => match context_bridge {
            Some(intermediate) => (
                format!(
                    "En båt inväntar broöppning av {} på väg mot {}",
                    intermediate.name(),
                    target_name
                ),
                eta_clause,
            ),
            // No ETA at the target itself: the opening is imminent.
            None => (format!("En båt inväntar broöppning vid {}", target_name), None),
        },
        VesselStatus::Approaching => {
            let approaching_count = group
                .iter()
                .filter(|v| v.status == VesselStatus::Approaching)
                .count();
            let subject = if approaching_count > 1 {
                format!("{} båtar närmar sig", swedish_count(approaching_count))
            } else {
                "En båt närmar sig".to_string()
            };
            let body = match context_bridge {
                Some(intermediate) => format!(
                    "{} {} på väg mot {}",
                    subject,
                    intermediate.name(),
                    target_name
                ),
                None => format!("{} {}", subject, target_name),
            };
            (body, eta_clause)
        }
        VesselStatus::EnRoute => (format!("En båt på väg mot {}", target_name), eta_clause),
        VesselStatus::Unknown => (format!("En båt på väg mot {}", target_name), None),
    };

    let counted = if leader.status == VesselStatus::Approaching {
        group
            .iter()
            .filter(|v| v.status == VesselStatus::Approaching)
            .count()
    } else {
        1
    };
    let additional = group.len() - counted;
    if additional > 0 {
        let word = if additional == 1 { "båt" } else { "båtar" };
        sentence.push_str(&format!(
            ", ytterligare {} {} på väg",
            swedish_count(additional).to_lowercase(),
            word
        ));
    }
    if let Some(clause) = trailing_eta {
        sentence.push_str(&format!(", {}", clause));
    }

    sentence
}

/// Minutes to the Swedish display form: "nu", "om 1 minut", "om N minuter".
fn format_eta(minutes: f64) -> String {
    let rounded = minutes.round() as i64;
    if rounded <= 0 {
        "nu".to_string()
    } else if rounded == 1 {
        "om 1 minut".to_string()
    } else {
        format!("om {} minuter", rounded)
    }
}

/// Swedish numerals for small counts; digits beyond ten.
fn swedish_count(n: usize) -> String {
    match n {
        1 => "En".to_string(),
        2 => "Två".to_string(),
        3 => "Tre".to_string(),
        4 => "Fyra".to_string(),
        5 => "Fem".to_string(),
        6 => "Sex".to_string(),
        7 => "Sju".to_string(),
        8 => "Åtta".to_string(),
        9 => "Nio".to_string(),
        10 => "Tio".to_string(),
        _ => n.to_string(),
    }
}
