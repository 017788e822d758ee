use std::collections::HashMap;

use serde::Serialize;

use crate::geometry::haversine_distance_m;

/// Default canal axis bearing where no survey value is available.
const DEFAULT_AXIS_BEARING: f64 = 125.0;

/// The five canal bridges, ordered south to north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BridgeId {
    Olidebron = 0,
    Klaffbron = 1,
    Jarnvagsbron = 2,
    Stridsbergsbron = 3,
    Stallbackabron = 4,
}

impl BridgeId {
    pub fn all() -> [BridgeId; 5] {
        [
            BridgeId::Olidebron,
            BridgeId::Klaffbron,
            BridgeId::Jarnvagsbron,
            BridgeId::Stridsbergsbron,
            BridgeId::Stallbackabron,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            BridgeId::Olidebron => "Olidebron",
            BridgeId::Klaffbron => "Klaffbron",
            BridgeId::Jarnvagsbron => "Järnvägsbron",
            BridgeId::Stridsbergsbron => "Stridsbergsbron",
            BridgeId::Stallbackabron => "Stallbackabron",
        }
    }

    /// Position along the canal, 0 at the southern end.
    pub fn canal_index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone)]
pub struct Bridge {
    pub id: BridgeId,
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub axis_bearing: f64,
    pub is_target: bool,
}

/// Static catalog of the canal bridges.
///
/// Read-only after construction. The coordinates are the configured canal
/// values; inter-bridge distances are derived from them once at startup.
pub struct BridgeRegistry {
    bridges: Vec<Bridge>,
    distances: HashMap<(BridgeId, BridgeId), f64>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        let bridges = vec![
            Bridge {
                id: BridgeId::Olidebron,
                name: BridgeId::Olidebron.name(),
                lat: 58.2997,
                lon: 12.2702,
                axis_bearing: DEFAULT_AXIS_BEARING,
                is_target: false,
            },
            Bridge {
                id: BridgeId::Klaffbron,
                name: BridgeId::Klaffbron.name(),
                lat: 58.3118,
                lon: 12.2845,
                axis_bearing: DEFAULT_AXIS_BEARING,
                is_target: true,
            },
            Bridge {
                id: BridgeId::Jarnvagsbron,
                name: BridgeId::Jarnvagsbron.name(),
                lat: 58.3168,
                lon: 12.2890,
                axis_bearing: DEFAULT_AXIS_BEARING,
                is_target: false,
            },
            Bridge {
                id: BridgeId::Stridsbergsbron,
                name: BridgeId::Stridsbergsbron.name(),
                lat: 58.3203,
                lon: 12.2917,
                axis_bearing: DEFAULT_AXIS_BEARING,
                is_target: true,
            },
            Bridge {
                id: BridgeId::Stallbackabron,
                name: BridgeId::Stallbackabron.name(),
                lat: 58.3360,
                lon: 12.3048,
                axis_bearing: DEFAULT_AXIS_BEARING,
                is_target: false,
            },
        ];

        let mut distances = HashMap::new();
        for a in &bridges {
            for b in &bridges {
                let d = haversine_distance_m(a.lat, a.lon, b.lat, b.lon);
                distances.insert((a.id, b.id), d);
            }
        }

        Self { bridges, distances }
    }

    pub fn get_bridge(&self, id: BridgeId) -> &Bridge {
        &self.bridges[id.canal_index()]
    }

    pub fn get_bridge_by_name(&self, name: &str) -> Option<&Bridge> {
        self.bridges.iter().find(|b| b.name == name)
    }

    pub fn all_bridge_ids(&self) -> Vec<BridgeId> {
        self.bridges.iter().map(|b| b.id).collect()
    }

    pub fn target_bridges(&self) -> Vec<BridgeId> {
        self.bridges.iter().filter(|b| b.is_target).map(|b| b.id).collect()
    }

    pub fn is_valid_target_bridge(&self, name: &str) -> bool {
        self.get_bridge_by_name(name).map(|b| b.is_target).unwrap_or(false)
    }

    /// Ordered sequence of bridges strictly between two bridges along the canal.
    pub fn bridges_between(&self, from: BridgeId, to: BridgeId) -> Vec<BridgeId> {
        let (lo, hi) = if from.canal_index() <= to.canal_index() {
            (from.canal_index(), to.canal_index())
        } else {
            (to.canal_index(), from.canal_index())
        };
        let mut seq: Vec<BridgeId> = BridgeId::all()
            .into_iter()
            .filter(|b| b.canal_index() > lo && b.canal_index() < hi)
            .collect();
        if from.canal_index() > to.canal_index() {
            seq.reverse();
        }
        seq
    }

    /// Precomputed great-circle distance between two bridges in meters.
    pub fn distance_between_bridges(&self, a: BridgeId, b: BridgeId) -> f64 {
        *self.distances.get(&(a, b)).unwrap_or(&0.0)
    }

    /// Sum of the inter-bridge segments from one bridge to another along the
    /// canal order, used by the progressive ETA calculator.
    pub fn route_distance(&self, from: BridgeId, to: BridgeId) -> f64 {
        if from == to {
            return 0.0;
        }
        let mut hops: Vec<BridgeId> = vec![from];
        hops.extend(self.bridges_between(from, to));
        hops.push(to);
        hops.windows(2)
            .map(|w| self.distance_between_bridges(w[0], w[1]))
            .sum()
    }

    /// The next target bridge along the vessel's direction of travel, if any.
    pub fn next_target_along(&self, after: BridgeId, northbound: bool) -> Option<BridgeId> {
        let idx = after.canal_index();
        self.bridges
            .iter()
            .filter(|b| b.is_target)
            .filter(|b| {
                if northbound {
                    b.id.canal_index() > idx
                } else {
                    b.id.canal_index() < idx
                }
            })
            .map(|b| b.id)
            .next()
    }
}

impl Default for BridgeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
