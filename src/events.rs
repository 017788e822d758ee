use tokio::sync::broadcast;

use crate::vessel::{VesselSnapshot, VesselStatus};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the vessel registry. Subscribers must never block the
/// write path, so delivery is a lossy broadcast: if nobody listens, or a
/// listener lags, sends are simply dropped.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    VesselEntered {
        vessel: VesselSnapshot,
    },
    VesselUpdated {
        vessel: VesselSnapshot,
    },
    VesselRemoved {
        mmsi: String,
        reason: &'static str,
    },
    StatusChanged {
        vessel: VesselSnapshot,
        old_status: VesselStatus,
        new_status: VesselStatus,
        reason: &'static str,
        stabilized: bool,
    },
    EtaCalculationError {
        mmsi: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TrackerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: TrackerEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
