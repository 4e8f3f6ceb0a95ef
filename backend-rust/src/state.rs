//! Shared application state and the broadcast snapshot built from it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use egress_core::{BuildingConfig, BuildingGraph, ExitAdmission, Localizer, UnsafeSegments};
use egress_types::StateUpdate;
use socketioxide::SocketIo;
use tracing::{debug, info};

/// Everything a handler needs. Cheap to clone; all members are shared.
#[derive(Clone)]
pub struct AppState {
    pub graph: Arc<BuildingGraph>,
    pub localizer: Arc<Localizer>,
    pub admission: Arc<ExitAdmission>,
    pub unsafe_segments: Arc<UnsafeSegments>,
    pub io: SocketIo,
    broadcasts: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(cfg: &BuildingConfig, io: SocketIo) -> Result<Self> {
        let graph = Arc::new(cfg.graph()?);
        let localizer = Localizer::from_config(cfg, &graph)?;
        let admission = ExitAdmission::new(graph.clone(), &cfg.exits)?;
        info!(
            "Building ready: {} nodes, {} anchors, localization {:?}",
            graph.len(),
            localizer.anchors().len(),
            localizer.strategy()
        );
        Ok(Self {
            graph,
            localizer: Arc::new(localizer),
            admission: Arc::new(admission),
            unsafe_segments: Arc::new(UnsafeSegments::new()),
            io,
            broadcasts: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Committed admission state plus the unsafe segments, as clients see it.
    pub fn state_update(&self) -> StateUpdate {
        let snap = self.admission.snapshot();
        StateUpdate {
            devices: snap.sessions.values().map(|s| s.to_result()).collect(),
            exits: snap.exits.iter().map(|e| (e.node.clone(), e.occupants.clone())).collect(),
            capacity: snap.exits.iter().map(|e| (e.node.clone(), e.capacity)).collect(),
            unsafe_segments: self.unsafe_segments.snapshot().to_pairs(),
        }
    }

    /// Push the current state to every connected client. Call only after a
    /// mutation has returned.
    pub fn broadcast(&self) {
        let update = self.state_update();
        let seq = self.broadcasts.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            "Broadcast #{seq}: {} devices, {} unsafe segments",
            update.devices.len(),
            update.unsafe_segments.len()
        );
        let _ = self.io.emit("update", &update);
    }

    /// Number of `update` broadcasts sent so far.
    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }
}
