//! admission.rs — Exit admission controller
//!
//! Owns every exit's occupant list and every device session. All operations
//! take the one table lock exactly once, so "check occupancy → choose → append"
//! and "find session → remove occupant → delete session" are each atomic with
//! respect to every other admission call.
//!
//! Route planning for the chosen exit runs inside the same critical section
//! through a caller-supplied planner, so a planning failure leaves the table
//! exactly as it was.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use egress_types::{format_distance, DeviceResult, Point};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::graph::BuildingGraph;
use crate::routing::Route;

// ── Types ─────────────────────────────────────────────────────────────────────

/// One `[[exits]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitConfig {
    pub node: String,
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitRecord {
    pub node: String,
    pub capacity: usize,
    /// Device tags in admission order, each at most once
    pub occupants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSession {
    pub device_tag: String,
    pub user_node: String,
    pub position: Option<Point>,
    pub assigned_exit: String,
    pub path: Vec<String>,
    pub total_distance: f64,
    pub assigned_at: DateTime<Utc>,
}

impl DeviceSession {
    pub fn to_result(&self) -> DeviceResult {
        DeviceResult {
            device_tag: self.device_tag.clone(),
            user_location: self.user_node.clone(),
            coordinates: self.position,
            assigned_exit: self.assigned_exit.clone(),
            shortest_path: self.path.clone(),
            total_distance: format_distance(self.total_distance),
        }
    }
}

/// Read-only copy of the admission table at one instant.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdmissionSnapshot {
    /// Configuration order
    pub exits: Vec<ExitRecord>,
    /// Keyed by device tag
    pub sessions: BTreeMap<String, DeviceSession>,
}

#[derive(Debug, Default)]
struct AdmissionTable {
    exits: Vec<ExitRecord>,
    sessions: BTreeMap<String, DeviceSession>,
}

impl AdmissionTable {
    fn exit_mut(&mut self, node: &str) -> Option<&mut ExitRecord> {
        self.exits.iter_mut().find(|e| e.node == node)
    }
}

// ── Controller ────────────────────────────────────────────────────────────────

pub struct ExitAdmission {
    graph: Arc<BuildingGraph>,
    /// Exit coordinates in configuration order, parallel to the table's exits
    exit_coords: Vec<Point>,
    table: Mutex<AdmissionTable>,
}

impl ExitAdmission {
    pub fn new(graph: Arc<BuildingGraph>, exits: &[ExitConfig]) -> Result<Self> {
        let mut records: Vec<ExitRecord> = Vec::with_capacity(exits.len());
        let mut exit_coords = Vec::with_capacity(exits.len());

        for exit in exits {
            let coords = graph.coords(&exit.node).ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "exit {} is not a node of the building graph",
                    exit.node
                ))
            })?;
            if records.iter().any(|r| r.node == exit.node) {
                return Err(Error::InvalidConfig(format!("exit {} is listed twice", exit.node)));
            }
            if exit.capacity == 0 {
                warn!("Admission: exit {} has capacity 0 and will never be assigned", exit.node);
            }
            records.push(ExitRecord {
                node: exit.node.clone(),
                capacity: exit.capacity,
                occupants: Vec::new(),
            });
            exit_coords.push(coords);
        }

        info!(
            "Admission: {} exits, total capacity {}",
            records.len(),
            records.iter().map(|r| r.capacity).sum::<usize>()
        );
        Ok(Self {
            graph,
            exit_coords,
            table: Mutex::new(AdmissionTable { exits: records, sessions: BTreeMap::new() }),
        })
    }

    /// Admit `device_tag` at `user_node` into the nearest exit with spare
    /// capacity. `planner` is called with the chosen exit and must return the
    /// route to it; its error aborts the assignment without any change.
    ///
    /// A device that already holds a session is re-assigned: its current slot
    /// does not count against capacity and is released only once the new
    /// assignment succeeds.
    pub fn assign<F>(
        &self,
        device_tag: &str,
        user_node: &str,
        position: Option<Point>,
        planner: F,
    ) -> Result<DeviceSession>
    where
        F: FnOnce(&str) -> Result<Route>,
    {
        let origin = self
            .graph
            .coords(user_node)
            .ok_or_else(|| Error::UnknownNode(user_node.to_string()))?;

        let mut table = self.table.lock();
        let previous = table.sessions.get(device_tag).map(|s| s.assigned_exit.clone());

        // stable: equal distances keep configuration order
        let mut order: Vec<(usize, f64)> = self
            .exit_coords
            .iter()
            .map(|c| origin.distance_to(c))
            .enumerate()
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        let chosen = order.iter().map(|&(i, _)| i).find(|&i| {
            let exit = &table.exits[i];
            let held = usize::from(previous.as_deref() == Some(exit.node.as_str()));
            exit.occupants.len().saturating_sub(held) < exit.capacity
        });
        let Some(i) = chosen else {
            debug!("Admission: no exit has room for {}", device_tag);
            return Err(Error::NoExitAvailable);
        };

        let exit_node = table.exits[i].node.clone();
        let route = planner(&exit_node)?;

        if let Some(old) = previous.as_deref() {
            if let Some(rec) = table.exit_mut(old) {
                rec.occupants.retain(|t| t != device_tag);
            }
        }
        table.exits[i].occupants.push(device_tag.to_string());

        let session = DeviceSession {
            device_tag: device_tag.to_string(),
            user_node: user_node.to_string(),
            position,
            assigned_exit: exit_node.clone(),
            path: route.path,
            total_distance: route.total_distance,
            assigned_at: Utc::now(),
        };
        table.sessions.insert(device_tag.to_string(), session.clone());

        let rec = &table.exits[i];
        info!(
            "Admission: {} → {} ({}/{}) from {}, {:.2}m",
            device_tag,
            exit_node,
            rec.occupants.len(),
            rec.capacity,
            user_node,
            session.total_distance
        );
        Ok(session)
    }

    /// Free the device's exit slot and drop its session. Returns the exit.
    pub fn release(&self, device_tag: &str) -> Result<String> {
        let mut table = self.table.lock();
        let session = table
            .sessions
            .remove(device_tag)
            .ok_or_else(|| Error::UnknownDevice(device_tag.to_string()))?;
        if let Some(rec) = table.exit_mut(&session.assigned_exit) {
            rec.occupants.retain(|t| t != device_tag);
        }
        info!("Admission: {} released {}", device_tag, session.assigned_exit);
        Ok(session.assigned_exit)
    }

    pub fn session(&self, device_tag: &str) -> Result<DeviceSession> {
        self.table
            .lock()
            .sessions
            .get(device_tag)
            .cloned()
            .ok_or_else(|| Error::UnknownDevice(device_tag.to_string()))
    }

    pub fn snapshot(&self) -> AdmissionSnapshot {
        let table = self.table.lock();
        AdmissionSnapshot { exits: table.exits.clone(), sessions: table.sessions.clone() }
    }
}
