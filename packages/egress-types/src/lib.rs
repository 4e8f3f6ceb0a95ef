//! # egress-types
//!
//! Shared wire structures for the egress guidance system.
//!
//! These types are used by:
//! - `egress-core`: planar points and filtered signal readings
//! - `egress-backend`: HTTP request/response bodies and the Socket.IO `update` payload
//! - `device-sim`: building requests and decoding results against a live backend
//!
//! ## Coordinate Conventions
//!
//! - **Building frame**: 2-D Cartesian, meters, origin and axes as drawn on the floor plan
//! - Node, anchor, wall and particle coordinates all live in the same frame

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Geometry ──────────────────────────────────────────────────────────────────

/// 2D point in the building frame (meters)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool { self.x.is_finite() && self.y.is_finite() }
}

impl From<[f64; 2]> for Point {
    fn from(v: [f64; 2]) -> Self { Self { x: v[0], y: v[1] } }
}

// ── Signal Readings ───────────────────────────────────────────────────────────

/// One filtered signal reading: a known anchor and a numeric RSSI (dBm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub anchor: String,
    pub rssi: f64,
}

impl Reading {
    pub fn new(anchor: impl Into<String>, rssi: f64) -> Self {
        Self { anchor: anchor.into(), rssi }
    }
}

/// A scanned access point exactly as the mobile client reports it.
/// Either field may be missing or malformed; the backend filters them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WifiDevice {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "signalStrength", default)]
    pub signal_strength: Option<serde_json::Value>,
}

impl WifiDevice {
    pub fn new(name: impl Into<String>, signal_strength: f64) -> Self {
        Self {
            name: Some(name.into()),
            signal_strength: Some(serde_json::Value::from(signal_strength)),
        }
    }

    /// Numeric reading, if both the name and a finite numeric signal are present.
    pub fn reading(&self) -> Option<Reading> {
        let name = self.name.as_ref()?;
        let rssi = self.signal_strength.as_ref()?.as_f64()?;
        rssi.is_finite().then(|| Reading::new(name.clone(), rssi))
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// `POST /` body: one location update for one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceUpdateRequest {
    pub device_tag: String,
    pub wifi_devices: Vec<WifiDevice>,
}

/// An unordered pair of adjacent graph nodes (`POST /unsafe` body, and the
/// wire form of a marked segment).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentPair {
    pub from: String,
    pub to: String,
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// Envelope used by every HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiResponse<T> {
    Success { data: T },
    Failure { message: String },
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self { Self::Success { data } }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure { message: message.into() }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }
}

/// Guidance handed back to a device after a successful update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceResult {
    pub device_tag: String,
    /// Graph node the device was snapped to
    pub user_location: String,
    /// Estimated position before snapping (absent only for sessions created
    /// without an estimate)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub coordinates: Option<Point>,
    pub assigned_exit: String,
    pub shortest_path: Vec<String>,
    /// Human-readable, e.g. `"6.00 meters"`
    pub total_distance: String,
}

/// Formats a path length the way clients display it.
pub fn format_distance(meters: f64) -> String {
    format!("{meters:.2} meters")
}

// ── Broadcast ─────────────────────────────────────────────────────────────────

/// Payload of the Socket.IO `update` event and of `GET /state`.
/// Always built from a committed snapshot, never mid-mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateUpdate {
    pub devices: Vec<DeviceResult>,
    /// exit node → occupying device tags, in admission order
    pub exits: BTreeMap<String, Vec<String>>,
    /// exit node → configured capacity
    pub capacity: BTreeMap<String, usize>,
    pub unsafe_segments: Vec<SegmentPair>,
}
