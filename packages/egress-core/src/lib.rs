//! # egress-core
//!
//! Indoor egress guidance: where is the device, which exit may it use, and
//! how does it get there safely.
//!
//! Pipeline for one device update:
//!
//! ```text
//! readings ─► distance ─► position ─► nearest node ─► admission ─► route
//!             (per anchor)  (strategy)                (capacity)    (A*)
//! ```
//!
//! Everything here is synchronous. The only shared mutable state lives in
//! [`ExitAdmission`] and [`UnsafeSegments`]; both are safe to share across
//! threads behind an `Arc`.

pub mod admission;
pub mod config;
pub mod distance;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod localizer;
pub mod position;
pub mod routing;

pub use admission::{AdmissionSnapshot, DeviceSession, ExitAdmission, ExitConfig, ExitRecord};
pub use config::{BuildingConfig, REFERENCE_BUILDING};
pub use distance::{estimate_distance, DistanceEstimate, PathLossParams};
pub use error::{Error, Result};
pub use geometry::{Bounds, Wall};
pub use graph::{nearest_node, BuildingGraph};
pub use localizer::{Fix, Localizer};
pub use position::{estimate_position, Observation, Strategy, StrategyKind};
pub use routing::{route, Route, SegmentSet, UnsafeSegments};
