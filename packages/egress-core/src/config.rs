//! config.rs — Building configuration
//!
//! One TOML document describes a deployment: the walkable graph, anchor
//! positions, exits with capacities, walls, path-loss parameters and the
//! localization strategy. See `building.toml` for the reference building,
//! which is embedded as [`REFERENCE_BUILDING`].

use std::collections::BTreeMap;

use egress_types::Point;
use serde::Deserialize;

use crate::admission::ExitConfig;
use crate::distance::PathLossParams;
use crate::error::{Error, Result};
use crate::geometry::{Bounds, Wall};
use crate::graph::{BuildingGraph, NodeSpec};
use crate::position::StrategyKind;

pub const REFERENCE_BUILDING: &str = include_str!("../building.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingConfig {
    #[serde(default)]
    pub path_loss: PathLossParams,
    #[serde(default)]
    pub localization: LocalizationConfig,
    #[serde(default)]
    pub walls: Vec<Wall>,
    pub anchors: BTreeMap<String, [f64; 2]>,
    pub exits: Vec<ExitConfig>,
    pub nodes: BTreeMap<String, NodeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    pub strategy: StrategyKind,
    pub particles: usize,
    pub rounds: usize,
    pub seed: Option<u64>,
    /// Sampling area for the particle filter; defaults to the box around
    /// every node and anchor
    pub bounds: Option<BoundsConfig>,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            particles: 1000,
            rounds: 5,
            seed: None,
            bounds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BoundsConfig {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl From<BoundsConfig> for Bounds {
    fn from(b: BoundsConfig) -> Self { Bounds::new(b.min.into(), b.max.into()) }
}

impl BuildingConfig {
    /// Parse and check everything that does not need the graph built.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(src)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn reference() -> Result<Self> { Self::from_toml_str(REFERENCE_BUILDING) }

    fn validate(&self) -> Result<()> {
        let pl = &self.path_loss;
        if !(pl.d_ref > 0.0 && pl.exponent > 0.0 && pl.rssi_ref.is_finite() && pl.sigma >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "path_loss: d_ref and exponent must be positive, sigma non-negative (got {pl:?})"
            )));
        }
        if let Some((name, _)) = self.anchors.iter().find(|(_, p)| !Point::from(**p).is_finite()) {
            return Err(Error::InvalidConfig(format!("anchor {name}: coordinates must be finite")));
        }
        if self.localization.particles == 0 {
            return Err(Error::InvalidConfig("localization.particles must be at least 1".into()));
        }
        if let Some(b) = self.localization.bounds {
            if !Bounds::from(b).is_valid() {
                return Err(Error::InvalidConfig(format!(
                    "localization.bounds {b:?} is not a rectangle"
                )));
            }
        }
        Ok(())
    }

    pub fn graph(&self) -> Result<BuildingGraph> { BuildingGraph::from_specs(&self.nodes) }

    pub fn anchor_positions(&self) -> BTreeMap<String, Point> {
        self.anchors.iter().map(|(name, p)| (name.clone(), Point::from(*p))).collect()
    }

    /// Configured bounds, or the box enclosing every graph node and anchor.
    pub fn bounds(&self, graph: &BuildingGraph) -> Option<Bounds> {
        if let Some(b) = self.localization.bounds {
            return Some(b.into());
        }
        let anchors: Vec<Point> = self.anchors.values().map(|p| Point::from(*p)).collect();
        Bounds::enclosing(graph.nodes().map(|n| &n.coords).chain(anchors.iter()))
    }
}
