//! localizer.rs — Readings → position → graph node
//!
//! Joins filtered readings with anchor positions, converts each to a range,
//! runs the configured position strategy and snaps the result onto the
//! building graph.

use std::collections::BTreeMap;

use egress_types::{Point, Reading};
use serde::Serialize;
use tracing::debug;

use crate::config::BuildingConfig;
use crate::distance::{estimate_distance, PathLossParams};
use crate::error::{Error, Result};
use crate::graph::BuildingGraph;
use crate::position::{
    estimate_position, weighted_centroid, Observation, ParticleFilterConfig, Strategy, StrategyKind,
};

/// Outcome of one localization.
#[derive(Debug, Clone, Serialize)]
pub struct Fix {
    pub position: Point,
    /// Nearest graph node to `position`
    pub node: String,
    pub observations: Vec<Observation>,
    /// Strategy that actually produced `position`
    pub strategy: StrategyKind,
}

#[derive(Debug, Clone)]
pub struct Localizer {
    anchors: BTreeMap<String, Point>,
    path_loss: PathLossParams,
    strategy: Strategy,
}

impl Localizer {
    pub fn new(
        anchors: BTreeMap<String, Point>,
        path_loss: PathLossParams,
        strategy: Strategy,
    ) -> Self {
        Self { anchors, path_loss, strategy }
    }

    pub fn from_config(cfg: &BuildingConfig, graph: &BuildingGraph) -> Result<Self> {
        let loc = &cfg.localization;
        let strategy = match loc.strategy {
            StrategyKind::Trilateration => Strategy::Trilateration,
            StrategyKind::Centroid => Strategy::Centroid,
            StrategyKind::ParticleFilter => {
                let bounds = cfg.bounds(graph).ok_or_else(|| {
                    Error::InvalidConfig("particle filter needs a sampling area".into())
                })?;
                Strategy::ParticleFilter(ParticleFilterConfig {
                    particles: loc.particles,
                    rounds: loc.rounds,
                    bounds,
                    walls: cfg.walls.clone(),
                    seed: loc.seed,
                })
            }
        };
        Ok(Self::new(cfg.anchor_positions(), cfg.path_loss, strategy))
    }

    pub fn is_anchor(&self, name: &str) -> bool { self.anchors.contains_key(name) }
    pub fn anchors(&self) -> &BTreeMap<String, Point> { &self.anchors }
    pub fn strategy(&self) -> StrategyKind { self.strategy.kind() }

    /// One observation per known anchor. Unknown anchors are dropped and a
    /// repeated anchor keeps its strongest reading.
    pub fn observe(&self, readings: &[Reading]) -> Vec<Observation> {
        let mut strongest: BTreeMap<&str, f64> = BTreeMap::new();
        for r in readings {
            if !self.anchors.contains_key(&r.anchor) {
                debug!("Localizer: ignoring unknown anchor {:?}", r.anchor);
                continue;
            }
            strongest
                .entry(r.anchor.as_str())
                .and_modify(|rssi| *rssi = rssi.max(r.rssi))
                .or_insert(r.rssi);
        }

        strongest
            .into_iter()
            .filter_map(|(name, rssi)| {
                let position = *self.anchors.get(name)?;
                let est = estimate_distance(rssi, &self.path_loss);
                debug!(
                    "Localizer: {} rssi={:.1} → {:.2}m [{:.2}, {:.2}]",
                    name, rssi, est.d_est, est.d_min, est.d_max
                );
                Some(Observation::new(name, position, rssi, est.d_est))
            })
            .collect()
    }

    /// Locate a device. Trilateration with exactly two usable anchors falls
    /// back to the weighted centroid.
    pub fn locate(&self, readings: &[Reading], graph: &BuildingGraph) -> Result<Fix> {
        let observations = self.observe(readings);

        let (position, strategy) = match estimate_position(&observations, &self.strategy) {
            Ok(p) => (p, self.strategy.kind()),
            Err(Error::InsufficientAnchors { usable: 2, .. })
                if self.strategy.kind() == StrategyKind::Trilateration =>
            {
                debug!("Localizer: 2 anchors — falling back to weighted centroid");
                (weighted_centroid(&observations)?, StrategyKind::Centroid)
            }
            Err(e) => return Err(e),
        };

        let node = graph.nearest_node(position).to_string();
        debug!("Localizer: ({:.2}, {:.2}) → {}", position.x, position.y, node);
        Ok(Fix { position, node, observations, strategy })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::REFERENCE_BUILDING;

    fn reference() -> (Localizer, BuildingGraph) {
        let cfg = BuildingConfig::reference().unwrap();
        let graph = cfg.graph().unwrap();
        (Localizer::from_config(&cfg, &graph).unwrap(), graph)
    }

    #[test]
    fn observe_filters_and_keeps_strongest() {
        let (loc, _) = reference();
        let obs = loc.observe(&[
            Reading::new("CS_Lab", -70.0),
            Reading::new("Guest", -40.0),
            Reading::new("CS_Lab", -62.0),
            Reading::new("MITS_STAFF", -55.0),
        ]);
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].anchor, "CS_Lab");
        assert_eq!(obs[0].rssi, -62.0);
        assert_eq!(obs[1].distance, 1.0);
    }

    #[test]
    fn two_anchors_fall_back_to_centroid() {
        let (loc, graph) = reference();
        let fix = loc
            .locate(&[Reading::new("bvn s22", -55.0), Reading::new("CS_Lab", -55.0)], &graph)
            .unwrap();
        assert_eq!(fix.strategy, StrategyKind::Centroid);
        // midpoint of (1, 8) and (4, 11)
        assert!((fix.position.x - 2.5).abs() < 1e-9 && (fix.position.y - 9.5).abs() < 1e-9);
        assert_eq!(fix.node, "Balcony1");
    }

    #[test]
    fn three_anchors_trilaterate() {
        let (loc, graph) = reference();
        let truth = Point::new(5.5, 6.0);
        let readings = exact_readings(&loc, truth);
        let fix = loc.locate(&readings, &graph).unwrap();
        assert_eq!(fix.strategy, StrategyKind::Trilateration);
        // ranges are rounded to centimeters
        assert!(fix.position.distance_to(&truth) < 0.1, "got {:?}", fix.position);
    }

    fn configured(strategy: &str) -> (BuildingConfig, Localizer, BuildingGraph) {
        let src = REFERENCE_BUILDING.replace(r#"strategy = "trilateration""#, strategy);
        let cfg = BuildingConfig::from_toml_str(&src).unwrap();
        let graph = cfg.graph().unwrap();
        let loc = Localizer::from_config(&cfg, &graph).unwrap();
        (cfg, loc, graph)
    }

    fn exact_readings(loc: &Localizer, truth: Point) -> Vec<Reading> {
        let params = PathLossParams::default();
        loc.anchors()
            .iter()
            .map(|(name, p)| Reading::new(name.clone(), params.rssi_at(truth.distance_to(p))))
            .collect()
    }

    #[test]
    fn configured_particle_filter_is_seeded_and_wall_aware() {
        let (cfg, loc, graph) = configured("strategy = \"particle_filter\"\nseed = 4");
        assert_eq!(loc.strategy(), StrategyKind::ParticleFilter);
        let Strategy::ParticleFilter(pf) = &loc.strategy else {
            panic!("expected a particle filter, got {:?}", loc.strategy);
        };
        assert_eq!(pf.seed, Some(4));
        assert_eq!(pf.particles, 1000);
        assert_eq!(pf.rounds, 5);
        assert_eq!(pf.walls, cfg.walls);
        assert_eq!(Some(pf.bounds), cfg.bounds(&graph));

        let readings = exact_readings(&loc, Point::new(2.4, 7.2));
        let first = loc.locate(&readings, &graph).unwrap();
        let second = loc.locate(&readings, &graph).unwrap();
        assert_eq!(first.strategy, StrategyKind::ParticleFilter);
        assert_eq!(first.position, second.position);
        assert_eq!(first.node, second.node);
        assert_eq!(first.node, "Master Bedroom");
    }

    #[test]
    fn configured_centroid_is_reported_as_centroid() {
        let (_, loc, graph) = configured(r#"strategy = "centroid""#);
        let readings = [
            Reading::new("CS_Lab", -55.0),
            Reading::new("bvn s22", -55.0),
            Reading::new("MITS_STAFF", -55.0),
        ];
        let fix = loc.locate(&readings, &graph).unwrap();
        assert_eq!(fix.strategy, StrategyKind::Centroid);
        // equal signals: plain mean of (4, 11), (1, 8), (8, 5)
        assert!((fix.position.x - 13.0 / 3.0).abs() < 1e-9);
        assert!((fix.position.y - 8.0).abs() < 1e-9);
        assert_eq!(fix.node, "Master Bedroom");
    }

    #[test]
    fn one_anchor_is_not_enough() {
        let (loc, graph) = reference();
        let err = loc.locate(&[Reading::new("CS_Lab", -60.0)], &graph).unwrap_err();
        assert!(matches!(err, Error::InsufficientAnchors { usable: 1, required: 3 }));
        assert!(err.is_localization_failure());
    }
}
