//! graph.rs — Building topology
//!
//! Nodes are rooms / corridor points with a coordinate; edges are walkable
//! connections weighted in meters. The graph is validated once at load time
//! and is immutable afterwards, so it is shared as `Arc<BuildingGraph>`.
//!
//! Node order is lexicographic by name. Everything that iterates nodes
//! (nearest-node lookup, validation messages) is therefore deterministic.

use std::collections::{BTreeMap, HashMap, VecDeque};

use egress_types::Point;
use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};

/// Weights of the two directions of one edge may differ by this much.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

// ── Configuration form ────────────────────────────────────────────────────────

/// One `[nodes."Name"]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub coords: [f64; 2],
    #[serde(default)]
    pub connections: BTreeMap<String, f64>,
}

// ── Validated graph ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub coords: Point,
    /// (neighbor index, weight in meters)
    pub edges: Vec<(usize, f64)>,
}

#[derive(Debug, Clone)]
pub struct BuildingGraph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    heuristic_scale: f64,
}

impl BuildingGraph {
    /// Build and validate a graph from its configuration tables.
    pub fn from_specs(specs: &BTreeMap<String, NodeSpec>) -> Result<Self> {
        if specs.is_empty() {
            return Err(Error::InvalidGraph("graph has no nodes".into()));
        }

        let index: HashMap<String, usize> = specs
            .keys()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut nodes = Vec::with_capacity(specs.len());
        for (name, spec) in specs {
            let coords = Point::from(spec.coords);
            if !coords.is_finite() {
                return Err(Error::InvalidGraph(format!("{name}: coordinates must be finite")));
            }

            let mut edges = Vec::with_capacity(spec.connections.len());
            for (neighbor, &weight) in &spec.connections {
                if neighbor == name {
                    return Err(Error::InvalidGraph(format!("{name}: connects to itself")));
                }
                let j = *index.get(neighbor).ok_or_else(|| {
                    Error::InvalidGraph(format!("{name}: connection to unknown node {neighbor}"))
                })?;
                if !(weight.is_finite() && weight > 0.0) {
                    return Err(Error::InvalidGraph(format!(
                        "{name} → {neighbor}: weight {weight} must be a positive real"
                    )));
                }
                let back = specs[neighbor].connections.get(name).copied();
                match back {
                    Some(w) if (w - weight).abs() <= SYMMETRY_TOLERANCE => {}
                    Some(w) => {
                        return Err(Error::InvalidGraph(format!(
                            "{name} ↔ {neighbor}: asymmetric weights {weight} / {w}"
                        )))
                    }
                    None => {
                        return Err(Error::InvalidGraph(format!(
                            "{name} → {neighbor}: missing reverse connection"
                        )))
                    }
                }
                edges.push((j, weight));
            }

            nodes.push(Node { name: name.clone(), coords, edges });
        }

        let mut graph = Self { nodes, index, heuristic_scale: 1.0 };
        graph.heuristic_scale = graph.audit_heuristic();
        graph.audit_connectivity();
        Ok(graph)
    }

    /// Warn about every edge shorter than the straight line between its
    /// endpoints and return the factor that keeps the A* heuristic admissible.
    fn audit_heuristic(&self) -> f64 {
        let mut scale = 1.0f64;
        for (i, node) in self.nodes.iter().enumerate() {
            for &(j, weight) in &node.edges {
                if j < i {
                    continue; // each undirected edge once
                }
                let straight = node.coords.distance_to(&self.nodes[j].coords);
                if straight > 0.0 && weight < straight {
                    warn!(
                        "Graph: edge {} ↔ {} weighs {:.2}m but endpoints are {:.2}m apart — heuristic scaled down",
                        node.name, self.nodes[j].name, weight, straight
                    );
                    scale = scale.min(weight / straight);
                }
            }
        }
        scale
    }

    fn audit_connectivity(&self) {
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([0usize]);
        seen[0] = true;
        while let Some(i) = queue.pop_front() {
            for &(j, _) in &self.nodes[i].edges {
                if !seen[j] {
                    seen[j] = true;
                    queue.push_back(j);
                }
            }
        }
        let unreachable: Vec<&str> = self
            .nodes
            .iter()
            .zip(&seen)
            .filter(|(_, reached)| !**reached)
            .map(|(n, _)| n.name.as_str())
            .collect();
        if !unreachable.is_empty() {
            warn!(
                "Graph: not connected — unreachable from {}: {:?}",
                self.nodes[0].name, unreachable
            );
        }
    }

    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn index_of(&self, name: &str) -> Option<usize> { self.index.get(name).copied() }
    pub fn node(&self, idx: usize) -> &Node { &self.nodes[idx] }
    pub fn nodes(&self) -> impl Iterator<Item = &Node> { self.nodes.iter() }

    pub fn coords(&self, name: &str) -> Option<Point> {
        self.index_of(name).map(|i| self.nodes[i].coords)
    }

    /// Weight of the direct edge a–b, if one exists.
    pub fn edge_weight(&self, a: &str, b: &str) -> Option<f64> {
        let (i, j) = (self.index_of(a)?, self.index_of(b)?);
        self.nodes[i].edges.iter().find(|&&(n, _)| n == j).map(|&(_, w)| w)
    }

    /// Multiplier (≤ 1) applied to straight-line distance in the A* heuristic.
    pub fn heuristic_scale(&self) -> f64 { self.heuristic_scale }

    /// Name of the node closest to `point`. The first minimizer in node order
    /// wins a tie.
    pub fn nearest_node(&self, point: Point) -> &str {
        // non-empty by construction
        let mut best = &self.nodes[0];
        let mut best_dist = point.distance_to(&best.coords);
        for node in &self.nodes[1..] {
            let d = point.distance_to(&node.coords);
            if d < best_dist {
                best = node;
                best_dist = d;
            }
        }
        &best.name
    }
}

/// Snap a continuous position onto the building graph.
pub fn nearest_node(point: Point, graph: &BuildingGraph) -> &str {
    graph.nearest_node(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(src: &str) -> BTreeMap<String, NodeSpec> {
        toml::from_str(src).unwrap()
    }

    const SQUARE: &str = r#"
        [A]
        coords = [0.0, 0.0]
        connections = { B = 1.0, D = 1.0 }
        [B]
        coords = [1.0, 0.0]
        connections = { A = 1.0, C = 1.0 }
        [C]
        coords = [1.0, 1.0]
        connections = { B = 1.0, D = 1.0 }
        [D]
        coords = [0.0, 1.0]
        connections = { C = 1.0, A = 1.0 }
    "#;

    #[test]
    fn builds_sorted_graph() {
        let g = BuildingGraph::from_specs(&specs(SQUARE)).unwrap();
        assert_eq!(g.len(), 4);
        assert_eq!(g.node(0).name, "A");
        assert_eq!(g.edge_weight("C", "D"), Some(1.0));
        assert_eq!(g.edge_weight("A", "C"), None);
        assert_eq!(g.heuristic_scale(), 1.0);
    }

    #[test]
    fn rejects_asymmetric_weights() {
        let src = SQUARE.replace(
            "connections = { C = 1.0, A = 1.0 }",
            "connections = { C = 1.0, A = 2.0 }",
        );
        let err = BuildingGraph::from_specs(&specs(&src)).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(msg) if msg.contains("asymmetric")));
    }

    #[test]
    fn rejects_dangling_and_non_positive_edges() {
        let dangling = SQUARE.replace("{ B = 1.0, D = 1.0 }", "{ B = 1.0, D = 1.0, Z = 1.0 }");
        assert!(matches!(
            BuildingGraph::from_specs(&specs(&dangling)),
            Err(Error::InvalidGraph(msg)) if msg.contains("unknown node Z")
        ));

        let negative = r#"
            [A]
            coords = [0.0, 0.0]
            connections = { B = -1.0 }
            [B]
            coords = [1.0, 0.0]
            connections = { A = -1.0 }
        "#;
        assert!(matches!(BuildingGraph::from_specs(&specs(negative)), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn rejects_missing_reverse_and_empty() {
        let one_way = r#"
            [A]
            coords = [0.0, 0.0]
            connections = { B = 1.0 }
            [B]
            coords = [1.0, 0.0]
        "#;
        assert!(matches!(
            BuildingGraph::from_specs(&specs(one_way)),
            Err(Error::InvalidGraph(msg)) if msg.contains("missing reverse")
        ));
        assert!(BuildingGraph::from_specs(&BTreeMap::new()).is_err());
    }

    #[test]
    fn short_edges_scale_heuristic() {
        // A–B is 4m apart on the plan but only 2m to walk
        let src = r#"
            [A]
            coords = [0.0, 0.0]
            connections = { B = 2.0 }
            [B]
            coords = [4.0, 0.0]
            connections = { A = 2.0 }
        "#;
        let g = BuildingGraph::from_specs(&specs(src)).unwrap();
        assert!((g.heuristic_scale() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn nearest_node_picks_closest_and_first_on_tie() {
        let g = BuildingGraph::from_specs(&specs(SQUARE)).unwrap();
        assert_eq!(nearest_node(Point::new(0.9, 0.8), &g), "C");
        // equidistant from all four corners
        assert_eq!(nearest_node(Point::new(0.5, 0.5), &g), "A");
    }
}
