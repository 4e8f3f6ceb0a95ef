//! routing.rs — Shortest safe path (A*)
//!
//! The search is stateless: the set of segments excluded from routing is
//! passed in. `UnsafeSegments` is the shared, grow-only store the backend
//! marks segments in; every route request clones its current contents so no
//! lock is held across a search.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashSet};

use egress_types::SegmentPair;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::graph::BuildingGraph;

// ── Unsafe segments ───────────────────────────────────────────────────────────

/// Unordered pair of node names, stored with the smaller name first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment {
    a: String,
    b: String,
}

impl Segment {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b { Self { a, b } } else { Self { a: b, b: a } }
    }

    pub fn endpoints(&self) -> (&str, &str) { (&self.a, &self.b) }
}

impl From<&Segment> for SegmentPair {
    fn from(s: &Segment) -> Self {
        SegmentPair { from: s.a.clone(), to: s.b.clone() }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentSet {
    segments: BTreeSet<Segment>,
}

impl SegmentSet {
    pub fn new() -> Self { Self::default() }

    /// Returns false if the pair was already present (in either orientation).
    pub fn insert(&mut self, a: &str, b: &str) -> bool {
        self.segments.insert(Segment::new(a, b))
    }

    pub fn contains(&self, a: &str, b: &str) -> bool {
        self.segments.contains(&Segment::new(a, b))
    }

    pub fn len(&self) -> usize { self.segments.len() }
    pub fn is_empty(&self) -> bool { self.segments.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &Segment> { self.segments.iter() }

    pub fn to_pairs(&self) -> Vec<SegmentPair> {
        self.segments.iter().map(SegmentPair::from).collect()
    }
}

/// Process-wide set of segments reported unsafe. Only ever grows.
#[derive(Debug, Default)]
pub struct UnsafeSegments {
    inner: RwLock<SegmentSet>,
}

impl UnsafeSegments {
    pub fn new() -> Self { Self::default() }

    /// Exclude the edge a–b from all future routes. The nodes must be adjacent.
    /// Returns false if the segment was already marked.
    pub fn mark(&self, graph: &BuildingGraph, a: &str, b: &str) -> Result<bool> {
        if graph.edge_weight(a, b).is_none() {
            return Err(Error::UnknownSegment { a: a.to_string(), b: b.to_string() });
        }
        let added = self.inner.write().insert(a, b);
        if added {
            info!("Routing: segment {} ↔ {} marked unsafe", a, b);
        }
        Ok(added)
    }

    pub fn snapshot(&self) -> SegmentSet { self.inner.read().clone() }

    pub fn len(&self) -> usize { self.inner.read().len() }
    pub fn is_empty(&self) -> bool { self.inner.read().is_empty() }
}

// ── A* ────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub path: Vec<String>,
    /// Sum of traversed edge weights, meters
    pub total_distance: f64,
}

/// Frontier entry ordered so `BinaryHeap` pops the smallest `f` first.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    f: f64,
    g: f64,
    node: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed for a min-heap; lower node index first on equal f
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

/// Minimum-weight path from `start` to `goal` that uses none of the
/// `excluded` segments.
pub fn route(
    graph: &BuildingGraph,
    start: &str,
    goal: &str,
    excluded: &SegmentSet,
) -> Result<Route> {
    let s = graph.index_of(start).ok_or_else(|| Error::UnknownNode(start.to_string()))?;
    let t = graph.index_of(goal).ok_or_else(|| Error::UnknownNode(goal.to_string()))?;

    if s == t {
        return Ok(Route { path: vec![start.to_string()], total_distance: 0.0 });
    }

    // Names → indices once, so the inner loop compares integers.
    let blocked: HashSet<(usize, usize)> = excluded
        .iter()
        .filter_map(|seg| {
            let (a, b) = seg.endpoints();
            let (i, j) = (graph.index_of(a)?, graph.index_of(b)?);
            Some((i.min(j), i.max(j)))
        })
        .collect();

    let target = graph.node(t).coords;
    let scale = graph.heuristic_scale();
    let h = |i: usize| graph.node(i).coords.distance_to(&target) * scale;

    let n = graph.len();
    let mut g_score = vec![f64::INFINITY; n];
    let mut came_from: Vec<Option<usize>> = vec![None; n];
    let mut heap = BinaryHeap::new();

    g_score[s] = 0.0;
    heap.push(Frontier { f: h(s), g: 0.0, node: s });

    while let Some(Frontier { g, node, .. }) = heap.pop() {
        if node == t {
            let path = reconstruct(graph, &came_from, t);
            debug!("A*: {} → {} via {} nodes, {:.2}m", start, goal, path.len(), g);
            return Ok(Route { path, total_distance: g });
        }
        if g > g_score[node] {
            continue; // stale entry
        }

        for &(next, weight) in &graph.node(node).edges {
            if blocked.contains(&(node.min(next), node.max(next))) {
                continue;
            }
            let tentative = g + weight;
            if tentative < g_score[next] {
                g_score[next] = tentative;
                came_from[next] = Some(node);
                heap.push(Frontier { f: tentative + h(next), g: tentative, node: next });
            }
        }
    }

    Err(Error::NoPathFound { from: start.to_string(), to: goal.to_string() })
}

fn reconstruct(graph: &BuildingGraph, came_from: &[Option<usize>], goal: usize) -> Vec<String> {
    let mut path = vec![graph.node(goal).name.clone()];
    let mut cur = goal;
    while let Some(prev) = came_from[cur] {
        path.push(graph.node(prev).name.clone());
        cur = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::graph::NodeSpec;

    /// A 2×3 grid where the direct bottom row is cheap and the top row costly.
    fn ladder() -> BuildingGraph {
        let specs: BTreeMap<String, NodeSpec> = toml::from_str(
            r#"
            [A]
            coords = [0.0, 0.0]
            connections = { B = 1.0, D = 1.0 }
            [B]
            coords = [1.0, 0.0]
            connections = { A = 1.0, C = 1.0, E = 1.0 }
            [C]
            coords = [2.0, 0.0]
            connections = { B = 1.0, F = 1.0 }
            [D]
            coords = [0.0, 1.0]
            connections = { A = 1.0, E = 2.0 }
            [E]
            coords = [1.0, 1.0]
            connections = { D = 2.0, B = 1.0, F = 2.0 }
            [F]
            coords = [2.0, 1.0]
            connections = { E = 2.0, C = 1.0 }
            "#,
        )
        .unwrap();
        BuildingGraph::from_specs(&specs).unwrap()
    }

    fn path_cost(graph: &BuildingGraph, path: &[String]) -> f64 {
        path.windows(2).map(|w| graph.edge_weight(&w[0], &w[1]).unwrap()).sum()
    }

    #[test]
    fn finds_cheapest_path() {
        let g = ladder();
        let r = route(&g, "A", "F", &SegmentSet::new()).unwrap();
        assert_eq!(r.path, vec!["A", "B", "C", "F"]);
        assert_eq!(r.total_distance, 3.0);
        assert_eq!(path_cost(&g, &r.path), r.total_distance);
    }

    #[test]
    fn excluded_segment_is_never_used() {
        let g = ladder();
        let mut excluded = SegmentSet::new();
        // reversed orientation still excludes B–C
        excluded.insert("C", "B");
        let r = route(&g, "A", "F", &excluded).unwrap();
        assert!(r.path.windows(2).all(|w| !excluded.contains(&w[0], &w[1])));
        assert_eq!(r.total_distance, 4.0);
        assert_eq!(path_cost(&g, &r.path), r.total_distance);
    }

    #[test]
    fn fully_cut_goal_has_no_path() {
        let g = ladder();
        let mut excluded = SegmentSet::new();
        excluded.insert("C", "F");
        excluded.insert("E", "F");
        assert!(matches!(
            route(&g, "A", "F", &excluded),
            Err(Error::NoPathFound { from, to }) if from == "A" && to == "F"
        ));
    }

    #[test]
    fn trivial_and_unknown_endpoints() {
        let g = ladder();
        let r = route(&g, "E", "E", &SegmentSet::new()).unwrap();
        assert_eq!(r.path, vec!["E"]);
        assert_eq!(r.total_distance, 0.0);
        assert!(matches!(
            route(&g, "A", "Roof", &SegmentSet::new()),
            Err(Error::UnknownNode(n)) if n == "Roof"
        ));
    }

    #[test]
    fn segment_set_is_orientation_free() {
        let mut set = SegmentSet::new();
        assert!(set.insert("Kitchen", "Dining Space"));
        assert!(!set.insert("Dining Space", "Kitchen"));
        assert!(set.contains("Kitchen", "Dining Space"));
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.to_pairs(),
            vec![SegmentPair { from: "Dining Space".into(), to: "Kitchen".into() }]
        );
    }

    #[test]
    fn marking_requires_adjacent_nodes() {
        let g = ladder();
        let unsafe_segments = UnsafeSegments::new();
        assert!(unsafe_segments.mark(&g, "A", "B").unwrap());
        assert!(!unsafe_segments.mark(&g, "B", "A").unwrap());
        assert!(matches!(unsafe_segments.mark(&g, "A", "F"), Err(Error::UnknownSegment { .. })));
        assert_eq!(unsafe_segments.len(), 1);
        assert!(unsafe_segments.snapshot().contains("A", "B"));
    }
}
