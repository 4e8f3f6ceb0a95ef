//! position.rs — Anchor observations → 2D position
//!
//! Three interchangeable strategies:
//!   - Weighted trilateration: linearized least squares, ≥3 anchors
//!   - Weighted centroid: signal-weighted mean of anchor positions, ≥2 anchors
//!   - Monte Carlo localization: particle filter that penalizes hypotheses
//!     whose line of sight to an anchor crosses a wall
//!
//! Trilateration subtracts the reference anchor's circle equation
//!   (x − x₀)² + (y − y₀)² = d₀²
//! from every other anchor's, leaving one linear row per anchor i:
//!   2(xᵢ − x₀)·x + 2(yᵢ − y₀)·y = d₀² − dᵢ² + xᵢ² − x₀² + yᵢ² − y₀²
//! which is solved through the 2×2 weighted normal equations AᵀWA·p = AᵀWb.

use egress_types::Point;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::{Bounds, Wall};

/// Keeps very weak anchors in the trilateration system instead of zeroing their row.
const MIN_ROW_WEIGHT: f64 = 0.05;
/// Added to the particle error so an exact hypothesis does not divide by zero.
const PARTICLE_EPSILON: f64 = 1e-6;
/// Relative determinant below which the normal matrix is treated as singular.
const SINGULAR_RATIO: f64 = 1e-10;

// ── Types ─────────────────────────────────────────────────────────────────────

/// One reading joined with its anchor's position and range estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub anchor: String,
    pub position: Point,
    pub rssi: f64,
    /// Estimated range to the anchor, meters
    pub distance: f64,
}

impl Observation {
    pub fn new(anchor: impl Into<String>, position: Point, rssi: f64, distance: f64) -> Self {
        Self { anchor: anchor.into(), position, rssi, distance }
    }

    pub fn signal_weight(&self) -> f64 { signal_weight(self.rssi) }
}

/// Linear rescale of RSSI over [-100, -50] dBm into [0, 1].
pub fn signal_weight(rssi: f64) -> f64 {
    ((rssi + 100.0) / 50.0).clamp(0.0, 1.0)
}

/// Strategy selector as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Trilateration,
    Centroid,
    ParticleFilter,
}

#[derive(Debug, Clone)]
pub struct ParticleFilterConfig {
    pub particles: usize,
    pub rounds: usize,
    pub bounds: Bounds,
    pub walls: Vec<Wall>,
    /// Fixed seed for reproducible runs; fresh entropy when `None`
    pub seed: Option<u64>,
}

impl ParticleFilterConfig {
    pub fn new(bounds: Bounds) -> Self {
        Self { particles: 1000, rounds: 5, bounds, walls: Vec::new(), seed: None }
    }
}

#[derive(Debug, Clone)]
pub enum Strategy {
    Trilateration,
    Centroid,
    ParticleFilter(ParticleFilterConfig),
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Trilateration => StrategyKind::Trilateration,
            Self::Centroid => StrategyKind::Centroid,
            Self::ParticleFilter(_) => StrategyKind::ParticleFilter,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

pub fn estimate_position(observations: &[Observation], strategy: &Strategy) -> Result<Point> {
    match strategy {
        Strategy::Trilateration => trilaterate(observations),
        Strategy::Centroid => weighted_centroid(observations),
        Strategy::ParticleFilter(cfg) => particle_filter(observations, cfg),
    }
}

fn has_usable_range(o: &Observation) -> bool {
    o.distance.is_finite() && o.distance > 0.0 && o.position.is_finite()
}

// ── Weighted trilateration ────────────────────────────────────────────────────

pub fn trilaterate(observations: &[Observation]) -> Result<Point> {
    let usable: Vec<&Observation> = observations.iter().filter(|o| has_usable_range(o)).collect();
    if usable.len() < 3 {
        return Err(Error::InsufficientAnchors { usable: usable.len(), required: 3 });
    }

    let reference = usable[0];
    let (x0, y0, d0) = (reference.position.x, reference.position.y, reference.distance);

    let mut atwa = [[0.0f64; 2]; 2];
    let mut atwb = [0.0f64; 2];

    for o in &usable[1..] {
        let (xi, yi, di) = (o.position.x, o.position.y, o.distance);
        let ax = 2.0 * (xi - x0);
        let ay = 2.0 * (yi - y0);
        let b = d0 * d0 - di * di + xi * xi - x0 * x0 + yi * yi - y0 * y0;
        let w = o.signal_weight().max(MIN_ROW_WEIGHT);

        atwa[0][0] += w * ax * ax;
        atwa[0][1] += w * ax * ay;
        atwa[1][0] += w * ay * ax;
        atwa[1][1] += w * ay * ay;
        atwb[0] += w * ax * b;
        atwb[1] += w * ay * b;
    }

    // Cramer's rule on the 2×2 normal matrix
    let det = atwa[0][0] * atwa[1][1] - atwa[0][1] * atwa[1][0];
    let scale = atwa[0][0] * atwa[1][1];
    if scale <= 0.0 || det.abs() <= SINGULAR_RATIO * scale {
        return Err(Error::DegenerateGeometry);
    }
    let x = (atwa[1][1] * atwb[0] - atwa[0][1] * atwb[1]) / det;
    let y = (atwa[0][0] * atwb[1] - atwa[1][0] * atwb[0]) / det;

    let p = Point::new(x, y);
    if !p.is_finite() {
        return Err(Error::DegenerateGeometry);
    }
    debug!("Trilateration: {} anchors → ({:.2}, {:.2})", usable.len(), x, y);
    Ok(p)
}

// ── Weighted centroid ─────────────────────────────────────────────────────────

pub fn weighted_centroid(observations: &[Observation]) -> Result<Point> {
    let usable: Vec<(&Observation, f64)> = observations
        .iter()
        .filter(|o| has_usable_range(o))
        .map(|o| (o, o.signal_weight()))
        .filter(|&(_, w)| w > 0.0)
        .collect();
    if usable.len() < 2 {
        return Err(Error::InsufficientAnchors { usable: usable.len(), required: 2 });
    }

    let (sx, sy, sw) = usable.iter().fold((0.0, 0.0, 0.0), |(sx, sy, sw), (o, w)| {
        (sx + o.position.x * w, sy + o.position.y * w, sw + w)
    });
    let p = Point::new(sx / sw, sy / sw);
    debug!("Centroid: {} anchors, Σw={:.3} → ({:.2}, {:.2})", usable.len(), sw, p.x, p.y);
    Ok(p)
}

// ── Monte Carlo localization ──────────────────────────────────────────────────

/// Absolute range error of one hypothesis summed over all anchors.
/// A wall between the hypothesis and an anchor makes the error infinite.
fn particle_error(p: &Point, observations: &[&Observation], walls: &[Wall]) -> f64 {
    observations
        .iter()
        .map(|o| {
            let expected = if walls.iter().any(|w| w.blocks(p, &o.position)) {
                f64::INFINITY
            } else {
                p.distance_to(&o.position)
            };
            (expected - o.distance).abs()
        })
        .sum()
}

pub fn particle_filter(observations: &[Observation], cfg: &ParticleFilterConfig) -> Result<Point> {
    let usable: Vec<&Observation> = observations
        .iter()
        .filter(|o| o.distance.is_finite() && o.distance >= 0.0 && o.position.is_finite())
        .collect();
    if usable.is_empty() {
        return Err(Error::InsufficientAnchors { usable: 0, required: 1 });
    }

    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let n = cfg.particles.max(1);
    let Bounds { min, max } = cfg.bounds;
    let mut particles: Vec<Point> = (0..n)
        .map(|_| Point::new(rng.gen_range(min.x..=max.x), rng.gen_range(min.y..=max.y)))
        .collect();

    for round in 0..cfg.rounds {
        let mut weights: Vec<f64> = particles
            .iter()
            .map(|p| 1.0 / (particle_error(p, &usable, &cfg.walls) + PARTICLE_EPSILON))
            .collect();

        let total: f64 = weights.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            debug!("MCL round {round}: every hypothesis is blocked — keeping particles");
            continue;
        }
        weights.iter_mut().for_each(|w| *w /= total);

        let picker = match WeightedIndex::new(&weights) {
            Ok(d) => d,
            Err(e) => {
                debug!("MCL round {round}: resampling skipped ({e})");
                continue;
            }
        };
        particles = (0..n).map(|_| particles[picker.sample(&mut rng)]).collect();
    }

    let (sx, sy) = particles.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let mean = Point::new(sx / n as f64, sy / n as f64);
    debug!("MCL: {} particles × {} rounds → ({:.2}, {:.2})", n, cfg.rounds, mean.x, mean.y);
    Ok(mean)
}
