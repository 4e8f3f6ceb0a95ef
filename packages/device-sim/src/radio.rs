//! radio.rs — Synthetic Wi-Fi scans
//!
//! What a phone at a known position would report for each anchor:
//!   1. Noiseless RSSI from the inverted log-distance path-loss model
//!   2. A fixed attenuation per wall crossed on the direct line to the anchor
//!   3. Log-normal shadowing (Gaussian in dB)
//!   4. Rounded to whole dBm, as handsets report it

use egress_core::{BuildingConfig, PathLossParams, Wall};
use egress_types::{Point, WifiDevice};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Closer than this the model is not meaningful; readings saturate.
const MIN_RANGE_M: f64 = 0.1;

pub struct RadioModel {
    anchors: Vec<(String, Point)>,
    path_loss: PathLossParams,
    walls: Vec<Wall>,
    shadowing: Option<Normal<f64>>,
    wall_loss_db: f64,
}

impl RadioModel {
    /// `noise_db` is the shadowing standard deviation; 0 disables it.
    pub fn new(cfg: &BuildingConfig, noise_db: f64, wall_loss_db: f64) -> anyhow::Result<Self> {
        let shadowing = if noise_db > 0.0 { Some(Normal::new(0.0, noise_db)?) } else { None };
        Ok(Self {
            anchors: cfg.anchor_positions().into_iter().collect(),
            path_loss: cfg.path_loss,
            walls: cfg.walls.clone(),
            shadowing,
            wall_loss_db,
        })
    }

    /// RSSI at `at` from one anchor before shadowing.
    pub fn mean_rssi(&self, at: Point, anchor: Point) -> f64 {
        let range = at.distance_to(&anchor).max(MIN_RANGE_M);
        let crossed = self.walls.iter().filter(|w| w.blocks(&at, &anchor)).count();
        self.path_loss.rssi_at(range) - self.wall_loss_db * crossed as f64
    }

    /// One scan: every anchor, in name order.
    pub fn scan(&self, at: Point, rng: &mut impl Rng) -> Vec<WifiDevice> {
        self.anchors
            .iter()
            .map(|(name, pos)| {
                let noise = self.shadowing.map(|n| n.sample(rng)).unwrap_or(0.0);
                WifiDevice::new(name.clone(), (self.mean_rssi(at, *pos) + noise).round())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model(noise_db: f64) -> RadioModel {
        RadioModel::new(&BuildingConfig::reference().unwrap(), noise_db, 4.0).unwrap()
    }

    #[test]
    fn one_meter_reads_reference_rssi() {
        let m = model(0.0);
        let anchor = Point::new(4.0, 11.0);
        assert!((m.mean_rssi(Point::new(4.0, 10.0), anchor) - -55.0).abs() < 1e-9);
    }

    #[test]
    fn walls_attenuate() {
        let m = model(0.0);
        // reference wall (2,2)–(4,4) sits between these two points
        let (a, b) = (Point::new(2.0, 4.0), Point::new(4.0, 2.0));
        let clear = m.path_loss.rssi_at(a.distance_to(&b));
        assert!((m.mean_rssi(a, b) - (clear - 4.0)).abs() < 1e-9);
    }

    #[test]
    fn scan_reports_every_anchor_as_whole_dbm() {
        let m = model(2.5);
        let mut rng = StdRng::seed_from_u64(3);
        let scan = m.scan(Point::new(5.0, 5.0), &mut rng);
        assert_eq!(scan.len(), 3);
        for dev in &scan {
            let r = dev.reading().unwrap();
            assert_eq!(r.rssi, r.rssi.round());
        }
    }
}
