//! distance.rs — RSSI → range conversion
//!
//! Log-distance path-loss model:
//!   d = d_ref · 10^(-(rssi − rssi_ref) / (10·n))
//!
//! The uncertainty band re-applies the model with the reading shifted by ±2σ
//! (≈95% of log-normal shadowing). Nothing is clamped: a very weak reading
//! yields a very large distance.

use serde::{Deserialize, Serialize};

/// Path-loss model parameters (`[path_loss]` in the building config).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathLossParams {
    /// Reference distance, meters
    pub d_ref: f64,
    /// RSSI measured at `d_ref`, dBm
    pub rssi_ref: f64,
    /// Path-loss exponent (2.0 = free space)
    pub exponent: f64,
    /// Shadowing standard deviation, dB
    pub sigma: f64,
}

impl Default for PathLossParams {
    fn default() -> Self {
        Self {
            d_ref: 1.0,
            rssi_ref: -55.0,
            exponent: 2.0,
            sigma: 2.5,
        }
    }
}

impl PathLossParams {
    /// Unrounded model distance for one reading.
    pub fn distance(&self, rssi: f64) -> f64 {
        self.d_ref * 10f64.powf(-(rssi - self.rssi_ref) / (10.0 * self.exponent))
    }

    /// Inverse model: the noiseless RSSI expected at `distance` meters.
    pub fn rssi_at(&self, distance: f64) -> f64 {
        self.rssi_ref - 10.0 * self.exponent * (distance / self.d_ref).log10()
    }
}

/// Range estimate with a 2σ band, all in meters rounded to centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceEstimate {
    pub d_est: f64,
    pub d_min: f64,
    pub d_max: f64,
}

pub fn estimate_distance(rssi: f64, params: &PathLossParams) -> DistanceEstimate {
    let band = 2.0 * params.sigma;
    DistanceEstimate {
        d_est: round2(params.distance(rssi)),
        // stronger than measured → closer
        d_min: round2(params.distance(rssi + band)),
        d_max: round2(params.distance(rssi - band)),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
