//! main.rs — Device simulator entry point
//!
//! Drives a running backend the way a crowd of phones would:
//!   1. Places every simulated device at a random point inside the building
//!   2. Sends one synthetic Wi-Fi scan per device, all concurrently
//!   3. Reads each admitted device's stored result back
//!   4. Releases a random share of the admitted devices
//!   5. Checks the final occupancy against exit capacities

mod http_tx;
mod radio;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use egress_core::BuildingConfig;
use egress_types::{ApiResponse, Point};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::task::JoinSet;
use tracing::{info, warn};

use http_tx::BackendClient;
use radio::RadioModel;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "device-sim", about = "Egress guidance load generator")]
struct Args {
    /// Backend base URL
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    backend: String,
    /// Building description (falls back to the embedded reference building)
    #[arg(short, long, default_value = "building.toml")]
    config: PathBuf,
    /// Number of simulated devices
    #[arg(long, default_value = "100")]
    devices: usize,
    /// Share of admitted devices to release afterwards (0.0 – 1.0)
    #[arg(long, default_value = "0.5")]
    release: f64,
    /// RNG seed for placement, shadowing and release sampling
    #[arg(long)]
    seed: Option<u64>,
    /// Shadowing standard deviation, dB
    #[arg(long, default_value = "2.5")]
    noise_db: f64,
    /// Attenuation per wall crossed, dB
    #[arg(long, default_value = "3.0")]
    wall_loss_db: f64,
    /// Delay between launching device requests, ms
    #[arg(long, default_value = "0")]
    delay_ms: u64,
}

/// Same rule as the backend: only a missing file falls back to the embedded
/// reference building.
fn load_building(path: &Path) -> Result<BuildingConfig> {
    match std::fs::read_to_string(path) {
        Ok(src) => BuildingConfig::from_toml_str(&src)
            .with_context(|| format!("parsing {}", path.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No {} found, using the embedded reference building", path.display());
            Ok(BuildingConfig::reference()?)
        }
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "device_sim=info".into()),
        )
        .init();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.release) {
        bail!("--release must be between 0 and 1, got {}", args.release);
    }

    let cfg = load_building(&args.config)?;
    let graph = cfg.graph()?;
    let bounds = cfg.bounds(&graph).context("building has no extent")?;
    let radio = RadioModel::new(&cfg, args.noise_db, args.wall_loss_db)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(
        "📱 Device simulator — {} devices against {}, {} anchors, σ={}dB",
        args.devices, args.backend, cfg.anchors.len(), args.noise_db
    );

    let client = BackendClient::new(&args.backend);

    // ── 1–2. Place devices and send scans ────────────────────────────────────
    let mut tasks = JoinSet::new();
    for i in 0..args.devices {
        let tag = format!("device-{i}");
        let at = Point::new(
            rng.gen_range(bounds.min.x..=bounds.max.x),
            rng.gen_range(bounds.min.y..=bounds.max.y),
        );
        let scan = radio.scan(at, &mut rng);
        let client = client.clone();
        tasks.spawn(async move {
            let outcome = client.send_update(&tag, scan).await;
            (tag, at, outcome)
        });
        if args.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
        }
    }

    let mut admitted: Vec<String> = Vec::new();
    let mut per_exit: BTreeMap<String, usize> = BTreeMap::new();
    let mut rejected: BTreeMap<String, usize> = BTreeMap::new();
    let mut transport_errors = 0usize;

    while let Some(joined) = tasks.join_next().await {
        let (tag, at, outcome) = joined?;
        match outcome {
            Ok(ApiResponse::Success { data }) => {
                info!(
                    "{tag} at ({:.1}, {:.1}) → {} via {} [{}]",
                    at.x, at.y, data.user_location, data.assigned_exit, data.total_distance
                );
                *per_exit.entry(data.assigned_exit).or_default() += 1;
                admitted.push(tag);
            }
            Ok(ApiResponse::Failure { message }) => {
                *rejected.entry(message).or_default() += 1;
            }
            Err(e) => {
                warn!("{tag}: {e:#}");
                transport_errors += 1;
            }
        }
    }
    admitted.sort();

    // ── 3. Read results back ─────────────────────────────────────────────────
    let mut missing = 0usize;
    for tag in &admitted {
        match client.result(tag).await? {
            ApiResponse::Success { .. } => {}
            ApiResponse::Failure { message } => {
                warn!("{tag}: admitted but no stored result ({message})");
                missing += 1;
            }
        }
    }

    // ── 4. Release a random share ────────────────────────────────────────────
    let n_release = (admitted.len() as f64 * args.release).round() as usize;
    let leaving: Vec<&String> = admitted.choose_multiple(&mut rng, n_release).collect();
    let mut released = 0usize;
    for tag in leaving {
        match client.release(tag).await? {
            ApiResponse::Success { data } => {
                info!("{tag}: {data}");
                released += 1;
            }
            ApiResponse::Failure { message } => warn!("{tag}: release refused ({message})"),
        }
    }

    // ── 5. Final occupancy ───────────────────────────────────────────────────
    let state = client.state().await?.into_data().context("backend refused /state")?;
    let mut over_capacity = false;
    for (exit, occupants) in &state.exits {
        let cap = state.capacity.get(exit).copied().unwrap_or(0);
        info!("Exit {exit}: {}/{cap}", occupants.len());
        if occupants.len() > cap {
            warn!("Exit {exit} over capacity!");
            over_capacity = true;
        }
    }

    info!("── Summary ──");
    info!("admitted {} / {} ({} transport errors)", admitted.len(), args.devices, transport_errors);
    for (exit, n) in &per_exit {
        info!("  {exit}: {n}");
    }
    for (message, n) in &rejected {
        info!("  rejected ×{n}: {message}");
    }
    info!("released {released}, results missing {missing}, still inside {}", state.devices.len());

    if over_capacity {
        bail!("capacity invariant violated");
    }
    Ok(())
}
