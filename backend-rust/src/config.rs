use std::path::Path;

use anyhow::{Context, Result};
use egress_core::BuildingConfig;
use tokio::fs;
use tracing::info;

/// Load the building description. A missing file falls back to the embedded
/// reference building; an unreadable or invalid file is fatal.
pub async fn load_building(path: &Path) -> Result<BuildingConfig> {
    if !path.exists() {
        info!("No {} found, using the embedded reference building", path.display());
        return Ok(BuildingConfig::reference()?);
    }

    let src = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let cfg = BuildingConfig::from_toml_str(&src)
        .with_context(|| format!("parsing {}", path.display()))?;
    info!(
        "Loaded {} ({} nodes, {} anchors, {} exits, strategy {:?})",
        path.display(),
        cfg.nodes.len(),
        cfg.anchors.len(),
        cfg.exits.len(),
        cfg.localization.strategy
    );
    Ok(cfg)
}
