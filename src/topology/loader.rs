use super::types::{Topology, TopologyConfig};

use anyhow::{Context, Result};
use std::path::Path;

/// Reads the topology file and selects the local node by name.
pub fn load_topology(path: impl AsRef<Path>, local_name: &str) -> Result<Topology> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read topology file {}", path.display()))?;

    let topology = parse_topology(&raw, local_name)?;

    tracing::info!(
        "Loaded topology from {}: {} groups, {} nodes, local node {} (group {})",
        path.display(),
        topology.group_count(),
        topology.nodes().len(),
        topology.local_node().name,
        topology.local_node().group
    );

    Ok(topology)
}

pub fn parse_topology(raw: &str, local_name: &str) -> Result<Topology> {
    let config: TopologyConfig =
        serde_json::from_str(raw).context("topology file is not valid JSON")?;
    let topology = Topology::from_config(config, local_name)?;
    Ok(topology)
}
