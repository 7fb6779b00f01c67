//! Columnar stage artifacts.
//!
//! Each pipeline stage persists its complete output as one CSV file, one row
//! per entity, written only after the stage has fully computed its result.
//! There is no partial-write recovery: a failed run leaves no file for that
//! stage and is re-run from the last successful stage's output, which is why
//! readers exist for the intermediate artifacts too.
//!
//! Cluster ids use the string convention (`"-1"` for noise) in every file.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::types::{ClusteredPackage, ClusterLabel, ClusterMetadata, ConstellationEdge};

fn write_rows<T: Serialize>(path: &Path, rows: &[T], what: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(crate::error::Error::from)?;
    info!(path = %path.display(), rows = rows.len(), "wrote {what}");
    Ok(())
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Write the clustered dataset
/// (`name,weekly_downloads,summary,cluster_id,x,y`).
pub fn write_clustered_dataset(path: &Path, packages: &[ClusteredPackage]) -> Result<()> {
    write_rows(path, packages, "clustered dataset")
}

/// Read a clustered dataset written by [`write_clustered_dataset`].
pub fn read_clustered_dataset(path: &Path) -> Result<Vec<ClusteredPackage>> {
    read_rows(path)
}

/// Write per-cluster metadata.
pub fn write_cluster_metadata(path: &Path, metadata: &[ClusterMetadata]) -> Result<()> {
    write_rows(path, metadata, "cluster metadata")
}

/// Read cluster metadata written by [`write_cluster_metadata`].
pub fn read_cluster_metadata(path: &Path) -> Result<Vec<ClusterMetadata>> {
    read_rows(path)
}

/// Write the constellation edge list.
pub fn write_constellations(path: &Path, edges: &[ConstellationEdge]) -> Result<()> {
    write_rows(path, edges, "constellation edges")
}

/// Read constellation edges written by [`write_constellations`].
pub fn read_constellations(path: &Path) -> Result<Vec<ConstellationEdge>> {
    read_rows(path)
}

/// Write cluster labels.
pub fn write_cluster_labels(path: &Path, labels: &[ClusterLabel]) -> Result<()> {
    write_rows(path, labels, "cluster labels")
}

/// Read cluster labels written by [`write_cluster_labels`].
pub fn read_cluster_labels(path: &Path) -> Result<Vec<ClusterLabel>> {
    read_rows(path)
}
