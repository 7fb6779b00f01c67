//! Presentation-layer JSON documents.
//!
//! Joins the pipeline outputs by cluster id and package name into the three
//! documents the map front end consumes: a package list, a cluster list, and
//! an edge list. Package names are resolved to integer ids through the
//! name→id map built while emitting the package list (ids are row positions
//! in the clustered dataset).

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{
    ClusteredPackage, ClusterId, ClusterLabel, ClusterMetadata, ConstellationEdge,
};

/// One package row for the front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDoc {
    /// Integer id: the package's row position.
    pub id: usize,
    /// Package name.
    pub name: String,
    /// Summary text.
    pub summary: String,
    /// Weekly downloads.
    pub downloads: u64,
    /// Plot x coordinate.
    pub x: f32,
    /// Plot y coordinate.
    pub y: f32,
    /// Cluster id, string convention.
    pub cluster_id: ClusterId,
}

/// One cluster row for the front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDoc {
    /// Cluster id, string convention.
    pub cluster_id: ClusterId,
    /// Human-readable label.
    pub label: String,
    /// Centroid x.
    pub centroid_x: f32,
    /// Centroid y.
    pub centroid_y: f32,
    /// Total weekly downloads over members.
    pub downloads: u64,
    /// Bounding box minimum x.
    pub min_x: f32,
    /// Bounding box maximum x.
    pub max_x: f32,
    /// Bounding box minimum y.
    pub min_y: f32,
    /// Bounding box maximum y.
    pub max_y: f32,
}

/// One constellation edge for the front end, endpoints as integer ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDoc {
    /// Cluster id, string convention.
    pub cluster_id: ClusterId,
    /// Source package id.
    pub from_id: usize,
    /// Target package id.
    pub to_id: usize,
    /// Source x coordinate.
    pub from_x: f32,
    /// Source y coordinate.
    pub from_y: f32,
    /// Target x coordinate.
    pub to_x: f32,
    /// Target y coordinate.
    pub to_y: f32,
}

/// Build the package list plus the name→id map used for edge resolution.
pub fn package_docs(
    packages: &[ClusteredPackage],
) -> (Vec<PackageDoc>, HashMap<String, usize>) {
    let mut name_to_id = HashMap::with_capacity(packages.len());
    let docs = packages
        .iter()
        .enumerate()
        .map(|(id, pkg)| {
            name_to_id.insert(pkg.name.clone(), id);
            PackageDoc {
                id,
                name: pkg.name.clone(),
                summary: pkg.summary.clone(),
                downloads: pkg.weekly_downloads,
                x: pkg.x,
                y: pkg.y,
                cluster_id: pkg.cluster_id,
            }
        })
        .collect();
    (docs, name_to_id)
}

/// Join metadata with labels into the cluster list.
///
/// A cluster without a label row gets the `Cluster {id}` fallback.
pub fn cluster_docs(metadata: &[ClusterMetadata], labels: &[ClusterLabel]) -> Vec<ClusterDoc> {
    let label_by_id: HashMap<ClusterId, &str> = labels
        .iter()
        .map(|l| (l.cluster_id, l.cluster_label.as_str()))
        .collect();

    metadata
        .iter()
        .map(|m| ClusterDoc {
            cluster_id: m.cluster_id,
            label: label_by_id
                .get(&m.cluster_id)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("Cluster {}", m.cluster_id)),
            centroid_x: m.centroid_x,
            centroid_y: m.centroid_y,
            downloads: m.total_weekly_downloads,
            min_x: m.min_x,
            max_x: m.max_x,
            min_y: m.min_y,
            max_y: m.max_y,
        })
        .collect()
}

/// Resolve edge endpoints to package ids.
///
/// Edges naming a package absent from the id map are dropped with a warning
/// rather than failing the export.
pub fn edge_docs(
    edges: &[ConstellationEdge],
    name_to_id: &HashMap<String, usize>,
) -> Vec<EdgeDoc> {
    edges
        .iter()
        .filter_map(|edge| {
            let from_id = name_to_id.get(&edge.from_package);
            let to_id = name_to_id.get(&edge.to_package);
            match (from_id, to_id) {
                (Some(&from_id), Some(&to_id)) => Some(EdgeDoc {
                    cluster_id: edge.cluster_id,
                    from_id,
                    to_id,
                    from_x: edge.from_x,
                    from_y: edge.from_y,
                    to_x: edge.to_x,
                    to_y: edge.to_y,
                }),
                _ => {
                    warn!(
                        from = %edge.from_package,
                        to = %edge.to_package,
                        "dropping edge with unknown package name"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Write any document list as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    info!(path = %path.display(), "wrote json document");
    Ok(())
}
