//! Per-cluster aggregate statistics.
//!
//! One [`ClusterMetadata`] record per distinct cluster id present in the
//! snapshot, noise included (the map renders the noise cloud too; it is only
//! constellation construction that excludes it). Clusters are independent,
//! so aggregation runs in parallel and joins in display order: labeled ids
//! ascending, noise last.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use crate::types::{ClusteredPackage, ClusterId, ClusterMetadata};

/// Compute centroid, bounding box, and total downloads per cluster.
///
/// Every id in the output owns at least one member, so centroids are always
/// defined. Empty input produces empty output.
pub fn aggregate(packages: &[ClusteredPackage]) -> Vec<ClusterMetadata> {
    let mut by_cluster: BTreeMap<ClusterId, Vec<&ClusteredPackage>> = BTreeMap::new();
    for pkg in packages {
        by_cluster.entry(pkg.cluster_id).or_default().push(pkg);
    }

    let groups: Vec<(ClusterId, Vec<&ClusteredPackage>)> = by_cluster.into_iter().collect();
    let metadata: Vec<ClusterMetadata> = groups
        .par_iter()
        .map(|(cluster_id, members)| cluster_metadata(*cluster_id, members))
        .collect();

    for ((cluster_id, members), _) in groups.iter().zip(&metadata) {
        debug!(cluster_id = %cluster_id, members = members.len(), "calculated cluster metadata");
    }
    metadata
}

fn cluster_metadata(cluster_id: ClusterId, members: &[&ClusteredPackage]) -> ClusterMetadata {
    let count = members.len() as f32;
    let mut sum_x = 0.0f32;
    let mut sum_y = 0.0f32;
    let mut min_x = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    let mut total_weekly_downloads = 0u64;

    for pkg in members {
        sum_x += pkg.x;
        sum_y += pkg.y;
        min_x = min_x.min(pkg.x);
        max_x = max_x.max(pkg.x);
        min_y = min_y.min(pkg.y);
        max_y = max_y.max(pkg.y);
        total_weekly_downloads += pkg.weekly_downloads;
    }

    ClusterMetadata {
        cluster_id,
        centroid_x: sum_x / count,
        centroid_y: sum_y / count,
        total_weekly_downloads,
        min_x,
        max_x,
        min_y,
        max_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, downloads: u64, cluster: ClusterId, x: f32, y: f32) -> ClusteredPackage {
        ClusteredPackage {
            name: name.to_string(),
            weekly_downloads: downloads,
            summary: String::new(),
            cluster_id: cluster,
            x,
            y,
        }
    }

    #[test]
    fn test_centroid_is_exact_mean() {
        let packages = vec![
            pkg("a", 1, ClusterId::Labeled(0), 0.0, 0.0),
            pkg("b", 2, ClusterId::Labeled(0), 2.0, 0.0),
            pkg("c", 3, ClusterId::Labeled(0), 1.0, 2.0),
        ];
        let metadata = aggregate(&packages);
        assert_eq!(metadata.len(), 1);
        let m = &metadata[0];
        assert_eq!(m.centroid_x, 1.0);
        assert!((m.centroid_y - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(m.total_weekly_downloads, 6);
        assert_eq!((m.min_x, m.max_x, m.min_y, m.max_y), (0.0, 2.0, 0.0, 2.0));
    }

    #[test]
    fn test_noise_is_aggregated_and_ordered_last() {
        let packages = vec![
            pkg("n1", 10, ClusterId::Noise, -1.0, -1.0),
            pkg("a", 1, ClusterId::Labeled(1), 0.0, 0.0),
            pkg("b", 2, ClusterId::Labeled(0), 1.0, 1.0),
            pkg("n2", 20, ClusterId::Noise, 1.0, 1.0),
        ];
        let metadata = aggregate(&packages);
        let ids: Vec<ClusterId> = metadata.iter().map(|m| m.cluster_id).collect();
        assert_eq!(
            ids,
            vec![ClusterId::Labeled(0), ClusterId::Labeled(1), ClusterId::Noise]
        );
        let noise = metadata.last().unwrap();
        assert_eq!(noise.total_weekly_downloads, 30);
        assert_eq!(noise.centroid_x, 0.0);
        assert_eq!((noise.min_x, noise.max_x), (-1.0, 1.0));
    }

    #[test]
    fn test_single_member_cluster() {
        let packages = vec![pkg("only", 7, ClusterId::Labeled(3), 2.5, -4.0)];
        let metadata = aggregate(&packages);
        let m = &metadata[0];
        assert_eq!((m.centroid_x, m.centroid_y), (2.5, -4.0));
        assert_eq!((m.min_x, m.max_x, m.min_y, m.max_y), (2.5, 2.5, -4.0, -4.0));
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }
}
