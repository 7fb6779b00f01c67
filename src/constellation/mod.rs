//! Constellation graphs: per-cluster minimum spanning trees.
//!
//! For every non-noise cluster, the builder picks the cluster's most salient
//! packages by weekly downloads and connects them with the minimum spanning
//! tree of their 2D positions. After every cluster's tree is built, a
//! dataset-global length cutoff drops edges that would span too much of the
//! map.
//!
//! # Selection policy
//!
//! `count = max(min_packages, floor(n * top_percent))`. Clusters smaller than
//! `min_packages` contribute no edges at all — that is an expected outcome,
//! logged and skipped, never an error.
//!
//! # Determinism
//!
//! Download-count ties break by package name; MST edge-weight ties break by
//! node index (candidate edges are sorted by `(distance, i, j)` before
//! Kruskal). The output is therefore a pure function of the input snapshot.
//!
//! # Global cutoff
//!
//! Edge lengths are normalized by the *dataset-wide* coordinate ranges, not
//! per-cluster ranges, so the cutoff fraction means the same absolute length
//! everywhere on the map and clusters with naturally large spread are not
//! pruned by a locally-computed threshold. Computed after all per-cluster
//! trees, since it needs every point.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::types::{ClusteredPackage, ClusterId, ConstellationEdge};

/// Configuration for [`ConstellationBuilder`].
#[derive(Debug, Clone)]
pub struct ConstellationConfig {
    /// Fraction of a cluster's packages to keep, by downloads
    /// (default: 0.15).
    pub top_percent: f64,
    /// Minimum packages for a cluster to get a constellation, and the floor
    /// for the top-percent selection (default: 3).
    pub min_packages: usize,
    /// Maximum edge length as a fraction of the dataset-wide coordinate
    /// range; longer edges are dropped after MST construction (default:
    /// 0.05). The range is global so the fraction is comparable across
    /// clusters of different spread.
    pub cutoff_length_frac: f64,
}

impl Default for ConstellationConfig {
    fn default() -> Self {
        Self {
            top_percent: 0.15,
            min_packages: 3,
            cutoff_length_frac: 0.05,
        }
    }
}

/// Builds constellation edge sets from a clustered snapshot.
#[derive(Debug, Clone, Default)]
pub struct ConstellationBuilder {
    config: ConstellationConfig,
}

impl ConstellationBuilder {
    /// Create a builder from a configuration.
    pub fn new(config: ConstellationConfig) -> Self {
        Self { config }
    }

    /// Set the top-package fraction.
    pub fn with_top_percent(mut self, top_percent: f64) -> Self {
        self.config.top_percent = top_percent;
        self
    }

    /// Set the minimum package count.
    pub fn with_min_packages(mut self, min_packages: usize) -> Self {
        self.config.min_packages = min_packages;
        self
    }

    /// Set the global length cutoff fraction.
    pub fn with_cutoff_length_frac(mut self, cutoff_length_frac: f64) -> Self {
        self.config.cutoff_length_frac = cutoff_length_frac;
        self
    }

    /// Build the filtered constellation edge set for one snapshot.
    ///
    /// Clusters are processed independently (in parallel) and joined in
    /// cluster-id order; the global length filter runs last because it needs
    /// the dataset-wide coordinate range.
    pub fn build(&self, packages: &[ClusteredPackage]) -> Vec<ConstellationEdge> {
        let mut by_cluster: BTreeMap<ClusterId, Vec<&ClusteredPackage>> = BTreeMap::new();
        for pkg in packages {
            if pkg.cluster_id.is_noise() {
                continue;
            }
            by_cluster.entry(pkg.cluster_id).or_default().push(pkg);
        }

        let groups: Vec<(ClusterId, Vec<&ClusteredPackage>)> = by_cluster.into_iter().collect();
        let per_cluster: Vec<Vec<ConstellationEdge>> = groups
            .par_iter()
            .map(|(cluster_id, members)| self.cluster_edges(*cluster_id, members))
            .collect();

        let mut edges: Vec<ConstellationEdge> = Vec::new();
        for (idx, cluster_edges) in per_cluster.into_iter().enumerate() {
            if cluster_edges.is_empty() {
                debug!(cluster_id = %groups[idx].0, "skipped cluster (insufficient packages)");
            } else {
                info!(
                    cluster_id = %groups[idx].0,
                    edges = cluster_edges.len(),
                    "generated constellation edges"
                );
            }
            edges.extend(cluster_edges);
        }

        self.filter_by_global_length(packages, edges)
    }

    /// MST edges for one cluster, or empty when the cluster is too small.
    fn cluster_edges(
        &self,
        cluster_id: ClusterId,
        members: &[&ClusteredPackage],
    ) -> Vec<ConstellationEdge> {
        let n = members.len();
        if n < self.config.min_packages {
            return Vec::new();
        }

        let count = usize::max(
            self.config.min_packages,
            (n as f64 * self.config.top_percent) as usize,
        );
        let mut top: Vec<&ClusteredPackage> = members.to_vec();
        top.sort_by(|a, b| {
            Reverse(a.weekly_downloads)
                .cmp(&Reverse(b.weekly_downloads))
                .then_with(|| a.name.cmp(&b.name))
        });
        top.truncate(count);

        if top.len() < self.config.min_packages {
            return Vec::new();
        }

        let coords: Vec<(f32, f32)> = top.iter().map(|p| (p.x, p.y)).collect();
        minimum_spanning_tree(&coords)
            .into_iter()
            .map(|(i, j)| ConstellationEdge {
                cluster_id,
                from_package: top[i].name.clone(),
                to_package: top[j].name.clone(),
                from_x: coords[i].0,
                from_y: coords[i].1,
                to_x: coords[j].0,
                to_y: coords[j].1,
            })
            .collect()
    }

    /// Drop edges whose length, normalized by the dataset-wide coordinate
    /// ranges, exceeds the cutoff fraction.
    fn filter_by_global_length(
        &self,
        packages: &[ClusteredPackage],
        edges: Vec<ConstellationEdge>,
    ) -> Vec<ConstellationEdge> {
        if edges.is_empty() {
            return edges;
        }

        let mut min_x = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for pkg in packages {
            min_x = min_x.min(pkg.x);
            max_x = max_x.max(pkg.x);
            min_y = min_y.min(pkg.y);
            max_y = max_y.max(pkg.y);
        }
        // Degenerate (zero) ranges get an epsilon substitute rather than a
        // division by zero.
        let range_x = f64::from(max_x - min_x).max(1e-8);
        let range_y = f64::from(max_y - min_y).max(1e-8);

        let before = edges.len();
        let kept: Vec<ConstellationEdge> = edges
            .into_iter()
            .filter(|edge| {
                let dx = f64::from(edge.to_x - edge.from_x) / range_x;
                let dy = f64::from(edge.to_y - edge.from_y) / range_y;
                (dx * dx + dy * dy).sqrt() <= self.config.cutoff_length_frac
            })
            .collect();

        let removed = before - kept.len();
        if removed > 0 {
            info!(
                removed,
                cutoff = self.config.cutoff_length_frac,
                "removed edges exceeding cutoff length"
            );
        }
        kept
    }
}

/// Minimum spanning tree over the complete Euclidean graph of `coords`.
///
/// Kruskal with a union-find; candidate edges are sorted by
/// `(distance, i, j)` so equal-weight edges resolve by node index and the
/// result is reproducible. Returns exactly `coords.len() - 1` index pairs
/// with `i < j` (empty for fewer than two points).
pub fn minimum_spanning_tree(coords: &[(f32, f32)]) -> Vec<(usize, usize)> {
    let n = coords.len();
    if n < 2 {
        return Vec::new();
    }

    let mut candidates: Vec<(f64, usize, usize)> = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..(n - 1) {
        for j in (i + 1)..n {
            let dx = f64::from(coords[i].0 - coords[j].0);
            let dy = f64::from(coords[i].1 - coords[j].1);
            candidates.push(((dx * dx + dy * dy).sqrt(), i, j));
        }
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut union_find = UnionFind::<usize>::new(n);
    let mut edges = Vec::with_capacity(n - 1);
    for (_, i, j) in candidates {
        if union_find.union(i, j) {
            edges.push((i, j));
            if edges.len() == n - 1 {
                break;
            }
        }
    }
    edges
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

    /// Six packages, three per cluster, two well-separated triangles.
    fn two_triangles() -> Vec<ClusteredPackage> {
        vec![
            pkg("a", 100, ClusterId::Labeled(1), 0.0, 0.0),
            pkg("b", 200, ClusterId::Labeled(1), 0.1, 0.0),
            pkg("c", 150, ClusterId::Labeled(1), 0.05, 0.1),
            pkg("d", 300, ClusterId::Labeled(2), 0.5, 0.5),
            pkg("e", 250, ClusterId::Labeled(2), 0.6, 0.5),
            pkg("f", 350, ClusterId::Labeled(2), 0.55, 0.6),
        ]
    }

    fn lenient_builder() -> ConstellationBuilder {
        ConstellationBuilder::default()
            .with_min_packages(3)
            .with_top_percent(0.5)
            .with_cutoff_length_frac(10.0)
    }

    #[test]
    fn test_two_triangles_give_four_edges() {
        let edges = lenient_builder().build(&two_triangles());
        // Two clusters of three selected packages: two MST edges each.
        assert_eq!(edges.len(), 4);
        for cluster in [ClusterId::Labeled(1), ClusterId::Labeled(2)] {
            assert_eq!(edges.iter().filter(|e| e.cluster_id == cluster).count(), 2);
        }
    }

    #[test]
    fn test_edge_endpoints_stay_within_cluster() {
        let packages = two_triangles();
        let edges = lenient_builder().build(&packages);
        for edge in &edges {
            let from = packages.iter().find(|p| p.name == edge.from_package).unwrap();
            let to = packages.iter().find(|p| p.name == edge.to_package).unwrap();
            assert_eq!(from.cluster_id, edge.cluster_id);
            assert_eq!(to.cluster_id, edge.cluster_id);
            // Coordinates are snapshots of the endpoints.
            assert_eq!((edge.from_x, edge.from_y), (from.x, from.y));
            assert_eq!((edge.to_x, edge.to_y), (to.x, to.y));
        }
    }

    #[test]
    fn test_noise_clusters_produce_no_edges() {
        let mut packages = two_triangles();
        for p in &mut packages {
            p.cluster_id = ClusterId::Noise;
        }
        let edges = lenient_builder().build(&packages);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_undersized_cluster_produces_no_edges() {
        let packages = vec![
            pkg("a", 100, ClusterId::Labeled(1), 0.0, 0.0),
            pkg("b", 200, ClusterId::Labeled(1), 0.1, 0.1),
        ];
        let edges = lenient_builder().build(&packages);
        assert!(edges.is_empty());
    }

    #[test]
    fn test_top_percent_selection_with_floor() {
        // Ten packages: top_percent 0.3 keeps floor(10 * 0.3) = 3.
        let mut packages: Vec<ClusteredPackage> = (0..10)
            .map(|i| {
                pkg(
                    &format!("p{i}"),
                    1000 - i as u64 * 10,
                    ClusterId::Labeled(1),
                    i as f32 * 0.1,
                    0.0,
                )
            })
            .collect();
        packages[9].weekly_downloads = 5000; // p9 jumps to the top

        let edges = ConstellationBuilder::default()
            .with_min_packages(3)
            .with_top_percent(0.3)
            .with_cutoff_length_frac(10.0)
            .build(&packages);

        assert_eq!(edges.len(), 2);
        // Selected set is {p9, p0, p1}: the two highest originals plus the
        // boosted one.
        let mut names: Vec<&str> = edges
            .iter()
            .flat_map(|e| [e.from_package.as_str(), e.to_package.as_str()])
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names, vec!["p0", "p1", "p9"]);
    }

    #[test]
    fn test_download_ties_break_by_name() {
        let packages = vec![
            pkg("d", 100, ClusterId::Labeled(1), 0.0, 0.0),
            pkg("b", 100, ClusterId::Labeled(1), 1.0, 0.0),
            pkg("c", 100, ClusterId::Labeled(1), 2.0, 0.0),
            pkg("a", 100, ClusterId::Labeled(1), 3.0, 0.0),
        ];
        let edges = ConstellationBuilder::default()
            .with_min_packages(3)
            .with_top_percent(0.75)
            .with_cutoff_length_frac(10.0)
            .build(&packages);

        let mut names: Vec<&str> = edges
            .iter()
            .flat_map(|e| [e.from_package.as_str(), e.to_package.as_str()])
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_mst_spans_all_selected_points() {
        let coords = vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (0.0, 3.0), (5.0, 5.0)];
        let edges = minimum_spanning_tree(&coords);
        assert_eq!(edges.len(), 4);

        // Spanning: union-find over the returned edges connects everything.
        let mut uf = UnionFind::<usize>::new(coords.len());
        for &(i, j) in &edges {
            assert!(uf.union(i, j), "edge ({i}, {j}) formed a cycle");
        }
        let root = uf.find(0);
        assert!((1..coords.len()).all(|i| uf.find(i) == root));
    }

    #[test]
    fn test_mst_tie_break_is_deterministic() {
        // Four corners of a square: many equal-length candidate edges.
        let coords = vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
        let a = minimum_spanning_tree(&coords);
        let b = minimum_spanning_tree(&coords);
        assert_eq!(a, b);
        assert_eq!(a, vec![(0, 1), (0, 2), (1, 3)]);
    }

    #[test]
    fn test_global_cutoff_is_monotonic() {
        let packages = two_triangles();
        let cutoffs = [0.01, 0.05, 0.2, 1.0, 10.0];
        let mut previous: Option<Vec<ConstellationEdge>> = None;
        for cutoff in cutoffs {
            let edges = ConstellationBuilder::default()
                .with_min_packages(3)
                .with_top_percent(0.5)
                .with_cutoff_length_frac(cutoff)
                .build(&packages);
            if let Some(prev) = &previous {
                // A larger cutoff never removes an edge a smaller one kept.
                for edge in prev {
                    assert!(edges.contains(edge), "cutoff {cutoff} lost {edge:?}");
                }
            }
            previous = Some(edges);
        }
    }

    #[test]
    fn test_cutoff_drops_long_edges() {
        // Cluster spread comparable to dataset range: a tight cutoff empties
        // it.
        let packages = vec![
            pkg("a", 1, ClusterId::Labeled(1), 0.0, 0.0),
            pkg("b", 2, ClusterId::Labeled(1), 1.0, 0.0),
            pkg("c", 3, ClusterId::Labeled(1), 0.0, 1.0),
        ];
        let edges = ConstellationBuilder::default()
            .with_min_packages(3)
            .with_top_percent(1.0)
            .with_cutoff_length_frac(0.05)
            .build(&packages);
        assert!(edges.is_empty());
    }
}
