//! Hierarchical density clustering (HDBSCAN family).
//!
//! # The Algorithm (Campello, Moulavi, Sander, 2013)
//!
//! Density clustering over a single-linkage hierarchy of **mutual
//! reachability distances**:
//!
//! 1. **Core distance**: for each point, the distance to its
//!    `min_samples`-th nearest neighbor. Sparse points get large core
//!    distances.
//! 2. **Mutual reachability**: `d_mreach(a, b) = max(core(a), core(b),
//!    d(a, b))`. Inflating distances near sparse points keeps noise from
//!    bridging dense regions.
//! 3. **Single-linkage hierarchy** over the mutual reachability matrix
//!    (kodama). Single linkage on mutual reachability is exactly the
//!    HDBSCAN hierarchy.
//! 4. **Condensation**: walk the hierarchy from the root; a split only
//!    spawns child clusters when both sides have at least
//!    `min_cluster_size` points, otherwise the small side "falls out" as
//!    individual points at that density level.
//! 5. **Selection**: cut the condensed tree either at its leaves
//!    ([`SelectionMethod::Leaf`], more and smaller clusters) or by
//!    excess-of-mass stability ([`SelectionMethod::Eom`], fewer and larger).
//!    Selected clusters born closer than `selection_epsilon` are replaced by
//!    their nearest ancestor born at or beyond it.
//!
//! Points outside every selected cluster are noise. The condensed-tree root
//! is never selectable, so a dataset whose hierarchy contains no genuine
//! sub-structure comes back entirely as noise rather than as one giant
//! cluster.
//!
//! Density levels are expressed as `lambda = 1 / distance`; a cluster's
//! stability is the sum of `lambda_exit - lambda_birth` over its points.

use kodama::{linkage, Method};

use super::traits::ClusterAssigner;
use crate::error::{Error, Result};
use crate::numeric::euclidean_f64;
use crate::types::ClusterId;

/// Policy for choosing which density level to cut the hierarchy at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMethod {
    /// Excess-of-mass stability: fewer, larger clusters.
    Eom,
    /// Condensed-tree leaves: more, smaller clusters.
    #[default]
    Leaf,
}

/// Configuration for [`DensityClusterer`].
#[derive(Debug, Clone)]
pub struct DensityConfig {
    /// Minimum points required to form a cluster (default: 8).
    pub min_cluster_size: usize,
    /// Density sensitivity: neighbor rank used for core distances
    /// (default: 2).
    pub min_samples: usize,
    /// Hierarchy cut policy (default: [`SelectionMethod::Leaf`]).
    pub selection_method: SelectionMethod,
    /// Clusters born at an inter-cluster distance below this threshold are
    /// merged into their enclosing cluster; larger values produce fewer,
    /// larger clusters (default: 0.0085).
    pub selection_epsilon: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: 8,
            min_samples: 2,
            selection_method: SelectionMethod::Leaf,
            selection_epsilon: 0.0085,
        }
    }
}

/// Hierarchical density clustering with a noise label.
#[derive(Debug, Clone, Default)]
pub struct DensityClusterer {
    config: DensityConfig,
}

/// One node of the condensed tree.
#[derive(Debug, Clone)]
struct CondensedCluster {
    parent: Option<usize>,
    birth_lambda: f64,
    children: Vec<usize>,
    /// `(lambda, count)` exit events: points falling out, or child splits.
    exits: Vec<(f64, usize)>,
}

impl DensityClusterer {
    /// Create a clusterer from a configuration.
    pub fn new(config: DensityConfig) -> Self {
        Self { config }
    }

    /// Set minimum cluster size.
    pub fn with_min_cluster_size(mut self, min_cluster_size: usize) -> Self {
        self.config.min_cluster_size = min_cluster_size;
        self
    }

    /// Set density sensitivity.
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.config.min_samples = min_samples;
        self
    }

    /// Set the hierarchy cut policy.
    pub fn with_selection_method(mut self, method: SelectionMethod) -> Self {
        self.config.selection_method = method;
        self
    }

    /// Set the cluster merge threshold.
    pub fn with_selection_epsilon(mut self, epsilon: f64) -> Self {
        self.config.selection_epsilon = epsilon;
        self
    }

    fn validate(&self, coords: &[Vec<f32>]) -> Result<usize> {
        let n = coords.len();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        let dim = coords[0].len();
        if let Some(bad) = coords.iter().find(|row| row.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: bad.len(),
            });
        }
        if self.config.min_cluster_size < 2 {
            return Err(Error::InvalidParameter {
                name: "min_cluster_size",
                message: "must be at least 2",
            });
        }
        if self.config.min_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "min_samples",
                message: "must be at least 1",
            });
        }
        if n < self.config.min_cluster_size {
            return Err(Error::InsufficientData {
                required: self.config.min_cluster_size,
                found: n,
            });
        }
        if n <= self.config.min_samples {
            return Err(Error::InsufficientData {
                required: self.config.min_samples + 1,
                found: n,
            });
        }
        Ok(n)
    }

    /// Condensed upper-triangle mutual reachability matrix (row-major), the
    /// layout kodama expects.
    fn mutual_reachability(&self, coords: &[Vec<f32>]) -> Vec<f64> {
        let n = coords.len();
        let mut dist = vec![0.0f64; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = euclidean_f64(&coords[i], &coords[j]);
                dist[i * n + j] = d;
                dist[j * n + i] = d;
            }
        }

        // core(i) = distance to the min_samples-th nearest other point.
        let core: Vec<f64> = (0..n)
            .map(|i| {
                let mut row: Vec<f64> = (0..n).filter(|&j| j != i).map(|j| dist[i * n + j]).collect();
                row.sort_by(f64::total_cmp);
                row[self.config.min_samples - 1]
            })
            .collect();

        let mut condensed = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..(n - 1) {
            for j in (i + 1)..n {
                condensed.push(dist[i * n + j].max(core[i]).max(core[j]));
            }
        }
        condensed
    }

    /// Leaf indices under a merge-tree node. Labels follow the SciPy/kodama
    /// convention: leaves are `0..n`, merge `t` creates node `n + t`.
    fn leaves_under(node: usize, n: usize, children: &[(usize, usize)]) -> Vec<usize> {
        let mut leaves = Vec::new();
        let mut stack = vec![node];
        while let Some(cur) = stack.pop() {
            if cur < n {
                leaves.push(cur);
            } else {
                let (a, b) = children[cur - n];
                stack.push(a);
                stack.push(b);
            }
        }
        leaves
    }

    /// Condense the single-linkage hierarchy. Returns the condensed clusters
    /// plus, per point, the condensed cluster it last belonged to.
    fn condense(
        &self,
        n: usize,
        children: &[(usize, usize)],
        distances: &[f64],
        sizes: &[usize],
    ) -> (Vec<CondensedCluster>, Vec<usize>) {
        let mcs = self.config.min_cluster_size;
        let node_size = |node: usize| if node < n { 1 } else { sizes[node - n] };

        let mut clusters = vec![CondensedCluster {
            parent: None,
            birth_lambda: 0.0,
            children: Vec::new(),
            exits: Vec::new(),
        }];
        let mut point_cluster = vec![0usize; n];

        let root = n + children.len() - 1;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some((node, cc)) = stack.pop() {
            debug_assert!(node >= n, "leaves are never traversed directly");
            let (a, b) = children[node - n];
            let lambda = 1.0 / distances[node - n].max(1e-12);
            let (sa, sb) = (node_size(a), node_size(b));

            fn fall_out(
                side: usize,
                cc: usize,
                lambda: f64,
                n: usize,
                children: &[(usize, usize)],
                clusters: &mut [CondensedCluster],
                point_cluster: &mut [usize],
            ) {
                let leaves = DensityClusterer::leaves_under(side, n, children);
                clusters[cc].exits.push((lambda, leaves.len()));
                for p in leaves {
                    point_cluster[p] = cc;
                }
            }

            match (sa >= mcs, sb >= mcs) {
                (true, true) => {
                    // True split: both sides become new condensed clusters.
                    for side in [a, b] {
                        let child_idx = clusters.len();
                        clusters[cc].children.push(child_idx);
                        clusters[cc].exits.push((lambda, node_size(side)));
                        clusters.push(CondensedCluster {
                            parent: Some(cc),
                            birth_lambda: lambda,
                            children: Vec::new(),
                            exits: Vec::new(),
                        });
                        if side >= n {
                            stack.push((side, child_idx));
                        } else {
                            // A cluster of exactly one leaf cannot occur
                            // (min_cluster_size >= 2), but keep the point.
                            point_cluster[side] = child_idx;
                        }
                    }
                }
                (true, false) => {
                    fall_out(b, cc, lambda, n, children, &mut clusters, &mut point_cluster);
                    stack.push((a, cc));
                }
                (false, true) => {
                    fall_out(a, cc, lambda, n, children, &mut clusters, &mut point_cluster);
                    stack.push((b, cc));
                }
                (false, false) => {
                    fall_out(a, cc, lambda, n, children, &mut clusters, &mut point_cluster);
                    fall_out(b, cc, lambda, n, children, &mut clusters, &mut point_cluster);
                }
            }
        }
        (clusters, point_cluster)
    }

    fn stability(cluster: &CondensedCluster) -> f64 {
        cluster
            .exits
            .iter()
            .map(|&(lambda, count)| (lambda - cluster.birth_lambda) * count as f64)
            .sum()
    }

    /// Choose clusters from the condensed tree. The root (index 0) is never
    /// selected.
    fn select(&self, clusters: &[CondensedCluster]) -> Vec<bool> {
        let m = clusters.len();
        let mut selected = vec![false; m];

        match self.config.selection_method {
            SelectionMethod::Leaf => {
                for (idx, c) in clusters.iter().enumerate().skip(1) {
                    selected[idx] = c.children.is_empty();
                }
            }
            SelectionMethod::Eom => {
                // Children are created after parents, so reverse index order
                // visits children first.
                let mut score = vec![0.0f64; m];
                for idx in (1..m).rev() {
                    let child_sum: f64 =
                        clusters[idx].children.iter().map(|&ch| score[ch]).sum();
                    let own = Self::stability(&clusters[idx]);
                    if clusters[idx].children.is_empty() || own >= child_sum {
                        score[idx] = own;
                        selected[idx] = true;
                        Self::deselect_descendants(idx, clusters, &mut selected);
                    } else {
                        score[idx] = child_sum;
                    }
                }
            }
        }

        if self.config.selection_epsilon > 0.0 {
            self.apply_epsilon(clusters, &mut selected);
        }
        selected
    }

    fn deselect_descendants(idx: usize, clusters: &[CondensedCluster], selected: &mut [bool]) {
        let mut stack: Vec<usize> = clusters[idx].children.clone();
        while let Some(cur) = stack.pop() {
            selected[cur] = false;
            stack.extend(&clusters[cur].children);
        }
    }

    /// Replace selected clusters born below the epsilon distance with their
    /// nearest ancestor born at or beyond it (merging siblings that would
    /// re-join within epsilon).
    fn apply_epsilon(&self, clusters: &[CondensedCluster], selected: &mut [bool]) {
        let epsilon = self.config.selection_epsilon;
        let chosen: Vec<usize> = (1..clusters.len()).filter(|&i| selected[i]).collect();
        for idx in chosen {
            let birth_distance = 1.0 / clusters[idx].birth_lambda.max(1e-12);
            if birth_distance >= epsilon {
                continue;
            }
            let mut cur = idx;
            while let Some(parent) = clusters[cur].parent {
                if parent == 0 {
                    // The root is not selectable; keep the original cluster.
                    break;
                }
                cur = parent;
                if 1.0 / clusters[cur].birth_lambda.max(1e-12) >= epsilon {
                    break;
                }
            }
            if cur != idx {
                selected[cur] = true;
                Self::deselect_descendants(cur, clusters, selected);
            }
        }
    }
}

impl ClusterAssigner for DensityClusterer {
    fn assign(&self, coords: &[Vec<f32>]) -> Result<Vec<ClusterId>> {
        let n = self.validate(coords)?;

        let mut condensed = self.mutual_reachability(coords);
        let dendrogram = linkage(&mut condensed, n, Method::Single);

        let steps = dendrogram.steps();
        let children: Vec<(usize, usize)> =
            steps.iter().map(|s| (s.cluster1, s.cluster2)).collect();
        let distances: Vec<f64> = steps.iter().map(|s| s.dissimilarity).collect();
        let sizes: Vec<usize> = steps.iter().map(|s| s.size).collect();

        let (clusters, point_cluster) = self.condense(n, &children, &distances, &sizes);
        let selected = self.select(&clusters);

        // A point's label is its nearest selected enclosing cluster, if any.
        let resolve = |mut cc: usize| -> Option<usize> {
            loop {
                if selected[cc] {
                    return Some(cc);
                }
                cc = clusters[cc].parent?;
            }
        };

        // Number selected clusters by first appearance in input order so the
        // labeling is stable for a given input.
        let mut label_of_cluster: Vec<Option<u32>> = vec![None; clusters.len()];
        let mut next_label = 0u32;
        let mut labels = Vec::with_capacity(n);
        for p in 0..n {
            match resolve(point_cluster[p]) {
                Some(cc) => {
                    let label = *label_of_cluster[cc].get_or_insert_with(|| {
                        let l = next_label;
                        next_label += 1;
                        l
                    });
                    labels.push(ClusterId::Labeled(label));
                }
                None => labels.push(ClusterId::Noise),
            }
        }
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `count` points packed tightly around `(cx, cy)`.
    fn blob(cx: f32, cy: f32, count: usize) -> Vec<Vec<f32>> {
        (0..count)
            .map(|i| {
                let t = i as f32 * 0.013;
                vec![cx + t, cy + 0.05 - t * 0.5]
            })
            .collect()
    }

    #[test]
    fn test_two_blobs_two_clusters() {
        let mut data = blob(0.0, 0.0, 10);
        data.extend(blob(8.0, 8.0, 10));

        let clusterer = DensityClusterer::default().with_min_cluster_size(5);
        let labels = clusterer.assign(&data).unwrap();

        assert_eq!(labels.len(), 20);
        let first = labels[0];
        let second = labels[10];
        assert!(!first.is_noise());
        assert!(!second.is_noise());
        assert_ne!(first, second);
        assert!(labels[..10].iter().all(|&l| l == first));
        assert!(labels[10..].iter().all(|&l| l == second));
    }

    #[test]
    fn test_outliers_between_blobs_are_noise() {
        let mut data = blob(0.0, 0.0, 10);
        data.extend(blob(8.0, 8.0, 10));
        data.push(vec![4.0, -20.0]);
        data.push(vec![-15.0, 4.0]);

        let clusterer = DensityClusterer::default().with_min_cluster_size(5);
        let labels = clusterer.assign(&data).unwrap();

        assert_eq!(labels[20], ClusterId::Noise);
        assert_eq!(labels[21], ClusterId::Noise);
        assert!(labels[..20].iter().all(|l| !l.is_noise()));
    }

    #[test]
    fn test_single_blob_is_all_noise() {
        // With no sub-structure the condensed tree is only its root, which is
        // never selectable (no single-cluster output).
        let data = blob(0.0, 0.0, 12);
        let clusterer = DensityClusterer::default().with_min_cluster_size(5);
        let labels = clusterer.assign(&data).unwrap();
        assert!(labels.iter().all(|l| l.is_noise()));
    }

    #[test]
    fn test_eom_matches_leaf_on_well_separated_blobs() {
        let mut data = blob(0.0, 0.0, 10);
        data.extend(blob(8.0, 8.0, 10));

        let leaf = DensityClusterer::default()
            .with_min_cluster_size(5)
            .with_selection_method(SelectionMethod::Leaf)
            .assign(&data)
            .unwrap();
        let eom = DensityClusterer::default()
            .with_min_cluster_size(5)
            .with_selection_method(SelectionMethod::Eom)
            .assign(&data)
            .unwrap();
        assert_eq!(leaf, eom);
    }

    #[test]
    fn test_selection_epsilon_merges_nearby_clusters() {
        // Two pairs of adjacent blobs; pairs are far apart.
        let mut data = blob(0.0, 0.0, 6);
        data.extend(blob(1.0, 0.0, 6));
        data.extend(blob(20.0, 20.0, 6));
        data.extend(blob(21.0, 20.0, 6));

        let fine = DensityClusterer::default()
            .with_min_cluster_size(5)
            .with_selection_epsilon(0.0)
            .assign(&data)
            .unwrap();
        let fine_count = fine.iter().filter(|l| !l.is_noise()).map(|l| *l).collect::<std::collections::HashSet<_>>().len();
        assert_eq!(fine_count, 4);

        let coarse = DensityClusterer::default()
            .with_min_cluster_size(5)
            .with_selection_epsilon(3.0)
            .assign(&data)
            .unwrap();
        let coarse_count = coarse.iter().filter(|l| !l.is_noise()).map(|l| *l).collect::<std::collections::HashSet<_>>().len();
        assert_eq!(coarse_count, 2);
        // Adjacent blobs now share a label.
        assert_eq!(coarse[0], coarse[6]);
        assert_eq!(coarse[12], coarse[18]);
        assert_ne!(coarse[0], coarse[12]);
    }

    #[test]
    fn test_assign_is_deterministic() {
        let mut data = blob(0.0, 0.0, 10);
        data.extend(blob(8.0, 8.0, 10));
        let clusterer = DensityClusterer::default().with_min_cluster_size(5);
        assert_eq!(
            clusterer.assign(&data).unwrap(),
            clusterer.assign(&data).unwrap()
        );
    }

    #[test]
    fn test_insufficient_data() {
        let data = blob(0.0, 0.0, 4);
        let err = DensityClusterer::default().assign(&data).unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientData {
                required: 8,
                found: 4
            }
        );
    }

    #[test]
    fn test_empty_and_invalid_params() {
        let clusterer = DensityClusterer::default();
        assert_eq!(clusterer.assign(&[]).unwrap_err(), Error::EmptyInput);

        let data = blob(0.0, 0.0, 10);
        let err = DensityClusterer::default()
            .with_min_cluster_size(1)
            .assign(&data)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));

        let err = DensityClusterer::default()
            .with_min_samples(0)
            .assign(&data)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }
}
