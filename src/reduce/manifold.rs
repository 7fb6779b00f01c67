//! Neighborhood-graph embedding (UMAP family).
//!
//! Projects high-dimensional vectors to a low-dimensional layout that
//! approximately preserves local neighborhood structure:
//!
//! 1. Build an exact k-nearest-neighbor graph under the chosen metric.
//! 2. Calibrate per-point membership weights (smooth-kNN): for each point,
//!    `rho` is the distance to its nearest neighbor and `sigma` is found by
//!    bisection so the total membership mass equals `log2(k)`.
//! 3. Symmetrize by fuzzy union: `w = a + b - a*b`.
//! 4. Optimize a layout by stochastic gradient descent: edges attract their
//!    endpoints along the curve `1 / (1 + a d^(2b))`, negative samples repel.
//!
//! The curve parameters `(a, b)` are fitted from `min_dist` and `spread`.
//!
//! # Supervision
//!
//! In supervised mode a per-point discrete label (an already-assigned cluster
//! id) down-weights graph edges that cross label boundaries by
//! `target_weight`, which pulls same-label points together and widens the
//! gaps between labels in the layout. Noise-labeled points are treated as
//! unlabeled and keep their original edge weights.
//!
//! # Determinism
//!
//! All randomness (layout initialization, negative sampling) comes from a
//! `StdRng` seeded with [`ManifoldConfig::seed`], and optimization is
//! single-threaded, so identical input and configuration reproduce the output
//! bit for bit.

use std::collections::HashMap;

use ndarray::Array2;
use rand::prelude::*;

use super::traits::DimensionalityReducer;
use crate::error::{Error, Result};
use crate::numeric::{cosine_distance, euclidean};
use crate::types::ClusterId;

/// Distance metric for the neighbor graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Euclidean (L2) distance.
    #[default]
    Euclidean,
    /// Cosine distance `1 - cos`.
    Cosine,
}

/// Configuration for [`ManifoldReducer`].
#[derive(Debug, Clone)]
pub struct ManifoldConfig {
    /// Output dimensionality (default: 2).
    pub n_components: usize,
    /// Neighborhood size for the kNN graph (default: 15).
    pub n_neighbors: usize,
    /// Minimum pairwise distance in the layout (default: 0.1).
    pub min_dist: f32,
    /// Effective scale of embedded points (default: 1.0).
    pub spread: f32,
    /// Weight applied to repulsive (negative) samples (default: 1.0).
    pub repulsion_strength: f32,
    /// Influence of labels in supervised mode, in `[0, 1]` (default: 0.5).
    /// 0 ignores labels entirely; 1 removes every cross-label edge.
    pub target_weight: f32,
    /// Number of optimization epochs (default: 200).
    pub n_epochs: usize,
    /// Negative samples per positive edge (default: 5).
    pub negative_samples: usize,
    /// Initial learning rate, decays linearly to 0 (default: 1.0).
    pub learning_rate: f32,
    /// Distance metric (default: Euclidean).
    pub metric: Metric,
    /// Seed for all internal randomness (default: 0).
    pub seed: u64,
}

impl Default for ManifoldConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            repulsion_strength: 1.0,
            target_weight: 0.5,
            n_epochs: 200,
            negative_samples: 5,
            learning_rate: 1.0,
            metric: Metric::Euclidean,
            seed: 0,
        }
    }
}

/// Neighborhood-graph embedding with deterministic, seeded optimization.
#[derive(Debug, Clone, Default)]
pub struct ManifoldReducer {
    config: ManifoldConfig,
}

/// One undirected graph edge with membership weight.
#[derive(Debug, Clone, Copy)]
struct FuzzyEdge {
    i: usize,
    j: usize,
    weight: f32,
}

impl ManifoldReducer {
    /// Create a reducer from a configuration.
    pub fn new(config: ManifoldConfig) -> Self {
        Self { config }
    }

    /// Set output dimensionality.
    pub fn with_n_components(mut self, n_components: usize) -> Self {
        self.config.n_components = n_components;
        self
    }

    /// Set neighborhood size.
    pub fn with_n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.config.n_neighbors = n_neighbors;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    fn validate(&self, data: &[Vec<f32>]) -> Result<(usize, usize)> {
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }
        let dim = data[0].len();
        if let Some(bad) = data.iter().find(|row| row.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: bad.len(),
            });
        }
        if self.config.n_components == 0 {
            return Err(Error::InvalidParameter {
                name: "n_components",
                message: "must be at least 1",
            });
        }
        if self.config.n_neighbors < 2 {
            return Err(Error::InvalidParameter {
                name: "n_neighbors",
                message: "must be at least 2",
            });
        }
        if !(0.0..=1.0).contains(&self.config.target_weight) {
            return Err(Error::InvalidParameter {
                name: "target_weight",
                message: "must be in [0, 1]",
            });
        }
        // A point needs n_neighbors *other* points for its neighborhood.
        if data.len() <= self.config.n_neighbors {
            return Err(Error::InsufficientData {
                required: self.config.n_neighbors + 1,
                found: data.len(),
            });
        }
        Ok((data.len(), dim))
    }

    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.config.metric {
            Metric::Euclidean => euclidean(a, b),
            Metric::Cosine => cosine_distance(a, b),
        }
    }

    /// Exact k-nearest neighbors per point: `(index, distance)` ascending,
    /// self excluded. O(n^2), fine at snapshot scale, and keeps the graph
    /// deterministic (ties break by index).
    fn knn(&self, matrix: &Array2<f32>) -> Vec<Vec<(usize, f32)>> {
        let n = matrix.nrows();
        let k = self.config.n_neighbors;
        (0..n)
            .map(|i| {
                let row_i = matrix.row(i);
                let mut dists: Vec<(usize, f32)> = (0..n)
                    .filter(|&j| j != i)
                    .map(|j| {
                        (
                            j,
                            self.distance(
                                row_i.as_slice().unwrap_or(&[]),
                                matrix.row(j).as_slice().unwrap_or(&[]),
                            ),
                        )
                    })
                    .collect();
                dists.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                dists.truncate(k);
                dists
            })
            .collect()
    }

    /// Smooth-kNN calibration: `(rho, sigma)` per point such that
    /// `sum_j exp(-(max(0, d_ij - rho)) / sigma) ~= log2(k)`.
    fn smooth_knn(&self, neighbors: &[Vec<(usize, f32)>]) -> Vec<(f32, f32)> {
        let target = (self.config.n_neighbors as f32).log2();
        neighbors
            .iter()
            .map(|nbrs| {
                let rho = nbrs
                    .iter()
                    .map(|&(_, d)| d)
                    .find(|&d| d > 0.0)
                    .unwrap_or(0.0);

                let mass = |sigma: f32| -> f32 {
                    nbrs.iter()
                        .map(|&(_, d)| (-(d - rho).max(0.0) / sigma).exp())
                        .sum()
                };

                let mut lo = 1e-6f32;
                let mut hi = 1.0f32;
                while mass(hi) < target && hi < 1e6 {
                    hi *= 2.0;
                }
                for _ in 0..64 {
                    let mid = (lo + hi) / 2.0;
                    if mass(mid) > target {
                        hi = mid;
                    } else {
                        lo = mid;
                    }
                }
                (rho, (lo + hi) / 2.0)
            })
            .collect()
    }

    /// Build the symmetric fuzzy graph, optionally down-weighting cross-label
    /// edges. Edges are returned sorted by `(i, j)` so downstream iteration
    /// order is deterministic.
    fn fuzzy_graph(
        &self,
        neighbors: &[Vec<(usize, f32)>],
        calib: &[(f32, f32)],
        labels: Option<&[ClusterId]>,
    ) -> Vec<FuzzyEdge> {
        let mut directed: HashMap<(usize, usize), (f32, f32)> = HashMap::new();
        for (i, nbrs) in neighbors.iter().enumerate() {
            let (rho, sigma) = calib[i];
            for &(j, d) in nbrs {
                let w = (-(d - rho).max(0.0) / sigma).exp();
                let key = if i < j { (i, j) } else { (j, i) };
                let entry = directed.entry(key).or_insert((0.0, 0.0));
                if i < j {
                    entry.0 = entry.0.max(w);
                } else {
                    entry.1 = entry.1.max(w);
                }
            }
        }

        let mut edges: Vec<FuzzyEdge> = directed
            .into_iter()
            .map(|((i, j), (a, b))| {
                let mut weight = a + b - a * b;
                if let Some(labels) = labels {
                    // Cross-label edges lose target_weight of their mass;
                    // pairs involving noise are left alone.
                    if let (ClusterId::Labeled(la), ClusterId::Labeled(lb)) =
                        (labels[i], labels[j])
                    {
                        if la != lb {
                            weight *= 1.0 - self.config.target_weight;
                        }
                    }
                }
                FuzzyEdge { i, j, weight }
            })
            .filter(|e| e.weight > 1e-8)
            .collect();
        edges.sort_by(|a, b| a.i.cmp(&b.i).then(a.j.cmp(&b.j)));
        edges
    }

    /// Fit curve parameters `(a, b)` so `1 / (1 + a d^(2b))` approximates the
    /// target membership curve induced by `min_dist` and `spread`.
    ///
    /// Coarse-to-fine grid search; cheap, deterministic, and accurate enough
    /// for layout purposes.
    fn fit_curve(&self) -> (f32, f32) {
        let min_dist = self.config.min_dist;
        let spread = self.config.spread.max(1e-3);
        let xs: Vec<f32> = (0..300).map(|i| i as f32 * 0.01 * 3.0 * spread).collect();
        let target: Vec<f32> = xs
            .iter()
            .map(|&x| {
                if x <= min_dist {
                    1.0
                } else {
                    (-(x - min_dist) / spread).exp()
                }
            })
            .collect();

        let sse = |a: f32, b: f32| -> f32 {
            xs.iter()
                .zip(target.iter())
                .map(|(&x, &t)| {
                    let y = 1.0 / (1.0 + a * x.powf(2.0 * b));
                    (y - t) * (y - t)
                })
                .sum()
        };

        let mut best = (1.0f32, 1.0f32);
        let mut best_err = f32::INFINITY;
        let mut a_range = (0.01f32, 10.0f32);
        let mut b_range = (0.1f32, 2.5f32);
        for _ in 0..4 {
            let (a_lo, a_hi) = a_range;
            let (b_lo, b_hi) = b_range;
            for ai in 0..=20 {
                let a = a_lo + (a_hi - a_lo) * ai as f32 / 20.0;
                for bi in 0..=20 {
                    let b = b_lo + (b_hi - b_lo) * bi as f32 / 20.0;
                    let err = sse(a, b);
                    if err < best_err {
                        best_err = err;
                        best = (a, b);
                    }
                }
            }
            // Shrink the search window around the incumbent.
            let a_step = (a_range.1 - a_range.0) / 20.0;
            let b_step = (b_range.1 - b_range.0) / 20.0;
            a_range = ((best.0 - a_step).max(1e-3), best.0 + a_step);
            b_range = ((best.1 - b_step).max(1e-3), best.1 + b_step);
        }
        best
    }

    /// SGD over the fuzzy graph: attraction along edges, repulsion from
    /// negative samples, linearly decaying learning rate, gradients clipped
    /// to +-4 as in reference implementations.
    fn optimize(&self, n: usize, edges: &[FuzzyEdge], rng: &mut StdRng) -> Vec<f32> {
        let dim = self.config.n_components;
        let mut layout: Vec<f32> = (0..n * dim)
            .map(|_| rng.random_range(-10.0f32..10.0f32))
            .collect();
        if edges.is_empty() {
            return layout;
        }

        let (a, b) = self.fit_curve();
        let gamma = self.config.repulsion_strength;
        let max_weight = edges
            .iter()
            .map(|e| e.weight)
            .fold(f32::MIN, f32::max)
            .max(1e-8);

        // Reference-style scheduling: an edge with weight w is updated every
        // max_weight / w epochs.
        let epochs_per_sample: Vec<f32> =
            edges.iter().map(|e| max_weight / e.weight).collect();
        let mut next_sample: Vec<f32> = epochs_per_sample.clone();

        let clip = |v: f32| v.clamp(-4.0, 4.0);
        let n_epochs = self.config.n_epochs.max(1);

        for epoch in 0..n_epochs {
            let alpha = self.config.learning_rate * (1.0 - epoch as f32 / n_epochs as f32);
            for (e_idx, edge) in edges.iter().enumerate() {
                if next_sample[e_idx] > (epoch + 1) as f32 {
                    continue;
                }
                next_sample[e_idx] += epochs_per_sample[e_idx];

                let (i, j) = (edge.i, edge.j);
                let d2: f32 = (0..dim)
                    .map(|c| {
                        let diff = layout[i * dim + c] - layout[j * dim + c];
                        diff * diff
                    })
                    .sum();

                // Attract i and j.
                if d2 > 0.0 {
                    let coef = (-2.0 * a * b * d2.powf(b - 1.0)) / (1.0 + a * d2.powf(b));
                    for c in 0..dim {
                        let g = clip(coef * (layout[i * dim + c] - layout[j * dim + c]));
                        layout[i * dim + c] += alpha * g;
                        layout[j * dim + c] -= alpha * g;
                    }
                }

                // Repel i from random points.
                for _ in 0..self.config.negative_samples {
                    let k = rng.random_range(0..n);
                    if k == i {
                        continue;
                    }
                    let d2: f32 = (0..dim)
                        .map(|c| {
                            let diff = layout[i * dim + c] - layout[k * dim + c];
                            diff * diff
                        })
                        .sum();
                    let coef = (2.0 * gamma * b) / ((0.001 + d2) * (1.0 + a * d2.powf(b)));
                    for c in 0..dim {
                        let diff = layout[i * dim + c] - layout[k * dim + c];
                        // Coincident points get a maximal nudge apart.
                        let g = if coef > 0.0 { clip(coef * diff) } else { 4.0 };
                        layout[i * dim + c] += alpha * g;
                    }
                }
            }
        }
        layout
    }

    fn embed(&self, data: &[Vec<f32>], labels: Option<&[ClusterId]>) -> Result<Vec<Vec<f32>>> {
        let (n, dim) = self.validate(data)?;
        if let Some(labels) = labels {
            if labels.len() != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    found: labels.len(),
                });
            }
        }

        let flat: Vec<f32> = data.iter().flatten().copied().collect();
        let matrix = Array2::from_shape_vec((n, dim), flat).map_err(|e| {
            Error::Other(format!("failed to build input matrix: {e}"))
        })?;

        let neighbors = self.knn(&matrix);
        let calib = self.smooth_knn(&neighbors);
        let edges = self.fuzzy_graph(&neighbors, &calib, labels);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let layout = self.optimize(n, &edges, &mut rng);

        let out_dim = self.config.n_components;
        Ok((0..n)
            .map(|i| layout[i * out_dim..(i + 1) * out_dim].to_vec())
            .collect())
    }
}

impl DimensionalityReducer for ManifoldReducer {
    fn reduce(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        self.embed(data, None)
    }

    fn reduce_supervised(
        &self,
        data: &[Vec<f32>],
        labels: &[ClusterId],
    ) -> Result<Vec<Vec<f32>>> {
        self.embed(data, Some(labels))
    }

    fn n_components(&self) -> usize {
        self.config.n_components
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::euclidean;

    fn two_blobs() -> Vec<Vec<f32>> {
        // Two tight blobs of 8 points each in 4D.
        let mut data = Vec::new();
        for i in 0..8 {
            let t = i as f32 * 0.01;
            data.push(vec![t, 0.02 - t, t, 0.01]);
        }
        for i in 0..8 {
            let t = i as f32 * 0.01;
            data.push(vec![5.0 + t, 5.0 - t, 5.0 + t, 5.0]);
        }
        data
    }

    fn small_reducer() -> ManifoldReducer {
        ManifoldReducer::new(ManifoldConfig {
            n_components: 2,
            n_neighbors: 4,
            n_epochs: 50,
            seed: 7,
            ..Default::default()
        })
    }

    #[test]
    fn test_reduce_output_shape() {
        let data = two_blobs();
        let out = small_reducer().reduce(&data).unwrap();
        assert_eq!(out.len(), data.len());
        assert!(out.iter().all(|row| row.len() == 2));
        assert!(out.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_reduce_is_deterministic() {
        let data = two_blobs();
        let reducer = small_reducer();
        let a = reducer.reduce(&data).unwrap();
        let b = reducer.reduce(&data).unwrap();
        // Bit-for-bit identical across runs with the same seed.
        assert_eq!(a, b);
    }

    #[test]
    fn test_reduce_separates_blobs() {
        let data = two_blobs();
        let out = small_reducer().reduce(&data).unwrap();

        // Mean intra-blob distance should be well below the inter-blob
        // centroid distance.
        let centroid = |rows: &[Vec<f32>]| -> Vec<f32> {
            let mut c = vec![0.0f32; 2];
            for r in rows {
                c[0] += r[0];
                c[1] += r[1];
            }
            c.iter_mut().for_each(|v| *v /= rows.len() as f32);
            c
        };
        let ca = centroid(&out[..8]);
        let cb = centroid(&out[8..]);
        let spread_a: f32 =
            out[..8].iter().map(|r| euclidean(r, &ca)).sum::<f32>() / 8.0;
        let spread_b: f32 =
            out[8..].iter().map(|r| euclidean(r, &cb)).sum::<f32>() / 8.0;
        let gap = euclidean(&ca, &cb);
        assert!(
            gap > spread_a && gap > spread_b,
            "blobs not separated: gap={gap} spreads=({spread_a}, {spread_b})"
        );
    }

    #[test]
    fn test_supervised_respects_label_length() {
        let data = two_blobs();
        let labels = vec![ClusterId::Labeled(0); 4];
        let err = small_reducer().reduce_supervised(&data, &labels).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_supervised_is_deterministic() {
        let data = two_blobs();
        let mut labels = vec![ClusterId::Labeled(0); 8];
        labels.extend(vec![ClusterId::Labeled(1); 7]);
        labels.push(ClusterId::Noise);
        let reducer = small_reducer();
        let a = reducer.reduce_supervised(&data, &labels).unwrap();
        let b = reducer.reduce_supervised(&data, &labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_insufficient_data() {
        let data = vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]];
        let reducer = ManifoldReducer::default().with_n_neighbors(10);
        let err = reducer.reduce(&data).unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientData {
                required: 11,
                found: 3
            }
        );
    }

    #[test]
    fn test_empty_input() {
        let err = small_reducer().reduce(&[]).unwrap_err();
        assert_eq!(err, Error::EmptyInput);
    }

    #[test]
    fn test_fit_curve_matches_defaults_roughly() {
        // With min_dist=0.1, spread=1.0 the reference fit lands near
        // a=1.58, b=0.9; accept a loose window.
        let reducer = ManifoldReducer::default();
        let (a, b) = reducer.fit_curve();
        assert!((0.5..=3.0).contains(&a), "a={a}");
        assert!((0.5..=1.5).contains(&b), "b={b}");
    }
}
