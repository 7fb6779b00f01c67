//! Stage orchestration.
//!
//! One [`Pipeline::run`] call processes one static snapshot: embeddings →
//! cluster ids → 2D coordinates → (constellation edges, cluster metadata).
//! Stages run strictly in sequence, each consuming the complete output of
//! its predecessor; any stage error aborts the run and discards partial
//! output, since no stage's output is useful without its successors.
//!
//! The dimensionality reducer runs twice with independent configurations:
//! unsupervised into [`PipelineConfig::clustering_reducer`] components for
//! density clustering, then supervised into 2 components for the plot.

use tracing::info;

use crate::cluster::{ClusterAssigner, DensityClusterer, DensityConfig};
use crate::constellation::{ConstellationBuilder, ConstellationConfig};
use crate::error::{Error, Result};
use crate::metadata::aggregate;
use crate::numeric::l2_normalized;
use crate::project::CoordinateProjector;
use crate::reduce::{DimensionalityReducer, ManifoldConfig, ManifoldReducer, Metric};
use crate::types::{ClusteredPackage, ClusterMetadata, ConstellationEdge, Package};

/// Explicit configuration for every stage; there is no ambient state.
///
/// Defaults reproduce the production map parameters.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Unsupervised reduction feeding the density clusterer.
    pub clustering_reducer: ManifoldConfig,
    /// Supervised 2-component reduction for the plot.
    pub projection_reducer: ManifoldConfig,
    /// Density clustering parameters.
    pub clusterer: DensityConfig,
    /// Constellation construction parameters.
    pub constellations: ConstellationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clustering_reducer: ManifoldConfig {
                n_components: 16,
                n_neighbors: 10,
                min_dist: 0.03,
                metric: Metric::Euclidean,
                seed: 0,
                ..Default::default()
            },
            projection_reducer: ManifoldConfig {
                n_components: 2,
                n_neighbors: 12,
                min_dist: 0.6,
                repulsion_strength: 0.3,
                target_weight: 0.5,
                spread: 0.7,
                metric: Metric::Euclidean,
                seed: 0,
                ..Default::default()
            },
            clusterer: DensityConfig::default(),
            constellations: ConstellationConfig::default(),
        }
    }
}

/// Everything one pipeline run derives from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasSnapshot {
    /// Packages with cluster ids and final coordinates, in input order.
    pub clustered: Vec<ClusteredPackage>,
    /// Per-cluster statistics, noise included.
    pub metadata: Vec<ClusterMetadata>,
    /// Filtered constellation edges.
    pub edges: Vec<ConstellationEdge>,
}

/// The cluster-graph construction pipeline.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline from a configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Process one snapshot.
    pub fn run(&self, packages: &[Package]) -> Result<AtlasSnapshot> {
        if packages.is_empty() {
            return Err(Error::EmptyInput);
        }
        let dim = packages[0].embedding.len();
        if let Some(bad) = packages.iter().find(|p| p.embedding.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                found: bad.embedding.len(),
            });
        }

        let embeddings: Vec<Vec<f32>> =
            packages.iter().map(|p| p.embedding.clone()).collect();

        // Stage 1: cluster ids from a fresh unsupervised reduction.
        let normalized = l2_normalized(&embeddings);
        let reducer = ManifoldReducer::new(self.config.clustering_reducer.clone());
        let reduced = reducer.reduce(&normalized)?;
        let coords_for_clustering = l2_normalized(&reduced);
        let clusterer = DensityClusterer::new(self.config.clusterer.clone());
        let cluster_ids = clusterer.assign(&coords_for_clustering)?;

        let distinct: std::collections::BTreeSet<_> = cluster_ids.iter().copied().collect();
        let noise = cluster_ids.iter().filter(|id| id.is_noise()).count();
        info!(
            clusters = distinct.iter().filter(|id| !id.is_noise()).count(),
            noise_points = noise,
            "assigned cluster ids"
        );

        // Stage 2: plot coordinates (supervised reduction + log-radius
        // compression).
        let projector = CoordinateProjector::new(ManifoldReducer::new(
            self.config.projection_reducer.clone(),
        ))?;
        let coords = projector.project(&embeddings, &cluster_ids)?;

        let clustered: Vec<ClusteredPackage> = packages
            .iter()
            .zip(cluster_ids.iter())
            .zip(coords.iter())
            .map(|((pkg, &cluster_id), &(x, y))| ClusteredPackage {
                name: pkg.name.clone(),
                weekly_downloads: pkg.weekly_downloads,
                summary: pkg.summary.clone(),
                cluster_id,
                x,
                y,
            })
            .collect();
        info!(packages = clustered.len(), "projected plot coordinates");

        // Stage 3 and 4: independent derivations from the clustered set.
        let edges = ConstellationBuilder::new(self.config.constellations.clone())
            .build(&clustered);
        info!(edges = edges.len(), "built constellation edges");

        let metadata = aggregate(&clustered);
        info!(clusters = metadata.len(), "aggregated cluster metadata");

        Ok(AtlasSnapshot {
            clustered,
            metadata,
            edges,
        })
    }
}
