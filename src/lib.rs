//! Cluster-graph construction for a visual map of software packages.
//!
//! `pkgatlas` turns a snapshot of package records (name, weekly downloads,
//! summary, embedding vector) into the data behind a zoomable 2D map: cluster
//! assignments, plot coordinates, per-cluster "constellation" edges among the
//! most-downloaded members, aggregate cluster statistics, and short
//! human-readable cluster labels.
//!
//! # Pipeline
//!
//! The stages run strictly in sequence over one static snapshot:
//!
//! 1. **Reduce** ([`reduce`]): a fuzzy-simplicial manifold reducer embeds the
//!    L2-normalized input vectors into a mid-dimensional space.
//! 2. **Cluster** ([`cluster`]): density clustering over the reduced vectors
//!    assigns each package a [`ClusterId`], with points in no dense region
//!    marked as noise.
//! 3. **Project** ([`project`]): a second, cluster-supervised reduction to 2D
//!    plus log-radius compression produces the plot coordinates.
//! 4. **Constellations** ([`constellation`]): per cluster, a Euclidean
//!    minimum spanning tree over the most-downloaded members, filtered by a
//!    global edge-length cutoff.
//! 5. **Metadata** ([`metadata`]): centroid, bounding box, and download
//!    totals per cluster.
//! 6. **Labels** ([`label`]): short labels from a caller-provided labeling
//!    collaborator, with budgets and per-cluster fallback.
//!
//! [`Pipeline`] orchestrates stages 1-5; labeling and the serialization
//! layers ([`artifacts`] for CSV, [`export`] for front-end JSON) are separate
//! calls because they involve external collaborators and the filesystem.
//!
//! # Example
//!
//! ```no_run
//! use pkgatlas::{Package, Pipeline, PipelineConfig};
//!
//! # fn main() -> pkgatlas::Result<()> {
//! let packages: Vec<Package> = load_snapshot();
//! let atlas = Pipeline::new(PipelineConfig::default()).run(&packages)?;
//! println!(
//!     "{} packages, {} clusters, {} edges",
//!     atlas.clustered.len(),
//!     atlas.metadata.len(),
//!     atlas.edges.len()
//! );
//! # Ok(())
//! # }
//! # fn load_snapshot() -> Vec<pkgatlas::Package> { Vec::new() }
//! ```
//!
//! Runs are deterministic: the same snapshot and configuration produce
//! byte-identical outputs.

pub mod artifacts;
pub mod cluster;
pub mod constellation;
pub mod error;
pub mod export;
pub mod label;
pub mod metadata;
pub mod numeric;
pub mod pipeline;
pub mod project;
pub mod reduce;
pub mod types;

pub use cluster::{ClusterAssigner, DensityClusterer, DensityConfig, SelectionMethod};
pub use constellation::{minimum_spanning_tree, ConstellationBuilder, ConstellationConfig};
pub use error::{Error, Result};
pub use export::{cluster_docs, edge_docs, package_docs, write_json};
pub use label::{
    generate_labels, ClusterLabeler, FnLabeler, LabelBudget, LabelCandidate, NOISE_LABEL,
};
pub use metadata::aggregate;
pub use pipeline::{AtlasSnapshot, Pipeline, PipelineConfig};
pub use project::{log_radius_compress, CoordinateProjector};
pub use reduce::{DimensionalityReducer, ManifoldConfig, ManifoldReducer, Metric};
pub use types::{
    ClusteredPackage, ClusterId, ClusterLabel, ClusterMetadata, ConstellationEdge, Package,
};
