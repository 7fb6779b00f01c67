//! Dimensionality reduction for clustering and visualization.
//!
//! The rest of the pipeline depends only on the [`DimensionalityReducer`]
//! contract (vectors in, vectors out, deterministic given a seed), never on a
//! specific algorithm's parameter surface. The concrete strategy shipped here
//! is [`ManifoldReducer`], a neighborhood-graph embedding in the UMAP family.
//!
//! The pipeline invokes reduction twice, with independent configurations:
//! once unsupervised into ~16 components for density clustering, and once
//! label-supervised into 2 components for the final plot. These are separate
//! invocations, not a shared cache.

mod manifold;
mod traits;

pub use manifold::{ManifoldConfig, ManifoldReducer, Metric};
pub use traits::DimensionalityReducer;
