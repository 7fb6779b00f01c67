//! Density-based cluster assignment.
//!
//! Turns low-dimensional coordinates into discrete cluster ids. The shipped
//! strategy, [`DensityClusterer`], is hierarchical density clustering in the
//! HDBSCAN family: it finds dense groups of arbitrary shape without a
//! preset cluster count and labels points in sparse regions as noise.
//!
//! The only semantically meaningful output value is [`ClusterId::Noise`];
//! labeled ids are arbitrary per-run identifiers with no ordering beyond the
//! sort used for display.
//!
//! [`ClusterId::Noise`]: crate::types::ClusterId::Noise

mod density;
mod traits;

pub use density::{DensityClusterer, DensityConfig, SelectionMethod};
pub use traits::ClusterAssigner;
