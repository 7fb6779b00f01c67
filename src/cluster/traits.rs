//! Cluster assignment traits.

use crate::error::Result;
use crate::types::ClusterId;

/// Trait for cluster assignment strategies.
///
/// Implementations turn low-dimensional coordinates into one discrete cluster
/// id per point. Points in regions too sparse to form a group are labeled
/// [`ClusterId::Noise`]; all other labels are arbitrary but stable within a
/// run.
pub trait ClusterAssigner {
    /// Assign one cluster id per input point.
    fn assign(&self, coords: &[Vec<f32>]) -> Result<Vec<ClusterId>>;
}
