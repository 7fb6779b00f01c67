//! Dimensionality reduction traits.

use crate::error::Result;
use crate::types::ClusterId;

/// Trait for dimensionality reduction strategies.
///
/// Implementations project N input vectors of a fixed dimension D to N output
/// vectors of dimension [`n_components`](Self::n_components), approximately
/// preserving local neighborhood structure. All internal randomness must be
/// seeded so that repeated runs on identical input produce bit-identical
/// output.
pub trait DimensionalityReducer {
    /// Project the input vectors without supervision.
    fn reduce(&self, data: &[Vec<f32>]) -> Result<Vec<Vec<f32>>>;

    /// Project the input vectors using per-point cluster ids as weak
    /// supervision: same-label points are pulled together, separation between
    /// labels is increased. Noise ids participate unlabeled.
    fn reduce_supervised(&self, data: &[Vec<f32>], labels: &[ClusterId])
        -> Result<Vec<Vec<f32>>>;

    /// Output dimensionality.
    fn n_components(&self) -> usize;
}
