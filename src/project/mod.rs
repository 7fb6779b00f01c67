//! Final 2D plotting coordinates.
//!
//! [`CoordinateProjector`] runs a label-supervised 2-component reduction over
//! the (L2-normalized) embeddings, then applies [`log_radius_compress`] so a
//! handful of far outliers cannot squash the rest of the map into a visually
//! indistinguishable blob: distance from the dataset center grows
//! logarithmically instead of linearly.

use crate::error::{Error, Result};
use crate::numeric::{l2_normalized, median};
use crate::reduce::DimensionalityReducer;
use crate::types::ClusterId;

/// Produces final 2D coordinates from embeddings and cluster ids.
#[derive(Debug, Clone)]
pub struct CoordinateProjector<R> {
    reducer: R,
}

impl<R: DimensionalityReducer> CoordinateProjector<R> {
    /// Wrap a reducer configured for 2 output components.
    pub fn new(reducer: R) -> Result<Self> {
        if reducer.n_components() != 2 {
            return Err(Error::InvalidParameter {
                name: "n_components",
                message: "coordinate projection requires a 2-component reducer",
            });
        }
        Ok(Self { reducer })
    }

    /// Project embeddings to 2D plotting coordinates, aligned with input
    /// order.
    pub fn project(
        &self,
        embeddings: &[Vec<f32>],
        cluster_ids: &[ClusterId],
    ) -> Result<Vec<(f32, f32)>> {
        let normalized = l2_normalized(embeddings);
        let reduced = self.reducer.reduce_supervised(&normalized, cluster_ids)?;
        let mut coords: Vec<(f32, f32)> = reduced.iter().map(|row| (row[0], row[1])).collect();
        log_radius_compress(&mut coords);
        Ok(coords)
    }
}

/// Radially compress coordinates around their coordinate-wise median.
///
/// Each point's offset from the center keeps its direction while its radius
/// `r` is replaced by `ln(1 + r)`. A zero radius is clamped to `1e-8` before
/// the division, so coincident-with-center points are a handled degenerate
/// case, not an error.
///
/// The transform is pure: identical input always yields identical output.
/// It is not idempotent — reapplying it compresses further.
pub fn log_radius_compress(points: &mut [(f32, f32)]) {
    if points.is_empty() {
        return;
    }
    let xs: Vec<f32> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f32> = points.iter().map(|p| p.1).collect();
    let (cx, cy) = (median(&xs), median(&ys));

    for p in points.iter_mut() {
        let dx = p.0 - cx;
        let dy = p.1 - cy;
        let r = (dx * dx + dy * dy).sqrt();
        let factor = r.ln_1p() / r.max(1e-8);
        p.0 = cx + dx * factor;
        p.1 = cy + dy * factor;
    }
}
