//! Shared numeric utilities.
//!
//! Small distance and normalization helpers used by every pipeline stage.
//! Distances are computed in `f32` for layout work and in `f64` where they
//! feed a linkage hierarchy.

/// Euclidean distance between two points.
#[inline]
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Euclidean distance accumulated in `f64`, for condensed dissimilarity
/// matrices.
#[inline]
pub fn euclidean_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Cosine distance `1 - cos(a, b)`.
///
/// Zero-norm inputs are treated as maximally distant (distance 1).
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom <= f32::EPSILON {
        return 1.0;
    }
    1.0 - dot / denom
}

/// L2-normalize each row, returning the normalized copy.
///
/// Zero vectors are returned unchanged rather than divided by zero.
pub fn l2_normalized(data: &[Vec<f32>]) -> Vec<Vec<f32>> {
    data.iter()
        .map(|row| {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm <= f32::EPSILON {
                row.clone()
            } else {
                row.iter().map(|v| v / norm).collect()
            }
        })
        .collect()
}

/// Median of a set of values. Even-length inputs use the mean of the two
/// middle values. Empty input returns 0.
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
