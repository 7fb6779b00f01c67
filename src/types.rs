//! Core data model for the package map.
//!
//! Every entity here is derived once per pipeline run from an immutable input
//! snapshot and never mutated afterwards; recomputation replaces the whole
//! set.

use core::fmt;
use std::cmp::Ordering;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Discrete cluster identifier.
///
/// The external convention is a string column where `"-1"` marks points that
/// density clustering could not assign to any group. Internally that sentinel
/// is a real variant so cluster logic never string-compares; the string form
/// appears only at the serde boundary.
///
/// Labels carry no meaning beyond equality. Ordering exists for stable
/// display output: labeled ids ascending, noise last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterId {
    /// Unclustered / noise. Serialized as `"-1"`.
    Noise,
    /// An opaque per-run cluster label. Serialized as its decimal digits.
    Labeled(u32),
}

impl ClusterId {
    /// Whether this id is the noise sentinel.
    pub fn is_noise(&self) -> bool {
        matches!(self, ClusterId::Noise)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterId::Noise => write!(f, "-1"),
            ClusterId::Labeled(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for ClusterId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "-1" {
            return Ok(ClusterId::Noise);
        }
        s.parse::<u32>()
            .map(ClusterId::Labeled)
            .map_err(|_| Error::InvalidParameter {
                name: "cluster_id",
                message: "expected \"-1\" or a non-negative integer label",
            })
    }
}

impl Ord for ClusterId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ClusterId::Labeled(a), ClusterId::Labeled(b)) => a.cmp(b),
            (ClusterId::Labeled(_), ClusterId::Noise) => Ordering::Less,
            (ClusterId::Noise, ClusterId::Labeled(_)) => Ordering::Greater,
            (ClusterId::Noise, ClusterId::Noise) => Ordering::Equal,
        }
    }
}

impl PartialOrd for ClusterId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for ClusterId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClusterId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: Error| D::Error::custom(e.to_string()))
    }
}

/// Immutable input record: one package from the dataset snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    /// Unique package name.
    pub name: String,
    /// Weekly download count; an absent upstream value is 0.
    pub weekly_downloads: u64,
    /// Short description; may be empty.
    pub summary: String,
    /// Semantic embedding, fixed dimension across the dataset.
    pub embedding: Vec<f32>,
}

/// A package after clustering and projection: cluster id plus final 2D
/// plotting coordinates. The embedding is not carried past this point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteredPackage {
    /// Unique package name.
    pub name: String,
    /// Weekly download count.
    pub weekly_downloads: u64,
    /// Short description.
    pub summary: String,
    /// Assigned cluster id.
    pub cluster_id: ClusterId,
    /// Final x coordinate (finite).
    pub x: f32,
    /// Final y coordinate (finite).
    pub y: f32,
}

/// One minimum-spanning-tree edge of a cluster's constellation.
///
/// Endpoint coordinates are snapshots taken at edge creation, not references;
/// both endpoints belong to `cluster_id`, which is never [`ClusterId::Noise`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstellationEdge {
    /// Cluster this edge belongs to.
    pub cluster_id: ClusterId,
    /// Name of the source package.
    pub from_package: String,
    /// Name of the target package.
    pub to_package: String,
    /// Source x coordinate.
    pub from_x: f32,
    /// Source y coordinate.
    pub from_y: f32,
    /// Target x coordinate.
    pub to_x: f32,
    /// Target y coordinate.
    pub to_y: f32,
}

/// Aggregate statistics for one cluster, noise included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    /// Cluster id.
    pub cluster_id: ClusterId,
    /// Mean x over members.
    pub centroid_x: f32,
    /// Mean y over members.
    pub centroid_y: f32,
    /// Sum of member download counts.
    pub total_weekly_downloads: u64,
    /// Bounding box: minimum x over members.
    pub min_x: f32,
    /// Bounding box: maximum x over members.
    pub max_x: f32,
    /// Bounding box: minimum y over members.
    pub min_y: f32,
    /// Bounding box: maximum y over members.
    pub max_y: f32,
}

/// A human-readable label for one cluster, from the labeling collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterLabel {
    /// Cluster id.
    pub cluster_id: ClusterId,
    /// Short descriptive label (1-4 words), or a fallback.
    pub cluster_label: String,
}
