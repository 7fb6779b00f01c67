//! Cluster labeling adapter.
//!
//! The actual label generation (an external natural-language service) is
//! provided by the user via a closure or trait implementation, keeping this
//! crate free of network concerns. This module owns everything around that
//! call: assembling per-cluster `(name, trimmed summary)` candidates under
//! character budgets, the noise label, and the per-cluster fallback policy —
//! a labeler failure is caught, logged, and replaced with a generic label; it
//! never aborts the batch.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::Result;
use crate::types::{ClusteredPackage, ClusterId, ClusterLabel};

/// Fixed label for the noise cluster; the labeler is never consulted for it.
pub const NOISE_LABEL: &str = "Not clustered";

/// One package offered to the labeler: name plus budget-trimmed summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelCandidate<'a> {
    /// Package name.
    pub name: &'a str,
    /// Summary, already trimmed to the per-item budget.
    pub summary: &'a str,
}

/// Character budgets for the text sent to the labeling collaborator.
#[derive(Debug, Clone)]
pub struct LabelBudget {
    /// Maximum characters kept per package summary (default: 256).
    pub max_chars_per_summary: usize,
    /// Maximum total characters across one cluster's candidates
    /// (default: 16384).
    pub max_total_chars: usize,
}

impl Default for LabelBudget {
    fn default() -> Self {
        Self {
            max_chars_per_summary: 256,
            max_total_chars: 16 * 1024,
        }
    }
}

/// Trait for cluster labeling strategies.
///
/// Given one cluster's candidate packages, produce a short (1-4 word)
/// descriptive label. Errors are handled by the caller via fallback.
pub trait ClusterLabeler {
    /// Label one cluster.
    fn label(&self, members: &[LabelCandidate<'_>]) -> Result<String>;
}

/// A function-based labeler.
#[derive(Clone)]
pub struct FnLabeler<F> {
    f: F,
}

impl<F> FnLabeler<F> {
    /// Create a labeler from a function.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ClusterLabeler for FnLabeler<F>
where
    F: Fn(&[LabelCandidate<'_>]) -> Result<String>,
{
    fn label(&self, members: &[LabelCandidate<'_>]) -> Result<String> {
        (self.f)(members)
    }
}

/// Create a labeler from a closure.
pub fn from_fn<F>(f: F) -> FnLabeler<F>
where
    F: Fn(&[LabelCandidate<'_>]) -> Result<String>,
{
    FnLabeler::new(f)
}

/// Truncate to at most `max_chars` characters, on a char boundary.
fn trim_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Generate one label per cluster id present in the snapshot.
///
/// Labeled clusters get the labeler's output; on any labeler error or empty
/// result, the fallback `Cluster {id}` is used instead and a warning is
/// logged. Noise is always [`NOISE_LABEL`]. Output is ordered labeled ids
/// ascending, noise last.
pub fn generate_labels<L: ClusterLabeler>(
    labeler: &L,
    packages: &[ClusteredPackage],
    budget: &LabelBudget,
) -> Vec<ClusterLabel> {
    let mut by_cluster: BTreeMap<ClusterId, Vec<&ClusteredPackage>> = BTreeMap::new();
    for pkg in packages {
        by_cluster.entry(pkg.cluster_id).or_default().push(pkg);
    }

    by_cluster
        .into_iter()
        .map(|(cluster_id, members)| {
            if cluster_id.is_noise() {
                return ClusterLabel {
                    cluster_id,
                    cluster_label: NOISE_LABEL.to_string(),
                };
            }

            // Per-item trim first, then stop adding candidates once the
            // overall budget is spent.
            let mut candidates: Vec<LabelCandidate<'_>> = Vec::new();
            let mut used = 0usize;
            for pkg in &members {
                let summary = trim_chars(&pkg.summary, budget.max_chars_per_summary);
                let cost = pkg.name.chars().count() + summary.chars().count() + 4;
                if used + cost > budget.max_total_chars {
                    break;
                }
                used += cost;
                candidates.push(LabelCandidate {
                    name: &pkg.name,
                    summary,
                });
            }

            let cluster_label = match labeler.label(&candidates) {
                Ok(label) if !label.trim().is_empty() => label.trim().to_string(),
                Ok(_) => {
                    warn!(cluster_id = %cluster_id, "labeler returned empty output, using fallback");
                    format!("Cluster {cluster_id}")
                }
                Err(err) => {
                    warn!(cluster_id = %cluster_id, error = %err, "labeling failed, using fallback");
                    format!("Cluster {cluster_id}")
                }
            };
            ClusterLabel {
                cluster_id,
                cluster_label,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn pkg(name: &str, summary: &str, cluster: ClusterId) -> ClusteredPackage {
        ClusteredPackage {
            name: name.to_string(),
            weekly_downloads: 0,
            summary: summary.to_string(),
            cluster_id: cluster,
            x: 0.0,
            y: 0.0,
        }
    }

    #[test]
    fn test_labels_per_cluster_with_noise_fixed() {
        let packages = vec![
            pkg("a", "numeric arrays", ClusterId::Labeled(0)),
            pkg("b", "linear algebra", ClusterId::Labeled(0)),
            pkg("c", "web framework", ClusterId::Labeled(1)),
            pkg("d", "", ClusterId::Noise),
        ];
        let labeler = from_fn(|members: &[LabelCandidate<'_>]| {
            Ok(format!("{} things", members.len()))
        });
        let labels = generate_labels(&labeler, &packages, &LabelBudget::default());

        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].cluster_id, ClusterId::Labeled(0));
        assert_eq!(labels[0].cluster_label, "2 things");
        assert_eq!(labels[1].cluster_label, "1 things");
        assert_eq!(labels[2].cluster_id, ClusterId::Noise);
        assert_eq!(labels[2].cluster_label, NOISE_LABEL);
    }

    #[test]
    fn test_failure_falls_back_per_cluster() {
        let packages = vec![
            pkg("a", "", ClusterId::Labeled(3)),
            pkg("b", "", ClusterId::Labeled(7)),
        ];
        let labeler = from_fn(|members: &[LabelCandidate<'_>]| {
            if members[0].name == "a" {
                Err(Error::Labeling("service unavailable".into()))
            } else {
                Ok("Graph tools".to_string())
            }
        });
        let labels = generate_labels(&labeler, &packages, &LabelBudget::default());
        // The failing cluster gets the fallback; the other is unaffected.
        assert_eq!(labels[0].cluster_label, "Cluster 3");
        assert_eq!(labels[1].cluster_label, "Graph tools");
    }

    #[test]
    fn test_empty_output_falls_back() {
        let packages = vec![pkg("a", "", ClusterId::Labeled(2))];
        let labeler = from_fn(|_: &[LabelCandidate<'_>]| Ok("   ".to_string()));
        let labels = generate_labels(&labeler, &packages, &LabelBudget::default());
        assert_eq!(labels[0].cluster_label, "Cluster 2");
    }

    #[test]
    fn test_per_item_budget_trims_summaries() {
        let long = "x".repeat(500);
        let packages = vec![pkg("a", &long, ClusterId::Labeled(0))];
        let labeler = from_fn(|members: &[LabelCandidate<'_>]| {
            assert_eq!(members[0].summary.chars().count(), 256);
            Ok("ok".to_string())
        });
        let _ = generate_labels(&labeler, &packages, &LabelBudget::default());
    }

    #[test]
    fn test_total_budget_limits_candidates() {
        let packages: Vec<ClusteredPackage> = (0..100)
            .map(|i| pkg(&format!("pkg{i:03}"), "0123456789", ClusterId::Labeled(0)))
            .collect();
        // Each candidate costs 6 + 10 + 4 = 20 chars; a 100-char budget
        // admits five.
        let budget = LabelBudget {
            max_chars_per_summary: 256,
            max_total_chars: 100,
        };
        let labeler = from_fn(|members: &[LabelCandidate<'_>]| {
            assert_eq!(members.len(), 5);
            Ok("ok".to_string())
        });
        let _ = generate_labels(&labeler, &packages, &budget);
    }

    #[test]
    fn test_trim_chars_respects_char_boundaries() {
        assert_eq!(trim_chars("héllo", 2), "hé");
        assert_eq!(trim_chars("ab", 5), "ab");
    }
}
