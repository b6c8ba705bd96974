//! Three-way annotation merge.

use crate::annotations::{self, Annotations};

/// Result of merging a freshly rendered set into an object's annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing is rendered and nothing was applied before; leave the object alone.
    Skip,
    /// The annotation map to store, including the refreshed marker.
    Merged(Annotations),
}

impl MergeOutcome {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }

    pub fn into_annotations(self) -> Option<Annotations> {
        match self {
            Self::Skip => None,
            Self::Merged(annotations) => Some(annotations),
        }
    }
}

/// Recovers the set recorded by the previous pass from `marker_key`.
pub fn last_applied_from(current: &Annotations, marker_key: &str) -> Annotations {
    current
        .get(marker_key)
        .map(|text| annotations::parse(text))
        .unwrap_or_default()
}

/// Merges `expected` into `current`.
///
/// Keys from `expected` are added or overwritten, keys recorded in
/// `last_applied` but no longer expected are removed, and `marker_key` is
/// set to the serialization of the resulting map without the marker itself.
///
/// Unmanaged keys present in `current` end up in the marker too, so the
/// following pass removes them. From the pass after that the merge is a
/// fixed point for the same `expected` set.
pub fn merge(
    current: &Annotations,
    expected: &Annotations,
    last_applied: &Annotations,
    marker_key: &str,
) -> MergeOutcome {
    if expected.is_empty() && last_applied.is_empty() {
        return MergeOutcome::Skip;
    }

    let mut results = current.clone();
    results.extend(
        expected
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    for key in last_applied.keys() {
        if !expected.contains_key(key) {
            results.remove(key);
        }
    }

    let mut merged = results.clone();
    results.remove(marker_key);
    merged.insert(marker_key.to_string(), annotations::serialize(&results));

    MergeOutcome::Merged(merged)
}
