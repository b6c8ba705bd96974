//! Compact `key=value` annotation-set text format.
//!
//! The same format is used for scope template output and for the
//! last-applied marker stored on every managed object:
//!
//! ```text
//! key1=value1,
//! key2=value2
//! ```
//!
//! Entries are separated by `,\n`, `\n` or `,`. Each entry is split on its
//! first `=`, so values may contain `=` but never a separator.

use std::collections::BTreeMap;

/// Annotation key under which a scope carries its template text.
pub const TEMPLATE_ANNOTATION: &str = "scribe.anza-labs.dev/annotations";

/// Annotation key holding the serialized set applied by the previous pass.
pub const LAST_APPLIED_ANNOTATION: &str = "scribe.anza-labs.dev/last-applied-annotations";

/// An annotation set. Keys iterate in byte order.
pub type Annotations = BTreeMap<String, String>;

/// Parses annotation text into a map.
///
/// Entries without `=` are silently discarded and an empty input yields an
/// empty map. When a key repeats, the last entry wins.
pub fn parse(input: &str) -> Annotations {
    let normalized = input.replace(",\n", ",").replace('\n', ",");

    normalized
        .trim()
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Serializes a map into annotation text.
///
/// Keys are emitted in ascending byte order and joined with `,\n`.
pub fn serialize(annotations: &Annotations) -> String {
    annotations
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",\n")
}
