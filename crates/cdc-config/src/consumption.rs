//! Unused-key guard.
//!
//! Consumed pointers are JSON Pointer prefixes. A leaf under any consumed
//! prefix is read by some part of the pipeline; every other leaf is unused,
//! usually a typo (`quality/upper_factr`) that would otherwise silently fall
//! back to a default.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every prefix [`crate::Settings::from_config_json`] reads.
static CONSUMED: &[&str] = &[
    "/paths/data_root",
    "/paths/state_dir",
    "/paths/metrics_dir",
    "/paths/bronze_dir",
    "/quality/core_entities",
    "/quality/history_window",
    "/quality/min_history_samples",
    "/quality/upper_factor",
    "/quality/lower_factor",
    "/quality/lower_floor",
];

pub fn consumed_pointers() -> &'static [&'static str] {
    CONSUMED
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Sorted, unique.
    pub consumed_prefixes: Vec<String>,
    /// Sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// With `Fail`, unused keys are an error; with `Warn`, they are only reported.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = consumed_pointers()
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected. \
            Remove them or fix their spelling. First few: {}",
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

/// Leading `/`, no trailing `/` unless the pointer is the root.
fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// RFC 6901 pointers of every scalar leaf; an empty array or object is not a leaf.
pub(crate) fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    let children: Vec<(String, &Value)> = match v {
        Value::Object(map) => map
            .iter()
            .map(|(k, child)| (k.replace('~', "~0").replace('/', "~1"), child))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, child)| (i.to_string(), child))
            .collect(),
        _ => {
            out.push(if prefix.is_empty() { "/".to_string() } else { prefix.to_string() });
            return;
        }
    };
    for (token, child) in children {
        collect_leaf_pointers(child, &format!("{prefix}/{token}"), out);
    }
}

/// First `n` pointers, comma-separated, with a count of the rest.
fn preview_list(items: &[String], n: usize) -> String {
    let shown = items.iter().take(n).map(String::as_str).collect::<Vec<_>>().join(", ");
    match items.len().saturating_sub(n) {
        0 => shown,
        rest => format!("{shown} (+{rest} more)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_respects_segment_boundary() {
        assert!(is_prefix_pointer("/quality", "/quality/upper_factor"));
        assert!(is_prefix_pointer("/paths/state_dir", "/paths/state_dir"));
        assert!(!is_prefix_pointer("/paths/state_dir", "/paths/state_dirs"));
        assert!(is_prefix_pointer("/", "/anything"));
    }

    #[test]
    fn leaves_include_array_elements_and_escape_tokens() {
        let mut out = Vec::new();
        collect_leaf_pointers(
            &serde_json::json!({"a/b": {"c~d": [1, 2]}}),
            "",
            &mut out,
        );
        assert_eq!(out, vec!["/a~1b/c~0d/0", "/a~1b/c~0d/1"]);
    }

    #[test]
    fn preview_counts_the_rest() {
        let items: Vec<String> = (0..4).map(|i| format!("/k{i}")).collect();
        assert_eq!(preview_list(&items, 2), "/k0, /k1 (+2 more)");
        assert_eq!(preview_list(&items[..1], 2), "/k0");
    }

    #[test]
    fn fail_policy_names_first_unused_keys() {
        let cfg = serde_json::json!({"quality": {"upper_factor": 2.0}, "legacy": {"x": 1}});
        let err = report_unused_keys(&cfg, UnusedKeyPolicy::Fail).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("CONFIG_UNUSED_KEYS"));
        assert!(msg.contains("/legacy/x"));
        assert!(!msg.contains("/quality"));
    }

    #[test]
    fn normalize_adds_leading_and_strips_trailing_slash() {
        assert_eq!(normalize_pointer("paths/"), "/paths");
        assert_eq!(normalize_pointer(""), "/");
    }
}
