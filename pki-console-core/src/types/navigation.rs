//! Navigation tree types and active-state computation

use serde::{Deserialize, Serialize};

/// One entry of the navigation tree.
///
/// `active` is never taken from the wire; it is recomputed as a pure
/// function of the current page every time the page or the tree changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavEntry {
    /// Page identifier this entry navigates to
    pub key: String,
    /// Display label
    pub label: String,
    /// Child entries (one level deep)
    pub entries: Vec<NavEntry>,
    /// Whether the entry corresponds to the current page (computed)
    #[serde(skip_deserializing)]
    pub active: bool,
}

/// Whether `key` appears in the tree, searching top-level entries and their
/// direct children.
#[must_use]
pub fn contains_key(entries: &[NavEntry], key: &str) -> bool {
    entries
        .iter()
        .any(|e| e.key == key || e.entries.iter().any(|c| c.key == key))
}

/// Recomputes every `active` flag from `page`.
///
/// Top-level entries are active iff their key matches. A matching child
/// activates both itself and its parent. Deterministic and idempotent.
pub fn recompute_active_state(entries: &mut [NavEntry], page: Option<&str>) {
    for entry in entries {
        entry.active = page == Some(entry.key.as_str());
        for child in &mut entry.entries {
            child.active = false;
        }
        if let Some(child) = entry
            .entries
            .iter_mut()
            .find(|c| page == Some(c.key.as_str()))
        {
            child.active = true;
            entry.active = true;
        }
    }
}
