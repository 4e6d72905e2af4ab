use std::collections::HashMap;

use rustc_hash::FxHashMap;

use crate::node::{Document, walk_nodes};

/// Generated ids of nodes whose kinds have bound views, mapped to the
/// owning extension's name. Nodes without an id attr are invisible here.
pub fn collect_tracked_ids(
    doc: &Document,
    tracked_kinds: &HashMap<String, String>,
) -> FxHashMap<String, String> {
    let mut ids = FxHashMap::default();
    walk_nodes(doc, |_, node| {
        let Some(kind) = node.kind() else {
            return;
        };
        let Some(extension) = tracked_kinds.get(kind) else {
            return;
        };
        if let Some(id) = node.id() {
            ids.insert(id.to_string(), extension.clone());
        }
    });
    ids
}

/// Per-extension registry of node id → view handle. Removal is idempotent:
/// a second removal of the same id is a no-op, and only effective removals
/// count.
#[derive(Debug)]
pub struct NodeViews<H> {
    views: FxHashMap<String, H>,
    removals: usize,
}

impl<H> Default for NodeViews<H> {
    fn default() -> Self {
        Self {
            views: FxHashMap::default(),
            removals: 0,
        }
    }
}

impl<H> NodeViews<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, handle: H) -> Option<H> {
        self.views.insert(id.into(), handle)
    }

    pub fn get(&self, id: &str) -> Option<&H> {
        self.views.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.views.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<H> {
        let removed = self.views.remove(id);
        if removed.is_some() {
            self.removals += 1;
        }
        removed
    }

    /// Count of effective removals, for auditing cleanup behavior.
    pub fn removals(&self) -> usize {
        self.removals
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }
}
