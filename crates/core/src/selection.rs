use serde::{Deserialize, Serialize};

use crate::node::{Document, Node, Path, node_ref};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

/// Either a caret/range anchored in text, or a whole-node selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "selection", rename_all = "snake_case")]
pub enum Selection {
    Range { anchor: Point, focus: Point },
    Node { path: Path },
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Selection::Range {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn node(path: Path) -> Self {
        Selection::Node { path }
    }

    pub fn is_collapsed(&self) -> bool {
        match self {
            Selection::Range { anchor, focus } => anchor == focus,
            Selection::Node { .. } => false,
        }
    }

    pub fn anchor(&self) -> Option<&Point> {
        match self {
            Selection::Range { anchor, .. } => Some(anchor),
            Selection::Node { .. } => None,
        }
    }

    pub fn focus(&self) -> Option<&Point> {
        match self {
            Selection::Range { focus, .. } => Some(focus),
            Selection::Node { .. } => None,
        }
    }

    /// Path of the node this selection is anchored in: the text leaf's path
    /// for a range, the selected node's path for a node selection.
    pub fn anchor_path(&self) -> &[usize] {
        match self {
            Selection::Range { anchor, .. } => &anchor.path,
            Selection::Node { path } => path,
        }
    }

    /// Distance of the anchor's parent from the document root. A caret in a
    /// top-level paragraph sits at depth 1; inside a table cell's paragraph,
    /// deeper.
    pub fn depth(&self) -> usize {
        self.anchor_path().len().saturating_sub(1)
    }

    /// Kind of the ancestor two levels above the anchor, when it exists.
    pub fn grandparent_kind<'a>(&self, doc: &'a Document) -> Option<&'a str> {
        let path = self.anchor_path();
        if path.len() < 3 {
            return None;
        }
        node_ref(doc, &path[..path.len() - 2])?.kind()
    }
}

pub(crate) fn transform_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    let Selection::Range { anchor, focus } = selection else {
        return;
    };
    for point in [anchor, focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

pub(crate) fn transform_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let Selection::Range { anchor, focus } = selection else {
        return;
    };
    let removed_len = range.end.saturating_sub(range.start);
    for point in [anchor, focus] {
        if point.path != path {
            continue;
        }
        if point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn shift_path_on_insert(target: &mut Path, path: &[usize]) {
    let (parent_path, index) = path.split_at(path.len() - 1);
    let index = index[0];

    if target.len() <= parent_path.len() {
        return;
    }
    if !target.starts_with(parent_path) {
        return;
    }
    let depth = parent_path.len();
    if target[depth] >= index {
        target[depth] += 1;
    }
}

pub(crate) fn transform_insert_node(selection: &mut Selection, path: &[usize]) {
    if path.is_empty() {
        return;
    }
    match selection {
        Selection::Range { anchor, focus } => {
            shift_path_on_insert(&mut anchor.path, path);
            shift_path_on_insert(&mut focus.path, path);
        }
        Selection::Node { path: target } => shift_path_on_insert(target, path),
    }
}

pub(crate) fn transform_remove_node(
    selection: &mut Selection,
    path: &[usize],
    removed: &Node,
    doc_after_remove: &Document,
) {
    if path.is_empty() {
        return;
    }
    let (parent_path, index) = path.split_at(path.len() - 1);
    let index = index[0];

    // A node selection whose target goes away degrades to a caret near the
    // removal site; one past the removal shifts left.
    if let Selection::Node { path: target } = selection {
        if target.len() > parent_path.len() && target.starts_with(parent_path) {
            let depth = parent_path.len();
            let ix = target[depth];
            if ix > index {
                target[depth] = ix - 1;
            } else if ix == index {
                let mut caret_path = target[..=depth].to_vec();
                caret_path[depth] = index.saturating_sub(1);
                *selection = Selection::collapsed(Point::new(caret_path, 0));
            }
        }
        return;
    }

    let merge_prefix_len = match (removed, index.checked_sub(1)) {
        (Node::Text(removed_text), Some(left_index)) => {
            let mut left_path = parent_path.to_vec();
            left_path.push(left_index);
            match node_ref(doc_after_remove, &left_path) {
                Some(Node::Text(left_text))
                    if left_text.marks == removed_text.marks
                        && left_text.text.ends_with(&removed_text.text) =>
                {
                    Some(left_text.text.len().saturating_sub(removed_text.text.len()))
                }
                _ => None,
            }
        }
        _ => None,
    };

    let Selection::Range { anchor, focus } = selection else {
        return;
    };
    for point in [anchor, focus] {
        if point.path.len() <= parent_path.len() {
            continue;
        }
        if !point.path.starts_with(parent_path) {
            continue;
        }
        let depth = parent_path.len();
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        // Point was inside the removed subtree. Map it to a nearby point.
        if let (Some(prefix), Node::Text(removed_text), Some(left_index)) =
            (merge_prefix_len, removed, index.checked_sub(1))
        {
            point.path.truncate(depth + 1);
            point.path[depth] = left_index;
            point.offset = (prefix + point.offset).min(prefix + removed_text.text.len());
        } else {
            point.path.truncate(depth + 1);
            point.path[depth] = index.saturating_sub(1);
            point.offset = 0;
        }
    }
}
