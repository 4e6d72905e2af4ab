use std::cmp::Ordering;
use std::sync::Arc;

use crate::node::{
    Attrs, AttrPatch, Document, ElementNode, Marks, Node, Path, TextNode, node_ref,
};
use crate::ops::{Op, Transaction, clamp_to_char_boundary};
use crate::selection::{Point, Selection};
use crate::state::{EditorState, StatePreview};

#[derive(Debug, Clone)]
pub struct UpdateError {
    message: String,
}

impl UpdateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// One semantic edit, expressed as a pure function from (pre-chain state,
/// in-progress transaction) to an extended transaction.
///
/// Returning the transaction unchanged signals a no-op for the current
/// state; an error signals the operation does not apply to the current
/// selection shape. Neither mutates the state.
pub trait DocumentUpdate: Send + Sync {
    fn update(&self, state: &EditorState, tx: Transaction) -> Result<Transaction, UpdateError>;
}

/// An ordered chain of updates. Application is an explicit fold: the
/// accumulator transaction produced by update `i` feeds update `i + 1`,
/// while the state stays the original pre-chain state throughout.
#[derive(Default, Clone)]
pub struct UpdateChain {
    updates: Vec<Arc<dyn DocumentUpdate>>,
}

impl UpdateChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(update: impl DocumentUpdate + 'static) -> Self {
        Self::new().then(update)
    }

    pub fn then(mut self, update: impl DocumentUpdate + 'static) -> Self {
        self.updates.push(Arc::new(update));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn apply(&self, state: &EditorState) -> Result<Transaction, UpdateError> {
        let mut tx = Transaction::default();
        for update in &self.updates {
            tx = update.update(state, tx)?;
        }
        Ok(tx)
    }
}

fn preview(state: &EditorState, tx: &Transaction) -> Result<StatePreview, UpdateError> {
    state
        .preview(tx)
        .map_err(|e| UpdateError::new(format!("Transaction preview failed: {e}")))
}

/// Inserts a prebuilt node at an explicit path.
pub struct InsertNodeUpdate {
    pub path: Path,
    pub node: Node,
}

impl DocumentUpdate for InsertNodeUpdate {
    fn update(&self, state: &EditorState, mut tx: Transaction) -> Result<Transaction, UpdateError> {
        let preview = preview(state, &tx)?;
        if !insert_path_is_valid(&preview.doc, &self.path) {
            return Err(UpdateError::new(format!(
                "Cannot insert node at {:?}",
                self.path
            )));
        }
        tx.push(Op::InsertNode {
            path: self.path.clone(),
            node: self.node.clone(),
        });
        Ok(tx)
    }
}

fn insert_path_is_valid(doc: &Document, path: &[usize]) -> bool {
    let Some((&index, parent_path)) = path.split_last() else {
        return false;
    };
    if parent_path.is_empty() {
        return index <= doc.children.len();
    }
    match node_ref(doc, parent_path) {
        Some(Node::Element(el)) => index <= el.children.len(),
        _ => false,
    }
}

/// Removes the node at a path. Missing path is a no-op.
pub struct RemoveNodeUpdate {
    pub path: Path,
}

impl DocumentUpdate for RemoveNodeUpdate {
    fn update(&self, state: &EditorState, mut tx: Transaction) -> Result<Transaction, UpdateError> {
        let preview = preview(state, &tx)?;
        if node_ref(&preview.doc, &self.path).is_none() {
            return Ok(tx);
        }
        tx.push(Op::RemoveNode {
            path: self.path.clone(),
        });
        Ok(tx)
    }
}

/// Patches attributes on the node at a path. A patch that would change
/// nothing, or a missing node, is a no-op.
pub struct SetNodeAttrsUpdate {
    pub path: Path,
    pub patch: AttrPatch,
}

impl DocumentUpdate for SetNodeAttrsUpdate {
    fn update(&self, state: &EditorState, mut tx: Transaction) -> Result<Transaction, UpdateError> {
        if self.patch.is_empty() {
            return Ok(tx);
        }
        let preview = preview(state, &tx)?;
        let Some(attrs) = node_ref(&preview.doc, &self.path).and_then(|n| n.attrs()) else {
            return Ok(tx);
        };

        let changes_something = self
            .patch
            .set
            .iter()
            .any(|(k, v)| attrs.get(k) != Some(v))
            || self.patch.remove.iter().any(|k| attrs.contains_key(k));
        if !changes_something {
            return Ok(tx);
        }

        tx.push(Op::SetNodeAttrs {
            path: self.path.clone(),
            patch: self.patch.clone(),
        });
        Ok(tx)
    }
}

/// Sets the resulting selection of the transaction. A node selection must
/// point at a node that exists once the pending ops have run.
pub struct SetSelectionUpdate {
    pub selection: Selection,
}

impl DocumentUpdate for SetSelectionUpdate {
    fn update(&self, state: &EditorState, mut tx: Transaction) -> Result<Transaction, UpdateError> {
        if let Selection::Node { path } = &self.selection {
            let preview = preview(state, &tx)?;
            if node_ref(&preview.doc, path).is_none() {
                return Err(UpdateError::new(format!(
                    "Node selection targets a missing node at {path:?}"
                )));
            }
        }
        tx.selection_after = Some(self.selection.clone());
        Ok(tx)
    }
}

/// Selects the node at a path as a node selection.
pub struct SelectNodeUpdate {
    pub path: Path,
}

impl DocumentUpdate for SelectNodeUpdate {
    fn update(&self, state: &EditorState, tx: Transaction) -> Result<Transaction, UpdateError> {
        SetSelectionUpdate {
            selection: Selection::node(self.path.clone()),
        }
        .update(state, tx)
    }
}

/// Inserts text at the caret. Consumes the mark holder when it targets the
/// caret: the run is inserted as its own leaf carrying the staged marks.
pub struct InsertTextUpdate {
    pub text: String,
}

impl DocumentUpdate for InsertTextUpdate {
    fn update(&self, state: &EditorState, mut tx: Transaction) -> Result<Transaction, UpdateError> {
        if self.text.is_empty() {
            return Ok(tx);
        }
        let preview = preview(state, &tx)?;

        let Selection::Range { anchor, focus } = &preview.selection else {
            return Err(UpdateError::new("Cannot insert text at a node selection"));
        };

        let (start, end) = order_points(anchor, focus);
        if start.path != end.path {
            return Err(UpdateError::new(
                "Cannot insert text across multiple leaves",
            ));
        }

        let Some(Node::Text(leaf)) = node_ref(&preview.doc, &start.path) else {
            return Err(UpdateError::new("Caret is not in a text leaf"));
        };

        if start.offset < end.offset {
            tx.push(Op::RemoveText {
                path: start.path.clone(),
                range: start.offset..end.offset,
            });
        }

        let staged = state.mark_holder.as_ref().filter(|h| &h.at == focus);
        match staged {
            Some(holder) if holder.marks != leaf.marks => {
                let offset = start.offset.min(leaf.text.len());
                let cut = end.offset.max(start.offset).min(leaf.text.len());
                let tail = leaf.text[cut..].to_string();

                if !tail.is_empty() {
                    tx.push(Op::RemoveText {
                        path: start.path.clone(),
                        range: offset..leaf.text.len(),
                    });
                }

                let run_path = sibling_path(&start.path, 1);
                tx.push(Op::InsertNode {
                    path: run_path.clone(),
                    node: Node::Text(TextNode {
                        text: self.text.clone(),
                        marks: holder.marks.clone(),
                    }),
                });

                if !tail.is_empty() {
                    tx.push(Op::InsertNode {
                        path: sibling_path(&start.path, 2),
                        node: Node::Text(TextNode {
                            text: tail,
                            marks: leaf.marks.clone(),
                        }),
                    });
                }

                tx.selection_after = Some(Selection::collapsed(Point::new(
                    run_path,
                    self.text.len(),
                )));
            }
            _ => {
                tx.push(Op::InsertText {
                    path: start.path.clone(),
                    offset: start.offset,
                    text: self.text.clone(),
                });
            }
        }

        Ok(tx)
    }
}

/// Toggles a mark over the selected range. Covered spans flip as a set:
/// when every span already carries the mark it comes off, otherwise it goes
/// on everywhere. A leaf only partially covered is split at the range
/// boundary so text outside the selection keeps its marks. A collapsed
/// selection is a no-op here — provisional marks go through the holder.
pub struct ToggleMarkUpdate {
    pub kind: String,
    pub attrs: Attrs,
}

struct LeafSpan {
    path: Path,
    leaf: TextNode,
    lo: usize,
    hi: usize,
    next: Option<Marks>,
}

impl DocumentUpdate for ToggleMarkUpdate {
    fn update(&self, state: &EditorState, mut tx: Transaction) -> Result<Transaction, UpdateError> {
        let preview = preview(state, &tx)?;

        let Selection::Range { anchor, focus } = &preview.selection else {
            return Err(UpdateError::new("Cannot toggle a mark on a node selection"));
        };
        if anchor == focus {
            return Ok(tx);
        }

        let (start, end) = order_points(anchor, focus);
        let mut spans = covered_spans(&preview.doc, start, end);
        if spans.is_empty() {
            return Ok(tx);
        }

        let all_marked = spans.iter().all(|s| s.leaf.marks.has(&self.kind));
        for span in &mut spans {
            let mut next = span.leaf.marks.clone();
            if all_marked {
                next.remove(&self.kind);
            } else {
                next.add(self.kind.clone(), self.attrs.clone());
            }
            if next != span.leaf.marks {
                span.next = Some(next);
            }
        }
        if spans.iter().all(|s| s.next.is_none()) {
            return Ok(tx);
        }

        // Last leaf first, so sibling inserts don't disturb the paths of
        // spans still to be emitted.
        for span in spans.iter().rev() {
            let Some(next) = &span.next else {
                continue;
            };
            let len = span.leaf.text.len();
            if span.lo == 0 && span.hi == len {
                tx.push(Op::SetTextMarks {
                    path: span.path.clone(),
                    marks: next.clone(),
                });
            } else if span.lo > 0 {
                tx.push(Op::RemoveText {
                    path: span.path.clone(),
                    range: span.lo..len,
                });
                tx.push(Op::InsertNode {
                    path: sibling_path(&span.path, 1),
                    node: Node::Text(TextNode {
                        text: span.leaf.text[span.lo..span.hi].to_string(),
                        marks: next.clone(),
                    }),
                });
                if span.hi < len {
                    tx.push(Op::InsertNode {
                        path: sibling_path(&span.path, 2),
                        node: Node::Text(TextNode {
                            text: span.leaf.text[span.hi..].to_string(),
                            marks: span.leaf.marks.clone(),
                        }),
                    });
                }
            } else {
                tx.push(Op::RemoveText {
                    path: span.path.clone(),
                    range: 0..span.hi,
                });
                tx.push(Op::InsertNode {
                    path: span.path.clone(),
                    node: Node::Text(TextNode {
                        text: span.leaf.text[..span.hi].to_string(),
                        marks: next.clone(),
                    }),
                });
            }
        }

        if let Some(selection) = span_selection(&spans) {
            tx.selection_after = Some(selection);
        }
        Ok(tx)
    }
}

fn covered_spans(doc: &Document, start: &Point, end: &Point) -> Vec<LeafSpan> {
    let mut spans = Vec::new();
    crate::node::walk_nodes(doc, |path, node| {
        let Node::Text(t) = node else {
            return;
        };
        if path < start.path.as_slice() || path > end.path.as_slice() {
            return;
        }
        let lo = if path == start.path.as_slice() {
            clamp_to_char_boundary(&t.text, start.offset)
        } else {
            0
        };
        let hi = if path == end.path.as_slice() {
            clamp_to_char_boundary(&t.text, end.offset)
        } else {
            t.text.len()
        };
        if lo < hi {
            spans.push(LeafSpan {
                path: path.to_vec(),
                leaf: t.clone(),
                lo,
                hi,
                next: None,
            });
        }
    });
    spans
}

/// The range covering exactly the toggled text once the split ops have run.
fn span_selection(spans: &[LeafSpan]) -> Option<Selection> {
    let first = spans.first()?;
    let last = spans.last()?;
    let first_split = first.next.is_some() && first.lo > 0;

    let anchor = if first_split {
        Point::new(sibling_path(&first.path, 1), 0)
    } else {
        Point::new(first.path.clone(), first.lo)
    };

    let focus = if last.next.is_some() && last.lo > 0 {
        Point::new(sibling_path(&last.path, 1), last.hi - last.lo)
    } else {
        let mut path = last.path.clone();
        // A split on the first leaf adds one sibling ahead of the last.
        let siblings = spans.len() > 1
            && path.len() == first.path.len()
            && path[..path.len() - 1] == first.path[..first.path.len() - 1];
        if first_split && siblings {
            if let Some(ix) = path.last_mut() {
                *ix += 1;
            }
        }
        Point::new(path, last.hi)
    };

    Some(Selection::Range { anchor, focus })
}

/// Replaces the block containing the selection anchor with a block of
/// another kind, keeping its children. Already matching kind and attrs is a
/// no-op.
pub struct SetBlockKindUpdate {
    pub kind: String,
    pub attrs: Attrs,
}

impl DocumentUpdate for SetBlockKindUpdate {
    fn update(&self, state: &EditorState, mut tx: Transaction) -> Result<Transaction, UpdateError> {
        let preview = preview(state, &tx)?;

        let Some(block_path) = anchor_block_path(&preview.selection) else {
            return Err(UpdateError::new("Selection has no containing block"));
        };
        let Some(Node::Element(block)) = node_ref(&preview.doc, &block_path) else {
            return Ok(tx);
        };

        if block.kind == self.kind && block.attrs == self.attrs {
            return Ok(tx);
        }

        tx.push(Op::RemoveNode {
            path: block_path.clone(),
        });
        tx.push(Op::InsertNode {
            path: block_path,
            node: Node::Element(ElementNode {
                kind: self.kind.clone(),
                attrs: self.attrs.clone(),
                children: block.children.clone(),
            }),
        });
        tx.selection_after = Some(preview.selection.clone());
        Ok(tx)
    }
}

/// Decreases the nesting of the list item at the anchor. At indent zero the
/// item falls back to a paragraph. Outside a list item this is a no-op.
pub struct LiftListItemUpdate;

impl DocumentUpdate for LiftListItemUpdate {
    fn update(&self, state: &EditorState, mut tx: Transaction) -> Result<Transaction, UpdateError> {
        let preview = preview(state, &tx)?;
        let Some((block_path, block)) = anchor_list_item(&preview) else {
            return Ok(tx);
        };

        let indent = block
            .attrs
            .get("indent")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);

        if indent <= 0 {
            tx.push(Op::RemoveNode {
                path: block_path.clone(),
            });
            tx.push(Op::InsertNode {
                path: block_path,
                node: Node::Element(ElementNode {
                    kind: "paragraph".to_string(),
                    attrs: Attrs::default(),
                    children: block.children.clone(),
                }),
            });
            tx.selection_after = Some(preview.selection.clone());
        } else {
            tx.push(Op::SetNodeAttrs {
                path: block_path,
                patch: AttrPatch::set_one("indent", serde_json::json!(indent - 1)),
            });
        }
        Ok(tx)
    }
}

/// Increases the nesting of the list item at the anchor, up to the indent
/// cap. Outside a list item, or already at the cap, this is a no-op.
pub struct SinkListItemUpdate;

impl DocumentUpdate for SinkListItemUpdate {
    fn update(&self, state: &EditorState, mut tx: Transaction) -> Result<Transaction, UpdateError> {
        let preview = preview(state, &tx)?;
        let Some((block_path, block)) = anchor_list_item(&preview) else {
            return Ok(tx);
        };

        let indent = block
            .attrs
            .get("indent")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        if indent >= crate::extensions::MAX_LIST_INDENT {
            return Ok(tx);
        }

        tx.push(Op::SetNodeAttrs {
            path: block_path,
            patch: AttrPatch::set_one("indent", serde_json::json!(indent + 1)),
        });
        Ok(tx)
    }
}

/// Inserts a new row below the table row containing the anchor, with as many
/// empty cells as the current row. Outside a table this is a no-op.
pub struct InsertTableRowUpdate;

impl DocumentUpdate for InsertTableRowUpdate {
    fn update(&self, state: &EditorState, mut tx: Transaction) -> Result<Transaction, UpdateError> {
        let preview = preview(state, &tx)?;
        let anchor_path = preview.selection.anchor_path();

        let mut row_path: Option<Path> = None;
        for len in (1..=anchor_path.len()).rev() {
            let prefix = &anchor_path[..len];
            if let Some(Node::Element(el)) = node_ref(&preview.doc, prefix) {
                if el.kind == "table_row" {
                    row_path = Some(prefix.to_vec());
                    break;
                }
            }
        }
        let Some(row_path) = row_path else {
            return Ok(tx);
        };

        let Some(Node::Element(row)) = node_ref(&preview.doc, &row_path) else {
            return Ok(tx);
        };
        let cols = row.children.len().max(1);

        tx.push(Op::InsertNode {
            path: sibling_path(&row_path, 1),
            node: crate::extensions::table_row_node(cols),
        });
        Ok(tx)
    }
}

fn anchor_block_path(selection: &Selection) -> Option<Path> {
    match selection {
        Selection::Range { anchor, .. } => {
            let (_, parent) = anchor.path.split_last()?;
            if parent.is_empty() && anchor.path.len() == 1 {
                return Some(anchor.path.clone());
            }
            Some(parent.to_vec())
        }
        Selection::Node { path } => Some(path.clone()),
    }
}

fn anchor_list_item(preview: &StatePreview) -> Option<(Path, ElementNode)> {
    let block_path = anchor_block_path(&preview.selection)?;
    match node_ref(&preview.doc, &block_path) {
        Some(Node::Element(el)) if el.kind == "list_item" => Some((block_path, el.clone())),
        _ => None,
    }
}

fn sibling_path(path: &[usize], offset: usize) -> Path {
    let mut out = path.to_vec();
    if let Some(last) = out.last_mut() {
        *last += offset;
    }
    out
}

pub(crate) fn order_points<'a>(a: &'a Point, b: &'a Point) -> (&'a Point, &'a Point) {
    match a.path.cmp(&b.path).then(a.offset.cmp(&b.offset)) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    }
}

