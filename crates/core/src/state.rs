use crate::node::{Document, Marks};
use crate::ops::{ApplyError, Transaction, apply_op_to};
use crate::selection::{Point, Selection};

/// Provisional marks staged at a caret before any text carries them.
/// Created on the first staged mark, cleared on confirm, cancel, or when the
/// caret moves away.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkHolder {
    pub at: Point,
    pub marks: Marks,
}

/// The document/selection snapshot a Document Update reads. Updates never
/// mutate this; they describe their effect through the transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub doc: Document,
    pub selection: Selection,
    pub mark_holder: Option<MarkHolder>,
}

#[derive(Debug, Clone)]
pub struct StatePreview {
    pub doc: Document,
    pub selection: Selection,
}

impl EditorState {
    pub fn new(doc: Document, selection: Selection) -> Self {
        Self {
            doc,
            selection,
            mark_holder: None,
        }
    }

    /// Document and selection as they stand after the in-progress
    /// transaction. Chained updates read positions through this instead of
    /// the stale pre-chain tree.
    pub fn preview(&self, tx: &Transaction) -> Result<StatePreview, ApplyError> {
        let mut doc = self.doc.clone();
        let mut selection = self.selection.clone();

        for op in tx.ops.iter().cloned() {
            let _ = apply_op_to(&mut doc, &mut selection, op)?;
        }

        if let Some(sel) = &tx.selection_after {
            selection = sel.clone();
        }

        Ok(StatePreview { doc, selection })
    }

    /// Marks in effect at the caret: the staged holder when it targets the
    /// current focus, otherwise the marks of the text leaf under the focus.
    pub fn active_marks(&self) -> Marks {
        if let (Some(holder), Some(focus)) = (&self.mark_holder, self.selection.focus()) {
            if &holder.at == focus {
                return holder.marks.clone();
            }
        }

        let path = self.selection.anchor_path();
        match crate::node::node_ref(&self.doc, path) {
            Some(crate::node::Node::Text(t)) => t.marks.clone(),
            _ => Marks::default(),
        }
    }
}
