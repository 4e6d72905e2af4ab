use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::command;
use crate::extension::ExtensionRegistry;
use crate::node::{Attrs, Document, Marks, Node};
use crate::ops::{ApplyError, Op, Transaction, apply_op_to};
use crate::selection::{Point, Selection};
use crate::state::{EditorState, MarkHolder};
use crate::update::UpdateChain;
use crate::view::collect_tracked_ids;

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

#[derive(Debug, Default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

/// Owns the document state, the merged extension registry, per-extension
/// storage, and the undo history. The host hands in the initial state and
/// drives edits through commands and update chains; every applied
/// transaction lands atomically with the selection kept consistent.
pub struct Editor {
    state: EditorState,
    registry: Arc<ExtensionRegistry>,
    storages: HashMap<String, Box<dyn Any + Send>>,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: ExtensionRegistry) -> Self {
        let mut storages = HashMap::new();
        for extension in registry.extensions() {
            if let Some(storage) = extension.storage() {
                storages.insert(extension.name().to_string(), storage);
            }
        }

        let config = EditorConfig::default().with_defaults();
        let mut editor = Self {
            state: EditorState::new(doc, selection),
            registry: Arc::new(registry),
            storages,
            config,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    pub fn standard() -> Self {
        let registry = ExtensionRegistry::standard();
        let doc = Document {
            children: vec![Node::paragraph("")],
        };
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, registry)
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn doc(&self) -> &Document {
        &self.state.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.state.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.state.selection = selection;
        self.normalize_selection_in_place();
        self.refresh_mark_holder();
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    /// Storage owned by the named extension. Extensions reach their own
    /// state through this; there is no cross-extension access path.
    pub fn storage<T: 'static>(&self, extension: &str) -> Option<&T> {
        self.storages.get(extension)?.downcast_ref()
    }

    pub fn storage_mut<T: 'static>(&mut self, extension: &str) -> Option<&mut T> {
        self.storages.get_mut(extension)?.downcast_mut()
    }

    /// Runs a registered command: builds its update chain against the
    /// current state and applies the result through the command wrapper.
    /// False means unknown command or not applicable.
    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> bool {
        let Some(command) = self.registry.command(id) else {
            return false;
        };
        let chain = command.chain(&self.state, args);
        self.run_chain(&chain)
    }

    /// Applies an update chain. False means the chain errored or its net
    /// effect was the identity; nothing is dispatched in either case.
    pub fn run_chain(&mut self, chain: &UpdateChain) -> bool {
        let Some(tx) = command::build_transaction(&self.state, chain) else {
            return false;
        };
        self.apply(tx).is_ok()
    }

    /// Enablement probe: would this chain change anything? Never dispatches.
    pub fn dry_run(&self, chain: &UpdateChain) -> bool {
        command::dry_run(&self.state, chain)
    }

    /// Resolves a keystroke through the priority-ordered key bindings and
    /// runs the bound command.
    pub fn handle_keystroke(&mut self, keystroke: &str) -> bool {
        let Some(command) = self.registry.resolve_key(keystroke) else {
            return false;
        };
        let command = command.to_string();
        self.run_command(&command, None)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        let ids_before = collect_tracked_ids(&self.state.doc, self.registry.tracked_kinds());

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut redo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            if let Ok(inv) = self.apply_op(op) {
                redo_ops.push(inv);
            } else {
                // If we can't apply inverse ops, bail out and stop mutating further.
                break;
            }
        }
        redo_ops.reverse();

        self.state.selection = selection_before.clone();
        self.normalize_in_place();

        self.redo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: redo_ops,
        });
        self.reconcile_node_views(ids_before);
        self.refresh_mark_holder();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        let ids_before = collect_tracked_ids(&self.state.doc, self.registry.tracked_kinds());

        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut undo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            if let Ok(inv) = self.apply_op(op) {
                undo_ops.push(inv);
            } else {
                break;
            }
        }
        undo_ops.reverse();

        self.state.selection = selection_after.clone();
        self.normalize_in_place();

        self.undo_stack.push(UndoRecord {
            selection_before,
            selection_after,
            inverse_ops: undo_ops,
        });
        self.reconcile_node_views(ids_before);
        self.refresh_mark_holder();
        true
    }

    /// Applies a transaction as a whole or not at all: the full op list is
    /// vetted against a preview before the live tree is touched, and any
    /// failure past that point rolls back through the recorded inverses.
    /// On success the inverse is recorded for undo and node views are
    /// reconciled against what the transaction deleted.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let selection_before = self.state.selection.clone();
        let ids_before = collect_tracked_ids(&self.state.doc, self.registry.tracked_kinds());

        self.state.preview(&tx)?;

        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in tx.ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => inverse_ops.push(inv),
                Err(err) => {
                    self.rollback(inverse_ops, selection_before);
                    return Err(err);
                }
            }
        }

        if let Some(sel) = tx.selection_after {
            self.state.selection = sel;
        }

        let mut inverse_normalize = match self.normalize_with_inverse_ops() {
            Ok(ops) => ops,
            Err(err) => {
                self.rollback(inverse_ops, selection_before);
                return Err(err);
            }
        };
        inverse_ops.append(&mut inverse_normalize);
        inverse_ops.reverse();

        self.normalize_selection_in_place();

        let selection_after = self.state.selection.clone();

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }

        self.reconcile_node_views(ids_before);
        self.refresh_mark_holder();
        Ok(())
    }

    /// Stages a provisional mark toggle at the caret. The staged set is the
    /// full mark set the next inserted text will carry; it reports active
    /// to toolbars even though no document text has it yet.
    pub fn stage_toggle_mark(&mut self, kind: &str, attrs: Attrs) -> bool {
        let Some(focus) = self.state.selection.focus().cloned() else {
            return false;
        };
        if !self.state.selection.is_collapsed() {
            return false;
        }

        let mut marks = self.state.active_marks();
        if marks.has(kind) {
            marks.remove(kind);
        } else {
            marks.add(kind.to_string(), attrs);
        }
        self.state.mark_holder = Some(MarkHolder { at: focus, marks });
        true
    }

    pub fn staged_marks(&self) -> Option<&Marks> {
        self.state.mark_holder.as_ref().map(|h| &h.marks)
    }

    pub fn clear_mark_holder(&mut self) {
        self.state.mark_holder = None;
    }

    fn refresh_mark_holder(&mut self) {
        let Some(holder) = &self.state.mark_holder else {
            return;
        };
        if self.state.selection.focus() != Some(&holder.at) {
            self.state.mark_holder = None;
        }
    }

    fn reconcile_node_views(&mut self, ids_before: rustc_hash::FxHashMap<String, String>) {
        let ids_after = collect_tracked_ids(&self.state.doc, self.registry.tracked_kinds());
        let registry = Arc::clone(&self.registry);

        for (id, extension_name) in ids_before {
            if ids_after.contains_key(&id) {
                continue;
            }
            let Some(extension) = registry.extension(&extension_name) else {
                continue;
            };
            let storage = self
                .storages
                .get_mut(&extension_name)
                .map(|boxed| &mut **boxed);
            extension.remove_node_view(storage, &id);
        }
    }

    fn normalize_in_place(&mut self) {
        let _ = self.normalize_with_inverse_ops();
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.state.selection = self
            .registry
            .normalize_selection(&self.state.doc, &self.state.selection);
    }

    /// Runs normalize passes to a fixpoint. On failure its partial edits
    /// are already rolled back; callers only undo their own.
    fn normalize_with_inverse_ops(&mut self) -> Result<Vec<Op>, ApplyError> {
        let selection_at_entry = self.state.selection.clone();
        let mut inverse_ops: Vec<Op> = Vec::new();
        for _ in 0..self.config.max_normalize_iterations {
            let ops = self.registry.normalize(&self.state.doc);
            if ops.is_empty() {
                return Ok(inverse_ops);
            }
            for op in ops {
                match self.apply_op(op) {
                    Ok(inv) => inverse_ops.push(inv),
                    Err(err) => {
                        self.rollback(inverse_ops, selection_at_entry);
                        return Err(err);
                    }
                }
            }
        }
        self.rollback(inverse_ops, selection_at_entry);
        Err(ApplyError::NormalizeDidNotConverge)
    }

    fn rollback(&mut self, inverse_ops: Vec<Op>, selection_before: Selection) {
        for op in inverse_ops.into_iter().rev() {
            let _ = self.apply_op(op);
        }
        self.state.selection = selection_before;
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        apply_op_to(&mut self.state.doc, &mut self.state.selection, op)
    }
}
