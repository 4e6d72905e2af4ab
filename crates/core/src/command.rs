use std::sync::Arc;

use serde_json::Value;

use crate::ops::Transaction;
use crate::state::EditorState;
use crate::update::UpdateChain;

/// A named, extension-contributed command: given the current state and
/// optional arguments, it describes its edit as an update chain. The chain
/// is run through the command wrapper, never applied directly.
#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub handler: Arc<dyn Fn(&EditorState, Option<Value>) -> UpdateChain + Send + Sync>,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&EditorState, Option<Value>) -> UpdateChain + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn chain(&self, state: &EditorState, args: Option<Value>) -> UpdateChain {
        (self.handler)(state, args)
    }
}

/// Builds the transaction an update chain produces against the given state.
/// `None` means not applicable: the chain errored, or its net effect is the
/// identity. No error crosses this boundary.
pub fn build_transaction(state: &EditorState, chain: &UpdateChain) -> Option<Transaction> {
    match chain.apply(state) {
        Ok(tx) if !tx.is_identity() => Some(tx),
        _ => None,
    }
}

/// Dry run: would dispatching this chain change anything? Used for
/// enablement checks; builds the transaction but never dispatches it.
pub fn dry_run(state: &EditorState, chain: &UpdateChain) -> bool {
    build_transaction(state, chain).is_some()
}

/// Builds the transaction and, when it is not the identity, hands it to
/// `dispatch` exactly once. Returns whether a dispatch happened.
pub fn run_with_dispatch(
    state: &EditorState,
    chain: &UpdateChain,
    dispatch: &mut dyn FnMut(Transaction),
) -> bool {
    let Some(tx) = build_transaction(state, chain) else {
        return false;
    };
    dispatch(tx);
    true
}
