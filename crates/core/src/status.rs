use serde::{Deserialize, Serialize};

use crate::editor::Editor;
use crate::node::find_by_id;
use crate::update::UpdateChain;

/// Lifecycle of async work an extension component issued outside the
/// update pipeline. The pipeline itself never awaits; the issuing component
/// owns this value and applies the result through `apply_if_node_exists`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AsyncStatus {
    #[default]
    Idle,
    Loading,
    Complete,
    Error {
        message: String,
    },
}

impl AsyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AsyncStatus::Complete | AsyncStatus::Error { .. })
    }
}

/// Applies an async result targeting a node by id. The node may have been
/// deleted while the work was pending; a stale id is a silent no-op, not an
/// error.
pub fn apply_if_node_exists(editor: &mut Editor, id: &str, chain: &UpdateChain) -> bool {
    if find_by_id(&editor.state().doc, id).is_none() {
        return false;
    }
    editor.run_chain(chain)
}
