//! Context-sensitive toolbar resolution: declarative tool-item descriptors
//! grouped into toolbars keyed by node/mark name, evaluated against the
//! current editor state. No rendering lives here; the host view layer reads
//! these descriptors and feeds clicks back through the command wrapper.

use std::collections::HashMap;
use std::sync::Arc;

use scribe_core::{
    Attrs, EditorState, Node, Selection, ToggleMarkUpdate, UpdateChain, node_ref,
};

type Predicate = dyn Fn(&EditorState) -> bool + Send + Sync;
type ClickHandler = dyn Fn(&EditorState) -> UpdateChain + Send + Sync;

/// Default visibility rule: an item with no configured depth always shows;
/// one with a depth shows only when the selection anchor sits at exactly
/// that depth (the node it governs is the direct parent of the caret).
///
/// `check_inside_of = "table"` is the escape hatch: table-cell content is
/// structurally one level deeper than the rule anticipates, so the item
/// also shows whenever the selection's grandparent is a cell or header
/// cell, regardless of depth.
pub fn should_show_tool_item(
    state: &EditorState,
    depth: Option<usize>,
    check_inside_of: Option<&str>,
) -> bool {
    if check_inside_of == Some("table") {
        if matches!(
            state.selection.grandparent_kind(&state.doc),
            Some("table_cell" | "table_header")
        ) {
            return true;
        }
    }
    match depth {
        None => true,
        Some(d) => state.selection.depth() == d,
    }
}

/// One stateless control descriptor.
#[derive(Clone)]
pub struct ToolItem {
    name: String,
    depth: Option<usize>,
    check_inside_of: Option<String>,
    show: Option<Arc<Predicate>>,
    disabled: Arc<Predicate>,
    active: Arc<Predicate>,
    on_click: Arc<ClickHandler>,
}

impl ToolItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depth: None,
            check_inside_of: None,
            show: None,
            disabled: Arc::new(|_| false),
            active: Arc::new(|_| false),
            on_click: Arc::new(|_| UpdateChain::new()),
        }
    }

    /// A mark toggle: active when the mark is in effect at the caret —
    /// including a provisionally staged mark the document doesn't carry
    /// yet — and clicking toggles it over the selection.
    pub fn mark(name: impl Into<String>, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let active_kind = kind.clone();
        Self::new(name)
            .active_when(move |state| state.active_marks().has(&active_kind))
            .on_click(move |_state| {
                UpdateChain::single(ToggleMarkUpdate {
                    kind: kind.clone(),
                    attrs: Attrs::default(),
                })
            })
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn check_inside_of(mut self, ancestor: impl Into<String>) -> Self {
        self.check_inside_of = Some(ancestor.into());
        self
    }

    pub fn show_when(
        mut self,
        show: impl Fn(&EditorState) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.show = Some(Arc::new(show));
        self
    }

    pub fn disabled_when(
        mut self,
        disabled: impl Fn(&EditorState) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.disabled = Arc::new(disabled);
        self
    }

    pub fn active_when(
        mut self,
        active: impl Fn(&EditorState) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.active = Arc::new(active);
        self
    }

    pub fn on_click(
        mut self,
        on_click: impl Fn(&EditorState) -> UpdateChain + Send + Sync + 'static,
    ) -> Self {
        self.on_click = Arc::new(on_click);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn should_show(&self, state: &EditorState) -> bool {
        if !should_show_tool_item(state, self.depth, self.check_inside_of.as_deref()) {
            return false;
        }
        match &self.show {
            Some(show) => show(state),
            None => true,
        }
    }

    pub fn should_be_disabled(&self, state: &EditorState) -> bool {
        (self.disabled)(state)
    }

    pub fn is_active(&self, state: &EditorState) -> bool {
        (self.active)(state)
    }

    /// The edit this control proposes; runs through the command wrapper.
    pub fn click(&self, state: &EditorState) -> UpdateChain {
        (self.on_click)(state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolbarError {
    DuplicateItem { toolbar: String, item: String },
    DuplicateToolbar(String),
}

impl std::fmt::Display for ToolbarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolbarError::DuplicateItem { toolbar, item } => {
                write!(f, "Duplicate tool item {item} in toolbar {toolbar}")
            }
            ToolbarError::DuplicateToolbar(name) => write!(f, "Duplicate toolbar: {name}"),
        }
    }
}

impl std::error::Error for ToolbarError {}

/// Ordered groups of tool items for one node/mark kind. Item names are
/// unique within the toolbar; a second definition under the same name is a
/// configuration error, not a silent override.
pub struct Toolbar {
    name: String,
    groups: Vec<Vec<ToolItem>>,
}

impl Toolbar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
        }
    }

    pub fn group(mut self, items: Vec<ToolItem>) -> Result<Self, ToolbarError> {
        for (ix, item) in items.iter().enumerate() {
            let seen_before = self.groups.iter().flatten().any(|e| e.name == item.name)
                || items[..ix].iter().any(|e| e.name == item.name);
            if seen_before {
                return Err(ToolbarError::DuplicateItem {
                    toolbar: self.name.clone(),
                    item: item.name.clone(),
                });
            }
        }
        self.groups.push(items);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[Vec<ToolItem>] {
        &self.groups
    }

    pub fn items(&self) -> impl Iterator<Item = &ToolItem> {
        self.groups.iter().flatten()
    }

    pub fn item(&self, name: &str) -> Option<&ToolItem> {
        self.items().find(|i| i.name == name)
    }

    /// Items currently visible for the given state, preserving group order.
    pub fn visible_items<'a>(&'a self, state: &EditorState) -> Vec<&'a ToolItem> {
        self.items().filter(|i| i.should_show(state)).collect()
    }
}

/// Static map from node/mark name to its toolbar. At most one toolbar
/// applies per name; absence means no toolbar is shown for that kind.
#[derive(Default)]
pub struct ToolbarRegistry {
    toolbars: HashMap<String, Toolbar>,
}

impl ToolbarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, toolbar: Toolbar) -> Result<(), ToolbarError> {
        if self.toolbars.contains_key(toolbar.name()) {
            return Err(ToolbarError::DuplicateToolbar(toolbar.name().to_string()));
        }
        self.toolbars.insert(toolbar.name().to_string(), toolbar);
        Ok(())
    }

    pub fn toolbar(&self, node_or_mark_name: &str) -> Option<&Toolbar> {
        self.toolbars.get(node_or_mark_name)
    }

    /// Toolbars for the built-in extension set.
    pub fn standard() -> Self {
        let mut registry = Self::new();

        let paragraph = Toolbar::new("paragraph")
            .group(vec![
                ToolItem::mark("bold", "bold"),
                ToolItem::mark("italic", "italic"),
                ToolItem::mark("code", "code"),
            ])
            .and_then(|t| {
                t.group(vec![heading_level_item(1), heading_level_item(2)])
            })
            .expect("standard paragraph toolbar must be valid");
        registry
            .register(paragraph)
            .expect("standard toolbars must be valid");

        let table = Toolbar::new("table")
            .group(vec![
                ToolItem::new("insert_row")
                    .depth(1)
                    .check_inside_of("table")
                    .on_click(|_state| {
                        UpdateChain::single(scribe_core::InsertTableRowUpdate)
                    }),
            ])
            .expect("standard table toolbar must be valid");
        registry
            .register(table)
            .expect("standard toolbars must be valid");

        registry
    }
}

fn heading_level_item(level: u64) -> ToolItem {
    ToolItem::new(format!("heading_{level}"))
        .active_when(move |state| {
            anchor_block(state)
                .map(|block| {
                    block.kind == "heading"
                        && block.attrs.get("level").and_then(|v| v.as_u64()) == Some(level)
                })
                .unwrap_or(false)
        })
        .on_click(move |_state| {
            let mut attrs = Attrs::default();
            attrs.insert("level".to_string(), serde_json::json!(level));
            UpdateChain::single(scribe_core::SetBlockKindUpdate {
                kind: "heading".to_string(),
                attrs,
            })
        })
}

fn anchor_block(state: &EditorState) -> Option<&scribe_core::ElementNode> {
    let block_path: Vec<usize> = match &state.selection {
        Selection::Range { anchor, .. } => {
            let (_, parent) = anchor.path.split_last()?;
            parent.to_vec()
        }
        Selection::Node { path } => path.clone(),
    };
    match node_ref(&state.doc, &block_path)? {
        Node::Element(el) => Some(el),
        _ => None,
    }
}
