use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use crate::attrs::{AttributeSpec, instantiate_attrs};
use crate::command::CommandSpec;
use crate::extension::{
    ChildConstraint, Extension, ExtensionKind, ExtensionRegistry, KeyBinding, MarkSpec, NodeSpec,
    NormalizePass,
};
use crate::node::{
    Attrs, AttrPatch, Document, ElementNode, Marks, Node, TextNode, VoidNode,
};
use crate::ops::Op;
use crate::selection::{Point, Selection};
use crate::state::EditorState;
use crate::update::{
    InsertNodeUpdate, InsertTableRowUpdate, LiftListItemUpdate, SetBlockKindUpdate,
    SetSelectionUpdate, SinkListItemUpdate, ToggleMarkUpdate, UpdateChain,
};
use crate::view::NodeViews;

impl ExtensionRegistry {
    /// Paragraph plus the structural normalize passes; the smallest schema
    /// an editor instance can run on.
    pub fn minimal() -> Self {
        let extensions: Vec<Arc<dyn Extension>> = vec![
            Arc::new(ParagraphExtension),
            Arc::new(CoreNormalizeExtension),
        ];
        Self::new(extensions).expect("minimal extension set must be valid")
    }

    /// The full built-in extension set.
    pub fn standard() -> Self {
        let extensions: Vec<Arc<dyn Extension>> = vec![
            Arc::new(ParagraphExtension),
            Arc::new(CoreNormalizeExtension),
            Arc::new(HeadingExtension),
            Arc::new(BlockquoteExtension),
            Arc::new(ListItemExtension),
            Arc::new(TableExtension),
            Arc::new(DividerExtension),
            Arc::new(ImageExtension),
            Arc::new(BoldExtension),
            Arc::new(ItalicExtension),
            Arc::new(CodeMarkExtension),
            Arc::new(LinkExtension),
        ];
        Self::new(extensions).expect("standard extension set must be valid")
    }
}

pub struct ParagraphExtension;

impl Extension for ParagraphExtension {
    fn name(&self) -> &'static str {
        "paragraph"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block("paragraph")]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.set_paragraph", "Turn into paragraph", |_state, _args| {
                UpdateChain::single(SetBlockKindUpdate {
                    kind: "paragraph".to_string(),
                    attrs: Attrs::default(),
                })
            })
            .description("Turn the current block into a plain paragraph.")
            .keywords(["paragraph", "text", "body"]),
        ]
    }
}

pub struct HeadingExtension;

impl Extension for HeadingExtension {
    fn name(&self) -> &'static str {
        "heading"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::block("heading").attr(AttributeSpec::integer("level", 1, 1, 6))]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("heading.set", "Set heading", |_state, args| {
                let Some(level) = args
                    .as_ref()
                    .and_then(|v| v.get("level"))
                    .and_then(|v| v.as_u64())
                else {
                    return UpdateChain::new();
                };
                let mut attrs = Attrs::default();
                attrs.insert("level".to_string(), serde_json::json!(level.clamp(1, 6)));
                UpdateChain::single(SetBlockKindUpdate {
                    kind: "heading".to_string(),
                    attrs,
                })
            })
            .description("Turn the current block into a heading of the given level.")
            .keywords(["heading", "title", "h1", "h2", "h3"]),
            CommandSpec::new("heading.unset", "Unset heading", |_state, _args| {
                UpdateChain::single(SetBlockKindUpdate {
                    kind: "paragraph".to_string(),
                    attrs: Attrs::default(),
                })
            })
            .description("Turn the current heading back into a paragraph.")
            .keywords(["heading", "paragraph"]),
        ]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeHeadingLevels)]
    }
}

pub struct BlockquoteExtension;

impl Extension for BlockquoteExtension {
    fn name(&self) -> &'static str {
        "blockquote"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::container("blockquote")]
    }
}

/// One cap shared by the indent attribute, its normalize pass, and the sink
/// update.
pub(crate) const MAX_LIST_INDENT: i64 = 8;

pub struct ListItemExtension;

impl Extension for ListItemExtension {
    fn name(&self) -> &'static str {
        "list_item"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::block("list_item")
                .attr(AttributeSpec::string("list_type", "bulleted"))
                .attr(AttributeSpec::integer("indent", 0, 0, MAX_LIST_INDENT)),
        ]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("list.lift", "Lift list item", |_state, _args| {
                UpdateChain::single(LiftListItemUpdate)
            })
            .description("Decrease the nesting of the current list item.")
            .keywords(["list", "outdent", "lift"]),
            CommandSpec::new("list.sink", "Sink list item", |_state, _args| {
                UpdateChain::single(SinkListItemUpdate)
            })
            .description("Increase the nesting of the current list item.")
            .keywords(["list", "indent", "sink"]),
        ]
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![
            KeyBinding::new("tab", "list.sink"),
            KeyBinding::new("shift-tab", "list.lift"),
        ]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeListIndent)]
    }
}

pub struct TableExtension;

impl Extension for TableExtension {
    fn name(&self) -> &'static str {
        "table"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec::container("table"),
            NodeSpec::container("table_row"),
            NodeSpec::container("table_cell"),
            NodeSpec::container("table_header"),
        ]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("table.insert_row", "Insert table row", |_state, _args| {
                UpdateChain::single(InsertTableRowUpdate)
            })
            .description("Insert a row below the current one.")
            .keywords(["table", "row"]),
        ]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeTableStructure)]
    }
}

pub struct DividerExtension;

impl Extension for DividerExtension {
    fn name(&self) -> &'static str {
        "divider"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void("divider")]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("divider.insert", "Insert divider", |state, _args| {
                insert_block_after_current(state, Node::divider())
            })
            .description("Insert a divider block and a trailing paragraph.")
            .keywords(["divider", "separator", "hr", "horizontal rule"]),
        ]
    }
}

pub struct ImageExtension;

impl ImageExtension {
    fn attr_specs() -> Vec<AttributeSpec> {
        vec![
            AttributeSpec::unique_id("id"),
            AttributeSpec::string("src", ""),
        ]
    }
}

impl Extension for ImageExtension {
    fn name(&self) -> &'static str {
        "image"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        let mut spec = NodeSpec::void("image");
        spec.attrs = Self::attr_specs();
        vec![spec]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("image.insert", "Insert image", |state, args| {
                let src = args
                    .as_ref()
                    .and_then(|v| v.get("src"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                insert_block_after_current(state, image_node(&src))
            })
            .description("Insert an image block (expects args.src).")
            .keywords(["image", "picture", "media"]),
        ]
    }

    fn storage(&self) -> Option<Box<dyn Any + Send>> {
        Some(Box::new(NodeViews::<String>::new()))
    }

    fn tracked_node_kinds(&self) -> Vec<&'static str> {
        vec!["image"]
    }

    fn remove_node_view(&self, storage: Option<&mut (dyn Any + Send)>, id: &str) {
        let Some(views) = storage.and_then(|s| s.downcast_mut::<NodeViews<String>>()) else {
            return;
        };
        views.remove(id);
    }
}

/// Builds an image node with a freshly generated id.
pub fn image_node(src: &str) -> Node {
    let mut attrs = Attrs::default();
    attrs.insert("src".to_string(), Value::String(src.to_string()));
    Node::Void(VoidNode {
        kind: "image".to_string(),
        attrs: instantiate_attrs(&ImageExtension::attr_specs(), attrs, false),
    })
}

fn mark_toggle_command(id: &'static str, label: &'static str, kind: &'static str) -> CommandSpec {
    CommandSpec::new(id, label, move |_state, _args| {
        UpdateChain::single(ToggleMarkUpdate {
            kind: kind.to_string(),
            attrs: Attrs::default(),
        })
    })
    .description("Toggle the mark on the current selection.")
    .keywords([kind, "mark"])
}

pub struct BoldExtension;

impl Extension for BoldExtension {
    fn name(&self) -> &'static str {
        "bold"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Mark
    }

    fn mark_specs(&self) -> Vec<MarkSpec> {
        vec![MarkSpec::new("bold")]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![mark_toggle_command("marks.toggle_bold", "Toggle bold", "bold")]
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![KeyBinding::new("cmd-b", "marks.toggle_bold")]
    }
}

pub struct ItalicExtension;

impl Extension for ItalicExtension {
    fn name(&self) -> &'static str {
        "italic"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Mark
    }

    fn mark_specs(&self) -> Vec<MarkSpec> {
        vec![MarkSpec::new("italic")]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![mark_toggle_command(
            "marks.toggle_italic",
            "Toggle italic",
            "italic",
        )]
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![KeyBinding::new("cmd-i", "marks.toggle_italic")]
    }
}

pub struct CodeMarkExtension;

impl Extension for CodeMarkExtension {
    fn name(&self) -> &'static str {
        "code"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Mark
    }

    fn mark_specs(&self) -> Vec<MarkSpec> {
        vec![MarkSpec::new("code")]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![mark_toggle_command("marks.toggle_code", "Toggle code", "code")]
    }

    fn key_bindings(&self) -> Vec<KeyBinding> {
        vec![KeyBinding::new("cmd-e", "marks.toggle_code")]
    }
}

pub struct LinkExtension;

impl Extension for LinkExtension {
    fn name(&self) -> &'static str {
        "link"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Mark
    }

    fn mark_specs(&self) -> Vec<MarkSpec> {
        vec![MarkSpec::new("link").attr(AttributeSpec::string("href", ""))]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("marks.set_link", "Set link", |_state, args| {
                let Some(href) = args
                    .as_ref()
                    .and_then(|v| v.get("href"))
                    .and_then(|v| v.as_str())
                else {
                    return UpdateChain::new();
                };
                let mut attrs = Attrs::default();
                attrs.insert("href".to_string(), Value::String(href.to_string()));
                UpdateChain::single(ToggleMarkUpdate {
                    kind: "link".to_string(),
                    attrs,
                })
            })
            .description("Toggle a link mark on the current selection (expects args.href).")
            .keywords(["link", "url", "hyperlink"]),
        ]
    }
}

/// Inserts a block after the one containing the anchor, followed by an
/// empty paragraph carrying the caret.
fn insert_block_after_current(state: &EditorState, node: Node) -> UpdateChain {
    let anchor_path = state.selection.anchor_path();
    let block_path: Vec<usize> = match &state.selection {
        Selection::Range { .. } => anchor_path
            .split_last()
            .map(|(_, parent)| parent.to_vec())
            .unwrap_or_default(),
        Selection::Node { path } => path.clone(),
    };

    let (parent_path, insert_at) = match block_path.split_last() {
        Some((block_ix, parent)) => (parent.to_vec(), block_ix + 1),
        None => (Vec::new(), state.doc.children.len()),
    };

    let node_path = {
        let mut path = parent_path.clone();
        path.push(insert_at);
        path
    };
    let paragraph_path = {
        let mut path = parent_path.clone();
        path.push(insert_at + 1);
        path
    };
    let caret_path = {
        let mut path = paragraph_path.clone();
        path.push(0);
        path
    };

    UpdateChain::new()
        .then(InsertNodeUpdate {
            path: node_path,
            node,
        })
        .then(InsertNodeUpdate {
            path: paragraph_path,
            node: Node::paragraph(""),
        })
        .then(SetSelectionUpdate {
            selection: Selection::collapsed(Point::new(caret_path, 0)),
        })
}

pub struct CoreNormalizeExtension;

impl Extension for CoreNormalizeExtension {
    fn name(&self) -> &'static str {
        "core_normalize"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Plain
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureBlocksHaveTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &ExtensionRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

struct EnsureBlocksHaveTextLeaf;

impl NormalizePass for EnsureBlocksHaveTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_inline_only_blocks_have_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &ExtensionRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &ExtensionRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);

                let spec_children = registry
                    .node_spec(&el.kind)
                    .map(|s| s.children.clone())
                    .unwrap_or(ChildConstraint::Any);

                if spec_children == ChildConstraint::InlineOnly {
                    let has_text = el.children.iter().any(|n| matches!(n, Node::Text(_)));
                    if !has_text {
                        let mut insert_path = path.clone();
                        insert_path.push(0);
                        ops.push(Op::InsertNode {
                            path: insert_path,
                            node: Node::Text(TextNode {
                                text: String::new(),
                                marks: Marks::default(),
                            }),
                        });
                    }
                } else {
                    walk(&el.children, path, registry, ops);
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &ExtensionRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn walk(
            children: &[Node],
            path: &mut Vec<usize>,
            registry: &ExtensionRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };

                path.push(ix);

                let spec_children = registry
                    .node_spec(&el.kind)
                    .map(|s| s.children.clone())
                    .unwrap_or_else(|| {
                        if el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                            ChildConstraint::InlineOnly
                        } else {
                            ChildConstraint::Any
                        }
                    });

                if spec_children == ChildConstraint::InlineOnly {
                    if el.children.len() >= 2 {
                        let mut ix = el.children.len();
                        while ix > 0 {
                            ix -= 1;
                            let Node::Text(right) = &el.children[ix] else {
                                continue;
                            };

                            let mut start = ix;
                            while start > 0 {
                                let Some(Node::Text(left)) = el.children.get(start - 1) else {
                                    break;
                                };
                                if left.marks != right.marks {
                                    break;
                                }
                                start -= 1;
                            }

                            if start == ix {
                                continue;
                            }

                            let Some(Node::Text(first)) = el.children.get(start) else {
                                continue;
                            };
                            let mut appended = String::new();
                            for node in el.children.iter().take(ix + 1).skip(start + 1) {
                                if let Node::Text(t) = node {
                                    appended.push_str(&t.text);
                                }
                            }

                            if !appended.is_empty() {
                                let mut insert_text_path = path.clone();
                                insert_text_path.push(start);
                                ops.push(Op::InsertText {
                                    path: insert_text_path,
                                    offset: first.text.len(),
                                    text: appended,
                                });
                            }

                            for remove_ix in (start + 1..=ix).rev() {
                                let mut remove_path = path.clone();
                                remove_path.push(remove_ix);
                                ops.push(Op::RemoveNode { path: remove_path });
                            }

                            ix = start;
                        }
                    }
                } else {
                    walk(&el.children, path, registry, ops);
                }

                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), registry, &mut ops);

        ops
    }
}

struct NormalizeHeadingLevels;

impl NormalizePass for NormalizeHeadingLevels {
    fn id(&self) -> &'static str {
        "heading.normalize_levels"
    }

    fn run(&self, doc: &Document, _registry: &ExtensionRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        crate::node::walk_nodes(doc, |path, node| {
            let Node::Element(el) = node else {
                return;
            };
            if el.kind != "heading" {
                return;
            }
            let level = el.attrs.get("level").and_then(|v| v.as_i64());
            let clamped = level.unwrap_or(1).clamp(1, 6);
            if level != Some(clamped) {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set_one("level", serde_json::json!(clamped)),
                });
            }
        });

        ops
    }
}

struct NormalizeListIndent;

impl NormalizePass for NormalizeListIndent {
    fn id(&self) -> &'static str {
        "list.normalize_indent"
    }

    fn run(&self, doc: &Document, _registry: &ExtensionRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        crate::node::walk_nodes(doc, |path, node| {
            let Node::Element(el) = node else {
                return;
            };
            if el.kind != "list_item" {
                return;
            }
            let indent = el.attrs.get("indent").and_then(|v| v.as_i64());
            let clamped = indent.unwrap_or(0).clamp(0, MAX_LIST_INDENT);
            if indent != Some(clamped) {
                ops.push(Op::SetNodeAttrs {
                    path: path.to_vec(),
                    patch: AttrPatch::set_one("indent", serde_json::json!(clamped)),
                });
            }
        });

        ops
    }
}

pub fn table_cell_node() -> Node {
    Node::Element(ElementNode {
        kind: "table_cell".to_string(),
        attrs: Attrs::default(),
        children: vec![Node::paragraph("")],
    })
}

pub fn table_row_node(cols: usize) -> Node {
    Node::Element(ElementNode {
        kind: "table_row".to_string(),
        attrs: Attrs::default(),
        children: (0..cols).map(|_| table_cell_node()).collect(),
    })
}

pub fn table_node(rows: usize, cols: usize) -> Node {
    Node::Element(ElementNode {
        kind: "table".to_string(),
        attrs: Attrs::default(),
        children: (0..rows.max(1)).map(|_| table_row_node(cols)).collect(),
    })
}

struct NormalizeTableStructure;

impl NormalizePass for NormalizeTableStructure {
    fn id(&self) -> &'static str {
        "table.normalize_structure"
    }

    fn run(&self, doc: &Document, _registry: &ExtensionRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn is_cell(kind: &str) -> bool {
            kind == "table_cell" || kind == "table_header"
        }

        fn normalize_table(table: &ElementNode, path: &[usize], ops: &mut Vec<Op>) {
            if table.children.is_empty() {
                let mut insert_path = path.to_vec();
                insert_path.push(0);
                ops.push(Op::InsertNode {
                    path: insert_path,
                    node: table_row_node(1),
                });
                return;
            }

            let mut max_cols = 1usize;
            for child in &table.children {
                let Node::Element(row) = child else {
                    continue;
                };
                if row.kind != "table_row" {
                    continue;
                }
                max_cols = max_cols.max(row.children.len().max(1));
            }

            for (row_ix, row_node) in table.children.iter().enumerate() {
                let Node::Element(row) = row_node else {
                    continue;
                };
                if row.kind != "table_row" {
                    continue;
                }

                if row.children.len() < max_cols {
                    for col_ix in row.children.len()..max_cols {
                        let mut insert_cell_path = path.to_vec();
                        insert_cell_path.push(row_ix);
                        insert_cell_path.push(col_ix);
                        ops.push(Op::InsertNode {
                            path: insert_cell_path,
                            node: table_cell_node(),
                        });
                    }
                }

                for (cell_ix, cell_node) in row.children.iter().enumerate() {
                    let Node::Element(cell) = cell_node else {
                        continue;
                    };
                    if !is_cell(&cell.kind) {
                        continue;
                    }
                    if cell.children.is_empty() {
                        let mut insert_para_path = path.to_vec();
                        insert_para_path.push(row_ix);
                        insert_para_path.push(cell_ix);
                        insert_para_path.push(0);
                        ops.push(Op::InsertNode {
                            path: insert_para_path,
                            node: Node::paragraph(""),
                        });
                    }
                }
            }
        }

        fn walk(nodes: &[Node], path: &mut Vec<usize>, ops: &mut Vec<Op>) {
            for (ix, node) in nodes.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                path.push(ix);

                if el.kind == "table" {
                    normalize_table(el, path, ops);
                }

                walk(&el.children, path, ops);
                path.pop();
            }
        }

        walk(&doc.children, &mut Vec::new(), &mut ops);

        ops
    }
}
