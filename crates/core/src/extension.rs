use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::attrs::{AttributeSpec, instantiate_attrs};
use crate::command::CommandSpec;
use crate::node::{Attrs, Document, ElementNode, Node, VoidNode};
use crate::ops::Op;
use crate::selection::{Point, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtensionKind {
    Node,
    Mark,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

/// Schema contribution for one node kind.
#[derive(Clone)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
    pub attrs: Vec<AttributeSpec>,
}

impl NodeSpec {
    pub fn block(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
            attrs: Vec::new(),
        }
    }

    pub fn container(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::BlockOnly,
            attrs: Vec::new(),
        }
    }

    pub fn void(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            role: NodeRole::Block,
            is_void: true,
            children: ChildConstraint::None,
            attrs: Vec::new(),
        }
    }

    pub fn attr(mut self, attr: AttributeSpec) -> Self {
        self.attrs.push(attr);
        self
    }
}

/// Schema contribution for one mark kind.
#[derive(Clone)]
pub struct MarkSpec {
    pub kind: String,
    pub attrs: Vec<AttributeSpec>,
}

impl MarkSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(mut self, attr: AttributeSpec) -> Self {
        self.attrs.push(attr);
        self
    }
}

/// Keystroke → command id. Higher-priority extensions shadow lower ones for
/// the same keystroke; first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    pub keystroke: String,
    pub command: String,
}

impl KeyBinding {
    pub fn new(keystroke: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            keystroke: keystroke.into(),
            command: command.into(),
        }
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &ExtensionRegistry) -> Vec<Op>;
}

/// A self-contained contributor of schema, attributes, key bindings and
/// behavior, composed with others at editor construction.
pub trait Extension: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> ExtensionKind;
    fn priority(&self) -> i32 {
        0
    }
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn mark_specs(&self) -> Vec<MarkSpec> {
        Vec::new()
    }
    fn key_bindings(&self) -> Vec<KeyBinding> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    /// Per-editor-instance state owned by this extension, created once at
    /// registration and torn down with the editor.
    fn storage(&self) -> Option<Box<dyn Any + Send>> {
        None
    }
    /// Node kinds whose instances this extension binds interactive views to.
    fn tracked_node_kinds(&self) -> Vec<&'static str> {
        Vec::new()
    }
    /// Releases the view bound to a deleted node. Must be idempotent.
    fn remove_node_view(&self, _storage: Option<&mut (dyn Any + Send)>, _id: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateExtension { kind: ExtensionKind, name: String },
    DuplicateNodeKind(String),
    DuplicateMarkKind(String),
    DuplicateAttribute { kind: String, name: String },
    DuplicateCommand(String),
    UnknownNodeKind(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateExtension { kind, name } => {
                write!(f, "Duplicate {kind:?} extension name: {name}")
            }
            RegistryError::DuplicateNodeKind(kind) => write!(f, "Duplicate node kind: {kind}"),
            RegistryError::DuplicateMarkKind(kind) => write!(f, "Duplicate mark kind: {kind}"),
            RegistryError::DuplicateAttribute { kind, name } => {
                write!(f, "Duplicate attribute {name} on kind {kind}")
            }
            RegistryError::DuplicateCommand(id) => write!(f, "Duplicate command id: {id}"),
            RegistryError::UnknownNodeKind(kind) => write!(f, "Unknown node kind: {kind}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Merged schema and behavior of an ordered extension list. Registration is
/// the only place configuration errors can surface; everything after runs
/// against a validated table.
pub struct ExtensionRegistry {
    extensions: Vec<Arc<dyn Extension>>,
    node_specs: HashMap<String, NodeSpec>,
    mark_specs: HashMap<String, MarkSpec>,
    commands: HashMap<String, CommandSpec>,
    key_bindings: Vec<KeyBinding>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    tracked_kinds: HashMap<String, String>,
}

impl ExtensionRegistry {
    pub fn new(
        extensions: impl IntoIterator<Item = Arc<dyn Extension>>,
    ) -> Result<Self, RegistryError> {
        let mut ordered: Vec<(usize, Arc<dyn Extension>)> =
            extensions.into_iter().enumerate().collect();
        // Higher priority first; declaration order breaks ties.
        ordered.sort_by(|(a_ix, a), (b_ix, b)| {
            b.priority().cmp(&a.priority()).then(a_ix.cmp(b_ix))
        });

        let mut registry = Self {
            extensions: Vec::new(),
            node_specs: HashMap::new(),
            mark_specs: HashMap::new(),
            commands: HashMap::new(),
            key_bindings: Vec::new(),
            normalize_passes: Vec::new(),
            tracked_kinds: HashMap::new(),
        };

        for (_, extension) in ordered {
            registry.register(extension)?;
        }
        Ok(registry)
    }

    fn register(&mut self, extension: Arc<dyn Extension>) -> Result<(), RegistryError> {
        if self
            .extensions
            .iter()
            .any(|e| e.kind() == extension.kind() && e.name() == extension.name())
        {
            return Err(RegistryError::DuplicateExtension {
                kind: extension.kind(),
                name: extension.name().to_string(),
            });
        }

        for spec in extension.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(RegistryError::DuplicateNodeKind(spec.kind));
            }
            check_unique_attrs(&spec.kind, &spec.attrs)?;
            self.node_specs.insert(spec.kind.clone(), spec);
        }

        for spec in extension.mark_specs() {
            if self.mark_specs.contains_key(&spec.kind) {
                return Err(RegistryError::DuplicateMarkKind(spec.kind));
            }
            check_unique_attrs(&spec.kind, &spec.attrs)?;
            self.mark_specs.insert(spec.kind.clone(), spec);
        }

        for cmd in extension.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(RegistryError::DuplicateCommand(cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        self.key_bindings.extend(extension.key_bindings());
        self.normalize_passes.extend(extension.normalize_passes());

        for kind in extension.tracked_node_kinds() {
            self.tracked_kinds
                .insert(kind.to_string(), extension.name().to_string());
        }

        self.extensions.push(extension);
        Ok(())
    }

    pub fn extensions(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    pub fn extension(&self, name: &str) -> Option<&Arc<dyn Extension>> {
        self.extensions.iter().find(|e| e.name() == name)
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn node_spec(&self, kind: &str) -> Option<&NodeSpec> {
        self.node_specs.get(kind)
    }

    pub fn mark_spec(&self, kind: &str) -> Option<&MarkSpec> {
        self.mark_specs.get(kind)
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    /// First binding (in priority order) matching the keystroke.
    pub fn resolve_key(&self, keystroke: &str) -> Option<&str> {
        self.key_bindings
            .iter()
            .find(|b| b.keystroke == keystroke)
            .map(|b| b.command.as_str())
    }

    pub fn key_bindings(&self) -> &[KeyBinding] {
        &self.key_bindings
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        let mut ops: Vec<Op> = Vec::new();
        for pass in &self.normalize_passes {
            ops.extend(pass.run(doc, self));
        }
        ops
    }

    /// kind → owning extension name, for node kinds with bound views.
    pub fn tracked_kinds(&self) -> &HashMap<String, String> {
        &self.tracked_kinds
    }

    /// Builds a node of a registered kind: defaults filled in, generated
    /// attributes freshly minted.
    pub fn create_node(&self, kind: &str, attrs: Attrs) -> Result<Node, RegistryError> {
        self.build_node(kind, attrs, false)
    }

    /// Like `create_node`, but keeps generated attribute values already
    /// present — the explicit allow for copied nodes.
    pub fn adopt_node(&self, kind: &str, attrs: Attrs) -> Result<Node, RegistryError> {
        self.build_node(kind, attrs, true)
    }

    fn build_node(
        &self,
        kind: &str,
        attrs: Attrs,
        keep_generated: bool,
    ) -> Result<Node, RegistryError> {
        let spec = self
            .node_specs
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownNodeKind(kind.to_string()))?;
        let attrs = instantiate_attrs(&spec.attrs, attrs, keep_generated);
        if spec.is_void {
            Ok(Node::Void(VoidNode {
                kind: kind.to_string(),
                attrs,
            }))
        } else {
            Ok(Node::Element(ElementNode {
                kind: kind.to_string(),
                attrs,
                children: Vec::new(),
            }))
        }
    }

    /// Clamps a possibly stale selection back onto existing text.
    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        if let Selection::Node { path } = selection {
            if crate::node::node_ref(doc, path).is_some() {
                return selection.clone();
            }
            let fallback = first_text_point(doc).unwrap_or(Point {
                path: vec![0],
                offset: 0,
            });
            return Selection::collapsed(fallback);
        }

        let Selection::Range { anchor, focus } = selection else {
            unreachable!();
        };

        let fallback = first_text_point(doc).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor = normalize_point_to_existing_text(doc, anchor).unwrap_or_else(|| {
            normalize_point_to_existing_text(doc, focus).unwrap_or_else(|| fallback.clone())
        });
        let focus =
            normalize_point_to_existing_text(doc, focus).unwrap_or_else(|| anchor.clone());

        Selection::Range { anchor, focus }
    }
}

fn check_unique_attrs(kind: &str, attrs: &[AttributeSpec]) -> Result<(), RegistryError> {
    for (ix, attr) in attrs.iter().enumerate() {
        if attrs[..ix].iter().any(|a| a.name == attr.name) {
            return Err(RegistryError::DuplicateAttribute {
                kind: kind.to_string(),
                name: attr.name.clone(),
            });
        }
    }
    Ok(())
}

fn first_text_point(doc: &Document) -> Option<Point> {
    fn walk(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => {
                    let point = Point {
                        path: path.clone(),
                        offset: 0,
                    };
                    path.pop();
                    return Some(point);
                }
                Node::Element(el) => {
                    if let Some(point) = walk(&el.children, path) {
                        path.pop();
                        return Some(point);
                    }
                }
                Node::Void(_) => {}
            }
            path.pop();
        }
        None
    }

    walk(&doc.children, &mut Vec::new())
}

fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    fn first_text_descendant(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
        for (ix, node) in children.iter().enumerate() {
            path.push(ix);
            match node {
                Node::Text(_) => {
                    let point = Point {
                        path: path.clone(),
                        offset: 0,
                    };
                    path.pop();
                    return Some(point);
                }
                Node::Element(el) => {
                    if let Some(point) = first_text_descendant(&el.children, path) {
                        path.pop();
                        return Some(point);
                    }
                }
                Node::Void(_) => {}
            }
            path.pop();
        }
        None
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        let node = &children[ix];
        match node {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: point.offset.min(t.text.len()),
                });
            }
            Node::Element(el) => {
                children = &el.children;
            }
            Node::Void(_) => {
                break;
            }
        }
    }

    let node = crate::node::node_ref(doc, &resolved_path)?;
    match node {
        Node::Text(t) => Some(Point {
            path: resolved_path,
            offset: point.offset.min(t.text.len()),
        }),
        Node::Element(el) => first_text_descendant(&el.children, &mut resolved_path),
        Node::Void(_) => None,
    }
}
