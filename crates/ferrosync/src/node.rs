//! The typeset node tree.
//!
//! Nodes live in one flat arena owned by the scanner; parents always
//! precede their children, so arena order is document order. Sheets are
//! the roots, one per page.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Sheet,
    HBox,
    VBox,
    VoidHBox,
    VoidVBox,
    Glue,
    Kern,
    Rule,
    Text,
    Math,
    Anchor,
}

impl NodeKind {
    /// Kinds that carry a two-dimensional extent of their own and can
    /// therefore contain a query point.
    pub fn is_box_like(self) -> bool {
        matches!(
            self,
            NodeKind::HBox
                | NodeKind::VBox
                | NodeKind::VoidHBox
                | NodeKind::VoidVBox
                | NodeKind::Rule
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Sheet => "sheet",
            NodeKind::HBox => "hbox",
            NodeKind::VBox => "vbox",
            NodeKind::VoidHBox => "void hbox",
            NodeKind::VoidVBox => "void vbox",
            NodeKind::Glue => "glue",
            NodeKind::Kern => "kern",
            NodeKind::Rule => "rule",
            NodeKind::Text => "text",
            NodeKind::Math => "math",
            NodeKind::Anchor => "anchor",
        }
    }
}

/// Index of a node in the scanner's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub tag: i32,
    pub line: i32,
    pub column: Option<i32>,
    /// Page of the owning sheet.
    pub page: i32,
    /// Local origin, relative to the enclosing box.
    pub h: i32,
    pub v: i32,
    /// Local dimensions; height grows upward from the origin, depth
    /// downward. Never accumulated across nesting.
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    /// Payload of text records; rules may carry one too.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Nesting depth, sheet = 0.
    pub level: u32,
    /// Page-space origin, cached by the geometry pass.
    pub visible_h: f32,
    pub visible_v: f32,
    /// Scale from local units to page points, cached per node so that
    /// sheet-level overrides need no lookup at query time.
    pub scale: f32,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, tag: i32, line: i32, column: Option<i32>) -> Self {
        Self {
            kind,
            tag,
            line,
            column,
            page: 0,
            h: 0,
            v: 0,
            width: 0,
            height: 0,
            depth: 0,
            text: None,
            parent: None,
            children: Vec::new(),
            level: 0,
            visible_h: 0.0,
            visible_v: 0.0,
            scale: 1.0,
        }
    }
}

/// The arena: every node of every sheet, plus the sorted sheet roots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
    sheets: Vec<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Sheet roots, sorted by page number.
    pub fn sheets(&self) -> &[NodeId] {
        &self.sheets
    }

    pub fn sheet_for_page(&self, page: i32) -> Option<NodeId> {
        self.sheets
            .iter()
            .copied()
            .find(|id| self.node(*id).page == page)
    }

    /// Registers `id` as a sheet root, replacing any previous sheet with
    /// the same page and keeping the roots sorted by page.
    pub(crate) fn add_sheet(&mut self, id: NodeId) -> Option<NodeId> {
        let page = self.node(id).page;
        let replaced = match self.sheets.iter().position(|s| self.node(*s).page == page) {
            Some(at) => Some(std::mem::replace(&mut self.sheets[at], id)),
            None => {
                self.sheets.push(id);
                None
            }
        };
        let nodes = &self.nodes;
        self.sheets.sort_by_key(|s| nodes[s.index()].page);
        replaced
    }

    /// Drops a sheet root (its arena nodes stay allocated but become
    /// unreachable; abandoned sheets are rare enough not to compact).
    pub(crate) fn remove_sheet(&mut self, id: NodeId) {
        self.sheets.retain(|s| *s != id);
    }

    /// The nearest box-like ancestor of `id`, or `id` itself when it is
    /// box-like.
    pub fn enclosing_box(&self, id: NodeId) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(at) = current {
            let node = self.node(at);
            if node.kind.is_box_like() {
                return Some(at);
            }
            current = node.parent;
        }
        None
    }
}

/// Borrowed view of one node, exposing the query-result accessors.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(tree: &'a Tree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    fn node(&self) -> &'a Node {
        self.tree.node(self.id)
    }

    pub fn kind(&self) -> NodeKind {
        self.node().kind
    }

    pub fn tag(&self) -> i32 {
        self.node().tag
    }

    pub fn line(&self) -> i32 {
        self.node().line
    }

    /// Column, or `None` when the record carried no column field.
    pub fn column(&self) -> Option<i32> {
        self.node().column
    }

    pub fn page(&self) -> i32 {
        self.node().page
    }

    pub fn visible_h(&self) -> f32 {
        self.node().visible_h
    }

    pub fn visible_v(&self) -> f32 {
        self.node().visible_v
    }

    pub fn visible_width(&self) -> f32 {
        let node = self.node();
        node.scale * node.width as f32
    }

    pub fn visible_height(&self) -> f32 {
        let node = self.node();
        node.scale * node.height as f32
    }

    pub fn visible_depth(&self) -> f32 {
        let node = self.node();
        node.scale * node.depth as f32
    }

    pub fn text(&self) -> Option<&'a str> {
        self.node().text.as_deref()
    }

    fn enclosing(&self) -> &'a Node {
        match self.tree.enclosing_box(self.id) {
            Some(id) => self.tree.node(id),
            None => self.node(),
        }
    }

    /// Visible geometry of the enclosing box (the node itself when it is
    /// box-like). Viewers highlight this box, not the bare leaf origin.
    pub fn box_visible_h(&self) -> f32 {
        self.enclosing().visible_h
    }

    pub fn box_visible_v(&self) -> f32 {
        self.enclosing().visible_v
    }

    pub fn box_visible_width(&self) -> f32 {
        let b = self.enclosing();
        b.scale * b.width as f32
    }

    pub fn box_visible_height(&self) -> f32 {
        let b = self.enclosing();
        b.scale * b.height as f32
    }

    pub fn box_visible_depth(&self) -> f32 {
        let b = self.enclosing();
        b.scale * b.depth as f32
    }
}
