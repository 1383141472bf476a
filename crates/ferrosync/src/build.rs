//! Tree construction from the record stream.
//!
//! The builder maintains a stack of currently open containers (the open
//! sheet first, then nested boxes, innermost last) mirroring begin/end
//! record pairs. Recovery policy: a malformed record is skipped with a
//! diagnostic; a structural mismatch or unresolved tag abandons the
//! current sheet only; an unterminated sheet at end of stream is closed
//! gracefully and the result marked partial.

use std::collections::HashMap;

use crate::error::{Diagnostic, Error, Result};
use crate::input::InputTable;
use crate::node::{Node, NodeId, NodeKind, Tree};
use crate::num::IntPolicy;
use crate::record::{BoxSpec, LeafSpec, Record, RecordLexer};

/// The format version this parser understands.
pub const SUPPORTED_VERSION: i32 = 1;

/// Global header fields from the preamble, possibly amended by
/// post-scriptum directives (last write wins).
#[derive(Debug, Clone, PartialEq)]
pub struct Preamble {
    pub version: i32,
    pub output: Option<String>,
    pub magnification: i32,
    pub unit: i32,
    pub x_offset: i32,
    pub y_offset: i32,
}

impl Default for Preamble {
    fn default() -> Self {
        Self {
            version: SUPPORTED_VERSION,
            output: None,
            magnification: 1000,
            unit: 1,
            x_offset: 0,
            y_offset: 0,
        }
    }
}

/// Magnification/offset directives seen while a sheet was open; they
/// shadow the preamble values for that sheet only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Overrides {
    pub magnification: Option<i32>,
    pub x_offset: Option<i32>,
    pub y_offset: Option<i32>,
}

/// Trailing index of per-sheet byte offsets, for random access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Postamble {
    pub count: i32,
    pub offsets: Vec<i32>,
}

/// Everything one parse pass produces.
#[derive(Debug)]
pub struct ParseOutcome {
    pub preamble: Preamble,
    pub tree: Tree,
    pub inputs: InputTable,
    pub postamble: Option<Postamble>,
    pub sheet_overrides: HashMap<NodeId, Overrides>,
    pub diagnostics: Vec<Diagnostic>,
    /// The stream ended with open containers or without a postamble; an
    /// updater may still be appending to the file.
    pub partial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Content,
    Postamble,
}

/// Parses a decoded synctex stream into a tree.
///
/// Fatal errors are `Unsupported` (bad or missing version record); all
/// other problems degrade to diagnostics per the recovery policy.
pub fn parse(input: &str, policy: IntPolicy) -> Result<ParseOutcome> {
    Builder::new(input, policy).run()
}

struct Builder<'a> {
    records: RecordLexer<'a>,
    tree: Tree,
    inputs: InputTable,
    diagnostics: Vec<Diagnostic>,
    preamble: Preamble,
    version_seen: bool,
    section: Section,
    postamble: Option<Postamble>,
    sheet_overrides: HashMap<NodeId, Overrides>,
    /// Open sheet (first) and boxes (innermost last).
    stack: Vec<NodeId>,
    /// Set while the remains of an abandoned sheet are skipped.
    skipping: bool,
    partial: bool,
}

impl<'a> Builder<'a> {
    fn new(input: &'a str, policy: IntPolicy) -> Self {
        Self {
            records: RecordLexer::new(input, policy),
            tree: Tree::new(),
            inputs: InputTable::new(),
            diagnostics: Vec::new(),
            preamble: Preamble::default(),
            version_seen: false,
            section: Section::Preamble,
            postamble: None,
            sheet_overrides: HashMap::new(),
            stack: Vec::new(),
            skipping: false,
            partial: false,
        }
    }

    fn warn(&mut self, message: impl Into<String>, offset: Option<usize>) {
        let message = message.into();
        log::warn!("{message}");
        self.diagnostics.push(Diagnostic::warning(message, offset));
    }

    fn run(mut self) -> Result<ParseOutcome> {
        while let Some((offset, record)) = self.records.next() {
            match record {
                Ok(record) => self.handle(offset, record)?,
                Err(Error::Malformed { offset, reason }) => {
                    // Line-oriented recovery: skip the record, keep going.
                    self.warn(format!("skipping malformed record: {reason}"), Some(offset));
                }
                Err(other) => return Err(other),
            }
        }
        if !self.version_seen {
            return Err(Error::Unsupported { version: 0 });
        }
        if !self.stack.is_empty() {
            let open = self.stack.len();
            self.close_open_containers();
            self.warn(
                format!("stream ended with {open} open container(s), auto-closed"),
                None,
            );
            self.partial = true;
        }
        if self.skipping {
            self.partial = true;
        }
        if self.postamble.is_none() {
            self.partial = true;
        }
        self.validate_tags();
        Ok(ParseOutcome {
            preamble: self.preamble,
            tree: self.tree,
            inputs: self.inputs,
            postamble: self.postamble,
            sheet_overrides: self.sheet_overrides,
            diagnostics: self.diagnostics,
            partial: self.partial,
        })
    }

    fn handle(&mut self, offset: usize, record: Record) -> Result<()> {
        if self.skipping {
            // Fast-forward the abandoned sheet; nothing nests sheets, so
            // its end record is the resume point.
            if let Record::SheetEnd { .. } = record {
                self.skipping = false;
            }
            return Ok(());
        }
        match record {
            Record::Version(version) => {
                if version != SUPPORTED_VERSION {
                    return Err(Error::Unsupported { version });
                }
                if self.version_seen {
                    self.warn("duplicate version record", Some(offset));
                }
                self.version_seen = true;
                self.preamble.version = version;
            }
            Record::Input { tag, path } => {
                if let Some(previous) = self.inputs.insert(tag, path) {
                    self.warn(
                        format!("input tag {tag} redefined (was {previous:?})"),
                        Some(offset),
                    );
                }
            }
            Record::Output(ext) => self.preamble.output = Some(ext),
            Record::Unit(value) => {
                if self.section != Section::Preamble {
                    self.warn("unit record outside preamble", Some(offset));
                }
                self.preamble.unit = value;
            }
            Record::Magnification(value) => match self.open_sheet() {
                Some(sheet) => {
                    self.sheet_overrides.entry(sheet).or_default().magnification = Some(value);
                }
                None => self.preamble.magnification = value,
            },
            Record::XOffset(value) => match self.open_sheet() {
                Some(sheet) => {
                    self.sheet_overrides.entry(sheet).or_default().x_offset = Some(value);
                }
                None => self.preamble.x_offset = value,
            },
            Record::YOffset(value) => match self.open_sheet() {
                Some(sheet) => {
                    self.sheet_overrides.entry(sheet).or_default().y_offset = Some(value);
                }
                None => self.preamble.y_offset = value,
            },
            Record::Content => self.section = Section::Content,
            Record::SheetBegin { page } => self.begin_sheet(page, offset),
            Record::SheetEnd { page } => self.end_sheet(page, offset),
            Record::VBoxBegin(spec) => self.begin_box(NodeKind::VBox, spec, offset),
            Record::HBoxBegin(spec) => self.begin_box(NodeKind::HBox, spec, offset),
            Record::VBoxEnd => self.end_box(NodeKind::VBox, offset),
            Record::HBoxEnd => self.end_box(NodeKind::HBox, offset),
            Record::VoidVBox(spec) => self.void_box(NodeKind::VoidVBox, spec, offset),
            Record::VoidHBox(spec) => self.void_box(NodeKind::VoidHBox, spec, offset),
            Record::Glue(leaf) => {
                self.leaf(NodeKind::Glue, leaf, None, offset);
            }
            Record::Math(leaf) => {
                self.leaf(NodeKind::Math, leaf, None, offset);
            }
            Record::Anchor(leaf) => {
                self.leaf(NodeKind::Anchor, leaf, None, offset);
            }
            Record::Kern { leaf, width } => {
                if let Some(id) = self.leaf(NodeKind::Kern, leaf, None, offset) {
                    self.tree.node_mut(id).width = width;
                }
            }
            Record::Text { leaf, payload } => {
                self.leaf(NodeKind::Text, leaf, Some(payload), offset);
            }
            Record::Rule { spec, payload } => {
                if let Some(id) = self.void_box_inner(NodeKind::Rule, spec, offset) {
                    self.tree.node_mut(id).text = payload;
                }
            }
            Record::ByteCount(value) => {
                if self.section == Section::Postamble
                    && let Some(postamble) = self.postamble.as_mut()
                {
                    postamble.offsets.push(value);
                }
            }
            Record::Postamble => {
                if !self.stack.is_empty() {
                    self.warn("postamble reached with open containers", Some(offset));
                    self.close_open_containers();
                    self.partial = true;
                }
                self.section = Section::Postamble;
                self.postamble = Some(Postamble::default());
            }
            Record::Count(count) => {
                if let Some(postamble) = self.postamble.as_mut() {
                    postamble.count = count;
                } else {
                    self.warn("count record outside postamble", Some(offset));
                }
            }
            Record::PostScriptum => {
                // Post-scriptum directives amend the global header; the
                // plain Magnification/Offset handling already does that
                // once the stack is empty.
            }
        }
        Ok(())
    }

    fn open_sheet(&self) -> Option<NodeId> {
        self.stack.first().copied()
    }

    fn begin_sheet(&mut self, page: i32, offset: usize) {
        if !self.stack.is_empty() {
            self.warn(
                format!("sheet {page} begins before the previous sheet ended"),
                Some(offset),
            );
            self.close_open_containers();
        }
        if page < 1 {
            self.warn(format!("invalid sheet page {page}, sheet skipped"), Some(offset));
            self.skipping = true;
            return;
        }
        let mut node = Node::new(NodeKind::Sheet, 0, 0, None);
        node.page = page;
        let id = self.tree.push(node);
        if self.tree.add_sheet(id).is_some() {
            self.warn(format!("duplicate sheet for page {page}, last wins"), Some(offset));
        }
        self.stack.push(id);
    }

    fn end_sheet(&mut self, page: i32, offset: usize) {
        let Some(sheet) = self.open_sheet() else {
            self.warn(format!("stray end of sheet {page}"), Some(offset));
            return;
        };
        if self.stack.len() > 1 {
            self.warn(
                format!("auto-closing {} open box(es) at end of sheet", self.stack.len() - 1),
                Some(offset),
            );
        }
        let opened = self.tree.node(sheet).page;
        if opened != page {
            self.warn(
                format!("sheet {opened} closed by end record for page {page}"),
                Some(offset),
            );
        }
        self.stack.clear();
    }

    fn attach(&mut self, mut node: Node, offset: usize) -> Option<NodeId> {
        let Some(&parent) = self.stack.last() else {
            self.warn(
                format!("{} record outside any sheet, skipped", node.kind.name()),
                Some(offset),
            );
            return None;
        };
        let parent_node = self.tree.node(parent);
        node.page = parent_node.page;
        node.parent = Some(parent);
        node.level = parent_node.level + 1;
        let id = self.tree.push(node);
        self.tree.node_mut(parent).children.push(id);
        Some(id)
    }

    fn begin_box(&mut self, kind: NodeKind, spec: BoxSpec, offset: usize) {
        let mut node = Node::new(kind, spec.link.tag, spec.link.line, spec.link.column);
        node.h = spec.point.h;
        node.v = spec.point.v;
        node.width = spec.extent.width;
        node.height = spec.extent.height;
        node.depth = spec.extent.depth;
        if let Some(id) = self.attach(node, offset) {
            self.stack.push(id);
        }
    }

    fn void_box_inner(&mut self, kind: NodeKind, spec: BoxSpec, offset: usize) -> Option<NodeId> {
        let mut node = Node::new(kind, spec.link.tag, spec.link.line, spec.link.column);
        node.h = spec.point.h;
        node.v = spec.point.v;
        node.width = spec.extent.width;
        node.height = spec.extent.height;
        node.depth = spec.extent.depth;
        self.attach(node, offset)
    }

    fn void_box(&mut self, kind: NodeKind, spec: BoxSpec, offset: usize) {
        self.void_box_inner(kind, spec, offset);
    }

    fn leaf(
        &mut self,
        kind: NodeKind,
        spec: LeafSpec,
        text: Option<String>,
        offset: usize,
    ) -> Option<NodeId> {
        let mut node = Node::new(kind, spec.link.tag, spec.link.line, spec.link.column);
        node.h = spec.point.h;
        node.v = spec.point.v;
        node.text = text;
        self.attach(node, offset)
    }

    fn end_box(&mut self, expected: NodeKind, offset: usize) {
        match self.stack.last().copied() {
            Some(top) if self.tree.node(top).kind == expected => {
                self.stack.pop();
            }
            Some(top) => {
                let found = self.tree.node(top).kind;
                self.abandon_sheet(expected, found, offset);
            }
            None => {
                self.warn(
                    format!("stray {} closer outside any sheet", expected.name()),
                    Some(offset),
                );
            }
        }
    }

    /// Structural mismatch: the current sheet cannot be trusted. Drop it
    /// and skip ahead to its end record; later sheets still parse.
    fn abandon_sheet(&mut self, expected: NodeKind, found: NodeKind, offset: usize) {
        let error = Error::StructuralMismatch {
            offset,
            expected: expected.name(),
            found: found.name(),
        };
        log::warn!("{error}, abandoning current sheet");
        self.diagnostics
            .push(Diagnostic::error(error.to_string(), Some(offset)));
        if let Some(sheet) = self.open_sheet() {
            self.tree.remove_sheet(sheet);
        }
        self.stack.clear();
        self.skipping = true;
    }

    fn close_open_containers(&mut self) {
        self.stack.clear();
    }

    /// Tags may be introduced after the content section, so dangling
    /// references are only detectable once the stream is consumed. A
    /// sheet holding one is dropped whole.
    fn validate_tags(&mut self) {
        let mut dropped = Vec::new();
        for &sheet in self.tree.sheets() {
            let mut work = vec![sheet];
            while let Some(id) = work.pop() {
                let node = self.tree.node(id);
                if node.kind != NodeKind::Sheet && !self.inputs.contains(node.tag) {
                    dropped.push((sheet, Error::UnresolvedTag { tag: node.tag }));
                    break;
                }
                work.extend(node.children.iter().copied());
            }
        }
        for (sheet, error) in dropped {
            let page = self.tree.node(sheet).page;
            log::warn!("{error}, dropping sheet {page}");
            self.diagnostics
                .push(Diagnostic::error(format!("{error}, sheet {page} dropped"), None));
            self.tree.remove_sheet(sheet);
        }
    }
}
