//! The scanner: owner of one parsed synctex file.
//!
//! Created from an output-file path (the parser locates the companion
//! `.synctex`/`.synctex.gz`), or from in-memory bytes for tests and
//! fuzzing. Owns the node tree, the input table and the query cursor;
//! everything is released together on drop. Queries never mutate the
//! tree, only the cursor, so a caller re-checks `is_stale` and rebuilds
//! a fresh scanner when the file changes on disk.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flate2::read::GzDecoder;

use crate::build::{self, Postamble, Preamble};
use crate::error::{Diagnostic, Error, Result};
use crate::input::InputTable;
use crate::node::{NodeId, NodeRef, Tree};
use crate::num;
use crate::query::{self, ContextHint, QueryState, WordHint};

pub struct Scanner {
    synctex_path: PathBuf,
    output_path: PathBuf,
    loaded_mtime: Option<SystemTime>,
    preamble: Preamble,
    tree: Tree,
    inputs: InputTable,
    postamble: Option<Postamble>,
    diagnostics: Vec<Diagnostic>,
    partial: bool,
    state: QueryState,
}

/// The synchronization candidates for `base`: plain and gzip flavors,
/// next to the output and under the directory hint.
fn candidates(output: &Path, directory: Option<&Path>, accept_compressed: bool) -> Vec<PathBuf> {
    let mut paths = vec![output.with_extension("synctex")];
    if accept_compressed {
        paths.push(output.with_extension("synctex.gz"));
    }
    if let Some(directory) = directory {
        for candidate in paths.clone() {
            if let Some(name) = candidate.file_name() {
                paths.push(directory.join(name));
            }
        }
    }
    paths
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

/// Reads and, for `.gz` candidates, transparently decompresses a file.
fn read_decoded(path: &Path) -> Result<String> {
    let raw = fs::read(path)?;
    if path.extension().is_some_and(|e| e == "gz") {
        let mut decoder = GzDecoder::new(raw.as_slice());
        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded)?;
        Ok(decoded)
    } else {
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

impl Scanner {
    /// Opens the most recently modified synctex candidate for `output`.
    ///
    /// `directory` is the build-directory hint for out-of-tree builds;
    /// `accept_compressed` admits the `.gz` candidates. Fails with
    /// [`Error::NotFound`] when no candidate is readable and
    /// [`Error::Unsupported`] on a foreign format version.
    pub fn new_with_output_file(
        output: impl AsRef<Path>,
        directory: Option<&Path>,
        accept_compressed: bool,
    ) -> Result<Self> {
        let output = output.as_ref();
        let chosen = candidates(output, directory, accept_compressed)
            .into_iter()
            .filter_map(|path| modified(&path).map(|mtime| (path, mtime)))
            .max_by_key(|(_, mtime)| *mtime);
        let Some((path, mtime)) = chosen else {
            return Err(Error::NotFound {
                output: output.display().to_string(),
            });
        };
        log::debug!("loading synctex data from {}", path.display());
        let decoded = read_decoded(&path)?;
        let mut scanner = Self::parse_str(&decoded)?;
        scanner.synctex_path = path;
        scanner.output_path = output.to_path_buf();
        scanner.loaded_mtime = Some(mtime);
        Ok(scanner)
    }

    /// Builds a scanner from raw bytes, sniffing the gzip magic. Entry
    /// point for tests and the fuzz target.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(&[0x1f, 0x8b]) {
            let mut decoder = GzDecoder::new(bytes);
            let mut decoded = String::new();
            decoder.read_to_string(&mut decoded)?;
            Self::parse_str(&decoded)
        } else {
            Self::parse_str(&String::from_utf8_lossy(bytes))
        }
    }

    /// Builds a scanner from an already decoded stream.
    pub fn parse_str(input: &str) -> Result<Self> {
        let mut outcome = build::parse(input, num::int_policy())?;
        crate::geometry::resolve(&mut outcome.tree, &outcome.preamble, &outcome.sheet_overrides);
        Ok(Self {
            synctex_path: PathBuf::new(),
            output_path: PathBuf::new(),
            loaded_mtime: None,
            preamble: outcome.preamble,
            tree: outcome.tree,
            inputs: outcome.inputs,
            postamble: outcome.postamble,
            diagnostics: outcome.diagnostics,
            partial: outcome.partial,
            state: QueryState::Idle,
        })
    }

    /// Forward query: source `name`/`line`/`column` to output nodes.
    ///
    /// `column` 0 means unspecified; a nonzero `page_hint` promotes that
    /// page's results. Returns whether at least one node matched.
    pub fn display_query(&mut self, name: &str, line: i32, column: i32, page_hint: i32) -> bool {
        self.display_query_inner(name, line, column, page_hint, None)
    }

    /// Forward query with content-hint disambiguation.
    pub fn display_query_with_hint(
        &mut self,
        name: &str,
        line: i32,
        column: i32,
        page_hint: i32,
        hint: &WordHint,
    ) -> bool {
        self.display_query_inner(name, line, column, page_hint, Some(hint))
    }

    fn display_query_inner(
        &mut self,
        name: &str,
        line: i32,
        column: i32,
        page_hint: i32,
        hint: Option<&WordHint>,
    ) -> bool {
        let results = match self.inputs.tag_for_name(name) {
            Some(tag) => query::display_results(&self.tree, tag, line, column, page_hint, hint),
            None => {
                log::debug!("input {name:?} not in the input table");
                Vec::new()
            }
        };
        self.ready(results)
    }

    /// Backward query: output `page`/`x`/`y` to source nodes. Returns
    /// whether at least one node contains the point.
    pub fn edit_query(&mut self, page: i32, x: f32, y: f32) -> bool {
        self.ready(query::edit_results(&self.tree, page, x, y, None))
    }

    /// Backward query with context-hint disambiguation.
    pub fn edit_query_with_hint(&mut self, page: i32, x: f32, y: f32, hint: &ContextHint) -> bool {
        self.ready(query::edit_results(&self.tree, page, x, y, Some(hint)))
    }

    fn ready(&mut self, results: Vec<NodeId>) -> bool {
        self.state = if results.is_empty() {
            QueryState::Exhausted
        } else {
            QueryState::ResultsReady { results, cursor: 0 }
        };
        matches!(self.state, QueryState::ResultsReady { .. })
    }

    /// Hands out the next ranked result, `None` once exhausted. Calling
    /// before any query or after exhaustion is a no-op. Resolve the id
    /// through [`Scanner::node`] for the accessor view.
    pub fn next_result(&mut self) -> Option<NodeId> {
        match &mut self.state {
            QueryState::Idle | QueryState::Exhausted => None,
            QueryState::ResultsReady { results, cursor } => {
                if *cursor < results.len() {
                    let id = results[*cursor];
                    *cursor += 1;
                    Some(id)
                } else {
                    self.state = QueryState::Exhausted;
                    None
                }
            }
        }
    }

    /// Path of the source file behind `tag`.
    pub fn get_name(&self, tag: i32) -> Option<&str> {
        self.inputs.get(tag)
    }

    pub fn tag_for_name(&self, name: &str) -> Option<i32> {
        self.inputs.tag_for_name(name)
    }

    pub fn inputs(&self) -> &InputTable {
        &self.inputs
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef::new(&self.tree, id)
    }

    pub fn synctex_path(&self) -> &Path {
        &self.synctex_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn version(&self) -> i32 {
        self.preamble.version
    }

    pub fn magnification(&self) -> i32 {
        self.preamble.magnification
    }

    pub fn unit(&self) -> i32 {
        self.preamble.unit
    }

    pub fn x_offset(&self) -> i32 {
        self.preamble.x_offset
    }

    pub fn y_offset(&self) -> i32 {
        self.preamble.y_offset
    }

    /// The stream ended mid-sheet or without a postamble.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn postamble(&self) -> Option<&Postamble> {
        self.postamble.as_ref()
    }

    /// Pages with a parsed sheet, ascending.
    pub fn sheet_pages(&self) -> Vec<i32> {
        self.tree
            .sheets()
            .iter()
            .map(|id| self.tree.node(*id).page)
            .collect()
    }

    /// Whether the backing file changed since this scanner was built.
    /// The caller then drops this instance and opens a new one; state
    /// is replaced, never patched in place.
    pub fn is_stale(&self) -> bool {
        match (self.loaded_mtime, modified(&self.synctex_path)) {
            (Some(loaded), Some(current)) => current > loaded,
            _ => false,
        }
    }
}
