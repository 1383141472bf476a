//! # FerroSync
//!
//! Native parser and query engine for SyncTeX synchronization files.
//!
//! ## Overview
//!
//! TeX engines emit a compact, line-oriented (optionally gzipped)
//! `.synctex` file mapping typeset output back to source input. This
//! crate reads that file into a navigable tree of typeset nodes (sheets,
//! boxes, glue, kerns, text fragments) and answers the two inverse
//! questions editors and viewers keep asking:
//!
//! - **Forward/display**: given `file:line[:column]`, where on which
//!   page did this end up?
//! - **Backward/edit**: given a click at `page:(x, y)`, which source
//!   location produced it?
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  records   ┌─────────┐  tree    ┌──────────┐
//! │ RecordLexer  │ ─────────► │ Builder │ ───────► │ geometry │
//! │ (gzip-aware) │            │         │          │ resolve  │
//! └──────────────┘            └─────────┘          └──────────┘
//!        ▲                                               │
//!        │ bytes                                         ▼
//! ┌──────────────┐   display_query / edit_query   ┌──────────┐
//! │   Scanner    │ ◄───────────────────────────── │  query   │
//! │ (owns it all)│ ─────────────────────────────► │ ranking  │
//! └──────────────┘        next_result()           └──────────┘
//! ```
//!
//! Parsing is a single linear pass; geometry is resolved eagerly once
//! and cached; queries are read-only walks. When the file changes on
//! disk the whole [`Scanner`] is dropped and rebuilt: no incremental
//! re-parse, no shared mutable state.
//!
//! ## Example
//!
//! ```no_run
//! use ferrosync::Scanner;
//!
//! let mut scanner = Scanner::new_with_output_file("main.pdf", None, true)?;
//! if scanner.display_query("./main.tex", 12, 0, 0) {
//!     while let Some(id) = scanner.next_result() {
//!         let node = scanner.node(id);
//!         println!("page {} at ({}, {})", node.page(), node.visible_h(), node.visible_v());
//!     }
//! }
//! # Ok::<(), ferrosync::Error>(())
//! ```
//!
//! ## Recovery model
//!
//! A malformed record is skipped; a structural mismatch or an
//! unresolvable tag drops the affected sheet; a truncated stream (an
//! engine still writing, an updater mid-append) yields a scanner marked
//! [`Scanner::is_partial`]. Only a missing file or a foreign format
//! version refuses to produce a scanner at all.

pub mod build;
pub mod error;
pub mod geometry;
pub mod input;
pub mod node;
pub mod num;
pub mod query;
pub mod record;
pub mod scanner;
pub mod update;

pub use build::SUPPORTED_VERSION;
pub use error::{Diagnostic, Error, Result, Severity};
pub use input::InputTable;
pub use node::{Node, NodeId, NodeKind, NodeRef, Tree};
pub use num::{IntPolicy, int_policy, parse_int, parse_int_with, set_int_policy};
pub use query::{ContextHint, QueryState, WordHint};
pub use scanner::Scanner;
pub use update::Updater;
