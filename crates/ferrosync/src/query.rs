//! Candidate collection and ranking for both query directions.
//!
//! Forward (display) queries map a source position to output nodes;
//! backward (edit) queries map an output point to source nodes. Both
//! produce a ranked result list the scanner then cursors through. All
//! ranking is done over reachable nodes only; sheets dropped during
//! recovery never produce results.

use serde::{Deserialize, Serialize};

use crate::node::{Node, NodeId, Tree};

/// Where the result cursor stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryState {
    /// No query ran yet.
    #[default]
    Idle,
    /// A query matched; `cursor` indexes the next result to hand out.
    ResultsReady { results: Vec<NodeId>, cursor: usize },
    /// A query ran and found nothing, or all results were consumed.
    Exhausted,
}

/// Word fragments disambiguating a forward query by content.
///
/// Never a primary selection key: hints only reorder otherwise equal
/// candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordHint {
    pub before: Option<String>,
    pub offset: u32,
    pub middle: String,
    pub after: Option<String>,
}

/// Offset/context strings disambiguating a backward query by content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextHint {
    pub offset: u32,
    pub context: String,
}

/// Reachable nodes in document order: sheets ascending by page, preorder
/// within each sheet.
fn document_order(tree: &Tree) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(tree.len());
    for &sheet in tree.sheets() {
        let mut work = vec![sheet];
        while let Some(id) = work.pop() {
            order.push(id);
            // Reverse so the leftmost child pops first.
            for &child in tree.node(id).children.iter().rev() {
                work.push(child);
            }
        }
    }
    order
}

/// Case-insensitive substring probe over a node's own payload and its
/// descendants'.
fn subtree_contains(tree: &Tree, id: NodeId, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let needle = needle.to_lowercase();
    let mut work = vec![id];
    while let Some(at) = work.pop() {
        let node = tree.node(at);
        if let Some(text) = node.text.as_deref()
            && text.to_lowercase().contains(&needle)
        {
            return true;
        }
        work.extend(node.children.iter().copied());
    }
    false
}

fn matches_word_hint(tree: &Tree, id: NodeId, hint: &WordHint) -> bool {
    subtree_contains(tree, id, &hint.middle)
        || hint
            .before
            .as_deref()
            .is_some_and(|b| subtree_contains(tree, id, b))
        || hint
            .after
            .as_deref()
            .is_some_and(|a| subtree_contains(tree, id, a))
}

/// Forward query: all nodes of `tag` on `line`, ranked per the display
/// ordering (exact column first when requested, page-hint page promoted,
/// then page ascending, content hints breaking remaining ties).
pub(crate) fn display_results(
    tree: &Tree,
    tag: i32,
    line: i32,
    column: i32,
    page_hint: i32,
    hint: Option<&WordHint>,
) -> Vec<NodeId> {
    let mut candidates: Vec<(usize, NodeId)> = document_order(tree)
        .into_iter()
        .filter(|id| {
            let node = tree.node(*id);
            node.kind != crate::node::NodeKind::Sheet && node.tag == tag && node.line == line
        })
        .enumerate()
        .collect();
    let column_requested =
        column > 0 && candidates.iter().any(|(_, id)| tree.node(*id).column == Some(column));
    candidates.sort_by_key(|(index, id)| {
        let node = tree.node(*id);
        let column_miss = !(column_requested && node.column == Some(column));
        let off_hint_page = !(page_hint > 0 && node.page == page_hint);
        let hint_miss = match hint {
            Some(hint) => !matches_word_hint(tree, *id, hint),
            None => false,
        };
        (column_miss, off_hint_page, node.page, hint_miss, *index)
    });
    log::debug!(
        "display query tag {tag} line {line}: {} candidate(s)",
        candidates.len()
    );
    candidates.into_iter().map(|(_, id)| id).collect()
}

/// Normalized visible bounding box; `v` spans `[origin - depth,
/// origin + height]`, dimensions may be negative in the file.
fn bounding_box(node: &Node) -> (f32, f32, f32, f32) {
    let w = node.scale * node.width as f32;
    let ht = node.scale * node.height as f32;
    let dp = node.scale * node.depth as f32;
    let x0 = node.visible_h.min(node.visible_h + w);
    let x1 = node.visible_h.max(node.visible_h + w);
    let y0 = (node.visible_v - dp).min(node.visible_v + ht);
    let y1 = (node.visible_v - dp).max(node.visible_v + ht);
    (x0, y0, x1, y1)
}

/// Backward query: box-like nodes on `page` containing `(x, y)`, ranked
/// by geometric specificity: smallest area first, ties broken by
/// nesting depth and then by origin distance. Every containing box stays in the list.
pub(crate) fn edit_results(
    tree: &Tree,
    page: i32,
    x: f32,
    y: f32,
    hint: Option<&ContextHint>,
) -> Vec<NodeId> {
    let Some(sheet) = tree.sheet_for_page(page) else {
        return Vec::new();
    };
    let mut candidates: Vec<(usize, NodeId)> = Vec::new();
    let mut index = 0usize;
    let mut work = vec![sheet];
    while let Some(id) = work.pop() {
        let node = tree.node(id);
        for &child in node.children.iter().rev() {
            work.push(child);
        }
        if !node.kind.is_box_like() {
            continue;
        }
        index += 1;
        let (x0, y0, x1, y1) = bounding_box(node);
        if x0 <= x && x <= x1 && y0 <= y && y <= y1 {
            candidates.push((index, id));
        }
    }
    candidates.sort_by(|(ia, a), (ib, b)| {
        let rank = |index: usize, id: NodeId| {
            let node = tree.node(id);
            let (x0, y0, x1, y1) = bounding_box(node);
            let area = (x1 - x0) * (y1 - y0);
            let dh = x - node.visible_h;
            let dv = y - node.visible_v;
            let hint_miss = match hint {
                Some(hint) => !subtree_contains(tree, id, &hint.context),
                None => false,
            };
            (
                area,
                std::cmp::Reverse(node.level),
                dh * dh + dv * dv,
                hint_miss,
                index,
            )
        };
        let (area_a, level_a, dist_a, miss_a, idx_a) = rank(*ia, *a);
        let (area_b, level_b, dist_b, miss_b, idx_b) = rank(*ib, *b);
        area_a
            .total_cmp(&area_b)
            .then(level_a.cmp(&level_b))
            .then(dist_a.total_cmp(&dist_b))
            .then(miss_a.cmp(&miss_b))
            .then(idx_a.cmp(&idx_b))
    });
    log::debug!(
        "edit query page {page} ({x}, {y}): {} candidate(s)",
        candidates.len()
    );
    candidates.into_iter().map(|(_, id)| id).collect()
}
