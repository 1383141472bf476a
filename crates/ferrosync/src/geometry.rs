//! Visible (page-space) geometry resolution.
//!
//! Local offsets compose down the parent chain; magnification and the
//! global offsets apply exactly once per axis, never per nesting level.
//! Dimensions stay local to each node and are only scaled. The pass runs
//! once, eagerly, after tree construction and caches its results on the
//! nodes.

use std::collections::HashMap;

use crate::build::{Overrides, Preamble};
use crate::node::{NodeId, Tree};

/// Scale and page origin for one sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Local units to page points: `unit * magnification / 1000`.
    pub scale: f32,
    pub origin_h: f32,
    pub origin_v: f32,
}

impl Frame {
    fn for_sheet(preamble: &Preamble, overrides: Option<&Overrides>) -> Self {
        let magnification = overrides
            .and_then(|o| o.magnification)
            .unwrap_or(preamble.magnification);
        let x_offset = overrides
            .and_then(|o| o.x_offset)
            .unwrap_or(preamble.x_offset);
        let y_offset = overrides
            .and_then(|o| o.y_offset)
            .unwrap_or(preamble.y_offset);
        let unit = preamble.unit as f32;
        Frame {
            scale: unit * magnification as f32 / 1000.0,
            origin_h: x_offset as f32 * unit,
            origin_v: y_offset as f32 * unit,
        }
    }
}

/// Annotates every node with its cached visible origin and scale.
pub fn resolve(tree: &mut Tree, preamble: &Preamble, overrides: &HashMap<NodeId, Overrides>) {
    let sheets: Vec<NodeId> = tree.sheets().to_vec();
    for sheet in sheets {
        let frame = Frame::for_sheet(preamble, overrides.get(&sheet));
        // Accumulate local sums in i64: individual offsets are 32 bit but
        // chains of them are not.
        let mut work: Vec<(NodeId, i64, i64)> = vec![(sheet, 0, 0)];
        while let Some((id, sum_h, sum_v)) = work.pop() {
            let node = tree.node_mut(id);
            let sum_h = sum_h + i64::from(node.h);
            let sum_v = sum_v + i64::from(node.v);
            node.visible_h = frame.origin_h + frame.scale * sum_h as f32;
            node.visible_v = frame.origin_v + frame.scale * sum_v as f32;
            node.scale = frame.scale;
            let children = node.children.clone();
            for child in children {
                work.push((child, sum_h, sum_v));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::parse;
    use crate::num::IntPolicy;

    const PREAMBLE: &str = "SyncTeX Version:1\nInput:1:./main.tex\nOutput:pdf\nMagnification:1000\nUnit:1\nX Offset:0\nY Offset:0\nContent:\n";

    fn resolved(content: &str) -> crate::build::ParseOutcome {
        let input = format!("{PREAMBLE}{content}");
        let mut outcome = parse(&input, IntPolicy::Strict).expect("parse");
        resolve(&mut outcome.tree, &outcome.preamble, &outcome.sheet_overrides);
        outcome
    }

    #[test]
    fn offsets_compose_down_the_chain() {
        let outcome = resolved("{1\n[1,1:3,4:400,600,0\n(1,1:10,20:100,10,2\ng1,2:5,6\n)\n]\n}1\nPostamble:\nPost scriptum:\n");
        let sheet = outcome.tree.node(outcome.tree.sheets()[0]);
        let vbox = outcome.tree.node(sheet.children[0]);
        let hbox = outcome.tree.node(vbox.children[0]);
        let glue = outcome.tree.node(hbox.children[0]);
        assert_eq!((vbox.visible_h, vbox.visible_v), (3.0, 4.0));
        assert_eq!((hbox.visible_h, hbox.visible_v), (13.0, 24.0));
        assert_eq!((glue.visible_h, glue.visible_v), (18.0, 30.0));
    }

    #[test]
    fn magnification_applies_once() {
        let outcome = resolved("{1\nMagnification:2000\n[1,1:3,0:400,600,0\n(1,1:10,0:100,10,2\n)\n]\n}1\nPostamble:\nPost scriptum:\n");
        let sheet = outcome.tree.node(outcome.tree.sheets()[0]);
        let vbox = outcome.tree.node(sheet.children[0]);
        let hbox = outcome.tree.node(vbox.children[0]);
        // scale 2.0: nested offsets scale linearly, not quadratically.
        assert_eq!(vbox.visible_h, 6.0);
        assert_eq!(hbox.visible_h, 26.0);
        // Dimensions scale but do not accumulate.
        assert_eq!(hbox.scale * hbox.width as f32, 200.0);
    }

    #[test]
    fn global_offsets_shift_the_page_origin() {
        let outcome = resolved("{1\n(1,1:10,20:100,10,2\n)\n}1\nPostamble:\nPost scriptum:\nX Offset:7\nY Offset:11\n");
        let sheet = outcome.tree.node(outcome.tree.sheets()[0]);
        let hbox = outcome.tree.node(sheet.children[0]);
        assert_eq!((hbox.visible_h, hbox.visible_v), (17.0, 31.0));
    }
}
