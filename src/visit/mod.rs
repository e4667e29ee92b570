//! Per-frame visitations over the scene graph
//!
//! Three visitors cover the frame pipeline: [`UpdateVisitor`] runs the
//! behavior hooks and actions and resolves transforms,
//! [`DrawVisitor`] sequences and issues the draw calls, and
//! [`PunctureVisitor`] casts a global ray through the tree for
//! picking. Visitation is single-threaded and cooperative; nothing
//! inside a visitation blocks or preempts.

pub mod draw;
pub mod puncture;
pub mod update;

pub use draw::{DrawStats, DrawVisitor};
pub use puncture::{Puncture, PunctureVisitor};
pub use update::UpdateVisitor;

use crate::scene::{Node, NodeId, Scene};

/// Depth-first pre-order over the whole tree, gated per subtree:
/// a node failing the gate is skipped along with its descendants.
pub(crate) fn collect_preorder<F>(scene: &Scene, gate: F) -> Vec<NodeId>
where
    F: Fn(&Node) -> bool,
{
    let mut out = Vec::with_capacity(scene.node_count());
    let mut stack = vec![scene.root()];
    while let Some(id) = stack.pop() {
        let Ok(node) = scene.node(id) else {
            continue;
        };
        if !gate(node) {
            continue;
        }
        out.push(id);
        // Reversed so children visit in list order.
        stack.extend(node.children().iter().rev().copied());
    }
    out
}
