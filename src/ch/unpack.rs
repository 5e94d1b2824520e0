//! Shortcut unpacking - expand hierarchy arcs to raw graph edges

use super::{ArcId, ArcKind, Hierarchy};
use crate::graph::EdgeId;

/// Relative slack when comparing a shortcut's weight to its unpacked sum
pub(crate) const UNPACK_EPSILON: f64 = 1e-9;

/// Append the raw edges behind `arc` to `out`, in travel order.
///
/// Uses an explicit stack so deep shortcut chains can't overflow the call stack.
pub fn unpack_arc(h: &Hierarchy, arc: ArcId, out: &mut Vec<EdgeId>) {
    let mut stack = vec![arc];
    while let Some(id) = stack.pop() {
        match h.arc(id).kind {
            ArcKind::Original => out.push(id as EdgeId),
            ArcKind::Shortcut { first, second, .. } => {
                // Second pushed first so the first child pops first
                stack.push(second);
                stack.push(first);
            }
        }
    }
}

/// Expand a whole hierarchy path
pub fn unpack_path(h: &Hierarchy, arcs: &[ArcId]) -> Vec<EdgeId> {
    let mut out = Vec::with_capacity(arcs.len() * 2);
    for &arc in arcs {
        unpack_arc(h, arc, &mut out);
    }
    tracing::trace!(arcs = arcs.len(), edges = out.len(), "unpacked path");
    out
}
