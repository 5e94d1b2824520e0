//! Incremental repair after an edge closes or reopens
//!
//! Closing raw edge e invalidates every shortcut whose unpacked path contains
//! e (the transitive parents of e) and every contraction decision that relied
//! on a witness path through e or through one of those shortcuts. Reopening e
//! can only make new shortcuts necessary, starting at e's lower-ranked end.
//!
//! Affected nodes are recontracted in ascending rank. Recontracting v keeps
//! shortcuts it still needs, drops the ones it no longer needs (with their
//! dependents) and adds new ones; each change schedules nodes ranked above v,
//! so a single ascending pass reaches a fixed point.

use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, trace};

use super::contraction::{apply_plan, plan_contraction, ShortcutPlan};
use super::{ArcId, ArcKind, Hierarchy};
use crate::graph::{EdgeId, GraphStore, NodeIdx};

/// What a closure toggle did to the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// The edge was already in the requested state
    Unchanged,
    /// Patched in place by recontracting `affected` nodes
    Repaired {
        affected: usize,
        removed_shortcuts: usize,
        added_shortcuts: usize,
    },
    /// The affected set exceeded the budget; the hierarchy was rebuilt
    RebuildRequired { affected: usize },
}

/// The repair touched more nodes than allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BudgetExceeded {
    pub affected: usize,
}

struct Repair<'a> {
    h: &'a mut Hierarchy,
    graph: &'a GraphStore,
    settle_limit: usize,
    worklist: BTreeSet<(u32, NodeIdx)>,
    current: Option<NodeIdx>,
    removed: usize,
    added: usize,
}

impl Repair<'_> {
    fn schedule(&mut self, node: NodeIdx) {
        if Some(node) == self.current {
            return;
        }
        self.worklist.insert((self.h.rank(node), node));
    }

    /// Remove a shortcut and everything built on it
    fn remove_cascade(&mut self, root: ArcId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.h.arc(id).alive {
                continue;
            }
            let middle = self.h.arc(id).middle();
            let (built_on, dependents) = self.h.unlink_shortcut(id);
            self.removed += 1;
            trace!(arc = id, "removed shortcut");

            if let Some(middle) = middle {
                self.schedule(middle);
            }
            for node in dependents {
                self.schedule(node);
            }
            stack.extend(built_on);
        }
    }

    fn recontract(&mut self, v: NodeIdx) {
        let level = self.h.rank(v);
        let mut plan = plan_contraction(self.h, self.graph, v, level, self.settle_limit);

        // Keep shortcuts that are still planned exactly as they are
        let existing: Vec<ArcId> = self.h.by_middle[v as usize].clone();
        for id in existing {
            let arc = self.h.arc(id);
            let same = |p: &ShortcutPlan| {
                p.from == arc.from
                    && p.to == arc.to
                    && p.weight == arc.weight
                    && matches!(arc.kind, ArcKind::Shortcut { first, second, .. }
                        if first == p.first && second == p.second)
            };
            let planned = plan.shortcuts.iter().position(same);
            match planned {
                Some(i) => {
                    plan.shortcuts.swap_remove(i);
                }
                None => self.remove_cascade(id),
            }
        }

        let new_arcs = apply_plan(self.h, v, plan);
        self.added += new_arcs.len();
        for id in new_arcs {
            let arc = self.h.arc(id);
            let lower = if self.h.rank(arc.from) < self.h.rank(arc.to) {
                arc.from
            } else {
                arc.to
            };
            self.schedule(lower);
        }
    }
}

/// Bring `h` in line with the new closed state of `edge`.
///
/// `graph` must already carry the new state. Gives up once more than
/// `budget` nodes would be recontracted, leaving `h` half-repaired; the caller
/// must rebuild it before anyone queries it again.
pub(crate) fn repair_edge(
    h: &mut Hierarchy,
    graph: &GraphStore,
    edge: EdgeId,
    settle_limit: usize,
    budget: usize,
) -> Result<UpdateOutcome, BudgetExceeded> {
    let closed = graph.is_closed(edge);
    let raw = graph.edge(edge);
    let mut repair = Repair {
        h,
        graph,
        settle_limit,
        worklist: BTreeSet::new(),
        current: None,
        removed: 0,
        added: 0,
    };

    if closed {
        let parents = repair.h.parents[edge as usize].clone();
        for id in parents {
            repair.remove_cascade(id);
        }
        let dependents: Vec<NodeIdx> = repair
            .h
            .witness_deps
            .get(&(edge as ArcId))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for node in dependents {
            repair.schedule(node);
        }
    } else if raw.from != raw.to {
        let lower = if repair.h.rank(raw.from) < repair.h.rank(raw.to) {
            raw.from
        } else {
            raw.to
        };
        repair.schedule(lower);
    }

    let mut processed: FxHashSet<NodeIdx> = FxHashSet::default();
    while let Some((_, v)) = repair.worklist.pop_first() {
        processed.insert(v);
        if processed.len() > budget {
            debug!(affected = processed.len(), budget, "repair budget exceeded");
            return Err(BudgetExceeded {
                affected: processed.len() + repair.worklist.len(),
            });
        }
        repair.current = Some(v);
        repair.recontract(v);
        repair.current = None;
    }

    let (removed, added) = (repair.removed, repair.added);
    repair.h.refresh_stats();
    debug!(
        edge,
        closed,
        affected = processed.len(),
        removed,
        added,
        "hierarchy repaired"
    );
    Ok(UpdateOutcome::Repaired {
        affected: processed.len(),
        removed_shortcuts: removed,
        added_shortcuts: added,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::{build, ChQuery};
    use crate::config::RouterConfig;
    use crate::graph::demo::lahaina;

    fn ids(graph: &GraphStore, h: &Hierarchy, from: &str, to: &str) -> Option<ArcId> {
        h.find_shortcut(graph.resolve(from).unwrap(), graph.resolve(to).unwrap())
    }

    #[test]
    fn test_close_removes_dependent_shortcut() {
        let mut graph = lahaina();
        let mut h = build(&graph, &RouterConfig::default());
        assert!(ids(&graph, &h, "B", "D").is_some());

        let edge = graph.edge_id("C", "D").unwrap();
        graph.set_closed("C", "D", true).unwrap();
        let outcome = repair_edge(&mut h, &graph, edge, 500, 2).unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::Repaired {
                affected: 1,
                removed_shortcuts: 1,
                added_shortcuts: 0
            }
        );
        assert!(ids(&graph, &h, "B", "D").is_none());
        assert!(ids(&graph, &h, "B", "I").is_some());
        h.check(&graph).unwrap();

        let a = graph.resolve("A").unwrap();
        let f = graph.resolve("F").unwrap();
        assert!(!ChQuery::new(&h, &graph).run(a, f).found());
    }

    #[test]
    fn test_reopen_restores_shortcut() {
        let mut graph = lahaina();
        let mut h = build(&graph, &RouterConfig::default());
        let edge = graph.edge_id("C", "D").unwrap();

        graph.set_closed("C", "D", true).unwrap();
        repair_edge(&mut h, &graph, edge, 500, 10).unwrap();
        graph.set_closed("C", "D", false).unwrap();
        let outcome = repair_edge(&mut h, &graph, edge, 500, 10).unwrap();

        assert!(matches!(outcome, UpdateOutcome::Repaired { added_shortcuts: 1, .. }));
        let shortcut = ids(&graph, &h, "B", "D").unwrap();
        assert_eq!(h.arc(shortcut).weight, 200.0);
        h.check(&graph).unwrap();

        let a = graph.resolve("A").unwrap();
        let f = graph.resolve("F").unwrap();
        assert_eq!(ChQuery::new(&h, &graph).run(a, f).cost, 460.0);
    }

    #[test]
    fn test_budget_exceeded() {
        let mut graph = lahaina();
        let mut h = build(&graph, &RouterConfig::default());
        let edge = graph.edge_id("C", "D").unwrap();
        graph.set_closed("C", "D", true).unwrap();
        let err = repair_edge(&mut h, &graph, edge, 500, 0).unwrap_err();
        assert_eq!(err.affected, 1);
    }

    #[test]
    fn test_closing_edge_without_shortcuts_touches_nothing() {
        let mut graph = lahaina();
        let mut h = build(&graph, &RouterConfig::default());
        let edge = graph.edge_id("G", "H").unwrap();
        graph.set_closed("G", "H", true).unwrap();
        let outcome = repair_edge(&mut h, &graph, edge, 500, 0).unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::Repaired {
                affected: 0,
                removed_shortcuts: 0,
                added_shortcuts: 0
            }
        );
    }
}
