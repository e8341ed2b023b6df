//! Closed patterns, the closure hash index, and early termination.
//!
//! Every recorded pattern registers, per code step, the set of physical
//! edges its projections realize that step with. Before a code is
//! expanded, the index is probed with the code's last-step edge set: a
//! hit names candidate patterns whose occurrences may coincide with the
//! code's. A candidate matches when graph coverage agrees and a
//! position-level isomorphism maps every current projection onto one of
//! the candidate's projections; the isomorphism is seeded in the
//! candidate's exemplar graph (the graph where it has fewest
//! projections) and then verified everywhere. A confirmed match lets the
//! search skip the whole subtree, unless the failure trie vetoes it.

use crate::dfs_code::DfsCode;
use crate::graph::{EdgeId, GraphId};
use crate::projection::{Projected, ProjectionArena};
use crate::termination::CodeTrie;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Index of a pattern in the closure index's pattern list.
pub type PatternId = usize;

/// A recorded closed pattern.
#[derive(Debug)]
pub struct ClosedPattern {
    /// Canonical DFS code of the pattern.
    pub code: DfsCode,
    /// Internal ids of the transaction graphs containing the pattern.
    pub graph_ids: BTreeSet<GraphId>,
    /// Number of containing graphs.
    pub support: usize,
    /// The pattern's projections at recording time.
    pub projected: Projected,
    /// Projections materialized per graph, oldest step first.
    by_graph: BTreeMap<GraphId, Vec<Vec<EdgeId>>>,
    /// Graph with the fewest projections; seed for isomorphism search.
    exemplar_gid: Option<GraphId>,
}

impl ClosedPattern {
    /// Materializes the per-graph projection lists and picks the
    /// exemplar graph (fewest projections, lowest id on ties).
    pub fn new(
        code: DfsCode,
        graph_ids: BTreeSet<GraphId>,
        support: usize,
        projected: Projected,
        arena: &ProjectionArena,
    ) -> Self {
        let by_graph = projected.by_graph(arena);
        let mut exemplar_gid = None;
        let mut best = usize::MAX;
        for (&gid, lists) in &by_graph {
            if lists.len() < best {
                best = lists.len();
                exemplar_gid = Some(gid);
            }
        }
        Self {
            code,
            graph_ids,
            support,
            projected,
            by_graph,
            exemplar_gid,
        }
    }

    /// Returns `true` for a one-vertex pattern.
    pub fn is_single_vertex(&self) -> bool {
        self.code.is_single_vertex()
    }

    /// Tests whether a pattern with the given coverage and projections
    /// occurs exactly where this one does. On success returns the
    /// position isomorphism from the probing pattern's code edges into
    /// this pattern's code edges.
    pub fn check_equivalent_occurrence(
        &self,
        other_graph_ids: &BTreeSet<GraphId>,
        other_support: usize,
        other: &Projected,
        arena: &ProjectionArena,
    ) -> Option<HashMap<usize, usize>> {
        if other_support > self.support {
            return None;
        }
        if self.graph_ids != *other_graph_ids {
            return None;
        }
        if other.projections().len() > self.projected.projections().len() {
            return None;
        }
        let exemplar = self.exemplar_gid?;
        let other_by_graph = other.by_graph(arena);
        let other_exemplar = other_by_graph.get(&exemplar)?;

        'possible: for iso in self.possible_isomorphisms(other_exemplar) {
            for (gid, other_lists) in &other_by_graph {
                let my_lists = &self.by_graph[gid];
                for other_edges in other_lists {
                    let matched = my_lists.iter().any(|my_edges| {
                        iso.iter().all(|(&oi, &mi)| other_edges[oi] == my_edges[mi])
                    });
                    if !matched {
                        continue 'possible;
                    }
                }
            }
            return Some(iso);
        }
        None
    }

    /// Candidate position isomorphisms, built by aligning the first
    /// probing projection in the exemplar graph against each of this
    /// pattern's exemplar projections.
    fn possible_isomorphisms(&self, other_exemplar: &[Vec<EdgeId>]) -> Vec<HashMap<usize, usize>> {
        let mut isomorphisms = Vec::new();
        let Some(other_edges) = other_exemplar.first() else {
            return isomorphisms;
        };
        let exemplar = self.exemplar_gid.expect("exemplar exists when projections do");
        for my_edges in &self.by_graph[&exemplar] {
            let mut iso = HashMap::new();
            for (i, oe) in other_edges.iter().enumerate() {
                for (j, me) in my_edges.iter().enumerate() {
                    if oe == me {
                        iso.insert(i, j);
                        break;
                    }
                }
                if iso.len() == other_edges.len() {
                    isomorphisms.push(iso.clone());
                }
            }
        }
        isomorphisms
    }
}

/// Outcome of the pre-expansion early-termination probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminationCheck {
    /// An occurrence-equivalent closed pattern exists; the subtree can
    /// be skipped.
    pub terminate: bool,
    /// The match is marked unsafe in the failure trie; the subtree must
    /// be mined, and the current code is known not to be closed.
    pub failure: bool,
}

/// All recorded patterns plus the per-step edge-set index over them.
#[derive(Debug, Default)]
pub struct ClosureIndex {
    patterns: Vec<ClosedPattern>,
    by_key: HashMap<BTreeSet<EdgeId>, Vec<PatternId>>,
}

impl ClosureIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pattern and registers it under each step key. Patterns
    /// without projections (one-vertex patterns) produce no keys.
    pub fn record(&mut self, pattern: ClosedPattern, arena: &ProjectionArena) -> PatternId {
        let id = self.patterns.len();
        for key in pattern.projected.step_keys(arena) {
            self.by_key.entry(key).or_default().push(id);
        }
        self.patterns.push(pattern);
        id
    }

    /// Number of recorded patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` while nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The recorded patterns, in discovery order.
    pub fn patterns(&self) -> &[ClosedPattern] {
        &self.patterns
    }

    /// Consumes the index, yielding the patterns in discovery order.
    pub fn into_patterns(self) -> Vec<ClosedPattern> {
        self.patterns
    }

    /// Probes the index before expanding a code. `detect_failure`
    /// controls whether matches are cross-checked against the trie of
    /// codes known to make early termination unsafe.
    pub fn check_early_termination(
        &self,
        graph_ids: &BTreeSet<GraphId>,
        projected: &Projected,
        arena: &ProjectionArena,
        trie: &CodeTrie,
        detect_failure: bool,
    ) -> TerminationCheck {
        let key = projected.last_edge_key(arena);
        let Some(candidates) = self.by_key.get(&key) else {
            return TerminationCheck::default();
        };
        let mut terminate = false;
        for &pid in candidates {
            let pattern = &self.patterns[pid];
            let Some(iso) =
                pattern.check_equivalent_occurrence(graph_ids, graph_ids.len(), projected, arena)
            else {
                continue;
            };
            terminate = true;
            if detect_failure {
                // The match only covers a prefix of the candidate's
                // code; termination is unsafe if that prefix is marked.
                let max_index = iso.values().copied().max().unwrap_or(0);
                let prefix = &pattern.code.steps()[..=max_index];
                if trie.contains_path(prefix) {
                    return TerminationCheck {
                        terminate: false,
                        failure: true,
                    };
                }
            }
        }
        TerminationCheck {
            terminate,
            failure: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dfs_code::ExtendedEdge;

    fn edge(gid: GraphId, index: u32) -> EdgeId {
        EdgeId { gid, index }
    }

    fn two_step_code() -> DfsCode {
        let mut code = DfsCode::new();
        code.push(ExtendedEdge::new(0, 1, 0, 0, 0));
        code.push(ExtendedEdge::new(1, 2, 0, 0, 0));
        code
    }

    /// Builds a pattern over two graphs with one two-step chain each.
    fn sample_pattern(arena: &mut ProjectionArena) -> ClosedPattern {
        let mut projected = Projected::new();
        for gid in 0..2 {
            let tail = arena.push(edge(gid, 0), false, None);
            let head = arena.push(edge(gid, 1), false, Some(tail));
            projected.push(head, gid);
        }
        let gids: BTreeSet<GraphId> = [0, 1].into_iter().collect();
        ClosedPattern::new(two_step_code(), gids.clone(), 2, projected, arena)
    }

    #[test]
    fn exemplar_is_lowest_minimal_graph() {
        let mut arena = ProjectionArena::new();
        let pattern = sample_pattern(&mut arena);
        assert_eq!(pattern.exemplar_gid, Some(0));
        assert!(!pattern.is_single_vertex());
    }

    #[test]
    fn equivalent_occurrence_on_matching_sub_projection() {
        let mut arena = ProjectionArena::new();
        let pattern = sample_pattern(&mut arena);

        // A one-step probe whose edges are the first step of the
        // pattern's chains in every graph.
        let mut probe = Projected::new();
        for gid in 0..2 {
            let chain = arena.push(edge(gid, 0), false, None);
            probe.push(chain, gid);
        }
        let gids: BTreeSet<GraphId> = [0, 1].into_iter().collect();
        let iso = pattern
            .check_equivalent_occurrence(&gids, 2, &probe, &arena)
            .expect("probe embeds into the pattern");
        assert_eq!(iso, [(0, 0)].into_iter().collect());
    }

    #[test]
    fn coverage_mismatch_rejects() {
        let mut arena = ProjectionArena::new();
        let pattern = sample_pattern(&mut arena);

        let mut probe = Projected::new();
        let chain = arena.push(edge(0, 0), false, None);
        probe.push(chain, 0);
        let gids: BTreeSet<GraphId> = [0].into_iter().collect();
        assert!(pattern
            .check_equivalent_occurrence(&gids, 1, &probe, &arena)
            .is_none());
    }

    #[test]
    fn foreign_edges_reject() {
        let mut arena = ProjectionArena::new();
        let pattern = sample_pattern(&mut arena);

        let mut probe = Projected::new();
        for gid in 0..2 {
            let chain = arena.push(edge(gid, 7), false, None);
            probe.push(chain, gid);
        }
        let gids: BTreeSet<GraphId> = [0, 1].into_iter().collect();
        assert!(pattern
            .check_equivalent_occurrence(&gids, 2, &probe, &arena)
            .is_none());
    }

    #[test]
    fn index_probe_and_trie_veto() {
        let mut arena = ProjectionArena::new();
        let pattern = sample_pattern(&mut arena);
        let code = pattern.code.clone();
        let mut index = ClosureIndex::new();
        index.record(pattern, &arena);

        let mut probe = Projected::new();
        for gid in 0..2 {
            let chain = arena.push(edge(gid, 0), false, None);
            probe.push(chain, gid);
        }
        let gids: BTreeSet<GraphId> = [0, 1].into_iter().collect();

        let trie = CodeTrie::new();
        let check = index.check_early_termination(&gids, &probe, &arena, &trie, true);
        assert_eq!(
            check,
            TerminationCheck {
                terminate: true,
                failure: false
            }
        );

        // Marking the matched prefix as unsafe flips the outcome.
        let mut marked = CodeTrie::new();
        marked.insert(&code.steps()[..1]);
        let check = index.check_early_termination(&gids, &probe, &arena, &marked, true);
        assert_eq!(
            check,
            TerminationCheck {
                terminate: false,
                failure: true
            }
        );

        // With detection off the veto is not consulted.
        let check = index.check_early_termination(&gids, &probe, &arena, &marked, false);
        assert!(check.terminate);
    }
}
