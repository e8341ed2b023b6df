//! Early-termination-failure analysis.
//!
//! Skipping a subtree because an occurrence-equivalent closed pattern
//! exists is only sound when no descendant of the skipped code is itself
//! closed. The analyzer runs after each recursive exit and probes five
//! structural situations in which "breaking" some occurrences of the
//! current code would create or enlarge a frequent forward extension;
//! any hit marks the code's step sequence in a prefix trie, and matches
//! against marked prefixes later veto early termination.
//!
//! Each case consults only the projections of the current code (case 5
//! consults projections of code prefixes, recovered by rewinding the
//! shared chains).

use crate::dfs_code::{DfsCode, ExtendedEdge, Label};
use crate::extension::ExtensionMap;
use crate::graph::{GraphId, GraphStore, VertexId};
use crate::projection::{Projected, ProjectionArena, ProjectionId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Prefix trie over DFS code steps marking codes unsafe for early
/// termination.
#[derive(Debug, Default)]
pub struct CodeTrie {
    root: TrieNode,
}

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<ExtendedEdge, TrieNode>,
}

impl CodeTrie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a step sequence.
    pub fn insert(&mut self, steps: &[ExtendedEdge]) {
        let mut node = &mut self.root;
        for step in steps {
            node = node.children.entry(*step).or_default();
        }
    }

    /// Returns `true` if `steps` walks a path present in the trie, i.e.
    /// it is a prefix of (or equal to) some marked sequence.
    pub fn contains_path(&self, steps: &[ExtendedEdge]) -> bool {
        let mut node = &self.root;
        for step in steps {
            match node.children.get(step) {
                Some(child) => node = child,
                None => return false,
            }
        }
        true
    }

    /// Returns `true` while nothing is marked.
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

/// The five-case analyzer plus the trie it feeds.
#[derive(Debug)]
pub struct FailureAnalyzer {
    min_sup: usize,
    trie: CodeTrie,
}

impl FailureAnalyzer {
    /// Creates an analyzer for the given minimum support.
    pub fn new(min_sup: usize) -> Self {
        Self {
            min_sup,
            trie: CodeTrie::new(),
        }
    }

    /// The trie of codes marked unsafe so far.
    pub fn trie(&self) -> &CodeTrie {
        &self.trie
    }

    /// Runs the five cases against the exiting code; the first hit marks
    /// the code and stops.
    pub fn analyze(
        &mut self,
        code: &DfsCode,
        projected: &Projected,
        extensions: &ExtensionMap,
        store: &GraphStore,
        arena: &ProjectionArena,
    ) {
        if code.is_empty() || projected.projections().is_empty() {
            return;
        }
        let rmp_edges = code.rightmost_path_edges();
        let fwd = forward_extensions(code, extensions);
        if self.case1(code, projected, &rmp_edges, &fwd, store, arena) {
            return;
        }
        if self.case2(code, projected, &rmp_edges, &fwd, store, arena) {
            return;
        }
        if self.case3(code, projected, &rmp_edges, &fwd, store, arena) {
            return;
        }
        if self.case4(code, projected, &rmp_edges, store, arena) {
            return;
        }
        self.case5(code, projected, store, arena);
    }

    /// Case 1: an edge from the rightmost graph vertex to an embedded
    /// vertex off the rightmost path can be broken into a new or
    /// enlarged frequent forward extension from the rightmost vertex.
    fn case1(
        &mut self,
        code: &DfsCode,
        projected: &Projected,
        rmp_edges: &[usize],
        fwd: &[(ExtendedEdge, &Projected)],
        store: &GraphStore,
        arena: &ProjectionArena,
    ) -> bool {
        if !code.at(code.len() - 1).is_forward() {
            return false;
        }
        let rightmost = code.rightmost();
        let mut gids_by_key: BTreeMap<(Label, Label), BTreeSet<GraphId>> = BTreeMap::new();
        for &head in projected.projections() {
            let gid = arena[head].edge.gid;
            let g = store.graph(gid);
            let from_vertex = arena.to_vertex_at(store, head, rmp_edges[0]);
            for (index, e) in g.incident_edges(from_vertex) {
                if arena.has_edge(head, g.edge_id(index)) {
                    continue;
                }
                let to_vertex = e.other(from_vertex);
                if arena.has_vertex_among(store, head, to_vertex, rmp_edges) {
                    continue;
                }
                if arena.has_vertex(store, head, to_vertex) {
                    let set = gids_by_key
                        .entry((e.label, g.label_of(to_vertex)))
                        .or_default();
                    set.insert(gid);
                    if set.len() >= self.min_sup {
                        self.trie.insert(code.steps());
                        return true;
                    }
                }
            }
        }
        for ((elb, vlb), gids) in gids_by_key.iter_mut() {
            for (step, ext) in fwd {
                if step.from == rightmost && step.edge_label == *elb && step.to_label == *vlb {
                    for &p in ext.projections() {
                        gids.insert(arena[p].edge.gid);
                    }
                    if gids.len() >= self.min_sup {
                        self.trie.insert(code.steps());
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Case 2: like case 1, but the candidate extension starts from an
    /// earlier rightmost-path vertex and the broken edges lead to
    /// vertices numbered strictly inside a forked path step.
    fn case2(
        &mut self,
        code: &DfsCode,
        projected: &Projected,
        rmp_edges: &[usize],
        fwd: &[(ExtendedEdge, &Projected)],
        store: &GraphStore,
        arena: &ProjectionArena,
    ) -> bool {
        if !code.at(code.len() - 1).is_forward() {
            return false;
        }
        let mut gids_by_key: BTreeMap<(u32, Label, Label), BTreeSet<GraphId>> = BTreeMap::new();
        for i in 0..rmp_edges.len() {
            let step = code.at(rmp_edges[i]);
            let v_start = step.from;
            let v_end = step.to;
            // Only path steps that jump over vertices of another branch.
            if v_end == v_start + 1 {
                continue;
            }
            for j in (i + 1)..rmp_edges.len() {
                let v_from = code.at(rmp_edges[j]).from;
                for &head in projected.projections() {
                    let gid = arena[head].edge.gid;
                    let g = store.graph(gid);
                    let iso = arena.embedding(store, code, head);
                    let skipped: HashSet<VertexId> = (v_start + 1..v_end)
                        .map(|v| iso[v as usize])
                        .collect();
                    let from_vertex = iso[v_from as usize];
                    for (index, e) in g.incident_edges(from_vertex) {
                        if arena.has_edge(head, g.edge_id(index)) {
                            continue;
                        }
                        let to_vertex = e.other(from_vertex);
                        if !skipped.contains(&to_vertex) {
                            continue;
                        }
                        let set = gids_by_key
                            .entry((v_from, e.label, g.label_of(to_vertex)))
                            .or_default();
                        set.insert(gid);
                        if set.len() >= self.min_sup {
                            self.trie.insert(code.steps());
                            return true;
                        }
                    }
                }
            }
        }
        for ((v_from, elb, vlb), gids) in gids_by_key.iter_mut() {
            for (step, ext) in fwd {
                if step.from == *v_from && step.edge_label == *elb && step.to_label == *vlb {
                    for &p in ext.projections() {
                        gids.insert(arena[p].edge.gid);
                    }
                    if gids.len() >= self.min_sup {
                        self.trie.insert(code.steps());
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Case 3: the first two rightmost-path steps carry identical edge
    /// and target labels, and an edge runs from the rightmost graph
    /// vertex back to the path's start vertex; breaking the first path
    /// step can then enlarge a forward extension from the rightmost
    /// vertex.
    fn case3(
        &mut self,
        code: &DfsCode,
        projected: &Projected,
        rmp_edges: &[usize],
        fwd: &[(ExtendedEdge, &Projected)],
        store: &GraphStore,
        arena: &ProjectionArena,
    ) -> bool {
        if !code.at(code.len() - 1).is_forward() || rmp_edges.len() <= 2 {
            return false;
        }
        let first = code.at(rmp_edges[rmp_edges.len() - 1]);
        let second = code.at(rmp_edges[rmp_edges.len() - 2]);
        if first.edge_label != second.edge_label || first.to_label != second.to_label {
            return false;
        }
        let rightmost = code.rightmost();
        let mut gids_by_key: BTreeMap<(Label, Label), BTreeSet<GraphId>> = BTreeMap::new();
        for &head in projected.projections() {
            let gid = arena[head].edge.gid;
            let g = store.graph(gid);
            let path_start = arena.from_vertex_at(store, head, rmp_edges[rmp_edges.len() - 1]);
            let from_vertex = arena.to_vertex_at(store, head, rmp_edges[0]);
            for (index, e) in g.incident_edges(from_vertex) {
                if arena.has_edge(head, g.edge_id(index)) {
                    continue;
                }
                let to_vertex = e.other(from_vertex);
                if to_vertex != path_start {
                    continue;
                }
                let set = gids_by_key
                    .entry((e.label, g.label_of(to_vertex)))
                    .or_default();
                set.insert(gid);
                if set.len() >= self.min_sup {
                    self.trie.insert(code.steps());
                    return true;
                }
            }
        }
        for ((elb, vlb), gids) in gids_by_key.iter_mut() {
            for (step, ext) in fwd {
                if step.from == rightmost && step.edge_label == *elb && step.to_label == *vlb {
                    for &p in ext.projections() {
                        gids.insert(arena[p].edge.gid);
                    }
                    if gids.len() >= self.min_sup {
                        self.trie.insert(code.steps());
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Case 4: the last step is backward. Walk an opposite-direction
    /// rightmost path anchored at the backward edge and look for a
    /// vacant physical edge (same labels, edge and target unused) that
    /// would realize a broken path step elsewhere.
    fn case4(
        &mut self,
        code: &DfsCode,
        projected: &Projected,
        rmp_edges: &[usize],
        store: &GraphStore,
        arena: &ProjectionArena,
    ) -> bool {
        let last = code.at(code.len() - 1);
        if !last.is_backward() {
            return false;
        }
        let Some(loop_index) = rmp_edges
            .iter()
            .copied()
            .find(|&idx| code.at(idx).from == last.to)
        else {
            return false;
        };
        for &idx in rmp_edges {
            if idx < loop_index {
                break;
            }
            let elb = code.at(idx).edge_label;
            let vlb = code.at(idx).from_label;
            for &head in projected.projections() {
                let gid = arena[head].edge.gid;
                let g = store.graph(gid);
                let vertex = arena.to_vertex_at(store, head, idx);
                for (index, e) in g.incident_edges(vertex) {
                    if e.label != elb {
                        continue;
                    }
                    let to_vertex = e.other(vertex);
                    if g.label_of(to_vertex) != vlb {
                        continue;
                    }
                    if arena.has_edge(head, g.edge_id(index)) {
                        continue;
                    }
                    if arena.has_vertex(store, head, to_vertex) {
                        continue;
                    }
                    self.trie.insert(code.steps());
                    return true;
                }
            }
        }
        false
    }

    /// Case 5: case 4 generalized over every code prefix ending in a
    /// backward step, with a label-structure precondition tying the
    /// path's first step to the step just before the loop point. Prefix
    /// projections are recovered by rewinding the shared chains.
    fn case5(
        &mut self,
        code: &DfsCode,
        projected: &Projected,
        store: &GraphStore,
        arena: &ProjectionArena,
    ) -> bool {
        let prefixes = code_prefixes(code);
        for tested in prefixes.iter().skip(1) {
            let last = tested.at(tested.len() - 1);
            if !last.is_backward() {
                continue;
            }
            let tested_rmp = tested.rightmost_path_edges();
            let Some(loop_pos) = tested_rmp
                .iter()
                .position(|&idx| tested.at(idx).from == last.to)
            else {
                continue;
            };
            let loop_index = tested_rmp[loop_pos];
            let before_pos = loop_pos + 1;
            if before_pos < tested_rmp.len() {
                let before = tested.at(tested_rmp[before_pos]);
                let first = tested.at(tested_rmp[tested_rmp.len() - 1]);
                if first.from_label != before.to_label
                    || first.edge_label != before.edge_label
                    || first.to_label != before.from_label
                {
                    continue;
                }
            }
            let back = code.len() - tested.len();
            let prefix_heads = prefix_projections(projected, back, arena);
            for &idx in &tested_rmp {
                if idx < loop_index {
                    break;
                }
                let elb = tested.at(idx).edge_label;
                let vlb = tested.at(idx).from_label;
                for &head in &prefix_heads {
                    let gid = arena[head].edge.gid;
                    let g = store.graph(gid);
                    let vertex = arena.to_vertex_at(store, head, idx);
                    for (index, e) in g.incident_edges(vertex) {
                        if e.label != elb {
                            continue;
                        }
                        let to_vertex = e.other(vertex);
                        if g.label_of(to_vertex) != vlb {
                            continue;
                        }
                        if arena.has_edge(head, g.edge_id(index)) {
                            continue;
                        }
                        if arena.has_vertex(store, head, to_vertex) {
                            continue;
                        }
                        self.trie.insert(code.steps());
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Filters an extension map down to the forward extensions a canonical
/// descendant could actually take: pure forward growth from the
/// rightmost vertex, or forward growth from an interior vertex that does
/// not sort below the code's own step at that vertex.
fn forward_extensions<'a>(
    code: &DfsCode,
    extensions: &'a ExtensionMap,
) -> Vec<(ExtendedEdge, &'a Projected)> {
    let mut result = Vec::new();
    let min_vlb = code.at(0).from_label;
    let max_vertex = code.rightmost();
    for (step, ext) in extensions {
        if step.is_backward() {
            continue;
        }
        if step.from == max_vertex && step.to > max_vertex {
            if step.to_label >= min_vlb {
                result.push((*step, ext));
            }
            continue;
        }
        let mut add = true;
        for dfs_step in code.steps() {
            if dfs_step.is_backward() {
                continue;
            }
            if dfs_step.from == step.from {
                if step.to_label < min_vlb {
                    add = false;
                    break;
                }
                if step.edge_label < dfs_step.edge_label {
                    add = false;
                    break;
                }
                if step.edge_label == dfs_step.edge_label && step.to_label < dfs_step.to_label {
                    add = false;
                    break;
                }
            }
        }
        if add {
            result.push((*step, ext));
        }
    }
    result
}

/// Prefixes of `code` cut just before a forward step that does not grow
/// the current rightmost branch, longest first, starting with the full
/// code itself.
fn code_prefixes(code: &DfsCode) -> Vec<DfsCode> {
    let mut prefixes = vec![code.clone()];
    let steps = code.steps();
    let mut old_from: Option<u32> = None;
    for i in (0..steps.len()).rev() {
        let step = steps[i];
        if step.is_forward() && (old_from.is_none() || old_from == Some(step.to)) {
            old_from = Some(step.from);
            continue;
        }
        if step.is_backward() && (old_from.is_none() || old_from == Some(step.from)) {
            continue;
        }
        old_from = Some(step.from);
        let mut prefix = DfsCode::new();
        for s in &steps[..=i] {
            prefix.push(*s);
        }
        prefixes.push(prefix);
    }
    prefixes
}

/// Distinct chain heads after rewinding every chain `back` nodes;
/// shared tails deduplicate by arena identity, first occurrence kept.
fn prefix_projections(
    projected: &Projected,
    back: usize,
    arena: &ProjectionArena,
) -> Vec<ProjectionId> {
    let mut heads = Vec::new();
    let mut seen = HashSet::new();
    for &head in projected.projections() {
        let tail = arena.rewind(head, back);
        if seen.insert(tail) {
            heads.push(tail);
        }
    }
    heads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, TransactionGraph};

    fn fwd(from: u32, to: u32) -> ExtendedEdge {
        ExtendedEdge::new(from, to, 0, 0, 0)
    }

    #[test]
    fn trie_marks_prefix_paths() {
        let mut trie = CodeTrie::new();
        assert!(trie.is_empty());
        trie.insert(&[fwd(0, 1), fwd(1, 2)]);
        assert!(trie.contains_path(&[fwd(0, 1)]));
        assert!(trie.contains_path(&[fwd(0, 1), fwd(1, 2)]));
        assert!(!trie.contains_path(&[fwd(1, 2)]));
        assert!(!trie.contains_path(&[fwd(0, 1), fwd(1, 3)]));
    }

    #[test]
    fn prefixes_cut_before_off_branch_forward_steps() {
        let mut code = DfsCode::new();
        code.push(fwd(0, 1));
        code.push(fwd(1, 2));
        code.push(ExtendedEdge::new(2, 0, 0, 0, 0));
        code.push(fwd(1, 3));
        let prefixes = code_prefixes(&code);
        assert_eq!(prefixes.len(), 2);
        assert_eq!(prefixes[0].len(), 4);
        assert_eq!(prefixes[1].len(), 3);
        assert!(prefixes[1].at(2).is_backward());
    }

    #[test]
    fn case1_detects_breakable_off_path_edge() {
        // Triangle with equal labels; the code embeds the fork
        // 1 - 0 - 2, leaving vertex 1 off the rightmost path while the
        // graph joins the rightmost vertex to it.
        let mut g = TransactionGraph::new(0, 0);
        for v in [1, 2, 3] {
            g.add_vertex(v, 0);
        }
        g.add_edge(Edge::new(1, 2, 0));
        g.add_edge(Edge::new(1, 3, 0));
        g.add_edge(Edge::new(2, 3, 0));
        g.freeze();
        let store = GraphStore::from_graphs(vec![g]);

        let mut code = DfsCode::new();
        code.push(fwd(0, 1));
        code.push(fwd(0, 2));

        let mut arena = ProjectionArena::new();
        let tail = arena.push(store.graph(0).edge_id(0), false, None); // 0->1, 1->2
        let head = arena.push(store.graph(0).edge_id(1), false, Some(tail)); // 2->3
        let mut projected = Projected::new();
        projected.push(head, 0);

        let mut analyzer = FailureAnalyzer::new(1);
        analyzer.analyze(&code, &projected, &ExtensionMap::new(), &store, &arena);
        assert!(analyzer.trie().contains_path(code.steps()));
    }

    #[test]
    fn analyzer_leaves_clean_codes_unmarked() {
        // A bare path has nothing to break.
        let mut g = TransactionGraph::new(0, 0);
        g.add_vertex(1, 0);
        g.add_vertex(2, 1);
        g.add_edge(Edge::new(1, 2, 0));
        g.freeze();
        let store = GraphStore::from_graphs(vec![g]);

        let mut code = DfsCode::new();
        code.push(ExtendedEdge::new(0, 1, 0, 1, 0));
        let mut arena = ProjectionArena::new();
        let head = arena.push(store.graph(0).edge_id(0), false, None);
        let mut projected = Projected::new();
        projected.push(head, 0);

        let mut analyzer = FailureAnalyzer::new(1);
        analyzer.analyze(&code, &projected, &ExtensionMap::new(), &store, &arena);
        assert!(analyzer.trie().is_empty());
    }
}
