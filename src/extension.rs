//! Rightmost-path extension engine.
//!
//! Given a code and its projections, enumerates every one-edge growth the
//! gSpan order permits: backward edges from the rightmost vertex to a
//! rightmost-path vertex, and forward edges from any rightmost-path
//! vertex to a fresh vertex. Each chain contributes one new chain node
//! per extension it realizes, and results are grouped per extended edge.
//!
//! The map is a `BTreeMap` keyed by the extended-edge order, so iterating
//! it visits siblings in exactly the lexicographic order the search
//! requires; no separate sort step exists to get out of sync.

use crate::dfs_code::{DfsCode, ExtendedEdge};
use crate::graph::{GraphStore, TransactionGraph, VertexId};
use crate::projection::{Projected, ProjectionArena};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Extensions of one code, keyed in lexicographic order.
pub type ExtensionMap = BTreeMap<ExtendedEdge, Projected>;

/// Enumerates all rightmost-path extensions of `code` over the graphs
/// covered by `projected`, appending one chain node per realized
/// extension. Graphs whose edge count does not exceed the code length
/// are skipped and counted into `edge_count_prunes`.
pub fn rightmost_path_extensions(
    code: &DfsCode,
    store: &GraphStore,
    projected: &Projected,
    arena: &mut ProjectionArena,
    edge_count_prunes: &mut u64,
) -> ExtensionMap {
    let mut extensions = ExtensionMap::new();

    if code.is_empty() {
        for &gid in projected.graph_ids() {
            let g = store.graph(gid);
            if g.edge_count() <= code.len() {
                *edge_count_prunes += 1;
                continue;
            }
            for v in g.vertex_ids() {
                for (index, e) in g.incident_edges(v) {
                    let l1 = g.label_of(e.v1);
                    let l2 = g.label_of(e.v2);
                    // Distinct endpoint labels: enumerate the edge once,
                    // from its v1 endpoint. Equal labels: both
                    // orientations are distinct embeddings.
                    if l1 != l2 && v != e.v1 {
                        continue;
                    }
                    let step = if l1 < l2 {
                        ExtendedEdge::new(0, 1, l1, l2, e.label)
                    } else {
                        ExtendedEdge::new(0, 1, l2, l1, e.label)
                    };
                    let reversed = if l1 < l2 {
                        false
                    } else if l2 < l1 {
                        true
                    } else {
                        v != e.v1
                    };
                    let chain = arena.push(g.edge_id(index), reversed, None);
                    extensions.entry(step).or_default().push(chain, gid);
                }
            }
        }
        return extensions;
    }

    let rightmost = code.rightmost();
    for &gid in projected.graph_ids() {
        let g = store.graph(gid);
        if g.edge_count() <= code.len() {
            *edge_count_prunes += 1;
            continue;
        }
        for &head in projected.projections() {
            if arena[head].edge.gid != gid {
                continue;
            }
            let iso = arena.embedding(store, code, head);
            let inverted: HashMap<VertexId, u32> = iso
                .iter()
                .enumerate()
                .map(|(dfs_v, &graph_v)| (graph_v, dfs_v as u32))
                .collect();

            // Backward extensions from the rightmost vertex.
            let mapped_rm = iso[rightmost as usize];
            let rm_label = g.label_of(mapped_rm);
            for &x in g.neighbors(mapped_rm) {
                let Some(&inv) = inverted.get(&x) else {
                    continue;
                };
                if code.on_rightmost_path(inv)
                    && code.not_pre_of_rightmost(inv)
                    && !code.contains_edge(rightmost, inv)
                {
                    let index = g.edge_between(mapped_rm, x).expect("neighbors share an edge");
                    let e = g.edge(index);
                    let step = ExtendedEdge::new(rightmost, inv, rm_label, g.label_of(x), e.label);
                    let chain = arena.push(g.edge_id(index), e.v1 != mapped_rm, Some(head));
                    extensions.entry(step).or_default().push(chain, gid);
                }
            }

            // Forward extensions from every rightmost-path vertex.
            let mapped: HashSet<VertexId> = iso.iter().copied().collect();
            for &v in code.rightmost_path() {
                let mapped_v = iso[v as usize];
                let v_label = g.label_of(mapped_v);
                for &x in g.neighbors(mapped_v) {
                    if mapped.contains(&x) {
                        continue;
                    }
                    let index = g.edge_between(mapped_v, x).expect("neighbors share an edge");
                    let e = g.edge(index);
                    let step =
                        ExtendedEdge::new(v, rightmost + 1, v_label, g.label_of(x), e.label);
                    let chain = arena.push(g.edge_id(index), e.v1 != mapped_v, Some(head));
                    extensions.entry(step).or_default().push(chain, gid);
                }
            }
        }
    }
    extensions
}

/// Enumerates the distinct rightmost-path extension edges of `code`
/// within a single graph, without tracking chains. Used by the
/// canonicality test against the pattern graph of a code.
pub fn single_graph_extensions(code: &DfsCode, g: &TransactionGraph) -> BTreeSet<ExtendedEdge> {
    let mut extensions = BTreeSet::new();

    if code.is_empty() {
        for v in g.vertex_ids() {
            for (_, e) in g.incident_edges(v) {
                let l1 = g.label_of(e.v1);
                let l2 = g.label_of(e.v2);
                let step = if l1 < l2 {
                    ExtendedEdge::new(0, 1, l1, l2, e.label)
                } else {
                    ExtendedEdge::new(0, 1, l2, l1, e.label)
                };
                extensions.insert(step);
            }
        }
        return extensions;
    }

    let rightmost = code.rightmost();
    for iso in subgraph_isomorphisms(code, g) {
        let inverted: HashMap<VertexId, u32> = iso
            .iter()
            .enumerate()
            .map(|(dfs_v, &graph_v)| (graph_v, dfs_v as u32))
            .collect();

        let mapped_rm = iso[rightmost as usize];
        let rm_label = g.label_of(mapped_rm);
        for &x in g.neighbors(mapped_rm) {
            let Some(&inv) = inverted.get(&x) else {
                continue;
            };
            if code.on_rightmost_path(inv)
                && code.not_pre_of_rightmost(inv)
                && !code.contains_edge(rightmost, inv)
            {
                let label = g.edge_label(mapped_rm, x).expect("neighbors share an edge");
                extensions.insert(ExtendedEdge::new(rightmost, inv, rm_label, g.label_of(x), label));
            }
        }

        let mapped: HashSet<VertexId> = iso.iter().copied().collect();
        for &v in code.rightmost_path() {
            let mapped_v = iso[v as usize];
            let v_label = g.label_of(mapped_v);
            for &x in g.neighbors(mapped_v) {
                if mapped.contains(&x) {
                    continue;
                }
                let label = g.edge_label(mapped_v, x).expect("neighbors share an edge");
                extensions.insert(ExtendedEdge::new(
                    v,
                    rightmost + 1,
                    v_label,
                    g.label_of(x),
                    label,
                ));
            }
        }
    }
    extensions
}

/// All embeddings of a non-empty code into one graph, built by extending
/// partial assignments step by step. Forward steps branch over unmapped
/// neighbors; backward steps filter.
pub fn subgraph_isomorphisms(code: &DfsCode, g: &TransactionGraph) -> Vec<Vec<VertexId>> {
    let mut isos: Vec<Vec<VertexId>> = g
        .vertices_with_label(code.at(0).from_label)
        .iter()
        .map(|&v| vec![v])
        .collect();

    for step in code.steps() {
        let mut updated = Vec::new();
        for iso in &isos {
            let mapped_from = iso[step.from as usize];
            if step.is_forward() {
                for &cand in g.neighbors(mapped_from) {
                    if g.label_of(cand) == step.to_label
                        && !iso.contains(&cand)
                        && g.edge_label(mapped_from, cand) == Some(step.edge_label)
                    {
                        let mut next = Vec::with_capacity(iso.len() + 1);
                        next.extend_from_slice(iso);
                        next.push(cand);
                        updated.push(next);
                    }
                }
            } else {
                let mapped_to = iso[step.to as usize];
                if g.is_neighbor(mapped_from, mapped_to)
                    && g.edge_label(mapped_from, mapped_to) == Some(step.edge_label)
                {
                    updated.push(iso.clone());
                }
            }
        }
        isos = updated;
    }
    isos
}
