//! Transaction graph store.
//!
//! A [`TransactionGraph`] goes through two phases. While the database is
//! being loaded and pruned it is a mutable bag of labeled vertices with
//! per-vertex edge lists. [`TransactionGraph::freeze`] then builds the
//! immutable indices the mining loop relies on: the edge table that gives
//! every physical edge a stable [`EdgeId`], per-vertex neighbor lists, the
//! label-to-vertices index and the endpoint-pair lookup. Nothing mutates a
//! graph after `freeze`.
//!
//! # Determinism
//! - Vertices iterate in ascending id order (`BTreeMap`).
//! - The edge table is ordered by owning vertex id, then list position,
//!   which is input order; neighbor lists follow edge-list order.
//! - All derived indices are functions of the loaded database alone.

use crate::dfs_code::{DfsCode, Label};
use crate::matrix::SparseTriangularMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Vertex identifier within one transaction graph. Opaque, unique per
/// graph, not necessarily dense.
pub type VertexId = u32;

/// Internal graph identifier: the dense position of the graph in the
/// database. The id declared in the input file is kept separately for
/// output (see [`TransactionGraph::display_id`]).
pub type GraphId = u32;

/// Identity of one physical edge: owning graph plus position in that
/// graph's frozen edge table. Two `EdgeId`s are equal exactly when they
/// name the same physical edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId {
    /// Internal id of the owning graph.
    pub gid: GraphId,
    /// Index into the owning graph's edge table.
    pub index: u32,
}

/// An undirected labeled edge, stored with the endpoint order of the
/// input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub v1: VertexId,
    pub v2: VertexId,
    pub label: Label,
}

impl Edge {
    /// Creates a new edge.
    #[inline]
    pub const fn new(v1: VertexId, v2: VertexId, label: Label) -> Self {
        Self { v1, v2, label }
    }

    /// The endpoint opposite to `v`.
    #[inline]
    pub fn other(&self, v: VertexId) -> VertexId {
        if self.v1 == v {
            self.v2
        } else {
            self.v1
        }
    }

    /// Endpoints as an unordered `(min, max)` pair.
    #[inline]
    fn key(&self) -> (VertexId, VertexId) {
        if self.v1 <= self.v2 {
            (self.v1, self.v2)
        } else {
            (self.v2, self.v1)
        }
    }
}

/// One member of the graph database.
#[derive(Debug, Clone, Default)]
pub struct TransactionGraph {
    id: GraphId,
    display_id: u32,
    labels: BTreeMap<VertexId, Label>,
    /// Mutable-phase adjacency: each edge appears in both endpoints'
    /// lists, in input order.
    adjacency: BTreeMap<VertexId, Vec<Edge>>,
    // Frozen indices, empty until `freeze` runs.
    edges: Vec<Edge>,
    incident: BTreeMap<VertexId, Vec<u32>>,
    neighbor_lists: BTreeMap<VertexId, Vec<VertexId>>,
    label_index: BTreeMap<Label, Vec<VertexId>>,
    edge_lookup: HashMap<(VertexId, VertexId), u32>,
}

impl TransactionGraph {
    /// Creates an empty graph with the given internal and declared ids.
    pub fn new(id: GraphId, display_id: u32) -> Self {
        Self {
            id,
            display_id,
            ..Self::default()
        }
    }

    /// Builds the pattern graph of a DFS code: DFS vertex numbers become
    /// vertex ids, step labels become vertex and edge labels. The result
    /// is frozen and ready for isomorphism queries.
    pub fn from_code(code: &DfsCode) -> Self {
        let mut g = Self::new(0, 0);
        for (v, label) in code.vertex_labels().into_iter().enumerate() {
            g.add_vertex(v as VertexId, label);
        }
        for step in code.steps() {
            g.add_edge(Edge::new(step.from, step.to, step.edge_label));
        }
        g.freeze();
        g
    }

    /// Internal (dense) id of this graph.
    #[inline]
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Id declared in the input file, used for result output.
    #[inline]
    pub fn display_id(&self) -> u32 {
        self.display_id
    }

    // ------------------------------------------------------------------
    // Mutable phase
    // ------------------------------------------------------------------

    /// Adds a vertex. Returns `false` if the id is already present.
    pub fn add_vertex(&mut self, v: VertexId, label: Label) -> bool {
        if self.labels.contains_key(&v) {
            return false;
        }
        self.labels.insert(v, label);
        self.adjacency.insert(v, Vec::new());
        true
    }

    /// Adds an undirected edge to both endpoints' lists. Both endpoints
    /// must already exist.
    pub fn add_edge(&mut self, edge: Edge) {
        self.adjacency
            .get_mut(&edge.v1)
            .expect("edge endpoint v1 must exist")
            .push(edge);
        self.adjacency
            .get_mut(&edge.v2)
            .expect("edge endpoint v2 must exist")
            .push(edge);
    }

    /// Returns `true` if the vertex id is present.
    pub fn contains_vertex(&self, v: VertexId) -> bool {
        self.labels.contains_key(&v)
    }

    /// Returns `true` if an edge between `u` and `v` exists
    /// (mutable-phase scan of the adjacency list).
    pub fn has_edge_between(&self, u: VertexId, v: VertexId) -> bool {
        self.adjacency
            .get(&u)
            .map(|list| list.iter().any(|e| e.other(u) == v))
            .unwrap_or(false)
    }

    /// Number of vertices currently present.
    pub fn vertex_count(&self) -> usize {
        self.labels.len()
    }

    /// Mutable-phase degree of `v`.
    pub fn degree(&self, v: VertexId) -> usize {
        self.adjacency.get(&v).map(Vec::len).unwrap_or(0)
    }

    /// Iterates `(vertex, label, degree)` over the mutable-phase state in
    /// ascending vertex order.
    pub fn vertex_summaries(&self) -> impl Iterator<Item = (VertexId, Label, usize)> + '_ {
        self.labels
            .iter()
            .map(move |(&v, &label)| (v, label, self.degree(v)))
    }

    /// Iterates every `(owning vertex, edge)` entry of the adjacency
    /// lists. Each physical edge is visited twice, once per endpoint.
    pub fn adjacency_entries(&self) -> impl Iterator<Item = (VertexId, &Edge)> {
        self.adjacency
            .iter()
            .flat_map(|(&v, list)| list.iter().map(move |e| (v, e)))
    }

    /// Deletes every vertex carrying `label`, together with all edges
    /// touching a deleted vertex. Returns the number of vertices removed.
    pub fn remove_vertices_with_label(&mut self, label: Label) -> usize {
        let doomed: Vec<VertexId> = self
            .labels
            .iter()
            .filter(|(_, &l)| l == label)
            .map(|(&v, _)| v)
            .collect();
        for &v in &doomed {
            self.labels.remove(&v);
            self.adjacency.remove(&v);
        }
        if !doomed.is_empty() {
            for list in self.adjacency.values_mut() {
                list.retain(|e| !doomed.contains(&e.v1) && !doomed.contains(&e.v2));
            }
        }
        doomed.len()
    }

    /// Drops edges whose endpoint-label pair or edge label is infrequent.
    ///
    /// The pair check runs first; an edge surviving it may still fall to
    /// the label check. Returns `(pair_removals, label_removals)` counted
    /// per adjacency-list entry, so a fully removed edge contributes two.
    pub fn remove_infrequent_edges(
        &mut self,
        matrix: &SparseTriangularMatrix,
        edge_label_support: &BTreeMap<Label, usize>,
        min_sup: usize,
    ) -> (u64, u64) {
        let mut by_pair = 0u64;
        let mut by_label = 0u64;
        let labels = self.labels.clone();
        for (&v, list) in self.adjacency.iter_mut() {
            let l1 = labels[&v];
            list.retain(|e| {
                let l2 = labels[&e.other(v)];
                if matrix.support(l1, l2) < min_sup as u64 {
                    by_pair += 1;
                    return false;
                }
                if edge_label_support.get(&e.label).copied().unwrap_or(0) < min_sup {
                    by_label += 1;
                    return false;
                }
                true
            });
        }
        (by_pair, by_label)
    }

    // ------------------------------------------------------------------
    // Freeze and frozen accessors
    // ------------------------------------------------------------------

    /// Builds the immutable indices from the current mutable state.
    ///
    /// Idempotent: re-freezing after further pruning rebuilds everything
    /// from scratch.
    pub fn freeze(&mut self) {
        self.edges.clear();
        self.incident.clear();
        self.neighbor_lists.clear();
        self.label_index.clear();
        self.edge_lookup.clear();

        // Edge table: owned by the v1 endpoint, ascending owner id, list
        // position order within an owner.
        for (&v, list) in &self.adjacency {
            for e in list {
                if e.v1 == v {
                    let index = self.edges.len() as u32;
                    self.edge_lookup.insert(e.key(), index);
                    self.edges.push(*e);
                }
            }
        }

        for (&v, list) in &self.adjacency {
            let mut incident = Vec::with_capacity(list.len());
            let mut neighbors = Vec::with_capacity(list.len());
            for e in list {
                incident.push(self.edge_lookup[&e.key()]);
                neighbors.push(e.other(v));
            }
            self.incident.insert(v, incident);
            self.neighbor_lists.insert(v, neighbors);
        }

        for (&v, &label) in &self.labels {
            self.label_index.entry(label).or_default().push(v);
        }
    }

    /// Number of edges in the frozen edge table.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The edge at `index` in the frozen table.
    #[inline]
    pub fn edge(&self, index: u32) -> &Edge {
        &self.edges[index as usize]
    }

    /// Label of vertex `v`.
    ///
    /// # Panics
    /// Panics if `v` is not a vertex of this graph; callers only pass
    /// vertices obtained from this graph.
    #[inline]
    pub fn label_of(&self, v: VertexId) -> Label {
        self.labels[&v]
    }

    /// Neighbors of `v` in edge-list order.
    pub fn neighbors(&self, v: VertexId) -> &[VertexId] {
        self.neighbor_lists.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates `(edge table index, edge)` over the edges incident to `v`.
    pub fn incident_edges(&self, v: VertexId) -> impl Iterator<Item = (u32, &Edge)> {
        self.incident
            .get(&v)
            .into_iter()
            .flat_map(move |list| list.iter().map(move |&i| (i, &self.edges[i as usize])))
    }

    /// Label of the edge between `u` and `v`, if present.
    pub fn edge_label(&self, u: VertexId, v: VertexId) -> Option<Label> {
        self.edge_between(u, v).map(|i| self.edges[i as usize].label)
    }

    /// Edge table index of the edge between `u` and `v`, if present.
    pub fn edge_between(&self, u: VertexId, v: VertexId) -> Option<u32> {
        let key = if u <= v { (u, v) } else { (v, u) };
        self.edge_lookup.get(&key).copied()
    }

    /// Returns `true` if `u` and `v` are adjacent.
    pub fn is_neighbor(&self, u: VertexId, v: VertexId) -> bool {
        self.edge_between(u, v).is_some()
    }

    /// Vertices carrying `label`, ascending.
    pub fn vertices_with_label(&self, label: Label) -> &[VertexId] {
        self.label_index.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Vertex ids in ascending order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.labels.keys().copied()
    }

    /// The identity of the edge at `index` in this graph.
    #[inline]
    pub fn edge_id(&self, index: u32) -> EdgeId {
        EdgeId { gid: self.id, index }
    }
}

/// The frozen graph database.
#[derive(Debug, Default)]
pub struct GraphStore {
    graphs: Vec<TransactionGraph>,
}

impl GraphStore {
    /// Wraps a database; graphs must be positioned at their internal id.
    pub fn from_graphs(graphs: Vec<TransactionGraph>) -> Self {
        debug_assert!(graphs.iter().enumerate().all(|(i, g)| g.id() as usize == i));
        Self { graphs }
    }

    /// The graph with internal id `gid`.
    #[inline]
    pub fn graph(&self, gid: GraphId) -> &TransactionGraph {
        &self.graphs[gid as usize]
    }

    /// Resolves an edge identity to the physical edge.
    #[inline]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        self.graph(id.gid).edge(id.index)
    }

    /// Number of graphs in the database.
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Returns `true` for an empty database.
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Iterates the database in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TransactionGraph> {
        self.graphs.iter()
    }
}
