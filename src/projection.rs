//! Projection chains: embeddings of DFS codes into the database.
//!
//! Every embedding of a code is a singly linked chain of nodes, one per
//! code step, newest step at the head. Chains share structure: extending
//! a pattern appends one node whose back-link is the parent chain, so the
//! memory cost of the search tree is one node per extension, not one copy
//! per chain. All nodes live in a [`ProjectionArena`] owned by the driver
//! and are addressed by [`ProjectionId`]; the arena grows monotonically
//! and outlives every pattern recorded during a run, which also makes
//! identity comparison of shared tails a plain id comparison.
//!
//! # Invariants
//! - Nodes are immutable once pushed.
//! - A chain's depth equals the length of the code it embeds.
//! - All edges of one chain belong to the same transaction graph.

use crate::dfs_code::{DfsCode, Label};
use crate::graph::{EdgeId, GraphId, GraphStore, VertexId};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Index;

/// Index of a chain node in the arena.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectionId(u32);

impl ProjectionId {
    /// Returns the raw arena index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ProjectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProjectionId({})", self.0)
    }
}

/// One node of a projection chain.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionNode {
    /// The physical edge this code step maps onto.
    pub edge: EdgeId,
    /// `true` when the physical edge's `(v1, v2)` runs opposite to the
    /// code step's `(from, to)`.
    pub reversed: bool,
    /// Chain node of the previous code step; `None` for step 0.
    pub previous: Option<ProjectionId>,
    /// Number of nodes in the chain ending here.
    pub depth: u32,
}

/// Append-only storage for chain nodes.
#[derive(Debug, Default)]
pub struct ProjectionArena {
    nodes: Vec<ProjectionNode>,
}

impl ProjectionArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node and returns its id.
    pub fn push(&mut self, edge: EdgeId, reversed: bool, previous: Option<ProjectionId>) -> ProjectionId {
        let depth = match previous {
            Some(p) => self[p].depth + 1,
            None => 1,
        };
        let id = ProjectionId(self.nodes.len() as u32);
        self.nodes.push(ProjectionNode {
            edge,
            reversed,
            previous,
            depth,
        });
        id
    }

    /// Number of nodes ever pushed.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` while no node has been pushed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edge identities along the chain, oldest step first.
    pub fn chain_edges(&self, head: ProjectionId) -> Vec<EdgeId> {
        let mut edges = Vec::with_capacity(self[head].depth as usize);
        let mut cur = Some(head);
        while let Some(id) = cur {
            edges.push(self[id].edge);
            cur = self[id].previous;
        }
        edges.reverse();
        edges
    }

    /// Reconstructs the embedding of `code` realized by the chain at
    /// `head`: DFS vertex number to graph vertex.
    pub fn embedding(&self, store: &GraphStore, code: &DfsCode, head: ProjectionId) -> Vec<VertexId> {
        let mut iso = vec![0; code.rightmost() as usize + 1];
        let mut cur = Some(head);
        for step in code.steps().iter().rev() {
            let node = &self[cur.expect("chain as long as the code")];
            let e = store.edge(node.edge);
            if node.reversed {
                iso[step.from as usize] = e.v2;
                iso[step.to as usize] = e.v1;
            } else {
                iso[step.from as usize] = e.v1;
                iso[step.to as usize] = e.v2;
            }
            cur = node.previous;
        }
        iso
    }

    /// The chain node embedding the code step at `index`.
    fn step_node(&self, head: ProjectionId, index: usize) -> &ProjectionNode {
        let mut steps_back = self[head].depth as usize - 1 - index;
        let mut cur = head;
        while steps_back > 0 {
            cur = self[cur].previous.expect("index within chain");
            steps_back -= 1;
        }
        &self[cur]
    }

    /// Graph vertex the step at `index` maps its `to` vertex onto.
    pub fn to_vertex_at(&self, store: &GraphStore, head: ProjectionId, index: usize) -> VertexId {
        let node = self.step_node(head, index);
        let e = store.edge(node.edge);
        if node.reversed {
            e.v1
        } else {
            e.v2
        }
    }

    /// Graph vertex the step at `index` maps its `from` vertex onto.
    pub fn from_vertex_at(&self, store: &GraphStore, head: ProjectionId, index: usize) -> VertexId {
        let node = self.step_node(head, index);
        let e = store.edge(node.edge);
        if node.reversed {
            e.v2
        } else {
            e.v1
        }
    }

    /// Returns `true` if the chain uses the physical edge `edge`.
    pub fn has_edge(&self, head: ProjectionId, edge: EdgeId) -> bool {
        let mut cur = Some(head);
        while let Some(id) = cur {
            if self[id].edge == edge {
                return true;
            }
            cur = self[id].previous;
        }
        false
    }

    /// Returns `true` if any edge of the chain touches `vertex`.
    pub fn has_vertex(&self, store: &GraphStore, head: ProjectionId, vertex: VertexId) -> bool {
        let mut cur = Some(head);
        while let Some(id) = cur {
            let e = store.edge(self[id].edge);
            if e.v1 == vertex || e.v2 == vertex {
                return true;
            }
            cur = self[id].previous;
        }
        false
    }

    /// Returns `true` if one of the chain edges selected by `indices`
    /// touches `vertex`. `indices` must be descending step indices.
    pub fn has_vertex_among(
        &self,
        store: &GraphStore,
        head: ProjectionId,
        vertex: VertexId,
        indices: &[usize],
    ) -> bool {
        if indices.is_empty() {
            return false;
        }
        let mut cur = Some(head);
        let mut index = self[head].depth as usize - 1;
        let mut k = 0;
        while let Some(id) = cur {
            if index != indices[k] {
                index = index.wrapping_sub(1);
                cur = self[id].previous;
                continue;
            }
            let e = store.edge(self[id].edge);
            if e.v1 == vertex || e.v2 == vertex {
                return true;
            }
            index = index.wrapping_sub(1);
            k += 1;
            if k == indices.len() {
                return false;
            }
            cur = self[id].previous;
        }
        false
    }

    /// Walks `back` nodes up the chain.
    pub fn rewind(&self, head: ProjectionId, back: usize) -> ProjectionId {
        let mut cur = head;
        for _ in 0..back {
            cur = self[cur].previous.expect("rewind within chain");
        }
        cur
    }
}

impl Index<ProjectionId> for ProjectionArena {
    type Output = ProjectionNode;

    #[inline]
    fn index(&self, id: ProjectionId) -> &ProjectionNode {
        &self.nodes[id.0 as usize]
    }
}

/// The projections of one code: all of its chains plus the set of graphs
/// covered. Support is the number of covered graphs.
#[derive(Debug, Clone, Default)]
pub struct Projected {
    projections: Vec<ProjectionId>,
    graph_ids: BTreeSet<GraphId>,
}

impl Projected {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set covering `graph_ids` with no chains yet; used to
    /// seed the recursion over the whole database.
    pub fn with_graph_ids(graph_ids: BTreeSet<GraphId>) -> Self {
        Self {
            projections: Vec::new(),
            graph_ids,
        }
    }

    /// Records a chain projected into graph `gid`.
    pub fn push(&mut self, chain: ProjectionId, gid: GraphId) {
        self.projections.push(chain);
        self.graph_ids.insert(gid);
    }

    /// The chains, in insertion order.
    #[inline]
    pub fn projections(&self) -> &[ProjectionId] {
        &self.projections
    }

    /// Ids of the graphs covered, ascending.
    #[inline]
    pub fn graph_ids(&self) -> &BTreeSet<GraphId> {
        &self.graph_ids
    }

    /// Support: number of graphs covered.
    #[inline]
    pub fn support(&self) -> usize {
        self.graph_ids.len()
    }

    /// Graph id of every chain, in insertion order.
    pub fn projection_graph_ids(&self, arena: &ProjectionArena) -> Vec<GraphId> {
        self.projections.iter().map(|&p| arena[p].edge.gid).collect()
    }

    /// The set of physical edges realizing the last code step.
    pub fn last_edge_key(&self, arena: &ProjectionArena) -> BTreeSet<EdgeId> {
        self.projections.iter().map(|&p| arena[p].edge).collect()
    }

    /// Per code step, the set of physical edges realizing that step
    /// across all chains; empty for a set with no chains.
    pub fn step_keys(&self, arena: &ProjectionArena) -> Vec<BTreeSet<EdgeId>> {
        let Some(&first) = self.projections.first() else {
            return Vec::new();
        };
        let length = arena[first].depth as usize;
        let mut keys = vec![BTreeSet::new(); length];
        for &head in &self.projections {
            let mut cur = Some(head);
            let mut i = length;
            while let Some(id) = cur {
                i -= 1;
                keys[i].insert(arena[id].edge);
                cur = arena[id].previous;
            }
        }
        keys
    }

    /// Chains grouped by graph, each materialized oldest step first.
    pub fn by_graph(&self, arena: &ProjectionArena) -> BTreeMap<GraphId, Vec<Vec<EdgeId>>> {
        let mut grouped: BTreeMap<GraphId, Vec<Vec<EdgeId>>> = BTreeMap::new();
        for &head in &self.projections {
            let gid = arena[head].edge.gid;
            grouped.entry(gid).or_default().push(arena.chain_edges(head));
        }
        grouped
    }

    /// Tests whether the extension `child` occurs wherever this set does:
    /// same graphs, at least as many chains, and every chain here is the
    /// back-link of some child chain.
    pub fn has_equivalent_occurrence(&self, child: &Projected, arena: &ProjectionArena) -> bool {
        if self.graph_ids != child.graph_ids {
            return false;
        }
        if self.projections.len() > child.projections.len() {
            return false;
        }
        let child_tails: HashSet<ProjectionId> = child
            .projections
            .iter()
            .filter_map(|&p| arena[p].previous)
            .collect();
        self.projections.iter().all(|p| child_tails.contains(p))
    }

    /// Counts distinct vertices labeled `label` across all chains,
    /// summed per graph.
    pub fn vertices_with_label_count(
        &self,
        label: Label,
        store: &GraphStore,
        arena: &ProjectionArena,
    ) -> usize {
        let mut per_graph: BTreeMap<GraphId, BTreeSet<VertexId>> = BTreeMap::new();
        for &head in &self.projections {
            let mut cur = Some(head);
            while let Some(id) = cur {
                let gid = arena[id].edge.gid;
                let g = store.graph(gid);
                let e = store.edge(arena[id].edge);
                if g.label_of(e.v1) == label {
                    per_graph.entry(gid).or_default().insert(e.v1);
                }
                if g.label_of(e.v2) == label {
                    per_graph.entry(gid).or_default().insert(e.v2);
                }
                cur = arena[id].previous;
            }
        }
        per_graph.values().map(BTreeSet::len).sum()
    }
}
