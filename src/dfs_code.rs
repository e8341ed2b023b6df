//! DFS codes: the canonical linear encoding of connected subgraphs.
//!
//! A pattern is represented as a sequence of extended edges produced by a
//! depth-first traversal. Forward edges discover a new vertex, backward
//! edges close a cycle to an already numbered vertex. The lexicographic
//! order on extended edges drives both the sibling visit order during
//! mining and the minimality test that rejects duplicate encodings of the
//! same abstract pattern.
//!
//! # Invariants
//! - The first step of a non-empty code is forward with vertices `(0, 1)`
//!   (or the self-loop sentinel used for one-vertex patterns).
//! - Every forward step introduces exactly the next unused vertex number.
//! - Backward steps reference only vertices already introduced.
//! - The rightmost path is derived purely from the step sequence.

use crate::fingerprint::{DigestBuilder, HashValue};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Integer vertex or edge label.
pub type Label = i32;

/// Edge label reserved for the one-vertex pattern sentinel code.
pub const SINGLE_VERTEX_EDGE_LABEL: Label = -1;

/// One step of a DFS code.
///
/// `from` and `to` are DFS vertex numbers, not transaction-graph vertex
/// ids. A step is forward when `from < to` and backward when `from > to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtendedEdge {
    /// Source DFS vertex.
    pub from: u32,
    /// Target DFS vertex.
    pub to: u32,
    /// Label of the source vertex.
    pub from_label: Label,
    /// Label of the target vertex.
    pub to_label: Label,
    /// Label of the edge itself.
    pub edge_label: Label,
}

impl ExtendedEdge {
    /// Creates a new extended edge.
    #[inline]
    pub const fn new(from: u32, to: u32, from_label: Label, to_label: Label, edge_label: Label) -> Self {
        Self { from, to, from_label, to_label, edge_label }
    }

    /// Returns `true` for a forward step (discovers a new vertex).
    #[inline]
    pub fn is_forward(&self) -> bool {
        self.from < self.to
    }

    /// Returns `true` for a backward step (closes a cycle).
    #[inline]
    pub fn is_backward(&self) -> bool {
        self.from > self.to
    }
}

impl Ord for ExtendedEdge {
    /// gSpan neighborhood order.
    ///
    /// For steps at distinct code positions `a = (i1, j1)`, `b = (i2, j2)`:
    /// - both forward: `a < b` iff `j1 < j2`, or `j1 == j2 && i1 > i2`;
    /// - both backward: `a < b` iff `i1 < i2`, or `i1 == i2 && j1 < j2`;
    /// - `a` backward, `b` forward: `a < b` iff `i1 < j2`;
    /// - `a` forward, `b` backward: `a < b` iff `j1 <= i2`.
    ///
    /// Steps at the same position compare by
    /// `(from_label, edge_label, to_label)`.
    fn cmp(&self, other: &Self) -> Ordering {
        if self.from == other.from && self.to == other.to {
            return (self.from_label, self.edge_label, self.to_label).cmp(&(
                other.from_label,
                other.edge_label,
                other.to_label,
            ));
        }
        match (self.is_forward(), other.is_forward()) {
            (true, true) => {
                if self.to != other.to {
                    self.to.cmp(&other.to)
                } else {
                    other.from.cmp(&self.from)
                }
            }
            (false, false) => {
                if self.from != other.from {
                    self.from.cmp(&other.from)
                } else {
                    self.to.cmp(&other.to)
                }
            }
            (false, true) => {
                if self.from < other.to {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (true, false) => {
                if self.to <= other.from {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
        }
    }
}

impl PartialOrd for ExtendedEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ExtendedEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{},{},{},{})",
            self.from, self.to, self.from_label, self.edge_label, self.to_label
        )
    }
}

/// A DFS code: an ordered sequence of extended edges.
///
/// The rightmost vertex and rightmost path are maintained incrementally
/// on every push; both are functions of the step sequence alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DfsCode {
    steps: Vec<ExtendedEdge>,
    rightmost: u32,
    rightmost_path: Vec<u32>,
}

impl DfsCode {
    /// Creates an empty code.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps in the code.
    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the code has no steps.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step sequence, oldest first.
    #[inline]
    pub fn steps(&self) -> &[ExtendedEdge] {
        &self.steps
    }

    /// The step at position `index`.
    #[inline]
    pub fn at(&self, index: usize) -> &ExtendedEdge {
        &self.steps[index]
    }

    /// The highest DFS vertex number introduced so far.
    ///
    /// Meaningful only for non-empty codes.
    #[inline]
    pub fn rightmost(&self) -> u32 {
        self.rightmost
    }

    /// Vertices on the path `0 → … → rightmost` along forward edges.
    #[inline]
    pub fn rightmost_path(&self) -> &[u32] {
        &self.rightmost_path
    }

    /// Appends a step, updating the rightmost vertex and path.
    pub fn push(&mut self, step: ExtendedEdge) {
        if self.steps.is_empty() {
            self.rightmost_path.push(step.from);
            if step.to != step.from {
                self.rightmost_path.push(step.to);
            }
            self.rightmost = step.from.max(step.to);
        } else if step.is_forward() {
            while *self.rightmost_path.last().expect("non-empty path") != step.from {
                self.rightmost_path.pop();
            }
            self.rightmost_path.push(step.to);
            self.rightmost = step.to;
        }
        self.steps.push(step);
    }

    /// Returns `true` if `v` lies on the rightmost path.
    pub fn on_rightmost_path(&self, v: u32) -> bool {
        self.rightmost_path.contains(&v)
    }

    /// Returns `true` unless `v` is the immediate predecessor of the
    /// rightmost vertex on the rightmost path.
    pub fn not_pre_of_rightmost(&self, v: u32) -> bool {
        if self.rightmost_path.len() < 2 {
            return true;
        }
        v != self.rightmost_path[self.rightmost_path.len() - 2]
    }

    /// Returns `true` if the code contains the undirected edge `{u, v}`.
    pub fn contains_edge(&self, u: u32, v: u32) -> bool {
        self.steps
            .iter()
            .any(|s| (s.from == u && s.to == v) || (s.from == v && s.to == u))
    }

    /// Labels of DFS vertices `0..=rightmost`, in vertex order.
    pub fn vertex_labels(&self) -> Vec<Label> {
        let mut labels = vec![0; self.rightmost as usize + 1];
        if let Some(first) = self.steps.first() {
            labels[first.from as usize] = first.from_label;
        }
        for step in &self.steps {
            if step.is_forward() {
                labels[step.to as usize] = step.to_label;
            }
        }
        labels
    }

    /// Indices of the forward steps that form the rightmost path, ordered
    /// nearest the rightmost vertex first.
    pub fn rightmost_path_edges(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        if self.rightmost_path.len() < 2 {
            return indices;
        }
        let mut k = 0;
        for (i, step) in self.steps.iter().enumerate() {
            if k + 1 < self.rightmost_path.len()
                && step.from == self.rightmost_path[k]
                && step.to == self.rightmost_path[k + 1]
            {
                indices.push(i);
                k += 1;
            }
        }
        indices.reverse();
        indices
    }

    /// Canonical byte encoding of the step sequence.
    ///
    /// Steps are serialized in order as five little-endian 32-bit fields,
    /// so equal codes encode to equal bytes across runs.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.steps.len() * 20);
        for step in &self.steps {
            out.extend_from_slice(&step.from.to_le_bytes());
            out.extend_from_slice(&step.to.to_le_bytes());
            out.extend_from_slice(&step.from_label.to_le_bytes());
            out.extend_from_slice(&step.to_label.to_le_bytes());
            out.extend_from_slice(&step.edge_label.to_le_bytes());
        }
        out
    }

    /// Deterministic fingerprint of the code, digesting every step
    /// field by field.
    pub fn fingerprint(&self) -> HashValue {
        let mut digest = DigestBuilder::new("dfs-code");
        digest.write_u32(self.steps.len() as u32);
        for step in &self.steps {
            digest
                .write_u32(step.from)
                .write_u32(step.to)
                .write_label(step.from_label)
                .write_label(step.to_label)
                .write_label(step.edge_label);
        }
        digest.finish()
    }

    /// Returns `true` for the one-vertex sentinel code.
    pub fn is_single_vertex(&self) -> bool {
        self.steps.len() == 1 && self.steps[0].edge_label == SINGLE_VERTEX_EDGE_LABEL
    }
}
