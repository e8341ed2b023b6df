//! Canonicality test for DFS codes.
//!
//! A code is canonical when it equals the minimum DFS code of its
//! abstract pattern. The test regenerates that minimum one step at a
//! time: at each step it enumerates the rightmost-path extensions of the
//! partial minimum over the code's own pattern graph and takes the
//! lexicographically smallest. The first step where the smallest
//! extension undercuts the examined code proves non-canonicality.

use crate::dfs_code::DfsCode;
use crate::extension::single_graph_extensions;
use crate::graph::TransactionGraph;

/// Returns `true` iff `code` is the minimum DFS code of its pattern.
pub fn is_canonical(code: &DfsCode) -> bool {
    let pattern = TransactionGraph::from_code(code);
    let mut candidate = DfsCode::new();
    for i in 0..code.len() {
        let extensions = single_graph_extensions(&candidate, &pattern);
        let Some(min_step) = extensions.into_iter().next() else {
            // The partial minimum no longer extends; the examined code
            // cannot be a traversal of the pattern from here.
            return false;
        };
        if min_step < *code.at(i) {
            return false;
        }
        candidate.push(min_step);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dfs_code::ExtendedEdge;

    #[test]
    fn straight_path_is_canonical() {
        let mut code = DfsCode::new();
        code.push(ExtendedEdge::new(0, 1, 0, 1, 0));
        code.push(ExtendedEdge::new(1, 2, 1, 0, 0));
        code.push(ExtendedEdge::new(2, 3, 0, 1, 0));
        assert!(is_canonical(&code));
    }

    #[test]
    fn fork_encoding_of_a_path_is_not_canonical() {
        // Same abstract path as above, written as a fork from vertex 0.
        let mut code = DfsCode::new();
        code.push(ExtendedEdge::new(0, 1, 0, 1, 0));
        code.push(ExtendedEdge::new(1, 2, 1, 0, 0));
        code.push(ExtendedEdge::new(0, 3, 0, 1, 0));
        assert!(!is_canonical(&code));
    }

    #[test]
    fn triangle_with_backward_close_is_canonical() {
        let mut code = DfsCode::new();
        code.push(ExtendedEdge::new(0, 1, 0, 0, 0));
        code.push(ExtendedEdge::new(1, 2, 0, 0, 0));
        code.push(ExtendedEdge::new(2, 0, 0, 0, 0));
        assert!(is_canonical(&code));
    }

    #[test]
    fn larger_start_label_is_not_canonical() {
        // The minimum code starts from the smaller vertex label.
        let mut code = DfsCode::new();
        code.push(ExtendedEdge::new(0, 1, 1, 0, 0));
        code.push(ExtendedEdge::new(1, 2, 0, 1, 0));
        assert!(!is_canonical(&code));
    }
}
