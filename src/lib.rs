//! Closegraph: closed frequent subgraph mining over labeled graph
//! databases.
//!
//! Given a database of undirected, integer-labeled transaction graphs
//! and a minimum support fraction, the miner enumerates every *closed*
//! connected subgraph together with the set of transaction graphs
//! containing it. A pattern is closed when no one-edge extension occurs
//! in as many transaction graphs.
//!
//! The search walks the gSpan code space: patterns are encoded as DFS
//! codes, grown along the rightmost path, and deduplicated by a
//! minimum-code canonicality test. Occurrences are tracked as shared
//! immutable projection chains, which make the closure machinery cheap:
//! an occurrence-equivalence test prunes non-closed patterns, a hash
//! index over projected edge sets allows whole subtrees to be skipped,
//! and a five-case failure analyzer vetoes the skips that would hide a
//! closed descendant.
//!
//! # Determinism
//! Two runs over the same input and parameters produce byte-identical
//! output: every iteration order that can reach the result flows through
//! sorted containers or explicit sorts.
//!
//! # References
//! - Yan, Han. "gSpan: Graph-based substructure pattern mining" (ICDM 2002)
//! - Yan, Han. "CloseGraph: mining closed frequent graph patterns" (KDD 2003)
//! - Zevin, Naaz. "cgSpan: Closed Graph-Based Substructure Pattern Mining"
//!   (IEEE BigData 2021)
//!
//! # Example
//!
//! ```
//! use closegraph::prelude::*;
//!
//! let db = "t # 0\nv 0 1\nv 1 1\ne 0 1 0\n";
//! let graphs = closegraph::io::parse_graphs(db.as_bytes()).unwrap();
//! let result = Miner::new(MinerConfig::default()).unwrap().mine(graphs);
//! assert_eq!(result.patterns.len(), 1);
//! assert_eq!(result.patterns[0].support, 1);
//! ```

pub mod canonical;
pub mod closure;
pub mod dfs_code;
pub mod extension;
pub mod fingerprint;
pub mod graph;
pub mod io;
pub mod matrix;
pub mod miner;
pub mod projection;
pub mod termination;

pub use canonical::is_canonical;
pub use closure::{ClosedPattern, ClosureIndex, PatternId, TerminationCheck};
pub use dfs_code::{DfsCode, ExtendedEdge, Label};
pub use fingerprint::{DigestBuilder, HashValue};
pub use graph::{Edge, EdgeId, GraphId, GraphStore, TransactionGraph, VertexId};
pub use io::{parse_graphs, read_graphs, render_results, write_results, ParseError};
pub use matrix::SparseTriangularMatrix;
pub use miner::{mine_file, ConfigError, MineError, Miner, MinerConfig, MiningResult, MiningStats};
pub use projection::{Projected, ProjectionArena, ProjectionId};
pub use termination::{CodeTrie, FailureAnalyzer};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::canonical::is_canonical;
    pub use crate::closure::ClosedPattern;
    pub use crate::dfs_code::{DfsCode, ExtendedEdge, Label};
    pub use crate::fingerprint::HashValue;
    pub use crate::graph::{Edge, EdgeId, GraphId, TransactionGraph};
    pub use crate::io::{parse_graphs, read_graphs, render_results, write_results};
    pub use crate::miner::{mine_file, Miner, MinerConfig, MiningResult};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::fingerprint::HashValue;

    fn mine(input: &str, config: MinerConfig) -> MiningResult {
        let graphs = parse_graphs(input.as_bytes()).expect("fixture parses");
        Miner::new(config).expect("valid config").mine(graphs)
    }

    fn oracle(config: &MinerConfig) -> MinerConfig {
        MinerConfig {
            early_termination: false,
            detect_termination_failure: false,
            ..config.clone()
        }
    }

    /// Renders both the configured run and the brute-force run without
    /// early termination; the outputs must agree byte for byte.
    fn assert_matches_oracle(input: &str, config: MinerConfig) -> String {
        let fast = mine(input, config.clone());
        let slow = mine(input, oracle(&config));
        let fast_rendered = render_results(&fast, config.output_graph_ids);
        let slow_rendered = render_results(&slow, config.output_graph_ids);
        assert_eq!(fast_rendered, slow_rendered);
        fast_rendered
    }

    const TWO_TRIANGLES: &str = concat!(
        "t # 0\nv 0 0\nv 1 0\nv 2 0\ne 0 1 0\ne 1 2 0\ne 2 0 0\n",
        "t # 1\nv 0 0\nv 1 0\nv 2 0\ne 0 1 0\ne 1 2 0\ne 2 0 0\n",
    );

    const ALTERNATING_PATH: &str =
        "t # 0\nv 0 0\nv 1 1\nv 2 0\nv 3 1\ne 0 1 0\ne 1 2 0\ne 2 3 0\n";

    const SHARED_EDGE: &str = concat!(
        "t # 1\nv 0 0\nv 1 1\ne 0 1 0\n",
        "t # 2\nv 0 0\nv 1 1\nv 2 2\ne 0 1 0\ne 1 2 0\n",
    );

    /// Two triangles sharing the B-C edge, apexes labeled A.
    const DIAMOND: &str = concat!(
        "t # 0\n",
        "v 0 0\nv 1 1\nv 2 2\nv 3 0\n",
        "e 0 1 0\ne 0 2 0\ne 1 2 0\ne 1 3 0\ne 2 3 0\n",
    );

    const TWO_COMPONENTS: &str =
        "t # 0\nv 0 0\nv 1 0\nv 2 1\nv 3 1\ne 0 1 0\ne 2 3 0\n";

    /// A square with a diagonal next to a triangle, all labels equal;
    /// dense sharing exercises the early-termination machinery.
    const SQUARE_AND_TRIANGLE: &str = concat!(
        "t # 0\n",
        "v 0 0\nv 1 0\nv 2 0\nv 3 0\n",
        "e 0 1 0\ne 1 2 0\ne 2 3 0\ne 3 0 0\ne 0 2 0\n",
        "t # 1\n",
        "v 0 0\nv 1 0\nv 2 0\n",
        "e 0 1 0\ne 1 2 0\ne 2 0 0\n",
    );

    #[test]
    fn two_triangles_yield_one_shared_pattern() {
        let result = mine(TWO_TRIANGLES, MinerConfig::default());
        assert_eq!(result.patterns.len(), 1);
        let triangle = &result.patterns[0];
        assert_eq!(triangle.support, 2);
        assert_eq!(triangle.code.len(), 3);
        let gids: Vec<u32> = triangle.graph_ids.iter().copied().collect();
        assert_eq!(gids, vec![0, 1]);
        assert!(is_canonical(&triangle.code));
    }

    #[test]
    fn alternating_path_has_no_closed_sub_paths() {
        let config = MinerConfig {
            max_edges: 3,
            ..MinerConfig::default()
        };
        let result = mine(ALTERNATING_PATH, config);
        assert_eq!(result.patterns.len(), 1);
        let path = &result.patterns[0];
        assert_eq!(path.support, 1);
        assert_eq!(path.code.len(), 3);
        assert!(is_canonical(&path.code));
    }

    #[test]
    fn shared_edge_wins_over_larger_single_graph_pattern() {
        let config = MinerConfig {
            min_support: 1.0,
            ..MinerConfig::default()
        };
        let result = mine(SHARED_EDGE, config.clone());
        assert_eq!(result.patterns.len(), 1);
        let edge = &result.patterns[0];
        assert_eq!(edge.support, 2);
        assert_eq!(edge.code.len(), 1);
        // The x line carries the declared ids 1 and 2.
        let rendered = render_results(&result, true);
        assert!(rendered.ends_with("x 1 2\n\n"));
    }

    #[test]
    fn diamond_closes_over_its_triangles() {
        let result = mine(DIAMOND, MinerConfig::default());
        assert_eq!(result.patterns.len(), 1);
        let diamond = &result.patterns[0];
        assert_eq!(diamond.support, 1);
        assert_eq!(diamond.code.len(), 5);
        assert!(is_canonical(&diamond.code));
    }

    #[test]
    fn components_mine_independently() {
        let result = mine(TWO_COMPONENTS, MinerConfig::default());
        assert_eq!(result.patterns.len(), 2);
        for pattern in &result.patterns {
            assert_eq!(pattern.support, 1);
            assert_eq!(pattern.code.len(), 1);
            let step = pattern.code.at(0);
            assert_eq!(step.from_label, step.to_label);
        }
        // Discovery order follows the extended-edge order.
        assert_eq!(result.patterns[0].code.at(0).from_label, 0);
        assert_eq!(result.patterns[1].code.at(0).from_label, 1);
    }

    #[test]
    fn early_termination_agrees_with_brute_force() {
        for (input, min_support) in [
            (TWO_TRIANGLES, 1.0),
            (ALTERNATING_PATH, 1.0),
            (SHARED_EDGE, 1.0),
            (DIAMOND, 1.0),
            (TWO_COMPONENTS, 1.0),
            (SQUARE_AND_TRIANGLE, 0.5),
            (SQUARE_AND_TRIANGLE, 1.0),
        ] {
            let config = MinerConfig {
                min_support,
                ..MinerConfig::default()
            };
            assert_matches_oracle(input, config);
        }
    }

    #[test]
    fn failure_detection_restores_oracle_results() {
        // Dense sharing is exactly where unsafe early terminations
        // would surface; with detection on, the optimized run must not
        // lose any pattern the brute-force run finds.
        let config = MinerConfig {
            min_support: 0.5,
            output_single_vertices: true,
            ..MinerConfig::default()
        };
        let rendered = assert_matches_oracle(SQUARE_AND_TRIANGLE, config);
        assert!(!rendered.is_empty());
    }

    #[test]
    fn single_vertex_patterns_need_uncovered_occurrences() {
        // Label 0 splits its occurrences between two edge shapes, so no
        // single extension covers them all; labels 1 and 2 are fully
        // covered by their unique edge shape.
        let input = concat!(
            "t # 0\nv 0 0\nv 1 1\ne 0 1 0\n",
            "t # 1\nv 0 0\nv 1 1\ne 0 1 0\n",
            "t # 2\nv 0 0\nv 1 2\ne 0 1 0\n",
            "t # 3\nv 0 0\nv 1 2\ne 0 1 0\n",
        );
        let config = MinerConfig {
            min_support: 0.5,
            output_single_vertices: true,
            ..MinerConfig::default()
        };
        let result = mine(input, config);
        let singles: Vec<_> = result
            .patterns
            .iter()
            .filter(|p| p.is_single_vertex())
            .collect();
        assert_eq!(singles.len(), 1);
        assert_eq!(singles[0].code.at(0).from_label, 0);
        assert_eq!(singles[0].support, 4);
        let edges: Vec<_> = result
            .patterns
            .iter()
            .filter(|p| !p.is_single_vertex())
            .collect();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|p| p.support == 2));
    }

    #[test]
    fn runs_are_byte_identical() {
        let config = MinerConfig {
            min_support: 0.5,
            output_single_vertices: true,
            ..MinerConfig::default()
        };
        let first = render_results(&mine(SQUARE_AND_TRIANGLE, config.clone()), true);
        let second = render_results(&mine(SQUARE_AND_TRIANGLE, config), true);
        assert_eq!(first, second);
        assert_eq!(
            HashValue::of_bytes("result", first.as_bytes()),
            HashValue::of_bytes("result", second.as_bytes()),
        );
    }

    #[test]
    fn relabeling_graphs_only_remaps_ids() {
        let reversed = concat!(
            "t # 2\nv 0 0\nv 1 1\nv 2 2\ne 0 1 0\ne 1 2 0\n",
            "t # 1\nv 0 0\nv 1 1\ne 0 1 0\n",
        );
        let config = MinerConfig::default();
        let a = mine(SHARED_EDGE, config.clone());
        let b = mine(reversed, config);
        let keys = |r: &MiningResult| {
            let mut v: Vec<(HashValue, usize)> = r
                .patterns
                .iter()
                .map(|p| (p.code.fingerprint(), p.support))
                .collect();
            v.sort();
            v
        };
        assert_eq!(keys(&a), keys(&b));
        // The x lines agree because declared ids travel with the graphs.
        assert_eq!(render_results(&a, true), render_results(&b, true));
    }

    #[test]
    fn every_reported_pattern_meets_support_and_canonicality() {
        let config = MinerConfig {
            min_support: 0.5,
            ..MinerConfig::default()
        };
        let result = mine(SQUARE_AND_TRIANGLE, config);
        assert!(!result.patterns.is_empty());
        for pattern in &result.patterns {
            assert!(pattern.support >= 1);
            assert_eq!(pattern.support, pattern.graph_ids.len());
            if !pattern.is_single_vertex() {
                assert!(is_canonical(&pattern.code));
            }
        }
    }

    #[test]
    fn no_reported_pattern_embeds_in_an_equal_support_sibling() {
        let result = mine(SQUARE_AND_TRIANGLE, MinerConfig::default());
        for (i, p) in result.patterns.iter().enumerate() {
            for (j, q) in result.patterns.iter().enumerate() {
                if i == j || p.support != q.support || p.code.len() >= q.code.len() {
                    continue;
                }
                let target = TransactionGraph::from_code(&q.code);
                let embeddings =
                    crate::extension::subgraph_isomorphisms(&p.code, &target);
                assert!(
                    embeddings.is_empty() || p.graph_ids != q.graph_ids,
                    "pattern {} embeds in equal-support pattern {}",
                    i,
                    j
                );
            }
        }
    }
}
