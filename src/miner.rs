//! Mining driver: configuration, pruning phases, recursion, statistics.
//!
//! The driver owns every long-lived structure of a run: the frozen graph
//! store, the projection arena, the closure index and the failure
//! analyzer. A run proceeds in phases: compute the absolute support
//! threshold, prune infrequent vertex labels, prune edges by label-pair
//! and edge-label support, freeze the surviving graphs, optionally emit
//! one-vertex patterns, then drive the recursive DFS over the code
//! space. Statistics counters are advisory and never influence results.
//!
//! # Determinism
//! - Graph ids, label maps and extension maps all iterate in sorted
//!   order, so two runs over the same input produce identical output.

use crate::canonical::is_canonical;
use crate::closure::{ClosedPattern, ClosureIndex};
use crate::dfs_code::{DfsCode, ExtendedEdge, Label, SINGLE_VERTEX_EDGE_LABEL};
use crate::extension::{rightmost_path_extensions, subgraph_isomorphisms};
use crate::graph::{GraphId, GraphStore, TransactionGraph};
use crate::io::ParseError;
use crate::matrix::SparseTriangularMatrix;
use crate::projection::{Projected, ProjectionArena};
use crate::termination::FailureAnalyzer;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Parameters of a mining run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Minimum support as a fraction of the database size. Must be
    /// positive; values above 1 simply make nothing frequent.
    pub min_support: f64,
    /// Emit closed one-vertex patterns.
    pub output_single_vertices: bool,
    /// Maximum number of edges per pattern; 0 mines nothing.
    pub max_edges: u32,
    /// Emit the ids of the graphs containing each pattern.
    pub output_graph_ids: bool,
    /// Skip subtrees that are occurrence-equivalent to a recorded
    /// pattern. Disabling this (together with failure detection) yields
    /// the same result set at a higher cost; the toggle exists for
    /// differential testing.
    pub early_termination: bool,
    /// Run the failure analyzer that vetoes unsafe early terminations.
    pub detect_termination_failure: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            min_support: 1.0,
            output_single_vertices: false,
            max_edges: u32::MAX,
            output_graph_ids: true,
            early_termination: true,
            detect_termination_failure: true,
        }
    }
}

impl MinerConfig {
    /// Checks preconditions. Runs before any work touches the database.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_support > 0.0) || !self.min_support.is_finite() {
            return Err(ConfigError::NonPositiveMinSupport(self.min_support));
        }
        Ok(())
    }
}

/// Rejected configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `min_support` must be a positive finite fraction.
    NonPositiveMinSupport(f64),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NonPositiveMinSupport(v) => {
                write!(f, "minimum support must be a positive finite fraction, got {}", v)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure of a whole file-to-result run.
#[derive(Debug)]
pub enum MineError {
    /// Rejected configuration.
    Config(ConfigError),
    /// Malformed or unreadable input database.
    Parse(ParseError),
}

impl std::fmt::Display for MineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MineError::Config(e) => write!(f, "{}", e),
            MineError::Parse(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for MineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MineError::Config(e) => Some(e),
            MineError::Parse(e) => Some(e),
        }
    }
}

impl From<ConfigError> for MineError {
    fn from(e: ConfigError) -> Self {
        MineError::Config(e)
    }
}

impl From<ParseError> for MineError {
    fn from(e: ParseError) -> Self {
        MineError::Parse(e)
    }
}

/// Advisory counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningStats {
    /// Graphs in the input database.
    pub graphs: usize,
    /// Closed patterns found.
    pub patterns: usize,
    /// Vertex deletions from the infrequent-label phase, counted per
    /// label and graph.
    pub infrequent_vertices_removed: u64,
    /// Adjacency entries dropped by the label-pair matrix.
    pub infrequent_pairs_removed: u64,
    /// Adjacency entries dropped by edge-label support.
    pub edges_removed_by_label: u64,
    /// Graphs left without vertices after pruning.
    pub empty_graphs_removed: u64,
    /// Graphs skipped because the code already used as many edges.
    pub edge_count_prunes: u64,
    /// Subtrees skipped by early termination.
    pub early_terminations: u64,
    /// Early terminations vetoed by the failure analyzer.
    pub termination_failures: u64,
}

/// Outcome of a mining run.
#[derive(Debug)]
pub struct MiningResult {
    /// Closed patterns in discovery order.
    pub patterns: Vec<ClosedPattern>,
    /// Declared input id of each graph, indexed by internal id.
    pub display_ids: Vec<u32>,
    /// Advisory counters.
    pub stats: MiningStats,
}

impl MiningResult {
    /// Patterns ordered by ascending support; ties keep discovery order.
    pub fn sorted_patterns(&self) -> Vec<&ClosedPattern> {
        let mut sorted: Vec<&ClosedPattern> = self.patterns.iter().collect();
        sorted.sort_by_key(|p| p.support);
        sorted
    }

    /// The declared input id of an internal graph id.
    pub fn display_id(&self, gid: GraphId) -> u32 {
        self.display_ids[gid as usize]
    }
}

/// The mining driver.
#[derive(Debug)]
pub struct Miner {
    config: MinerConfig,
    min_sup: usize,
    store: GraphStore,
    arena: ProjectionArena,
    index: ClosureIndex,
    analyzer: FailureAnalyzer,
    stats: MiningStats,
    frequent_vertex_labels: Vec<Label>,
}

impl Miner {
    /// Creates a driver after validating the configuration.
    pub fn new(config: MinerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            min_sup: 0,
            store: GraphStore::default(),
            arena: ProjectionArena::new(),
            index: ClosureIndex::new(),
            analyzer: FailureAnalyzer::new(0),
            stats: MiningStats::default(),
            frequent_vertex_labels: Vec::new(),
        })
    }

    /// Runs the full pipeline over a loaded database.
    pub fn mine(mut self, mut graphs: Vec<TransactionGraph>) -> MiningResult {
        let n = graphs.len();
        self.stats.graphs = n;
        let display_ids: Vec<u32> = graphs.iter().map(TransactionGraph::display_id).collect();
        self.min_sup = (self.config.min_support * n as f64).ceil() as usize;
        self.analyzer = FailureAnalyzer::new(self.min_sup);
        info!("mining {} graphs, absolute minimum support {}", n, self.min_sup);

        if self.config.max_edges == 0 {
            return MiningResult {
                patterns: Vec::new(),
                display_ids,
                stats: self.stats,
            };
        }

        self.find_frequent_vertex_labels(&mut graphs);
        self.remove_infrequent_pairs(&mut graphs);

        let mut graph_ids = BTreeSet::new();
        for g in &mut graphs {
            if g.vertex_count() == 0 {
                self.stats.empty_graphs_removed += 1;
            } else {
                g.freeze();
                graph_ids.insert(g.id());
            }
        }
        self.store = GraphStore::from_graphs(graphs);

        if self.config.output_single_vertices {
            self.emit_single_vertex_patterns(&graph_ids);
        }

        if !self.frequent_vertex_labels.is_empty() {
            let projected = Projected::with_graph_ids(graph_ids.clone());
            self.dfs(&DfsCode::new(), &graph_ids, &projected);
        }

        let mut patterns = self.index.into_patterns();
        retain_closed(&mut patterns);
        self.stats.patterns = patterns.len();
        info!("found {} closed patterns", self.stats.patterns);
        debug!(
            "pruning: {} vertices, {} pair entries, {} label entries, {} empty graphs, {} edge-count skips",
            self.stats.infrequent_vertices_removed,
            self.stats.infrequent_pairs_removed,
            self.stats.edges_removed_by_label,
            self.stats.empty_graphs_removed,
            self.stats.edge_count_prunes,
        );
        debug!(
            "early termination applied {} times, failure detected {} times",
            self.stats.early_terminations, self.stats.termination_failures,
        );
        MiningResult {
            patterns,
            display_ids,
            stats: self.stats,
        }
    }

    /// Recursive depth-first search over the code space.
    fn dfs(&mut self, code: &DfsCode, graph_ids: &BTreeSet<GraphId>, projected: &Projected) {
        let mut unsafe_match = false;
        if self.config.early_termination {
            let check = self.index.check_early_termination(
                graph_ids,
                projected,
                &self.arena,
                self.analyzer.trie(),
                self.config.detect_termination_failure,
            );
            if check.failure {
                self.stats.termination_failures += 1;
                unsafe_match = true;
            }
            if check.terminate {
                self.stats.early_terminations += 1;
                return;
            }
        }

        let extensions = rightmost_path_extensions(
            code,
            &self.store,
            projected,
            &mut self.arena,
            &mut self.stats.edge_count_prunes,
        );

        for (step, new_projected) in &extensions {
            if new_projected.support() < self.min_sup {
                continue;
            }
            let mut grown = code.clone();
            grown.push(*step);
            if grown.len() as u64 > u64::from(self.config.max_edges) {
                continue;
            }
            if is_canonical(&grown) {
                self.dfs(&grown, new_projected.graph_ids(), new_projected);
            }
        }

        if code.is_empty() {
            return;
        }

        if self.config.detect_termination_failure {
            self.analyzer
                .analyze(code, projected, &extensions, &self.store, &self.arena);
        }

        // An unsafe match still proves an equivalent occurrence exists,
        // so the code is mined further but never recorded.
        if unsafe_match {
            return;
        }

        let has_equivalent = extensions
            .values()
            .any(|ext| projected.has_equivalent_occurrence(ext, &self.arena));
        if !has_equivalent {
            debug!("recording closed pattern {}", code.fingerprint());
            let pattern = ClosedPattern::new(
                code.clone(),
                graph_ids.clone(),
                graph_ids.len(),
                projected.clone(),
                &self.arena,
            );
            self.index.record(pattern, &self.arena);
        }
    }

    /// Counts vertex-label supports over vertices that carry edges and
    /// deletes the infrequent labels from every graph containing them.
    fn find_frequent_vertex_labels(&mut self, graphs: &mut [TransactionGraph]) {
        let mut label_gids: BTreeMap<Label, BTreeSet<GraphId>> = BTreeMap::new();
        for g in graphs.iter() {
            for (_v, label, degree) in g.vertex_summaries() {
                if degree > 0 {
                    label_gids.entry(label).or_default().insert(g.id());
                }
            }
        }
        for (label, gids) in &label_gids {
            if gids.len() >= self.min_sup {
                self.frequent_vertex_labels.push(*label);
            } else {
                for &gid in gids {
                    graphs[gid as usize].remove_vertices_with_label(*label);
                    self.stats.infrequent_vertices_removed += 1;
                }
            }
        }
        debug!(
            "{} frequent vertex labels",
            self.frequent_vertex_labels.len()
        );
    }

    /// Builds the label-pair matrix and per-edge-label supports, then
    /// drops edges failing either threshold. Both prunings apply; every
    /// removal is charged to exactly one counter.
    fn remove_infrequent_pairs(&mut self, graphs: &mut [TransactionGraph]) {
        let mut matrix = SparseTriangularMatrix::new();
        let mut label_support: BTreeMap<Label, usize> = BTreeMap::new();
        for g in graphs.iter() {
            let mut seen_pairs: HashSet<(Label, Label)> = HashSet::new();
            let mut seen_labels: HashSet<Label> = HashSet::new();
            for (v, e) in g.adjacency_entries() {
                let l1 = g.label_of(v);
                let l2 = g.label_of(e.other(v));
                let key = if l1 <= l2 { (l1, l2) } else { (l2, l1) };
                if seen_pairs.insert(key) {
                    matrix.increment(l1, l2);
                }
                if seen_labels.insert(e.label) {
                    *label_support.entry(e.label).or_default() += 1;
                }
            }
        }
        matrix.remove_infrequent(self.min_sup as u64);
        for g in graphs.iter_mut() {
            let (by_pair, by_label) =
                g.remove_infrequent_edges(&matrix, &label_support, self.min_sup);
            self.stats.infrequent_pairs_removed += by_pair;
            self.stats.edges_removed_by_label += by_label;
        }
    }

    /// Emits the frequent vertex labels onto which no frequent edge
    /// extension projects every occurrence.
    fn emit_single_vertex_patterns(&mut self, graph_ids: &BTreeSet<GraphId>) {
        let mut label_gids: BTreeMap<Label, BTreeSet<GraphId>> = BTreeMap::new();
        let mut label_counts: BTreeMap<Label, usize> = BTreeMap::new();
        for &gid in graph_ids {
            let g = self.store.graph(gid);
            for (_v, label, degree) in g.vertex_summaries() {
                if degree > 0 {
                    label_gids.entry(label).or_default().insert(gid);
                    *label_counts.entry(label).or_default() += 1;
                }
            }
        }

        let projected = Projected::with_graph_ids(graph_ids.clone());
        let extensions = rightmost_path_extensions(
            &DfsCode::new(),
            &self.store,
            &projected,
            &mut self.arena,
            &mut self.stats.edge_count_prunes,
        );

        for (label, gids) in &label_gids {
            if gids.len() < self.min_sup {
                continue;
            }
            let total = label_counts[label];
            let mut closed = true;
            for (step, ext) in &extensions {
                if step.from_label != *label && step.to_label != *label {
                    continue;
                }
                if ext.vertices_with_label_count(*label, &self.store, &self.arena) == total {
                    closed = false;
                    break;
                }
            }
            if closed {
                let mut code = DfsCode::new();
                code.push(ExtendedEdge::new(
                    0,
                    0,
                    *label,
                    *label,
                    SINGLE_VERTEX_EDGE_LABEL,
                ));
                let pattern =
                    ClosedPattern::new(code, gids.clone(), gids.len(), Projected::new(), &self.arena);
                self.index.record(pattern, &self.arena);
            }
        }
    }
}

/// Drops every recorded pattern that embeds into a larger recorded
/// pattern with identical support and coverage. The recursion's
/// occurrence-equivalence test prunes almost all such patterns on the
/// fly; this pass guarantees the property on the emitted set.
fn retain_closed(patterns: &mut Vec<ClosedPattern>) {
    let mut keep = vec![true; patterns.len()];
    for i in 0..patterns.len() {
        if patterns[i].is_single_vertex() {
            continue;
        }
        for j in 0..patterns.len() {
            if i == j || patterns[j].is_single_vertex() {
                continue;
            }
            if patterns[j].support == patterns[i].support
                && patterns[j].graph_ids == patterns[i].graph_ids
                && patterns[j].code.len() > patterns[i].code.len()
                && embeds_in(&patterns[i].code, &patterns[j].code)
            {
                keep[i] = false;
                break;
            }
        }
    }
    let mut mask = keep.into_iter();
    patterns.retain(|_| mask.next().expect("mask covers every pattern"));
}

/// Tests whether the pattern of `small` occurs inside the pattern graph
/// of `large`.
fn embeds_in(small: &DfsCode, large: &DfsCode) -> bool {
    let pattern = TransactionGraph::from_code(large);
    !subgraph_isomorphisms(small, &pattern).is_empty()
}

/// Reads a database file and mines it with the given configuration.
pub fn mine_file<P: AsRef<Path>>(input: P, config: MinerConfig) -> Result<MiningResult, MineError> {
    let miner = Miner::new(config)?;
    let graphs = crate::io::read_graphs(input)?;
    Ok(miner.mine(graphs))
}
