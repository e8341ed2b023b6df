//! Line-oriented database reader and result writer.
//!
//! The input format is ASCII, one record per line: `t # <gid>` opens a
//! transaction graph, `v <id> <label>` adds a vertex, `e <v1> <v2>
//! <label>` adds an undirected edge between previously declared
//! vertices. Parsing aborts on the first malformed line and reports its
//! 1-based line number. Internally graphs receive dense ids in file
//! order; the declared id is carried along for output.
//!
//! Results are rendered in ascending support order, each record closed
//! by a blank line; the optional `x` line lists the declared ids of the
//! containing graphs in ascending order.

use crate::graph::{Edge, TransactionGraph, VertexId};
use crate::miner::MiningResult;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Failure while reading a graph database.
#[derive(Debug)]
pub enum ParseError {
    /// Underlying read failure.
    Io(std::io::Error),
    /// A line starting with an unrecognized token.
    UnknownToken { line: usize, token: String },
    /// A recognized line with the wrong shape or an unparsable field.
    MalformedLine { line: usize, reason: String },
    /// A vertex id declared twice within one graph.
    DuplicateVertex { line: usize, vertex: VertexId },
    /// A second edge over the same endpoint pair.
    DuplicateEdge { line: usize, v1: VertexId, v2: VertexId },
    /// An edge referencing an undeclared vertex.
    UnknownVertex { line: usize, vertex: VertexId },
    /// Content before the first `t` header.
    MissingHeader { line: usize },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "read failure: {}", e),
            ParseError::UnknownToken { line, token } => {
                write!(f, "line {}: unknown token `{}`", line, token)
            }
            ParseError::MalformedLine { line, reason } => {
                write!(f, "line {}: {}", line, reason)
            }
            ParseError::DuplicateVertex { line, vertex } => {
                write!(f, "line {}: vertex {} declared twice", line, vertex)
            }
            ParseError::DuplicateEdge { line, v1, v2 } => {
                write!(f, "line {}: duplicate edge between {} and {}", line, v1, v2)
            }
            ParseError::UnknownVertex { line, vertex } => {
                write!(f, "line {}: edge references undeclared vertex {}", line, vertex)
            }
            ParseError::MissingHeader { line } => {
                write!(f, "line {}: content before the first `t #` header", line)
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::Io(e)
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, line: usize) -> Result<T, ParseError> {
    field.parse().map_err(|_| ParseError::MalformedLine {
        line,
        reason: format!("invalid number `{}`", field),
    })
}

/// Parses a graph database from any buffered reader.
pub fn parse_graphs<R: BufRead>(reader: R) -> Result<Vec<TransactionGraph>, ParseError> {
    let mut graphs: Vec<TransactionGraph> = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        match fields[0] {
            "t" => {
                if fields.len() != 3 || fields[1] != "#" {
                    return Err(ParseError::MalformedLine {
                        line: line_no,
                        reason: "expected `t # <gid>`".into(),
                    });
                }
                let declared: u32 = parse_number(fields[2], line_no)?;
                let id = graphs.len() as u32;
                graphs.push(TransactionGraph::new(id, declared));
            }
            "v" => {
                let Some(g) = graphs.last_mut() else {
                    return Err(ParseError::MissingHeader { line: line_no });
                };
                if fields.len() != 3 {
                    return Err(ParseError::MalformedLine {
                        line: line_no,
                        reason: "expected `v <id> <label>`".into(),
                    });
                }
                let v: VertexId = parse_number(fields[1], line_no)?;
                let label: i32 = parse_number(fields[2], line_no)?;
                if !g.add_vertex(v, label) {
                    return Err(ParseError::DuplicateVertex {
                        line: line_no,
                        vertex: v,
                    });
                }
            }
            "e" => {
                let Some(g) = graphs.last_mut() else {
                    return Err(ParseError::MissingHeader { line: line_no });
                };
                if fields.len() != 4 {
                    return Err(ParseError::MalformedLine {
                        line: line_no,
                        reason: "expected `e <v1> <v2> <label>`".into(),
                    });
                }
                let v1: VertexId = parse_number(fields[1], line_no)?;
                let v2: VertexId = parse_number(fields[2], line_no)?;
                let label: i32 = parse_number(fields[3], line_no)?;
                if v1 == v2 {
                    return Err(ParseError::MalformedLine {
                        line: line_no,
                        reason: format!("self-loop on vertex {}", v1),
                    });
                }
                for &v in &[v1, v2] {
                    if !g.contains_vertex(v) {
                        return Err(ParseError::UnknownVertex {
                            line: line_no,
                            vertex: v,
                        });
                    }
                }
                if g.has_edge_between(v1, v2) {
                    return Err(ParseError::DuplicateEdge {
                        line: line_no,
                        v1,
                        v2,
                    });
                }
                g.add_edge(Edge::new(v1, v2, label));
            }
            token => {
                return Err(ParseError::UnknownToken {
                    line: line_no,
                    token: token.to_string(),
                });
            }
        }
    }
    debug!("parsed {} graphs", graphs.len());
    Ok(graphs)
}

/// Reads a graph database file.
pub fn read_graphs<P: AsRef<Path>>(path: P) -> Result<Vec<TransactionGraph>, ParseError> {
    let file = File::open(path)?;
    parse_graphs(BufReader::new(file))
}

/// Renders a mining result in the line-oriented output format.
///
/// Patterns appear in ascending support order, ties in discovery order,
/// each record terminated by a blank line. The `x` line is emitted only
/// when `output_graph_ids` is set.
pub fn render_results(result: &MiningResult, output_graph_ids: bool) -> String {
    let mut out = String::new();
    for (i, pattern) in result.sorted_patterns().into_iter().enumerate() {
        let code = &pattern.code;
        out.push_str(&format!("t # {} * {}\n", i, pattern.support));
        if code.is_single_vertex() {
            out.push_str(&format!("v 0 {}\n", code.at(0).from_label));
        } else {
            for (v, label) in code.vertex_labels().into_iter().enumerate() {
                out.push_str(&format!("v {} {}\n", v, label));
            }
            for step in code.steps() {
                out.push_str(&format!("e {} {} {}\n", step.from, step.to, step.edge_label));
            }
        }
        if output_graph_ids {
            let mut ids: Vec<u32> = pattern
                .graph_ids
                .iter()
                .map(|&gid| result.display_id(gid))
                .collect();
            ids.sort_unstable();
            out.push('x');
            for id in ids {
                out.push_str(&format!(" {}", id));
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// Writes a rendered mining result to a file.
pub fn write_results<P: AsRef<Path>>(
    result: &MiningResult,
    output_graph_ids: bool,
    path: P,
) -> Result<(), std::io::Error> {
    let mut file = File::create(path)?;
    file.write_all(render_results(result, output_graph_ids).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::{mine_file, Miner, MinerConfig};

    #[test]
    fn parses_two_graphs_with_dense_ids() {
        let input = "t # 7\nv 0 1\nv 1 2\ne 0 1 5\n\nt # 9\nv 3 1\n";
        let graphs = parse_graphs(input.as_bytes()).expect("valid input");
        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].id(), 0);
        assert_eq!(graphs[0].display_id(), 7);
        assert_eq!(graphs[1].id(), 1);
        assert_eq!(graphs[1].display_id(), 9);
        assert_eq!(graphs[0].vertex_count(), 2);
        assert!(graphs[0].has_edge_between(1, 0));
    }

    #[test]
    fn reports_line_numbers_on_errors() {
        let err = parse_graphs("t # 0\nv 0 1\nv 0 2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateVertex { line: 3, vertex: 0 }));

        let err = parse_graphs("t # 0\nv 0 1\ne 0 1 5\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::UnknownVertex { line: 3, vertex: 1 }));

        let err = parse_graphs("t # 0\nv 0 1\nv 1 1\ne 0 1 5\ne 1 0 5\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateEdge { line: 5, .. }));

        let err = parse_graphs("v 0 1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MissingHeader { line: 1 }));

        let err = parse_graphs("t # 0\nw 1 2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::UnknownToken { line: 2, .. }));

        let err = parse_graphs("t # 0\nv 0 x\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn render_matches_record_format() {
        let input = "t # 4\nv 0 1\nv 1 2\ne 0 1 7\n";
        let graphs = parse_graphs(input.as_bytes()).expect("valid input");
        let result = Miner::new(MinerConfig::default())
            .expect("valid config")
            .mine(graphs);
        let rendered = render_results(&result, true);
        assert_eq!(rendered, "t # 0 * 1\nv 0 1\nv 1 2\ne 0 1 7\nx 4\n\n");
        let without_ids = render_results(&result, false);
        assert_eq!(without_ids, "t # 0 * 1\nv 0 1\nv 1 2\ne 0 1 7\n\n");
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let input_path = dir.path().join("db.txt");
        let output_path = dir.path().join("out.txt");
        let mut file = File::create(&input_path).expect("create input");
        write!(file, "t # 0\nv 0 1\nv 1 2\ne 0 1 7\n").expect("write input");
        drop(file);

        let result = mine_file(&input_path, MinerConfig::default()).expect("mines");
        write_results(&result, true, &output_path).expect("writes");
        let written = std::fs::read_to_string(&output_path).expect("readable");
        assert_eq!(written, "t # 0 * 1\nv 0 1\nv 1 2\ne 0 1 7\nx 0\n\n");
    }

    #[test]
    fn missing_file_propagates_io_error() {
        let err = read_graphs("/nonexistent/db.txt").unwrap_err();
        assert!(matches!(err, ParseError::Io(_)));
    }
}
