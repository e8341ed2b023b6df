//! Benchmarks for the mining pipeline.
//!
//! Synthetic databases with controlled sharing: chains measure raw
//! enumeration throughput, rings of triangles stress the closure and
//! early-termination machinery.

use closegraph::io::parse_graphs;
use closegraph::miner::{Miner, MinerConfig};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// Builds `count` copies of a labeled chain with `len` edges.
fn chain_database(count: usize, len: usize) -> String {
    let mut db = String::new();
    for gid in 0..count {
        db.push_str(&format!("t # {}\n", gid));
        for v in 0..=len {
            db.push_str(&format!("v {} {}\n", v, v % 3));
        }
        for v in 0..len {
            db.push_str(&format!("e {} {} {}\n", v, v + 1, v % 2));
        }
    }
    db
}

/// Builds `count` copies of a ring of `n` triangles sharing vertices.
fn triangle_ring_database(count: usize, n: usize) -> String {
    let mut db = String::new();
    for gid in 0..count {
        db.push_str(&format!("t # {}\n", gid));
        for v in 0..2 * n {
            db.push_str(&format!("v {} 0\n", v));
        }
        for t in 0..n {
            let a = 2 * t;
            let b = 2 * t + 1;
            let c = (2 * t + 2) % (2 * n);
            db.push_str(&format!("e {} {} 0\n", a, b));
            db.push_str(&format!("e {} {} 0\n", b, c));
            if c != a {
                db.push_str(&format!("e {} {} 0\n", a, c));
            }
        }
    }
    db
}

fn bench_chain_mining(c: &mut Criterion) {
    let db = chain_database(20, 8);
    c.bench_function("mine_20_chains_of_8", |b| {
        b.iter(|| {
            let graphs = parse_graphs(black_box(db.as_bytes())).expect("valid database");
            let config = MinerConfig {
                min_support: 0.5,
                ..MinerConfig::default()
            };
            let result = Miner::new(config).expect("valid config").mine(graphs);
            black_box(result.patterns.len())
        });
    });
}

fn bench_triangle_ring_mining(c: &mut Criterion) {
    let db = triangle_ring_database(4, 4);
    c.bench_function("mine_4_triangle_rings", |b| {
        b.iter(|| {
            let graphs = parse_graphs(black_box(db.as_bytes())).expect("valid database");
            let config = MinerConfig {
                min_support: 1.0,
                max_edges: 5,
                ..MinerConfig::default()
            };
            let result = Miner::new(config).expect("valid config").mine(graphs);
            black_box(result.patterns.len())
        });
    });
}

fn bench_early_termination_toggle(c: &mut Criterion) {
    let db = triangle_ring_database(2, 3);
    c.bench_function("mine_rings_without_early_termination", |b| {
        b.iter(|| {
            let graphs = parse_graphs(black_box(db.as_bytes())).expect("valid database");
            let config = MinerConfig {
                min_support: 1.0,
                max_edges: 5,
                early_termination: false,
                detect_termination_failure: false,
                ..MinerConfig::default()
            };
            let result = Miner::new(config).expect("valid config").mine(graphs);
            black_box(result.patterns.len())
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_chain_mining,
              bench_triangle_ring_mining,
              bench_early_termination_toggle
);
criterion_main!(benches);
