//! Benchmarks for the diagram source sanitizer
//!
//! The sanitizer runs on every successful generation, so its cost sits
//! directly on the request path.

use criterion::{Criterion, criterion_group, criterion_main};
use sketchmind::sanitize::sanitize;
use std::hint::black_box;

const CLEAN_FLOWCHART: &str = "flowchart TD\n    A[Start] --> B[Check settings]\n    B --> C[Apply]\n    C --> D[Done]";

const MESSY_FLOWCHART: &str = "```mermaid\nflowchartTD\nA[\"Say \"hi\"\" &amp;quot;loudly&amp;quot;] --> B[em\u{2014}dash; here]\nsubgraph Phase 1: Setup!\n        C[C:\\temp] --> D\nend\n```";

const DIRECTIVE_MINDMAP: &str = "%%{init: {\"theme\": \"forest\"}}%%\nmindmap\n  root((Topic))\n    Branch one\n      Leaf\n    Branch two";

fn bench_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");

    group.bench_function("clean_flowchart", |b| {
        b.iter(|| sanitize(black_box(CLEAN_FLOWCHART)))
    });

    group.bench_function("messy_flowchart", |b| {
        b.iter(|| sanitize(black_box(MESSY_FLOWCHART)))
    });

    group.bench_function("directive_mindmap", |b| {
        b.iter(|| sanitize(black_box(DIRECTIVE_MINDMAP)))
    });

    let large: String = std::iter::once("flowchart TD".to_string())
        .chain((0..500).map(|i| format!("N{}[\u{201C}node {}\u{201D}; label] --> N{}", i, i, i + 1)))
        .collect::<Vec<_>>()
        .join("\n");
    group.bench_function("large_flowchart_500_nodes", |b| {
        b.iter(|| sanitize(black_box(&large)))
    });

    group.finish();
}

criterion_group!(benches, bench_sanitize);
criterion_main!(benches);
