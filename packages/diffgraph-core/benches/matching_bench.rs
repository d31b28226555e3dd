//! Throughput of the driver algorithm (spec §4.2) over synthetic call
//! graphs of varying function count, with the default step pipeline and
//! default config (spec §6).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use diffgraph_core::config::MatchingConfig;
use diffgraph_core::context::MatchingContext;
use diffgraph_core::matching::driver::{run_comparison, CancellationFlag};
use diffgraph_core::model::basic_block::BasicBlock;
use diffgraph_core::model::call_graph::{CallGraph, Endianness, ExecutableMetadata};
use diffgraph_core::model::flow_graph::{EdgeKind, FlowGraph};
use diffgraph_core::model::instruction::{Instruction, InstructionCache};

fn metadata(id: &str) -> ExecutableMetadata {
    ExecutableMetadata {
        id: id.into(),
        architecture: "x86_64".into(),
        endianness: Endianness::Little,
        hash: "deadbeef".into(),
    }
}

/// A deterministic synthetic function: `blocks_per_fn` basic blocks in a
/// chain, each holding a handful of instructions drawn from a small
/// mnemonic vocabulary so the instruction cache sees realistic reuse.
fn synthetic_function(cache: &InstructionCache, name: &str, base_addr: u64, blocks_per_fn: usize) -> FlowGraph {
    const MNEMONICS: &[&str] = &["mov", "push", "pop", "add", "sub", "cmp", "jmp", "ret"];
    let blocks: Vec<BasicBlock> = (0..blocks_per_fn)
        .map(|b| {
            let instrs = (0..4)
                .map(|i| {
                    let addr = base_addr + (b * 4 + i) as u64;
                    let mnemonic = MNEMONICS[(b + i) % MNEMONICS.len()];
                    Instruction::new(cache, addr, mnemonic, format!("r{}, {}", i, b * 7 + i))
                })
                .collect();
            BasicBlock::new(instrs)
        })
        .collect();
    let edges: Vec<(usize, usize, EdgeKind)> = (0..blocks_per_fn.saturating_sub(1)).map(|i| (i, i + 1, EdgeKind::Unconditional)).collect();
    FlowGraph::new(name, blocks, edges, 0, false, false, None)
}

fn synthetic_call_graph(function_count: usize, blocks_per_fn: usize, cache: &InstructionCache) -> CallGraph {
    let mut cg = CallGraph::new(metadata("bench-binary"));
    for i in 0..function_count {
        let base = 0x1000 + (i as u64) * 0x1000;
        cg.add_function(synthetic_function(cache, &format!("func_{i}"), base, blocks_per_fn));
    }
    cg
}

fn bench_identity_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity_comparison");
    for &function_count in &[10usize, 50, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(function_count), &function_count, |b, &function_count| {
            let cache = InstructionCache::new();
            let primary = synthetic_call_graph(function_count, 6, &cache);
            let secondary = synthetic_call_graph(function_count, 6, &cache);
            let config = MatchingConfig::default();

            b.iter(|| {
                let mut ctx = MatchingContext::new(&primary, &secondary);
                let result = run_comparison(&mut ctx, &config, &CancellationFlag::new()).unwrap();
                black_box(result);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_identity_comparison);
criterion_main!(benches);
