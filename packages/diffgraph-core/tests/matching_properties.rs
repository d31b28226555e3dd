//! Property-based tests for the invariants in spec §8.
//!
//! Mirrors the teacher's convention of a dedicated `tests/*_property_tests.rs`
//! file per crate (`codegraph-ir/tests/config_property_tests.rs`) rather than
//! inline `proptest!` blocks inside the matching modules.

use std::collections::HashSet;

use diffgraph_core::config::MatchingConfig;
use diffgraph_core::context::MatchingContext;
use diffgraph_core::matching::driver::{self, CancellationFlag};
use diffgraph_core::model::basic_block::{prime_product, BasicBlock};
use diffgraph_core::model::call_graph::{CallGraph, Endianness, ExecutableMetadata};
use diffgraph_core::model::flow_graph::{EdgeKind, FlowGraph};
use diffgraph_core::model::instruction::{Instruction, InstructionCache};
use proptest::prelude::*;

const MNEMONICS: &[&str] = &["mov", "push", "pop", "add", "sub", "jmp", "ret", "nop"];

fn metadata(id: &str) -> ExecutableMetadata {
    ExecutableMetadata {
        id: id.into(),
        architecture: "x86_64".into(),
        endianness: Endianness::Little,
        hash: "deadbeef".into(),
    }
}

/// Builds a straight-line flow graph (no branches, no loops) from a list of
/// `(mnemonic_index, operand)` pairs, one basic block per instruction, so
/// the generated functions stay small and acyclic while still exercising
/// every size the pipeline can see.
fn straight_line_function(cache: &InstructionCache, name: &str, base_addr: u64, body: &[(usize, u32)]) -> FlowGraph {
    let blocks: Vec<BasicBlock> = body
        .iter()
        .enumerate()
        .map(|(i, &(mnemonic_idx, operand))| {
            let addr = base_addr + i as u64;
            let mnemonic = MNEMONICS[mnemonic_idx % MNEMONICS.len()];
            BasicBlock::new(vec![Instruction::new(cache, addr, mnemonic, operand.to_string())])
        })
        .collect();
    let edges: Vec<(usize, usize, EdgeKind)> = (0..blocks.len().saturating_sub(1)).map(|i| (i, i + 1, EdgeKind::Unconditional)).collect();
    FlowGraph::new(name, blocks, edges, 0, false, false, None)
}

fn body_strategy() -> impl Strategy<Value = Vec<(usize, u32)>> {
    prop::collection::vec((0usize..MNEMONICS.len(), 0u32..1000), 1..5)
}

proptest! {
    /// Invariant 6: reordering a basic block's instructions never changes
    /// its prime product (multiplication is commutative).
    #[test]
    fn prime_product_is_permutation_invariant(body in prop::collection::vec((0usize..MNEMONICS.len(), 0u32..1000), 1..8), perm_seed in any::<u64>()) {
        let cache = InstructionCache::new();
        let instrs: Vec<Instruction> = body
            .iter()
            .enumerate()
            .map(|(i, &(m, op))| Instruction::new(&cache, i as u64, MNEMONICS[m % MNEMONICS.len()], op.to_string()))
            .collect();

        let mut shuffled = instrs.clone();
        // Deterministic pseudo-shuffle (no RNG crate dependency needed): a
        // fixed-stride rotation keyed off perm_seed, applied len() times.
        let len = shuffled.len();
        if len > 1 {
            let stride = 1 + (perm_seed as usize % (len - 1));
            for i in 0..len {
                shuffled.swap(i, (i + stride) % len);
            }
        }

        prop_assert_eq!(prime_product(&instrs), prime_product(&shuffled));
    }

    /// Invariant 7: two isomorphic flow graphs (same shape, same per-vertex
    /// instruction content, reversed vertex insertion order) produce equal
    /// MD-indices.
    #[test]
    fn md_index_is_equal_for_isomorphic_graphs(body in body_strategy()) {
        let cache = InstructionCache::new();
        let forward = straight_line_function(&cache, "f", 0x1000, &body);

        // Build the reverse-insertion-order isomorph: same chain, same
        // per-node content, blocks inserted in reverse and the edge list
        // permuted to match — entry is still logically the same node.
        let mut reversed_body: Vec<(usize, u32)> = body.clone();
        reversed_body.reverse();
        let n = reversed_body.len();
        let blocks: Vec<BasicBlock> = reversed_body
            .iter()
            .enumerate()
            .map(|(i, &(m, op))| BasicBlock::new(vec![Instruction::new(&cache, i as u64, MNEMONICS[m % MNEMONICS.len()], op.to_string())]))
            .collect();
        // Edge i -> i+1 in original order becomes (n-1-i) -> (n-2-i) here.
        let edges: Vec<(usize, usize, EdgeKind)> = (0..n.saturating_sub(1)).map(|i| (n - 1 - i, n - 2 - i, EdgeKind::Unconditional)).collect();
        let backward = FlowGraph::new("f", blocks, edges, n - 1, false, false, None);

        prop_assert!((forward.md_index() - backward.md_index()).abs() < diffgraph_core::fingerprint::EPSILON);
    }

    /// Invariant 1 (Bijection) + 2 (Determinism): running the full driver
    /// twice on the same identity inputs yields the same FixedPoint set,
    /// and no function or basic block is claimed twice.
    #[test]
    fn identity_comparison_is_deterministic_and_bijective(
        bodies in prop::collection::vec(body_strategy(), 1..4),
    ) {
        let cache = InstructionCache::new();
        let config = MatchingConfig::default();

        let build = || {
            let mut primary = CallGraph::new(metadata("bin"));
            let mut secondary = CallGraph::new(metadata("bin"));
            for (i, body) in bodies.iter().enumerate() {
                let base = 0x1000 + (i as u64) * 0x1000;
                primary.add_function(straight_line_function(&cache, &format!("f{i}"), base, body));
                secondary.add_function(straight_line_function(&cache, &format!("f{i}"), base, body));
            }
            (primary, secondary)
        };

        let (primary_a, secondary_a) = build();
        let mut ctx_a = MatchingContext::new(&primary_a, &secondary_a);
        let result_a = driver::run_comparison(&mut ctx_a, &config, &CancellationFlag::new()).unwrap();

        let (primary_b, secondary_b) = build();
        let mut ctx_b = MatchingContext::new(&primary_b, &secondary_b);
        let result_b = driver::run_comparison(&mut ctx_b, &config, &CancellationFlag::new()).unwrap();

        prop_assert_eq!(result_a.len(), bodies.len());

        let mut seen_primary = HashSet::new();
        let mut seen_secondary = HashSet::new();
        for fp in &result_a {
            prop_assert!(seen_primary.insert(fp.primary));
            prop_assert!(seen_secondary.insert(fp.secondary));
            prop_assert!((fp.similarity - 1.0).abs() < 1e-9);
        }

        let summarize = |fps: &[diffgraph_core::context::FixedPoint]| {
            fps.iter()
                .map(|fp| (fp.primary_entry, fp.secondary_entry, fp.step, (fp.similarity * 1e9).round() as i64, (fp.confidence * 1e9).round() as i64, fp.flags.bits()))
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(summarize(&result_a), summarize(&result_b));
    }
}

/// Invariant 3 (Monotonicity): adding a step to the end of the function
/// pipeline can only add FixedPoints, never remove or change earlier ones.
/// Two functions that share a name but nothing else structurally: a
/// hash-only pipeline commits nothing (no content hash is supplied), while
/// hash-then-name commits both.
#[test]
fn adding_a_step_only_adds_fixed_points() {
    let cache = InstructionCache::new();
    let mut primary = CallGraph::new(metadata("bin"));
    let mut secondary = CallGraph::new(metadata("bin"));
    primary.add_function(straight_line_function(&cache, "alpha", 0x1000, &[(0, 1), (1, 2)]));
    primary.add_function(straight_line_function(&cache, "beta", 0x2000, &[(2, 3), (3, 4), (4, 5)]));
    secondary.add_function(straight_line_function(&cache, "alpha", 0x5000, &[(0, 1), (1, 2)]));
    secondary.add_function(straight_line_function(&cache, "beta", 0x6000, &[(2, 3), (3, 4), (4, 5)]));

    let mut narrow = MatchingConfig::default();
    narrow.function_matching = vec!["functionHashMatch".into()];
    narrow.basic_block_matching = vec!["blockEntryMatch".into()];
    let mut ctx = MatchingContext::new(&primary, &secondary);
    let narrow_result = driver::run_comparison(&mut ctx, &narrow, &CancellationFlag::new()).unwrap();

    let mut wide = narrow.clone();
    wide.function_matching.push("functionNameMatch".into());
    let mut ctx2 = MatchingContext::new(&primary, &secondary);
    let wide_result = driver::run_comparison(&mut ctx2, &wide, &CancellationFlag::new()).unwrap();

    assert_eq!(narrow_result.len(), 0, "hash-only pipeline should commit nothing without content hashes");
    assert_eq!(wide_result.len(), 2, "adding the name-match step should pick up both functions");

    let narrow_pairs: HashSet<_> = narrow_result.iter().map(|fp| (fp.primary, fp.secondary)).collect();
    let wide_pairs: HashSet<_> = wide_result.iter().map(|fp| (fp.primary, fp.secondary)).collect();
    assert!(narrow_pairs.is_subset(&wide_pairs));
}

/// Invariant 4 (Idempotence): re-running the function pipeline against an
/// already-fully-matched context adds nothing new.
#[test]
fn rerunning_the_function_pipeline_on_a_full_context_is_a_no_op() {
    let cache = InstructionCache::new();
    let mut primary = CallGraph::new(metadata("bin"));
    let mut secondary = CallGraph::new(metadata("bin"));
    primary.add_function(straight_line_function(&cache, "alpha", 0x1000, &[(0, 1)]));
    secondary.add_function(straight_line_function(&cache, "alpha", 0x1000, &[(0, 1)]));

    let config = MatchingConfig::default();
    let mut ctx = MatchingContext::new(&primary, &secondary);
    let steps = diffgraph_core::matching::registry::function_steps(&config.function_matching);

    driver::run_function_pipeline(&mut ctx, &steps, &CancellationFlag::new()).unwrap();
    assert_eq!(ctx.fixed_points().len(), 1);

    driver::run_function_pipeline(&mut ctx, &steps, &CancellationFlag::new()).unwrap();
    assert_eq!(ctx.fixed_points().len(), 1, "re-running against an already-matched context must not add or duplicate matches");
}
