//! Order-invariant structural fingerprints (spec §4.1).
//!
//! Two derived quantities drive most matching steps: the basic block's
//! prime product (see [`crate::model::basic_block`]) and the flow graph's
//! MD-index, computed here. Both must be deterministic and independent of
//! vertex enumeration order, since the loader is free to hand back vertices
//! in whatever order its own internal arena used.

use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

use crate::model::call_graph::{CallGraph, FunctionVertex};
use crate::model::flow_graph::{FlowGraph, Vertex};

/// Float comparisons against an MD-index must use this tolerance rather than
/// direct equality (spec §9 "Float semantics").
pub const EPSILON: f64 = 1e-9;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}

/// Small prime weights for the MD-index edge contribution formula. The
/// exact values are an Open Question the original leaves to configuration
/// (spec §9(a)); these defaults are fixed here and recorded in DESIGN.md.
pub struct MdIndexWeights {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
}

pub const DEFAULT_WEIGHTS: MdIndexWeights = MdIndexWeights {
    a: 2.0,
    b: 3.0,
    c: 5.0,
    d: 7.0,
    e: 11.0,
};

/// BFS topological level of every vertex reachable from the flow graph's
/// entry, keyed by vertex. Unreachable vertices (spec §3: "every other
/// vertex is reachable from it unless marked unreachable") are simply
/// absent from the map.
pub fn bfs_levels(fg: &FlowGraph) -> FxHashMap<Vertex, usize> {
    let mut levels = FxHashMap::default();
    let mut queue = VecDeque::new();
    levels.insert(fg.entry(), 0usize);
    queue.push_back(fg.entry());
    while let Some(v) = queue.pop_front() {
        let level = levels[&v];
        for succ in fg.successors(v) {
            if !levels.contains_key(&succ) {
                levels.insert(succ, level + 1);
                queue.push_back(succ);
            }
        }
    }
    levels
}

/// The MD-index of a single flow graph (spec §4.1). Sum, over every edge
/// `(u, v)`, of `1 / sqrt(level(u) + in(u)*a + out(u)*b + in(v)*c + out(v)*d + topo(v)*e)`.
///
/// `level` and `topo` are the same BFS-from-entry depth function; the
/// formula names them separately because the original weights a vertex's
/// own depth (`level(u)`) and its successor's depth (`topo(v)`) with
/// different roles in the sum.
pub fn md_index_with_weights(fg: &FlowGraph, weights: &MdIndexWeights) -> f64 {
    let levels = bfs_levels(fg);
    let mut sum = 0.0;
    for (u, v, _kind) in fg.edges() {
        let level_u = *levels.get(&u).unwrap_or(&0) as f64;
        let topo_v = *levels.get(&v).unwrap_or(&0) as f64;
        let in_u = fg.in_degree(u) as f64;
        let out_u = fg.out_degree(u) as f64;
        let in_v = fg.in_degree(v) as f64;
        let out_v = fg.out_degree(v) as f64;
        let denom = level_u + in_u * weights.a + out_u * weights.b + in_v * weights.c + out_v * weights.d + topo_v * weights.e;
        if denom > 0.0 {
            sum += 1.0 / denom.sqrt();
        }
    }
    sum
}

pub fn md_index(fg: &FlowGraph) -> f64 {
    md_index_with_weights(fg, &DEFAULT_WEIGHTS)
}

/// Edges-only MD-index: same formula as [`md_index`] but skipping back
/// edges (`topo(v) <= level(u)`), so loop unrolling or a changed
/// back-edge count doesn't perturb it — used by the loop-invariant
/// function step distinct from the plain, loop-sensitive MD-index (spec
/// §4.2 "By edges-only MD-index (loop-invariant)").
pub fn md_index_acyclic(fg: &FlowGraph) -> f64 {
    let levels = bfs_levels(fg);
    let mut sum = 0.0;
    for (u, v, _kind) in fg.edges() {
        let level_u = *levels.get(&u).unwrap_or(&0) as f64;
        let topo_v = *levels.get(&v).unwrap_or(&0) as f64;
        if topo_v <= level_u {
            continue;
        }
        let in_u = fg.in_degree(u) as f64;
        let out_u = fg.out_degree(u) as f64;
        let in_v = fg.in_degree(v) as f64;
        let out_v = fg.out_degree(v) as f64;
        let denom = level_u
            + in_u * DEFAULT_WEIGHTS.a
            + out_u * DEFAULT_WEIGHTS.b
            + in_v * DEFAULT_WEIGHTS.c
            + out_v * DEFAULT_WEIGHTS.d
            + topo_v * DEFAULT_WEIGHTS.e;
        if denom > 0.0 {
            sum += 1.0 / denom.sqrt();
        }
    }
    sum
}

/// Quantize a float to an integer bucket key within [`EPSILON`] tolerance,
/// so `HashMap`-based bucketing (spec §4.2 "uniqueness rule") can group
/// values that compare equal under [`approx_eq`] without a pairwise scan.
pub fn quantize(x: f64) -> i64 {
    (x / EPSILON).round() as i64
}

/// Call-graph-extended MD-index: the flow graph's own MD-index plus a
/// contribution from each immediate callee's call-graph degree signature.
/// This is the "including immediate callees' entry signatures" variant
/// named in spec §4.1; the exact per-callee contribution is an Open
/// Question the original leaves unspecified beyond "extended with callee
/// signatures" — resolved here as `1 / sqrt(in_degree + out_degree + 1)`
/// per callee, recorded in DESIGN.md.
pub fn call_graph_extended_md_index(call_graph: &CallGraph, v: FunctionVertex) -> f64 {
    let own = call_graph.function(v).md_index();
    let callee_contribution: f64 = call_graph
        .callees(v)
        .map(|callee| {
            let in_deg = call_graph.in_degree(callee) as f64;
            let out_deg = call_graph.out_degree(callee) as f64;
            1.0 / (in_deg + out_deg + 1.0).sqrt()
        })
        .sum();
    own + callee_contribution
}

/// SHA-256 over the concatenation of a function's normalized instruction
/// bytes — `(mnemonic, operands)` pairs in block-then-instruction order,
/// addresses excluded so relocations don't perturb the hash. Only used by
/// the equality-by-hash step (spec §4.1 "Hashing").
pub fn function_hash(fg: &FlowGraph) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for v in fg.vertices() {
        for instr in fg.block(v).instructions() {
            hasher.update(instr.mnemonic().as_bytes());
            hasher.update([0]);
            hasher.update(instr.operand_string().as_bytes());
            hasher.update([0]);
        }
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::basic_block::BasicBlock;
    use crate::model::flow_graph::EdgeKind;
    use crate::model::instruction::{Instruction, InstructionCache};

    fn block(cache: &InstructionCache, addr: u64) -> BasicBlock {
        BasicBlock::new(vec![Instruction::new(cache, addr, "nop", "")])
    }

    fn diamond(cache: &InstructionCache) -> FlowGraph {
        FlowGraph::new(
            "f",
            vec![block(cache, 0x0), block(cache, 0x10), block(cache, 0x20), block(cache, 0x30)],
            vec![
                (0, 1, EdgeKind::TrueBranch),
                (0, 2, EdgeKind::FalseBranch),
                (1, 3, EdgeKind::Unconditional),
                (2, 3, EdgeKind::Unconditional),
            ],
            0,
            false,
            false,
            None,
        )
    }

    #[test]
    fn isomorphic_graphs_have_equal_md_index() {
        let cache1 = InstructionCache::new();
        let cache2 = InstructionCache::new();
        let g1 = diamond(&cache1);
        // Same shape, different addresses/vertex insertion order equivalent relabeling
        let g2 = diamond(&cache2);
        assert!(approx_eq(md_index(&g1), md_index(&g2)));
    }

    #[test]
    fn md_index_is_order_invariant_under_relabeling() {
        let cache = InstructionCache::new();
        // Build the same diamond but insert the two middle blocks in the opposite order.
        let fg_a = FlowGraph::new(
            "f",
            vec![block(&cache, 0x0), block(&cache, 0x10), block(&cache, 0x20), block(&cache, 0x30)],
            vec![(0, 1, EdgeKind::TrueBranch), (0, 2, EdgeKind::FalseBranch), (1, 3, EdgeKind::Unconditional), (2, 3, EdgeKind::Unconditional)],
            0,
            false,
            false,
            None,
        );
        let fg_b = FlowGraph::new(
            "f",
            vec![block(&cache, 0x0), block(&cache, 0x20), block(&cache, 0x10), block(&cache, 0x30)],
            vec![(0, 2, EdgeKind::TrueBranch), (0, 1, EdgeKind::FalseBranch), (2, 3, EdgeKind::Unconditional), (1, 3, EdgeKind::Unconditional)],
            0,
            false,
            false,
            None,
        );
        assert!(approx_eq(md_index(&fg_a), md_index(&fg_b)));
    }

    #[test]
    fn function_hash_is_deterministic_and_order_sensitive() {
        let cache = InstructionCache::new();
        let g1 = diamond(&cache);
        let g2 = diamond(&cache);
        assert_eq!(function_hash(&g1), function_hash(&g2));
    }
}
