//! Flow graphs: one per function (spec §3).
//!
//! Vertices are basic blocks, arena-indexed via `petgraph`'s `NodeIndex`
//! rather than bidirectional owning references — flow graphs reference
//! their owning call graph only by id, and call graph edges reference peer
//! flow graphs only by index, per the cyclic-ownership design note (spec §9).

use std::sync::OnceLock;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::basic_block::BasicBlock;

/// A vertex identifier within one [`FlowGraph`]. Stable for the lifetime of
/// the graph (no vertices are ever removed after construction).
pub type Vertex = NodeIndex<u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Unconditional,
    TrueBranch,
    FalseBranch,
    Switch,
    Call,
}

#[derive(Debug)]
pub struct FlowGraph {
    pub entry_address: u64,
    pub name: String,
    pub is_library: bool,
    pub is_stub: bool,
    graph: DiGraph<BasicBlock, EdgeKind, u32>,
    entry: Vertex,
    md_index: OnceLock<f64>,
    /// SHA-256 of normalized instruction bytes, if the loader supplied one
    /// (spec §4.1 "Hashing"; only used by the equality-by-hash step).
    pub content_hash: Option<[u8; 32]>,
    /// Demangled symbol name, if the loader could demangle `name` (used by
    /// the demangled-name-equality function step, distinct from the raw
    /// symbol name step).
    demangled_name: Option<String>,
    /// Literal string constants the function references, used by the
    /// string-references function step (spec §4.2).
    string_refs: Vec<String>,
}

impl FlowGraph {
    /// Builds a flow graph from blocks plus edges given as
    /// `(source_index, target_index, kind)` referencing positions in
    /// `blocks`. `entry_index` names the designated entry vertex.
    pub fn new(
        name: impl Into<String>,
        blocks: Vec<BasicBlock>,
        edges: Vec<(usize, usize, EdgeKind)>,
        entry_index: usize,
        is_library: bool,
        is_stub: bool,
        content_hash: Option<[u8; 32]>,
    ) -> Self {
        Self::with_metadata(name, blocks, edges, entry_index, is_library, is_stub, content_hash, None, Vec::new())
    }

    /// Full constructor, additionally carrying the demangled name and
    /// string-reference metadata consumed by the name- and string-based
    /// function steps (spec §4.2). [`Self::new`] delegates here with empty
    /// metadata for callers that don't care.
    #[allow(clippy::too_many_arguments)]
    pub fn with_metadata(
        name: impl Into<String>,
        blocks: Vec<BasicBlock>,
        edges: Vec<(usize, usize, EdgeKind)>,
        entry_index: usize,
        is_library: bool,
        is_stub: bool,
        content_hash: Option<[u8; 32]>,
        demangled_name: Option<String>,
        string_refs: Vec<String>,
    ) -> Self {
        assert!(!blocks.is_empty(), "a flow graph must have at least one basic block");
        let mut graph = DiGraph::<BasicBlock, EdgeKind, u32>::default();
        let mut indices = Vec::with_capacity(blocks.len());
        for block in blocks {
            indices.push(graph.add_node(block));
        }
        for (src, dst, kind) in edges {
            graph.add_edge(indices[src], indices[dst], kind);
        }
        let entry = indices[entry_index];
        let entry_address = graph[entry].entry_address();
        Self {
            entry_address,
            name: name.into(),
            is_library,
            is_stub,
            graph,
            entry,
            md_index: OnceLock::new(),
            content_hash,
            demangled_name,
            string_refs,
        }
    }

    pub fn demangled_name(&self) -> Option<&str> {
        self.demangled_name.as_deref()
    }

    pub fn string_refs(&self) -> &[String] {
        &self.string_refs
    }

    /// Whether `name` looks like a disassembler-generated placeholder
    /// (`sub_401000`, `loc_10002ab0`, ...) rather than a real symbol — the
    /// symbol-name-equality step only fires on non-auto-generated names
    /// (spec §4.2).
    pub fn is_auto_generated_name(&self) -> bool {
        is_auto_generated_name(&self.name)
    }

    pub fn entry(&self) -> Vertex {
        self.entry
    }

    pub fn block(&self, v: Vertex) -> &BasicBlock {
        &self.graph[v]
    }

    pub fn vertices(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.graph.node_indices()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn instruction_count(&self) -> usize {
        self.graph.node_weights().map(|b| b.len()).sum()
    }

    pub fn predecessors(&self, v: Vertex) -> impl Iterator<Item = Vertex> + '_ {
        self.graph.neighbors_directed(v, Direction::Incoming)
    }

    pub fn successors(&self, v: Vertex) -> impl Iterator<Item = Vertex> + '_ {
        self.graph.neighbors_directed(v, Direction::Outgoing)
    }

    pub fn in_degree(&self, v: Vertex) -> usize {
        self.graph.edges_directed(v, Direction::Incoming).count()
    }

    pub fn out_degree(&self, v: Vertex) -> usize {
        self.graph.edges_directed(v, Direction::Outgoing).count()
    }

    pub fn edges(&self) -> impl Iterator<Item = (Vertex, Vertex, EdgeKind)> + '_ {
        self.graph
            .edge_indices()
            .map(|e| {
                let (s, t) = self.graph.edge_endpoints(e).unwrap();
                (s, t, self.graph[e])
            })
    }

    pub fn edge_kind(&self, src: Vertex, dst: Vertex) -> Option<EdgeKind> {
        self.graph.find_edge(src, dst).map(|e| self.graph[e])
    }

    /// Number of back-edges into an already-BFS-visited ancestor — used as
    /// the engine's loop count (spec §4.4 "Loop count ratio").
    pub fn loop_count(&self) -> usize {
        let levels = crate::fingerprint::bfs_levels(self);
        self.edges()
            .filter(|(u, v, _)| match (levels.get(u), levels.get(v)) {
                (Some(lu), Some(lv)) => lv <= lu,
                _ => false,
            })
            .count()
    }

    /// The function-level MD-index (spec §4.1), computed once and cached.
    pub fn md_index(&self) -> f64 {
        *self.md_index.get_or_init(|| crate::fingerprint::md_index(self))
    }

    /// Aggregate prime product over every instruction in the function,
    /// independent of block order (commutative, like the per-block one).
    pub fn prime_product(&self) -> u64 {
        self.graph
            .node_weights()
            .fold(1u64, |acc, block| acc.wrapping_mul(block.prime_product()))
    }
}

/// `sub_401000`, `loc_10002ab0`, `j_CreateFileW`, ... — the prefixes IDA and
/// similar disassemblers use for placeholder names when no real symbol is
/// available.
const AUTO_NAME_PREFIXES: &[&str] = &["sub_", "loc_", "fun_", "func_", "j_", "nullsub_", "unknown_"];

pub fn is_auto_generated_name(name: &str) -> bool {
    AUTO_NAME_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::instruction::InstructionCache;

    fn single_instr_block(cache: &InstructionCache, addr: u64) -> BasicBlock {
        BasicBlock::new(vec![crate::model::instruction::Instruction::new(cache, addr, "nop", "")])
    }

    #[test]
    fn degrees_and_entry_are_consistent() {
        let cache = InstructionCache::new();
        let b0 = single_instr_block(&cache, 0x100);
        let b1 = single_instr_block(&cache, 0x110);
        let b2 = single_instr_block(&cache, 0x120);
        let fg = FlowGraph::new(
            "f",
            vec![b0, b1, b2],
            vec![
                (0, 1, EdgeKind::TrueBranch),
                (0, 2, EdgeKind::FalseBranch),
                (1, 2, EdgeKind::Unconditional),
            ],
            0,
            false,
            false,
            None,
        );
        assert_eq!(fg.entry_address, 0x100);
        assert_eq!(fg.out_degree(fg.entry()), 2);
        assert_eq!(fg.vertex_count(), 3);
        assert_eq!(fg.edge_count(), 3);
    }
}
