//! Call graphs: one per executable under comparison (spec §3).

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::flow_graph::FlowGraph;

/// A vertex identifier within a [`CallGraph`] — indexes into its flow graphs.
pub type FunctionVertex = NodeIndex<u32>;

#[derive(Debug, Clone)]
pub struct ExecutableMetadata {
    pub id: String,
    pub architecture: String,
    pub endianness: Endianness,
    pub hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// Directed graph of functions; edges are call sites (with multiplicity,
/// modeled as a parallel-edge-capable `DiGraph`).
#[derive(Debug)]
pub struct CallGraph {
    pub metadata: ExecutableMetadata,
    graph: DiGraph<FlowGraph, (), u32>,
    by_entry_address: HashMap<u64, FunctionVertex>,
}

impl CallGraph {
    pub fn new(metadata: ExecutableMetadata) -> Self {
        Self {
            metadata,
            graph: DiGraph::default(),
            by_entry_address: HashMap::new(),
        }
    }

    pub fn add_function(&mut self, flow_graph: FlowGraph) -> FunctionVertex {
        let entry = flow_graph.entry_address;
        let idx = self.graph.add_node(flow_graph);
        self.by_entry_address.insert(entry, idx);
        idx
    }

    /// Add a call edge. Call sites are modeled with multiplicity: calling
    /// `add_call` twice between the same two functions adds two parallel
    /// edges, matching the spec's "edges are call sites (with multiplicity)".
    pub fn add_call(&mut self, caller: FunctionVertex, callee: FunctionVertex) {
        self.graph.add_edge(caller, callee, ());
    }

    pub fn function(&self, v: FunctionVertex) -> &FlowGraph {
        &self.graph[v]
    }

    pub fn functions(&self) -> impl Iterator<Item = FunctionVertex> + '_ {
        self.graph.node_indices()
    }

    pub fn function_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn by_entry_address(&self, address: u64) -> Option<FunctionVertex> {
        self.by_entry_address.get(&address).copied()
    }

    pub fn callers(&self, v: FunctionVertex) -> impl Iterator<Item = FunctionVertex> + '_ {
        self.graph.neighbors_directed(v, Direction::Incoming)
    }

    /// Callees of `v`. Yields one entry per call site, so a function called
    /// twice from `v` appears twice here; [`Self::callee_set`] collapses
    /// that down to the distinct-callee set the call-graph-neighborhood
    /// step actually needs.
    pub fn callees(&self, v: FunctionVertex) -> impl Iterator<Item = FunctionVertex> + '_ {
        self.graph.neighbors_directed(v, Direction::Outgoing)
    }

    pub fn caller_set(&self, v: FunctionVertex) -> std::collections::HashSet<FunctionVertex> {
        self.callers(v).collect()
    }

    pub fn callee_set(&self, v: FunctionVertex) -> std::collections::HashSet<FunctionVertex> {
        self.callees(v).collect()
    }

    pub fn in_degree(&self, v: FunctionVertex) -> usize {
        self.graph.edges_directed(v, Direction::Incoming).count()
    }

    pub fn out_degree(&self, v: FunctionVertex) -> usize {
        self.graph.edges_directed(v, Direction::Outgoing).count()
    }
}
