//! Step polymorphism (spec §9 "Step polymorphism"): each step is a variant
//! of a sum type rather than a subclass, dispatched through one small
//! trait so the driver loop (spec §4.2 "Driver algorithm") is written once
//! and reused for both the function-level and basic-block-level pipelines.
//!
//! Step identity is "by pointer equality" in the original (spec §9 "Step
//! identity by pointer equality"); safe Rust approximates this with a
//! canonical `&'static str` returned by [`FunctionStep::name`] /
//! [`BasicBlockStep::name`] — equality is still O(1) on an interned,
//! deduplicated string, just not a true pointer compare.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::context::BasicBlockFixedPoint;
use crate::errors::Result;
use crate::model::call_graph::{CallGraph, FunctionVertex};
use crate::model::flow_graph::{FlowGraph, Vertex};

use super::{basic_block_steps, function_steps};

/// Read-only view the driver hands each function-level step on every pass
/// (spec §4.2: "a pure function from (context, currently-unmatched-primary,
/// currently-unmatched-secondary) to a set of candidate pairs").
pub struct FunctionPipelineContext<'a> {
    pub primary: &'a CallGraph,
    pub secondary: &'a CallGraph,
    pub matched_primary: FxHashSet<FunctionVertex>,
    pub matched_secondary: FxHashSet<FunctionVertex>,
    pub matches_by_primary: FxHashMap<FunctionVertex, FunctionVertex>,
    pub matches_by_secondary: FxHashMap<FunctionVertex, FunctionVertex>,
}

impl<'a> FunctionPipelineContext<'a> {
    pub fn unmatched_primary(&self) -> impl Iterator<Item = FunctionVertex> + '_ {
        self.primary.functions().filter(move |v| !self.matched_primary.contains(v))
    }

    pub fn unmatched_secondary(&self) -> impl Iterator<Item = FunctionVertex> + '_ {
        self.secondary.functions().filter(move |v| !self.matched_secondary.contains(v))
    }
}

/// Read-only view the driver hands each basic-block-level step on every
/// pass, scoped to the two flow graphs of one confirmed `FixedPoint`.
pub struct BlockPipelineContext<'a> {
    pub primary_fg: &'a FlowGraph,
    pub secondary_fg: &'a FlowGraph,
    pub matched_primary: &'a FxHashSet<Vertex>,
    pub matched_secondary: &'a FxHashSet<Vertex>,
    pub matches: &'a BTreeSet<BasicBlockFixedPoint>,
}

impl<'a> BlockPipelineContext<'a> {
    pub fn unmatched_primary(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.primary_fg.vertices().filter(move |v| !self.matched_primary.contains(v))
    }

    pub fn unmatched_secondary(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.secondary_fg.vertices().filter(move |v| !self.matched_secondary.contains(v))
    }
}

/// One function-level matching heuristic (spec §4.2, canonical order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionStep {
    HashEquality,
    MdIndexCallGraphExtended,
    MdIndexPlain,
    InstructionAndBlockCount,
    SymbolNameEquality,
    DemangledNameEquality,
    EdgeMdIndexLoopInvariant,
    AddressEquality,
    CallGraphNeighborhood,
    StringReferences,
    LoopHead,
}

impl FunctionStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HashEquality => "functionHashMatch",
            Self::MdIndexCallGraphExtended => "functionMdIndexCgMatch",
            Self::MdIndexPlain => "functionMdIndexMatch",
            Self::InstructionAndBlockCount => "functionInstrCountMatch",
            Self::SymbolNameEquality => "functionNameMatch",
            Self::DemangledNameEquality => "functionDemangledNameMatch",
            Self::EdgeMdIndexLoopInvariant => "functionEdgeMdIndexMatch",
            Self::AddressEquality => "functionAddressMatch",
            Self::CallGraphNeighborhood => "functionCallGraphNeighborMatch",
            Self::StringReferences => "functionStringRefsMatch",
            Self::LoopHead => "functionLoopHeadMatch",
        }
    }

    pub fn generate(&self, ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
        match self {
            Self::HashEquality => function_steps::hash_equality(ctx),
            Self::MdIndexCallGraphExtended => function_steps::md_index_call_graph_extended(ctx),
            Self::MdIndexPlain => function_steps::md_index_plain(ctx),
            Self::InstructionAndBlockCount => function_steps::instruction_and_block_count(ctx),
            Self::SymbolNameEquality => function_steps::symbol_name_equality(ctx),
            Self::DemangledNameEquality => function_steps::demangled_name_equality(ctx),
            Self::EdgeMdIndexLoopInvariant => function_steps::edge_md_index_loop_invariant(ctx),
            Self::AddressEquality => function_steps::address_equality(ctx),
            Self::CallGraphNeighborhood => function_steps::call_graph_neighborhood(ctx),
            Self::StringReferences => function_steps::string_references(ctx),
            Self::LoopHead => function_steps::loop_head(ctx),
        }
    }
}

/// One basic-block-level matching heuristic (spec §4.2, canonical order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicBlockStep {
    EntryPairing,
    PrimeProductEquality,
    LocalSignatureEquality,
    NeighborInstructionCount,
    EdgePropagation,
    SelfLoopPreservation,
}

impl BasicBlockStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EntryPairing => "blockEntryMatch",
            Self::PrimeProductEquality => "blockPrimeProductMatch",
            Self::LocalSignatureEquality => "blockMdIndexMatch",
            Self::NeighborInstructionCount => "blockNeighborInstrCountMatch",
            Self::EdgePropagation => "blockEdgePropagationMatch",
            Self::SelfLoopPreservation => "blockSelfLoopMatch",
        }
    }

    pub fn generate(&self, ctx: &BlockPipelineContext) -> Result<Vec<(Vertex, Vertex)>> {
        match self {
            Self::EntryPairing => basic_block_steps::entry_pairing(ctx),
            Self::PrimeProductEquality => basic_block_steps::prime_product_equality(ctx),
            Self::LocalSignatureEquality => basic_block_steps::local_signature_equality(ctx),
            Self::NeighborInstructionCount => basic_block_steps::neighbor_instruction_count(ctx),
            Self::EdgePropagation => basic_block_steps::edge_propagation(ctx),
            Self::SelfLoopPreservation => basic_block_steps::self_loop_preservation(ctx),
        }
    }
}
