//! Matching Context (spec §3, §4.2): the shared state of all confirmed
//! matches, plus the `FixedPoint` / `BasicBlockFixedPoint` value types that
//! record a confirmed correspondence at the function and basic-block level.

use std::collections::BTreeSet;

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::lcs::InstructionMatch;
use crate::model::call_graph::{CallGraph, FunctionVertex};
use crate::model::flow_graph::Vertex;

bitflags! {
    /// Change-flag bitset set by the Change Classifier (spec §4.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangeFlags: u32 {
        /// Unmatched basic blocks exist on either side.
        const STRUCTURAL  = 1 << 0;
        /// Some matched basic block has unmatched instructions.
        const INSTRUCTIONS = 1 << 1;
        /// Some matched instruction pair has equal primes but unequal operands.
        const OPERANDS    = 1 << 2;
        /// Some matched basic block pair has non-isomorphic outgoing edge labels.
        const BRANCHES    = 1 << 3;
        /// The two function entries are not matched to each other.
        const ENTRYPOINT  = 1 << 4;
        /// Loop count differs between primary and secondary.
        const LOOPS       = 1 << 5;
        /// Non-auto-generated names differ.
        const NAME        = 1 << 6;
        /// Set by the driver when scoring this `FixedPoint` failed (spec §7
        /// `ScoringWarning`); similarity and confidence are forced to 0.
        const DIAGNOSTIC  = 1 << 7;
    }
}

/// A confirmed pairing of one primary basic block with one secondary basic
/// block (spec §3). Ordering and equality follow the original's
/// `operator<`/`operator==`: purely by `(primary vertex, secondary vertex)`,
/// so a `BTreeSet<BasicBlockFixedPoint>` holds at most one entry per pair
/// regardless of which step produced it or how its instruction matches are
/// later filled in.
#[derive(Debug, Clone)]
pub struct BasicBlockFixedPoint {
    pub primary: Vertex,
    pub secondary: Vertex,
    pub step: &'static str,
    pub instruction_matches: Vec<InstructionMatch>,
}

impl BasicBlockFixedPoint {
    pub fn new(primary: Vertex, secondary: Vertex, step: &'static str) -> Self {
        Self {
            primary,
            secondary,
            step,
            instruction_matches: Vec::new(),
        }
    }

    fn key(&self) -> (u32, u32) {
        (self.primary.index() as u32, self.secondary.index() as u32)
    }
}

impl PartialEq for BasicBlockFixedPoint {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for BasicBlockFixedPoint {}

impl PartialOrd for BasicBlockFixedPoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for BasicBlockFixedPoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

/// A confirmed pairing of one primary function with one secondary function
/// (spec §3). Ordering and equality are by `(primary entry address,
/// secondary entry address)`, matching the original's `operator<`.
#[derive(Debug, Clone)]
pub struct FixedPoint {
    pub primary: FunctionVertex,
    pub secondary: FunctionVertex,
    pub primary_entry: u64,
    pub secondary_entry: u64,
    pub step: &'static str,
    pub basic_blocks: BTreeSet<BasicBlockFixedPoint>,
    pub similarity: f64,
    pub confidence: f64,
    pub flags: ChangeFlags,
    pub comments_ported: bool,
}

impl FixedPoint {
    pub fn new(
        primary: FunctionVertex,
        secondary: FunctionVertex,
        primary_entry: u64,
        secondary_entry: u64,
        step: &'static str,
    ) -> Self {
        Self {
            primary,
            secondary,
            primary_entry,
            secondary_entry,
            step,
            basic_blocks: BTreeSet::new(),
            similarity: 0.0,
            confidence: 0.0,
            flags: ChangeFlags::empty(),
            comments_ported: false,
        }
    }

    fn key(&self) -> (u64, u64) {
        (self.primary_entry, self.secondary_entry)
    }
}

impl PartialEq for FixedPoint {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for FixedPoint {}

impl PartialOrd for FixedPoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for FixedPoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

/// Shared state of all confirmed function matches (spec §3). Single-writer
/// during the function-level pipeline (spec §5): steps are pure readers,
/// only the driver calls [`MatchingContext::commit_function_pair`].
pub struct MatchingContext<'a> {
    pub primary: &'a CallGraph,
    pub secondary: &'a CallGraph,
    fixed_points: Vec<FixedPoint>,
    by_primary: FxHashMap<FunctionVertex, usize>,
    by_secondary: FxHashMap<FunctionVertex, usize>,
}

impl<'a> MatchingContext<'a> {
    pub fn new(primary: &'a CallGraph, secondary: &'a CallGraph) -> Self {
        Self {
            primary,
            secondary,
            fixed_points: Vec::new(),
            by_primary: FxHashMap::default(),
            by_secondary: FxHashMap::default(),
        }
    }

    pub fn is_primary_matched(&self, v: FunctionVertex) -> bool {
        self.by_primary.contains_key(&v)
    }

    pub fn is_secondary_matched(&self, v: FunctionVertex) -> bool {
        self.by_secondary.contains_key(&v)
    }

    pub fn matched_primary_secondary(&self, v: FunctionVertex) -> Option<FunctionVertex> {
        self.by_primary.get(&v).map(|&idx| self.fixed_points[idx].secondary)
    }

    pub fn unmatched_primary(&self) -> impl Iterator<Item = FunctionVertex> + '_ {
        self.primary.functions().filter(move |v| !self.is_primary_matched(*v))
    }

    pub fn unmatched_secondary(&self) -> impl Iterator<Item = FunctionVertex> + '_ {
        self.secondary.functions().filter(move |v| !self.is_secondary_matched(*v))
    }

    pub fn matched_primary_set(&self) -> FxHashSet<FunctionVertex> {
        self.by_primary.keys().copied().collect()
    }

    pub fn matched_secondary_set(&self) -> FxHashSet<FunctionVertex> {
        self.by_secondary.keys().copied().collect()
    }

    pub fn matches_by_primary(&self) -> FxHashMap<FunctionVertex, FunctionVertex> {
        self.by_primary
            .iter()
            .map(|(&p, &idx)| (p, self.fixed_points[idx].secondary))
            .collect()
    }

    pub fn matches_by_secondary(&self) -> FxHashMap<FunctionVertex, FunctionVertex> {
        self.by_secondary
            .iter()
            .map(|(&s, &idx)| (s, self.fixed_points[idx].primary))
            .collect()
    }

    /// Attempt to commit a function-level candidate under the conflict-free
    /// rule (spec §4.2 rule 1): if either endpoint is already matched, the
    /// candidate is dropped and `false` is returned. The producing step's
    /// name is attached and never overwritten afterwards (rule 3).
    pub fn commit_function_pair(&mut self, primary: FunctionVertex, secondary: FunctionVertex, step: &'static str) -> bool {
        if self.is_primary_matched(primary) || self.is_secondary_matched(secondary) {
            return false;
        }
        let primary_entry = self.primary.function(primary).entry_address;
        let secondary_entry = self.secondary.function(secondary).entry_address;
        let fp = FixedPoint::new(primary, secondary, primary_entry, secondary_entry, step);
        let idx = self.fixed_points.len();
        self.fixed_points.push(fp);
        self.by_primary.insert(primary, idx);
        self.by_secondary.insert(secondary, idx);
        true
    }

    pub fn fixed_points(&self) -> &[FixedPoint] {
        &self.fixed_points
    }

    pub fn fixed_points_mut(&mut self) -> &mut [FixedPoint] {
        &mut self.fixed_points
    }

    pub fn into_fixed_points(self) -> Vec<FixedPoint> {
        self.fixed_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_flags_combine() {
        let flags = ChangeFlags::STRUCTURAL | ChangeFlags::NAME;
        assert!(flags.contains(ChangeFlags::STRUCTURAL));
        assert!(flags.contains(ChangeFlags::NAME));
        assert!(!flags.contains(ChangeFlags::OPERANDS));
    }

    #[test]
    fn basic_block_fixed_point_orders_by_vertex_pair_only() {
        use petgraph::graph::NodeIndex;
        let a = BasicBlockFixedPoint::new(NodeIndex::new(0), NodeIndex::new(1), "entryBlockMatch");
        let mut b = BasicBlockFixedPoint::new(NodeIndex::new(0), NodeIndex::new(1), "blockPrimeProductMatch");
        b.instruction_matches.push(InstructionMatch { primary_index: 0, secondary_index: 0 });
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), std::cmp::Ordering::Equal);
    }
}
