//! Public entry point (spec §6 "External interfaces"): validates a
//! `MatchingConfig`, builds a fresh `MatchingContext` for one primary/
//! secondary call graph pair, and runs the driver algorithm end to end.

use std::path::Path;

use crate::config::MatchingConfig;
use crate::context::{FixedPoint, MatchingContext};
use crate::errors::Result;
use crate::matching::driver::{self, CancellationFlag};
use crate::model::call_graph::CallGraph;
use crate::model::instruction::InstructionCache;

/// Abstract loader port (spec §6 "Interface to the loader"): given a path
/// to an exported binary, returns a populated `CallGraph` and the
/// `InstructionCache` its instructions were interned against. Binary
/// loading from the disassembler's export format is an external
/// collaborator — out of scope for this crate (spec §1) — so no
/// implementation is provided here, only the seam a loader plugs into.
pub trait ExecutableFactory {
    fn load(&self, path: &Path) -> Result<(CallGraph, InstructionCache)>;
}

/// Writer-side port (spec §6 `[AMBIENT]`): a sink for confirmed
/// `FixedPoint`s, called once per match in sorted order as the driver
/// produces them, plus a `finish` hook for anything buffered. Object-safe
/// so a caller can box whichever concrete adapter it picked (e.g.
/// `diffgraph_storage::JsonLinesWriter`) without this crate depending on
/// it.
pub trait FixedPointWriter: Send + Sync {
    fn write_fixed_point(&self, fp: &FixedPoint) -> Result<()>;
    fn finish(&self) -> Result<()>;
}

/// One pairwise comparison run (spec §2 "Data flow").
pub struct Comparison<'a> {
    pub primary: &'a CallGraph,
    pub secondary: &'a CallGraph,
    pub config: MatchingConfig,
}

impl<'a> Comparison<'a> {
    pub fn new(primary: &'a CallGraph, secondary: &'a CallGraph, config: MatchingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { primary, secondary, config })
    }

    /// Runs the full pipeline (spec §4.2 "Driver algorithm") and returns
    /// the surviving `FixedPoint`s, sorted by `(primary entry address,
    /// secondary entry address)`.
    pub fn run(&self, cancel: &CancellationFlag) -> Result<Vec<FixedPoint>> {
        tracing::info!(
            primary_functions = self.primary.function_count(),
            secondary_functions = self.secondary.function_count(),
            "starting comparison"
        );
        let mut ctx = MatchingContext::new(self.primary, self.secondary);
        let result = driver::run_comparison(&mut ctx, &self.config, cancel);
        match &result {
            Ok(fixed_points) => tracing::info!(matched = fixed_points.len(), "comparison finished"),
            Err(e) => tracing::warn!(error = %e, "comparison aborted"),
        }
        result
    }
}
