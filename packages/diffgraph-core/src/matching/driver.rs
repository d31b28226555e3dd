//! Driver algorithm (spec §4.2): runs the function-level pipeline to its
//! fixed point, then fans out per confirmed `FixedPoint` to run the
//! basic-block pipeline, align instructions, score, and classify.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::classifier;
use crate::config::MatchingConfig;
use crate::context::{BasicBlockFixedPoint, FixedPoint, MatchingContext};
use crate::errors::{EngineError, Result};
use crate::lcs;
use crate::model::call_graph::CallGraph;
use crate::model::flow_graph::FlowGraph;
use crate::scoring;

use super::registry;
use super::step::{BasicBlockStep, BlockPipelineContext, FunctionPipelineContext, FunctionStep};

/// Cooperative cancellation checked between steps and between per-function
/// workers (spec §5 "Cancellation"). Cloning shares the same underlying
/// flag, so a caller can hold one handle and cancel a running comparison
/// from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs the function-level pipeline to a fixed point (spec §4.2 "Driver
/// algorithm" step 1): re-run every step in order as long as some step in a
/// full pass commits at least one new pair.
pub fn run_function_pipeline(
    ctx: &mut MatchingContext,
    steps: &[FunctionStep],
    cancel: &CancellationFlag,
) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let mut committed_any = false;
        for step in steps {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let pipeline_ctx = FunctionPipelineContext {
                primary: ctx.primary,
                secondary: ctx.secondary,
                matched_primary: ctx.matched_primary_set(),
                matched_secondary: ctx.matched_secondary_set(),
                matches_by_primary: ctx.matches_by_primary(),
                matches_by_secondary: ctx.matches_by_secondary(),
            };
            let mut candidates = match step.generate(&pipeline_ctx) {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(step = step.name(), error = %e, "function step failed, skipping");
                    continue;
                }
            };
            // Sort by (primary address, secondary address) so commit order
            // doesn't depend on container iteration order (spec §5
            // "Ordering guarantees").
            candidates.sort_by_key(|(p, s)| (ctx.primary.function(*p).entry_address, ctx.secondary.function(*s).entry_address));
            for (p, s) in candidates {
                if ctx.commit_function_pair(p, s, step.name()) {
                    committed_any = true;
                }
            }
        }
        if !committed_any {
            break;
        }
    }
    Ok(())
}

/// Runs the basic-block pipeline over one confirmed `FixedPoint`'s two flow
/// graphs to its own fixed point (spec §4.2 "Driver algorithm" step 2),
/// returning the committed `BasicBlockFixedPoint`s sorted by vertex pair.
pub fn run_block_pipeline(
    primary_fg: &FlowGraph,
    secondary_fg: &FlowGraph,
    steps: &[BasicBlockStep],
    cancel: &CancellationFlag,
) -> Result<BTreeSet<BasicBlockFixedPoint>> {
    let mut matched: BTreeSet<BasicBlockFixedPoint> = BTreeSet::new();
    let mut matched_primary: FxHashSet<_> = FxHashSet::default();
    let mut matched_secondary: FxHashSet<_> = FxHashSet::default();

    loop {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let mut committed_any = false;
        for step in steps {
            let pipeline_ctx = BlockPipelineContext {
                primary_fg,
                secondary_fg,
                matched_primary: &matched_primary,
                matched_secondary: &matched_secondary,
                matches: &matched,
            };
            let mut candidates = match step.generate(&pipeline_ctx) {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(step = step.name(), error = %e, "basic-block step failed, skipping");
                    continue;
                }
            };
            candidates.sort_by_key(|(p, s)| (p.index(), s.index()));
            for (p, s) in candidates {
                if matched_primary.contains(&p) || matched_secondary.contains(&s) {
                    continue;
                }
                matched_primary.insert(p);
                matched_secondary.insert(s);
                matched.insert(BasicBlockFixedPoint::new(p, s, step.name()));
                committed_any = true;
            }
        }
        if !committed_any {
            break;
        }
    }
    Ok(matched)
}

/// Step 3 (align) through step 5 (classify) of the driver algorithm, for
/// one `FixedPoint`. Runs entirely against data already owned by the
/// worker (spec §5: "each worker owns its own FixedPoint exclusively").
fn finish_fixed_point(
    fp: &mut FixedPoint,
    primary_fg: &FlowGraph,
    secondary_fg: &FlowGraph,
    primary_cg: &CallGraph,
    secondary_cg: &CallGraph,
    config: &MatchingConfig,
    block_steps: &[BasicBlockStep],
    cancel: &CancellationFlag,
) -> Result<()> {
    let blocks = run_block_pipeline(primary_fg, secondary_fg, block_steps, cancel)?;
    fp.basic_blocks = blocks
        .into_iter()
        .map(|bb| {
            let primary_instrs = primary_fg.block(bb.primary).instructions();
            let secondary_instrs = secondary_fg.block(bb.secondary).instructions();
            let instruction_matches = lcs::align(primary_instrs, secondary_instrs);
            BasicBlockFixedPoint {
                instruction_matches,
                ..bb
            }
        })
        .collect();

    match scoring::score(fp, primary_cg, secondary_cg, config) {
        Ok(()) => {}
        Err(e) => {
            tracing::warn!(primary = fp.primary_entry, error = %e, "scoring failed for fixed point");
            fp.similarity = 0.0;
            fp.confidence = 0.0;
            fp.flags |= crate::context::ChangeFlags::DIAGNOSTIC;
        }
    }
    classifier::classify(fp, primary_fg, secondary_fg);
    Ok(())
}

/// Runs the full driver algorithm end to end (spec §4.2): function
/// pipeline to its fixed point, then a trivially parallel fan-out (spec
/// §5) over confirmed `FixedPoint`s for basic-block matching, LCS
/// alignment, scoring, and classification. Returns the surviving
/// `FixedPoint`s (below-threshold ones dropped per `min_confidence` /
/// `min_similarity`), sorted by `(primary entry address, secondary entry
/// address)`.
pub fn run_comparison(
    ctx: &mut MatchingContext,
    config: &MatchingConfig,
    cancel: &CancellationFlag,
) -> Result<Vec<FixedPoint>> {
    let function_steps = registry::function_steps(&config.function_matching);
    let block_steps = registry::basic_block_steps(&config.basic_block_matching);

    run_function_pipeline(ctx, &function_steps, cancel)?;
    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let primary = ctx.primary;
    let secondary = ctx.secondary;
    let mut fixed_points = ctx.fixed_points_mut().to_vec();

    let results: Vec<Result<()>> = fixed_points
        .par_iter_mut()
        .map(|fp| {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let primary_fg = primary.function(fp.primary);
            let secondary_fg = secondary.function(fp.secondary);
            finish_fixed_point(fp, primary_fg, secondary_fg, primary, secondary, config, &block_steps, cancel)
        })
        .collect();
    for r in results {
        r?;
    }

    fixed_points.retain(|fp| fp.confidence >= config.min_confidence && fp.similarity >= config.min_similarity);
    fixed_points.sort();
    Ok(fixed_points)
}
