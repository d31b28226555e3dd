//! Scoring (spec §4.4): similarity as a weighted sum of ten features, each
//! normalized to [0,1]; confidence as a lookup on the producing step alone.

use rustc_hash::FxHashMap;

use crate::config::MatchingConfig;
use crate::context::FixedPoint;
use crate::errors::{EngineError, Result};
use crate::fingerprint::{call_graph_extended_md_index, EPSILON};
use crate::model::call_graph::CallGraph;
use crate::model::flow_graph::{is_auto_generated_name, FlowGraph, Vertex};

fn ratio(matched: usize, max: usize) -> f64 {
    if max == 0 {
        1.0
    } else {
        matched as f64 / max as f64
    }
}

fn clip01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

fn md_index_similarity(a: f64, b: f64) -> f64 {
    let denom = a.abs().max(b.abs());
    if denom < EPSILON {
        return 1.0;
    }
    1.0 - clip01((a - b).abs() / denom)
}

/// Frequency-weighted Jaccard-style overlap between two instruction
/// multisets' primes (spec §4.4 "Prime product equality": "1 if equal else
/// ratio of intersecting prime multisets").
fn prime_multiset_overlap(primary_fg: &FlowGraph, secondary_fg: &FlowGraph) -> f64 {
    if primary_fg.prime_product() == secondary_fg.prime_product() {
        return 1.0;
    }
    let mut primary_counts: FxHashMap<u64, usize> = FxHashMap::default();
    let mut total_primary = 0usize;
    for v in primary_fg.vertices() {
        for instr in primary_fg.block(v).instructions() {
            *primary_counts.entry(instr.prime()).or_insert(0) += 1;
            total_primary += 1;
        }
    }
    let mut secondary_counts: FxHashMap<u64, usize> = FxHashMap::default();
    let mut total_secondary = 0usize;
    for v in secondary_fg.vertices() {
        for instr in secondary_fg.block(v).instructions() {
            *secondary_counts.entry(instr.prime()).or_insert(0) += 1;
            total_secondary += 1;
        }
    }
    let intersection: usize = primary_counts
        .iter()
        .map(|(prime, &count)| count.min(*secondary_counts.get(prime).unwrap_or(&0)))
        .sum();
    let max_total = total_primary.max(total_secondary);
    if max_total == 0 {
        1.0
    } else {
        intersection as f64 / max_total as f64
    }
}

fn name_equality(primary_fg: &FlowGraph, secondary_fg: &FlowGraph) -> f64 {
    let primary_auto = is_auto_generated_name(&primary_fg.name);
    let secondary_auto = is_auto_generated_name(&secondary_fg.name);
    if !primary_auto && !secondary_auto {
        if primary_fg.name == secondary_fg.name {
            1.0
        } else {
            0.0
        }
    } else if primary_auto != secondary_auto {
        0.5
    } else {
        0.0
    }
}

/// Computes `similarity` (spec §4.4 table) and looks up `confidence` from
/// the producing step's entry in `config.step_confidence`. Mutates `fp` in
/// place; on an internal failure (spec §7 `ScoringWarning`, e.g. division
/// by zero on a malformed graph) returns `Err` so the driver can mark the
/// `FixedPoint` with similarity = confidence = 0 and a diagnostic flag
/// instead of aborting the run.
///
/// Takes the two call graphs (rather than just the matched flow graph
/// pair) because the call-graph-extended MD-index feature needs to walk
/// callees, which only the call graph can resolve.
pub fn score(fp: &mut FixedPoint, primary_cg: &CallGraph, secondary_cg: &CallGraph, config: &MatchingConfig) -> Result<()> {
    let primary_fg = primary_cg.function(fp.primary);
    let secondary_fg = secondary_cg.function(fp.secondary);

    if primary_fg.vertex_count() == 0 || secondary_fg.vertex_count() == 0 {
        return Err(EngineError::ScoringWarning {
            function: fp.primary_entry,
            detail: "flow graph has no basic blocks".into(),
        });
    }

    let weights = &config.similarity_weights;

    let bb_ratio = ratio(fp.basic_blocks.len(), primary_fg.vertex_count().max(secondary_fg.vertex_count()));

    let instr_matched: usize = fp.basic_blocks.iter().map(|bb| bb.instruction_matches.len()).sum();
    let instr_ratio = ratio(instr_matched, primary_fg.instruction_count().max(secondary_fg.instruction_count()));

    let secondary_for: FxHashMap<Vertex, Vertex> = fp.basic_blocks.iter().map(|bb| (bb.primary, bb.secondary)).collect();
    let edges_matched = primary_fg
        .edges()
        .filter(|(u, v, _)| match (secondary_for.get(u), secondary_for.get(v)) {
            (Some(&su), Some(&sv)) => secondary_fg.edge_kind(su, sv).is_some(),
            _ => false,
        })
        .count();
    let edges_ratio = ratio(edges_matched, primary_fg.edge_count().max(secondary_fg.edge_count()));

    let md_sim = md_index_similarity(primary_fg.md_index(), secondary_fg.md_index());

    let cg_md_sim = md_index_similarity(
        call_graph_extended_md_index(primary_cg, fp.primary),
        call_graph_extended_md_index(secondary_cg, fp.secondary),
    );

    let prime_product_score = prime_multiset_overlap(primary_fg, secondary_fg);

    let size_ratio = ratio(
        primary_fg.instruction_count().min(secondary_fg.instruction_count()),
        primary_fg.instruction_count().max(secondary_fg.instruction_count()),
    );

    let loop_ratio = ratio(
        primary_fg.loop_count().min(secondary_fg.loop_count()),
        primary_fg.loop_count().max(secondary_fg.loop_count()),
    );

    let entry_point_score = if fp
        .basic_blocks
        .iter()
        .any(|bb| bb.primary == primary_fg.entry() && bb.secondary == secondary_fg.entry())
    {
        1.0
    } else {
        0.0
    };

    let name_score = name_equality(primary_fg, secondary_fg);

    let similarity = weights.basic_blocks_matched * bb_ratio
        + weights.instructions_matched * instr_ratio
        + weights.edges_matched * edges_ratio
        + weights.md_index * md_sim
        + weights.call_graph_md_index * cg_md_sim
        + weights.prime_product * prime_product_score
        + weights.size_ratio * size_ratio
        + weights.loop_count_ratio * loop_ratio
        + weights.entry_point * entry_point_score
        + weights.name_equality * name_score;

    fp.similarity = clip01(similarity);
    fp.confidence = *config.step_confidence.get(fp.step).unwrap_or(&0.5);
    Ok(())
}
