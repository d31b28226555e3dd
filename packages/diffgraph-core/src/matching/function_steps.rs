//! Function-level matching steps (spec §4.2), in the order the original
//! lists them: exact-equality first, then structural, then name-based,
//! then propagation-based, then fuzzy.
//!
//! Most of these share one shape: bucket unmatched entities on both sides
//! by some feature value, then commit a pair only when both buckets hold
//! exactly one entity (spec §4.2 rule 2, "uniqueness rule"). [`unique_bucket_pairs`]
//! implements that shape once; the per-step functions just supply the key.

use ahash::AHashMap;
use rustc_hash::FxHashSet;
use std::hash::Hash;

use crate::errors::Result;
use crate::fingerprint::{call_graph_extended_md_index, quantize};
use crate::model::call_graph::FunctionVertex;

use super::step::FunctionPipelineContext;

fn unique_bucket_pairs<K: Eq + Hash>(
    primary_items: impl Iterator<Item = (FunctionVertex, K)>,
    secondary_items: impl Iterator<Item = (FunctionVertex, K)>,
) -> Vec<(FunctionVertex, FunctionVertex)> {
    let mut primary_buckets: AHashMap<K, Vec<FunctionVertex>> = AHashMap::default();
    for (v, key) in primary_items {
        primary_buckets.entry(key).or_default().push(v);
    }
    let mut secondary_buckets: AHashMap<K, Vec<FunctionVertex>> = AHashMap::default();
    for (v, key) in secondary_items {
        secondary_buckets.entry(key).or_default().push(v);
    }

    let mut out = Vec::new();
    for (key, primaries) in &primary_buckets {
        if primaries.len() != 1 {
            continue;
        }
        if let Some(secondaries) = secondary_buckets.get(key) {
            if secondaries.len() == 1 {
                out.push((primaries[0], secondaries[0]));
            }
        }
    }
    out
}

pub fn hash_equality(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let primary = ctx
        .unmatched_primary()
        .filter_map(|v| ctx.primary.function(v).content_hash.map(|h| (v, h)));
    let secondary = ctx
        .unmatched_secondary()
        .filter_map(|v| ctx.secondary.function(v).content_hash.map(|h| (v, h)));
    Ok(unique_bucket_pairs(primary, secondary))
}

pub fn md_index_call_graph_extended(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let primary = ctx.unmatched_primary().map(|v| {
        let md = quantize(call_graph_extended_md_index(ctx.primary, v));
        let pp = ctx.primary.function(v).prime_product();
        (v, (md, pp))
    });
    let secondary = ctx.unmatched_secondary().map(|v| {
        let md = quantize(call_graph_extended_md_index(ctx.secondary, v));
        let pp = ctx.secondary.function(v).prime_product();
        (v, (md, pp))
    });
    Ok(unique_bucket_pairs(primary, secondary))
}

pub fn md_index_plain(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let primary = ctx.unmatched_primary().map(|v| (v, quantize(ctx.primary.function(v).md_index())));
    let secondary = ctx.unmatched_secondary().map(|v| (v, quantize(ctx.secondary.function(v).md_index())));
    Ok(unique_bucket_pairs(primary, secondary))
}

pub fn instruction_and_block_count(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let primary = ctx.unmatched_primary().map(|v| {
        let fg = ctx.primary.function(v);
        (v, (fg.prime_product(), fg.instruction_count(), fg.vertex_count()))
    });
    let secondary = ctx.unmatched_secondary().map(|v| {
        let fg = ctx.secondary.function(v);
        (v, (fg.prime_product(), fg.instruction_count(), fg.vertex_count()))
    });
    Ok(unique_bucket_pairs(primary, secondary))
}

pub fn symbol_name_equality(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let primary = ctx
        .unmatched_primary()
        .filter(|&v| !ctx.primary.function(v).is_auto_generated_name())
        .map(|v| (v, ctx.primary.function(v).name.clone()));
    let secondary = ctx
        .unmatched_secondary()
        .filter(|&v| !ctx.secondary.function(v).is_auto_generated_name())
        .map(|v| (v, ctx.secondary.function(v).name.clone()));
    Ok(unique_bucket_pairs(primary, secondary))
}

pub fn demangled_name_equality(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let primary = ctx
        .unmatched_primary()
        .filter_map(|v| ctx.primary.function(v).demangled_name().map(|n| (v, n.to_string())));
    let secondary = ctx
        .unmatched_secondary()
        .filter_map(|v| ctx.secondary.function(v).demangled_name().map(|n| (v, n.to_string())));
    Ok(unique_bucket_pairs(primary, secondary))
}

pub fn edge_md_index_loop_invariant(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let primary = ctx
        .unmatched_primary()
        .map(|v| (v, quantize(crate::fingerprint::md_index_acyclic(ctx.primary.function(v)))));
    let secondary = ctx
        .unmatched_secondary()
        .map(|v| (v, quantize(crate::fingerprint::md_index_acyclic(ctx.secondary.function(v)))));
    Ok(unique_bucket_pairs(primary, secondary))
}

pub fn address_equality(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let primary = ctx.unmatched_primary().map(|v| (v, ctx.primary.function(v).entry_address));
    let secondary = ctx.unmatched_secondary().map(|v| (v, ctx.secondary.function(v).entry_address));
    Ok(unique_bucket_pairs(primary, secondary))
}

pub fn string_references(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let primary = ctx.unmatched_primary().filter_map(|v| {
        let refs = ctx.primary.function(v).string_refs();
        if refs.is_empty() {
            return None;
        }
        let mut sorted = refs.to_vec();
        sorted.sort();
        Some((v, sorted))
    });
    let secondary = ctx.unmatched_secondary().filter_map(|v| {
        let refs = ctx.secondary.function(v).string_refs();
        if refs.is_empty() {
            return None;
        }
        let mut sorted = refs.to_vec();
        sorted.sort();
        Some((v, sorted))
    });
    Ok(unique_bucket_pairs(primary, secondary))
}

/// Interpretation of spec §4.2's "by loop-head matching (if both are the
/// head of the only loop of a matched function)": a function with exactly
/// one back edge is distinctive enough to bucket by its whole-function
/// prime product even without the structural or name evidence the earlier
/// steps need (an Open Question resolution, recorded in DESIGN.md).
pub fn loop_head(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let primary = ctx
        .unmatched_primary()
        .filter(|&v| ctx.primary.function(v).loop_count() == 1)
        .map(|v| (v, ctx.primary.function(v).prime_product()));
    let secondary = ctx
        .unmatched_secondary()
        .filter(|&v| ctx.secondary.function(v).loop_count() == 1)
        .map(|v| (v, ctx.secondary.function(v).prime_product()));
    Ok(unique_bucket_pairs(primary, secondary))
}

/// Propagation step: commit `(p, q)` when every caller and callee of
/// unmatched primary function `p` is already matched, and the secondary
/// counterparts of those neighbors agree on exactly one unmatched secondary
/// function `q` as their shared caller/callee (spec §4.2 "By call-graph
/// neighborhood").
pub fn call_graph_neighborhood(ctx: &FunctionPipelineContext) -> Result<Vec<(FunctionVertex, FunctionVertex)>> {
    let mut out = Vec::new();
    for p in ctx.unmatched_primary() {
        let callers: Vec<_> = ctx.primary.callers(p).collect();
        let callees: Vec<_> = ctx.primary.callees(p).collect();
        if callers.is_empty() && callees.is_empty() {
            continue;
        }
        if !callers.iter().all(|c| ctx.matches_by_primary.contains_key(c)) {
            continue;
        }
        if !callees.iter().all(|c| ctx.matches_by_primary.contains_key(c)) {
            continue;
        }

        let mut candidate_sets: Vec<FxHashSet<FunctionVertex>> = Vec::new();
        for c in &callers {
            let matched_secondary_caller = ctx.matches_by_primary[c];
            candidate_sets.push(ctx.secondary.callees(matched_secondary_caller).collect());
        }
        for c in &callees {
            let matched_secondary_callee = ctx.matches_by_primary[c];
            candidate_sets.push(ctx.secondary.callers(matched_secondary_callee).collect());
        }

        let mut sets = candidate_sets.into_iter();
        let Some(mut intersection) = sets.next() else {
            continue;
        };
        for set in sets {
            intersection.retain(|v| set.contains(v));
            if intersection.is_empty() {
                break;
            }
        }

        if intersection.len() == 1 {
            let q = *intersection.iter().next().unwrap();
            if !ctx.matched_secondary.contains(&q) {
                out.push((p, q));
            }
        }
    }
    Ok(out)
}
