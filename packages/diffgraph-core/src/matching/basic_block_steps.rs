//! Basic-block-level matching steps (spec §4.2), run inside one confirmed
//! `FixedPoint`'s two flow graphs.

use ahash::AHashMap;
use std::hash::Hash;

use crate::errors::Result;
use crate::model::flow_graph::Vertex;

use super::step::BlockPipelineContext;

fn unique_bucket_pairs<K: Eq + Hash>(
    primary_items: impl Iterator<Item = (Vertex, K)>,
    secondary_items: impl Iterator<Item = (Vertex, K)>,
) -> Vec<(Vertex, Vertex)> {
    let mut primary_buckets: AHashMap<K, Vec<Vertex>> = AHashMap::default();
    for (v, key) in primary_items {
        primary_buckets.entry(key).or_default().push(v);
    }
    let mut secondary_buckets: AHashMap<K, Vec<Vertex>> = AHashMap::default();
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

/// The two flow graph entries are always matched if both exist (spec §4.2
/// "Entry block pairing"). Harmless to re-emit on every pass: the driver's
/// conflict-free rule (spec §4.2 rule 1) simply drops it once committed.
pub fn entry_pairing(ctx: &BlockPipelineContext) -> Result<Vec<(Vertex, Vertex)>> {
    Ok(vec![(ctx.primary_fg.entry(), ctx.secondary_fg.entry())])
}

pub fn prime_product_equality(ctx: &BlockPipelineContext) -> Result<Vec<(Vertex, Vertex)>> {
    let primary = ctx
        .unmatched_primary()
        .map(|v| (v, ctx.primary_fg.block(v).prime_product()));
    let secondary = ctx
        .unmatched_secondary()
        .map(|v| (v, ctx.secondary_fg.block(v).prime_product()));
    Ok(unique_bucket_pairs(primary, secondary))
}

/// Interpretation of spec §4.2's basic-block "By MD-index": the
/// function-level MD-index is a whole-graph fingerprint, which doesn't
/// apply per-vertex, so this buckets each unmatched block by its local
/// structural signature `(in_degree, out_degree, bfs_level)` instead — a
/// position-in-the-graph fingerprint at the same granularity as the
/// function-level MD-index's inputs (an Open Question resolution, recorded
/// in DESIGN.md).
pub fn local_signature_equality(ctx: &BlockPipelineContext) -> Result<Vec<(Vertex, Vertex)>> {
    let primary_levels = crate::fingerprint::bfs_levels(ctx.primary_fg);
    let secondary_levels = crate::fingerprint::bfs_levels(ctx.secondary_fg);

    let primary = ctx.unmatched_primary().filter_map(|v| {
        let level = *primary_levels.get(&v)?;
        Some((v, (ctx.primary_fg.in_degree(v), ctx.primary_fg.out_degree(v), level)))
    });
    let secondary = ctx.unmatched_secondary().filter_map(|v| {
        let level = *secondary_levels.get(&v)?;
        Some((v, (ctx.secondary_fg.in_degree(v), ctx.secondary_fg.out_degree(v), level)))
    });
    Ok(unique_bucket_pairs(primary, secondary))
}

/// Restricted to successors of an already-matched block pair, bucketed by
/// instruction-count equality (spec §4.2 "By instruction-count equality
/// restricted to already-matched-neighbor successors").
pub fn neighbor_instruction_count(ctx: &BlockPipelineContext) -> Result<Vec<(Vertex, Vertex)>> {
    use std::collections::HashSet;
    let mut candidates: AHashMap<usize, (HashSet<Vertex>, HashSet<Vertex>)> = AHashMap::default();
    for bb in ctx.matches {
        for succ_p in ctx.primary_fg.successors(bb.primary) {
            if ctx.matched_primary.contains(&succ_p) {
                continue;
            }
            let count = ctx.primary_fg.block(succ_p).len();
            candidates.entry(count).or_default().0.insert(succ_p);
        }
        for succ_s in ctx.secondary_fg.successors(bb.secondary) {
            if ctx.matched_secondary.contains(&succ_s) {
                continue;
            }
            let count = ctx.secondary_fg.block(succ_s).len();
            candidates.entry(count).or_default().1.insert(succ_s);
        }
    }

    let mut out = Vec::new();
    for (primaries, secondaries) in candidates.values() {
        if primaries.len() == 1 && secondaries.len() == 1 {
            out.push((*primaries.iter().next().unwrap(), *secondaries.iter().next().unwrap()));
        }
    }
    Ok(out)
}

/// If all predecessors of an unmatched block are matched to predecessors of
/// a unique candidate, commit; symmetric for successors (spec §4.2 "By edge
/// propagation").
pub fn edge_propagation(ctx: &BlockPipelineContext) -> Result<Vec<(Vertex, Vertex)>> {
    let matched_secondary_for: AHashMap<Vertex, Vertex> =
        ctx.matches.iter().map(|bb| (bb.primary, bb.secondary)).collect();

    let mut out = Vec::new();
    for p in ctx.unmatched_primary() {
        if let Some(q) = propagate_from_neighbors(ctx, p, &matched_secondary_for, true) {
            out.push((p, q));
            continue;
        }
        if let Some(q) = propagate_from_neighbors(ctx, p, &matched_secondary_for, false) {
            out.push((p, q));
        }
    }
    Ok(out)
}

fn propagate_from_neighbors(
    ctx: &BlockPipelineContext,
    p: Vertex,
    matched_secondary_for: &AHashMap<Vertex, Vertex>,
    via_predecessors: bool,
) -> Option<Vertex> {
    let neighbors: Vec<Vertex> = if via_predecessors {
        ctx.primary_fg.predecessors(p).collect()
    } else {
        ctx.primary_fg.successors(p).collect()
    };
    if neighbors.is_empty() || !neighbors.iter().all(|n| matched_secondary_for.contains_key(n)) {
        return None;
    }

    let mut intersection: Option<std::collections::HashSet<Vertex>> = None;
    for n in &neighbors {
        let s_n = matched_secondary_for[n];
        let candidates: std::collections::HashSet<Vertex> = if via_predecessors {
            ctx.secondary_fg.successors(s_n).collect()
        } else {
            ctx.secondary_fg.predecessors(s_n).collect()
        };
        intersection = Some(match intersection {
            None => candidates,
            Some(existing) => existing.intersection(&candidates).copied().collect(),
        });
    }

    let candidates = intersection?;
    if candidates.len() == 1 {
        let q = *candidates.iter().next().unwrap();
        if !ctx.matched_secondary.contains(&q) {
            return Some(q);
        }
    }
    None
}

/// Self-loop preservation: an unmatched block with a self-loop on one side
/// can only correspond to an unmatched, also-self-looping block with equal
/// prime product on the other side (spec §4.2 "By self-loop preservation").
pub fn self_loop_preservation(ctx: &BlockPipelineContext) -> Result<Vec<(Vertex, Vertex)>> {
    let primary = ctx
        .unmatched_primary()
        .filter(|&v| ctx.primary_fg.edge_kind(v, v).is_some())
        .map(|v| (v, ctx.primary_fg.block(v).prime_product()));
    let secondary = ctx
        .unmatched_secondary()
        .filter(|&v| ctx.secondary_fg.edge_kind(v, v).is_some())
        .map(|v| (v, ctx.secondary_fg.block(v).prime_product()));
    Ok(unique_bucket_pairs(primary, secondary))
}
