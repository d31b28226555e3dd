//! Change Classifier (spec §4.5): labels a matched function pair with
//! change flags derived purely from its already-computed basic-block and
//! instruction matches.

use rustc_hash::FxHashMap;

use crate::context::{ChangeFlags, FixedPoint};
use crate::model::flow_graph::{is_auto_generated_name, FlowGraph, Vertex};

/// Sets every applicable bit in `fp.flags`. Does not touch similarity,
/// confidence, or the `DIAGNOSTIC` bit the driver sets on a scoring
/// failure (spec §7) — those are orthogonal to structural classification.
pub fn classify(fp: &mut FixedPoint, primary_fg: &FlowGraph, secondary_fg: &FlowGraph) {
    let mut flags = fp.flags & ChangeFlags::DIAGNOSTIC;

    if fp.basic_blocks.len() < primary_fg.vertex_count() || fp.basic_blocks.len() < secondary_fg.vertex_count() {
        flags |= ChangeFlags::STRUCTURAL;
    }

    let secondary_for: FxHashMap<Vertex, Vertex> = fp.basic_blocks.iter().map(|bb| (bb.primary, bb.secondary)).collect();

    for bb in &fp.basic_blocks {
        let primary_block = primary_fg.block(bb.primary);
        let secondary_block = secondary_fg.block(bb.secondary);

        if bb.instruction_matches.len() < primary_block.len() || bb.instruction_matches.len() < secondary_block.len() {
            flags |= ChangeFlags::INSTRUCTIONS;
        }

        for m in &bb.instruction_matches {
            let primary_instr = &primary_block.instructions()[m.primary_index];
            let secondary_instr = &secondary_block.instructions()[m.secondary_index];
            if primary_instr.prime() == secondary_instr.prime() && primary_instr.operand_string() != secondary_instr.operand_string() {
                flags |= ChangeFlags::OPERANDS;
            }
        }

        for succ_p in primary_fg.successors(bb.primary) {
            let Some(&succ_s) = secondary_for.get(&succ_p) else {
                continue;
            };
            let kind_p = primary_fg.edge_kind(bb.primary, succ_p);
            let kind_s = secondary_fg.edge_kind(bb.secondary, succ_s);
            if kind_p != kind_s {
                flags |= ChangeFlags::BRANCHES;
            }
        }
    }

    let entries_matched = fp
        .basic_blocks
        .iter()
        .any(|bb| bb.primary == primary_fg.entry() && bb.secondary == secondary_fg.entry());
    if !entries_matched {
        flags |= ChangeFlags::ENTRYPOINT;
    }

    if primary_fg.loop_count() != secondary_fg.loop_count() {
        flags |= ChangeFlags::LOOPS;
    }

    let primary_auto = is_auto_generated_name(&primary_fg.name);
    let secondary_auto = is_auto_generated_name(&secondary_fg.name);
    if !primary_auto && !secondary_auto && primary_fg.name != secondary_fg.name {
        flags |= ChangeFlags::NAME;
    }

    fp.flags = flags;
}
