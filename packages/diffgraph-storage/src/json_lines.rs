//! `JsonLinesWriter` (spec §6 `[AMBIENT]`): the one concrete
//! `FixedPointWriter` this crate ships, writing one JSON object per
//! confirmed `FixedPoint` to any `Write` implementer.

use std::io::Write;
use std::sync::Mutex;

use diffgraph_core::context::{BasicBlockFixedPoint, FixedPoint};
use diffgraph_core::FixedPointWriter;
use serde::Serialize;

use crate::error::Result;

/// Wire shape for one matched instruction pair.
#[derive(Debug, Serialize)]
struct InstructionMatchRecord {
    primary_index: usize,
    secondary_index: usize,
}

/// Wire shape for one matched basic-block pair. Vertex indices are recorded
/// as plain `u32`s (petgraph's `NodeIndex` carries no stable cross-process
/// identity of its own) — a consumer correlates them back to addresses via
/// the accompanying `FlowGraph`, same as the in-process classifier does.
#[derive(Debug, Serialize)]
struct BasicBlockRecord {
    primary_vertex: u32,
    secondary_vertex: u32,
    step: &'static str,
    instruction_matches: Vec<InstructionMatchRecord>,
}

impl From<&BasicBlockFixedPoint> for BasicBlockRecord {
    fn from(bb: &BasicBlockFixedPoint) -> Self {
        Self {
            primary_vertex: bb.primary.index() as u32,
            secondary_vertex: bb.secondary.index() as u32,
            step: bb.step,
            instruction_matches: bb
                .instruction_matches
                .iter()
                .map(|m| InstructionMatchRecord {
                    primary_index: m.primary_index,
                    secondary_index: m.secondary_index,
                })
                .collect(),
        }
    }
}

/// Wire shape for one confirmed function match (spec §4.4, §4.5): every
/// field a consumer needs to reconstruct similarity, confidence, and change
/// flags without linking against `diffgraph-core`'s internal types.
#[derive(Debug, Serialize)]
struct FixedPointRecord {
    primary_entry: u64,
    secondary_entry: u64,
    step: &'static str,
    similarity: f64,
    confidence: f64,
    flags: u32,
    basic_blocks: Vec<BasicBlockRecord>,
}

impl From<&FixedPoint> for FixedPointRecord {
    fn from(fp: &FixedPoint) -> Self {
        Self {
            primary_entry: fp.primary_entry,
            secondary_entry: fp.secondary_entry,
            step: fp.step,
            similarity: fp.similarity,
            confidence: fp.confidence,
            flags: fp.flags.bits(),
            basic_blocks: fp.basic_blocks.iter().map(BasicBlockRecord::from).collect(),
        }
    }
}

/// Writes one JSON object per line (spec §6 `[AMBIENT]`), the
/// [JSON Lines](https://jsonlines.org) convention, to any `Write`
/// implementer. Wrapped in a `Mutex` so a single writer can be shared
/// across the `rayon` fan-out the driver runs the per-function phase under
/// (spec §5) without every caller needing its own synchronization.
pub struct JsonLinesWriter<W: Write> {
    sink: Mutex<W>,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink: Mutex::new(sink) }
    }
}

impl<W: Write + Send> FixedPointWriter for JsonLinesWriter<W> {
    fn write_fixed_point(&self, fp: &FixedPoint) -> diffgraph_core::Result<()> {
        let record = FixedPointRecord::from(fp);
        let mut sink = self.sink.lock().expect("json lines writer mutex poisoned");
        write_record(&mut *sink, &record).map_err(|e| diffgraph_core::EngineError::Load(e.to_string()))
    }

    fn finish(&self) -> diffgraph_core::Result<()> {
        let mut sink = self.sink.lock().expect("json lines writer mutex poisoned");
        sink.flush().map_err(|e| diffgraph_core::EngineError::Load(e.to_string()))
    }
}

fn write_record<W: Write>(sink: &mut W, record: &FixedPointRecord) -> Result<()> {
    serde_json::to_writer(&mut *sink, record)?;
    sink.write_all(b"\n")?;
    Ok(())
}

impl<W: Write> JsonLinesWriter<W> {
    /// Same as the trait method, but surfaces this crate's own
    /// [`crate::error::StorageError`] instead of folding I/O failures into
    /// `diffgraph_core::EngineError::Load` — useful to callers that only
    /// ever talk to this adapter directly and don't want the core crate's
    /// error type in scope.
    pub fn write(&self, fp: &FixedPoint) -> Result<()> {
        let record = FixedPointRecord::from(fp);
        let mut sink = self.sink.lock().expect("json lines writer mutex poisoned");
        write_record(&mut *sink, &record)
    }
}
