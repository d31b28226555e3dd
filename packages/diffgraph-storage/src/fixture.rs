//! `JsonFixtureLoader` (spec §6 `[AMBIENT]`): a minimal `ExecutableFactory`
//! implementation reading a small JSON schema instead of a disassembler
//! export. Binary loading from the disassembler's own format stays out of
//! scope per spec §1 — this adapter exists only so the ad-hoc comparison
//! binary and integration tests have *something* to feed `Comparison`
//! without standing up a real loader.

use std::fs;
use std::path::Path;

use diffgraph_core::engine::ExecutableFactory;
use diffgraph_core::model::basic_block::BasicBlock;
use diffgraph_core::model::call_graph::{CallGraph, Endianness, ExecutableMetadata};
use diffgraph_core::model::flow_graph::{EdgeKind, FlowGraph};
use diffgraph_core::model::instruction::{Instruction, InstructionCache};
use diffgraph_core::{EngineError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FixtureFile {
    metadata: FixtureMetadata,
    functions: Vec<FixtureFunction>,
    #[serde(default)]
    calls: Vec<(usize, usize)>,
}

#[derive(Debug, Deserialize)]
struct FixtureMetadata {
    id: String,
    architecture: String,
    endianness: FixtureEndianness,
    hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FixtureEndianness {
    Little,
    Big,
}

#[derive(Debug, Deserialize)]
struct FixtureFunction {
    name: String,
    entry: usize,
    #[serde(default)]
    is_library: bool,
    #[serde(default)]
    is_stub: bool,
    #[serde(default)]
    demangled_name: Option<String>,
    #[serde(default)]
    string_refs: Vec<String>,
    blocks: Vec<FixtureBlock>,
    #[serde(default)]
    edges: Vec<(usize, usize, FixtureEdgeKind)>,
}

#[derive(Debug, Deserialize)]
struct FixtureBlock {
    instructions: Vec<FixtureInstruction>,
}

#[derive(Debug, Deserialize)]
struct FixtureInstruction {
    address: u64,
    mnemonic: String,
    #[serde(default)]
    operands: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FixtureEdgeKind {
    Unconditional,
    TrueBranch,
    FalseBranch,
    Switch,
    Call,
}

impl From<FixtureEdgeKind> for EdgeKind {
    fn from(kind: FixtureEdgeKind) -> Self {
        match kind {
            FixtureEdgeKind::Unconditional => EdgeKind::Unconditional,
            FixtureEdgeKind::TrueBranch => EdgeKind::TrueBranch,
            FixtureEdgeKind::FalseBranch => EdgeKind::FalseBranch,
            FixtureEdgeKind::Switch => EdgeKind::Switch,
            FixtureEdgeKind::Call => EdgeKind::Call,
        }
    }
}

/// Reads a `FixtureFile` from `path` and builds a `(CallGraph,
/// InstructionCache)` pair, interning every instruction's mnemonic against a
/// freshly created cache scoped to this one load (spec §3 "Instruction
/// Cache" lifetime rule).
#[derive(Debug, Default)]
pub struct JsonFixtureLoader;

impl ExecutableFactory for JsonFixtureLoader {
    fn load(&self, path: &Path) -> Result<(CallGraph, InstructionCache)> {
        let text = fs::read_to_string(path).map_err(|e| EngineError::Load(format!("{}: {e}", path.display())))?;
        let fixture: FixtureFile = serde_json::from_str(&text).map_err(|e| EngineError::Load(format!("{}: {e}", path.display())))?;

        let cache = InstructionCache::new();
        let mut call_graph = CallGraph::new(ExecutableMetadata {
            id: fixture.metadata.id,
            architecture: fixture.metadata.architecture,
            endianness: match fixture.metadata.endianness {
                FixtureEndianness::Little => Endianness::Little,
                FixtureEndianness::Big => Endianness::Big,
            },
            hash: fixture.metadata.hash,
        });

        let mut vertices = Vec::with_capacity(fixture.functions.len());
        for f in fixture.functions {
            if f.blocks.is_empty() {
                return Err(EngineError::Load(format!("function {} has no basic blocks", f.name)));
            }
            let mut blocks = Vec::with_capacity(f.blocks.len());
            for b in &f.blocks {
                if b.instructions.is_empty() {
                    return Err(EngineError::Load(format!("function {} has a basic block with no instructions", f.name)));
                }
                let instructions = b
                    .instructions
                    .iter()
                    .map(|i| Instruction::new(&cache, i.address, &i.mnemonic, i.operands.clone()))
                    .collect();
                blocks.push(BasicBlock::new(instructions));
            }
            let edges: Vec<(usize, usize, EdgeKind)> = f.edges.into_iter().map(|(s, d, k)| (s, d, k.into())).collect();
            let flow_graph = FlowGraph::with_metadata(f.name, blocks, edges, f.entry, f.is_library, f.is_stub, None, f.demangled_name, f.string_refs);
            vertices.push(call_graph.add_function(flow_graph));
        }
        for (caller, callee) in fixture.calls {
            let (Some(&c), Some(&d)) = (vertices.get(caller), vertices.get(callee)) else {
                return Err(EngineError::Load(format!("call edge references out-of-range function index ({caller}, {callee})")));
            };
            call_graph.add_call(c, d);
        }

        Ok((call_graph, cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_two_function_fixture_with_a_call_edge() {
        let fixture = r#"{
            "metadata": {"id": "demo", "architecture": "x86_64", "endianness": "little", "hash": "deadbeef"},
            "functions": [
                {
                    "name": "main",
                    "entry": 0,
                    "blocks": [
                        {"instructions": [{"address": 4096, "mnemonic": "call", "operands": "helper"}]}
                    ]
                },
                {
                    "name": "helper",
                    "entry": 0,
                    "blocks": [
                        {"instructions": [{"address": 8192, "mnemonic": "ret", "operands": ""}]}
                    ]
                }
            ],
            "calls": [[0, 1]]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(fixture.as_bytes()).unwrap();

        let (call_graph, cache) = JsonFixtureLoader.load(file.path()).unwrap();
        assert_eq!(call_graph.function_count(), 2);
        assert_eq!(cache.len(), 2);

        let main = call_graph.by_entry_address(4096).unwrap();
        assert_eq!(call_graph.callees(main).count(), 1);
    }

    #[test]
    fn rejects_a_function_with_no_blocks() {
        let fixture = r#"{
            "metadata": {"id": "demo", "architecture": "x86_64", "endianness": "little", "hash": "deadbeef"},
            "functions": [{"name": "empty", "entry": 0, "blocks": []}]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(fixture.as_bytes()).unwrap();
        assert!(JsonFixtureLoader.load(file.path()).is_err());
    }

    #[test]
    fn rejects_a_block_with_no_instructions() {
        let fixture = r#"{
            "metadata": {"id": "demo", "architecture": "x86_64", "endianness": "little", "hash": "deadbeef"},
            "functions": [{"name": "hollow", "entry": 0, "blocks": [{"instructions": []}]}]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(fixture.as_bytes()).unwrap();
        assert!(JsonFixtureLoader.load(file.path()).is_err(), "an empty block must surface as a Load error, not panic");
    }
}
