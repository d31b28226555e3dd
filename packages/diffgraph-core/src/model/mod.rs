//! Graph Model (spec §3, §4.1): instructions, basic blocks, flow graphs and
//! call graphs, plus their derived metrics.

pub mod basic_block;
pub mod call_graph;
pub mod flow_graph;
pub mod instruction;

pub use basic_block::{prime_product, BasicBlock};
pub use call_graph::{CallGraph, Endianness, ExecutableMetadata, FunctionVertex};
pub use flow_graph::{is_auto_generated_name, EdgeKind, FlowGraph, Vertex};
pub use instruction::{CacheEntry, Instruction, InstructionCache};
