//! Step Pipeline (spec §4.2): the function-level and basic-block-level
//! matching steps, their shared trait/context plumbing, the name registry,
//! and the driver that runs both pipelines to a fixed point.

pub mod basic_block_steps;
pub mod driver;
pub mod function_steps;
pub mod registry;
pub mod step;

pub use driver::{run_comparison, CancellationFlag};
pub use step::{BasicBlockStep, BlockPipelineContext, FunctionPipelineContext, FunctionStep};
