//! Step registry (spec §9 "Step polymorphism"): maps the step-name strings
//! carried in [`crate::config::MatchingConfig`] to the concrete
//! [`FunctionStep`] / [`BasicBlockStep`] variant they name.

use super::step::{BasicBlockStep, FunctionStep};

pub fn resolve_function_step(name: &str) -> Option<FunctionStep> {
    Some(match name {
        "functionHashMatch" => FunctionStep::HashEquality,
        "functionMdIndexCgMatch" => FunctionStep::MdIndexCallGraphExtended,
        "functionMdIndexMatch" => FunctionStep::MdIndexPlain,
        "functionInstrCountMatch" => FunctionStep::InstructionAndBlockCount,
        "functionNameMatch" => FunctionStep::SymbolNameEquality,
        "functionDemangledNameMatch" => FunctionStep::DemangledNameEquality,
        "functionEdgeMdIndexMatch" => FunctionStep::EdgeMdIndexLoopInvariant,
        "functionAddressMatch" => FunctionStep::AddressEquality,
        "functionCallGraphNeighborMatch" => FunctionStep::CallGraphNeighborhood,
        "functionStringRefsMatch" => FunctionStep::StringReferences,
        "functionLoopHeadMatch" => FunctionStep::LoopHead,
        _ => return None,
    })
}

pub fn resolve_basic_block_step(name: &str) -> Option<BasicBlockStep> {
    Some(match name {
        "blockEntryMatch" => BasicBlockStep::EntryPairing,
        "blockPrimeProductMatch" => BasicBlockStep::PrimeProductEquality,
        "blockMdIndexMatch" => BasicBlockStep::LocalSignatureEquality,
        "blockNeighborInstrCountMatch" => BasicBlockStep::NeighborInstructionCount,
        "blockEdgePropagationMatch" => BasicBlockStep::EdgePropagation,
        "blockSelfLoopMatch" => BasicBlockStep::SelfLoopPreservation,
        _ => return None,
    })
}

/// Resolve an ordered list of step names from [`crate::config::MatchingConfig`]
/// into the steps the driver will actually run, in the configured order.
/// Unknown names are a setup-time `ConfigError`, already rejected by
/// [`crate::config::MatchingConfig::validate`]; callers that skip
/// validation get them filtered out here defensively instead of panicking.
pub fn function_steps(names: &[String]) -> Vec<FunctionStep> {
    names.iter().filter_map(|n| resolve_function_step(n)).collect()
}

pub fn basic_block_steps(names: &[String]) -> Vec<BasicBlockStep> {
    names.iter().filter_map(|n| resolve_basic_block_step(n)).collect()
}
