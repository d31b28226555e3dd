//! Configuration (spec §6): the options an `ExecutableFactory` caller may
//! tune, plus the bit-exact defaults SPEC_FULL fixes for the weight vector
//! and step-confidence table (the original leaves these as an Open
//! Question beyond "configuration"; see DESIGN.md).

use rustc_hash::FxHashMap;

use crate::errors::{EngineError, Result};
use crate::fingerprint::EPSILON;
use crate::matching::registry::{resolve_basic_block_step, resolve_function_step};

/// Canonical ordering of the function-level pipeline (spec §4.2), used as
/// `MatchingConfig::default`'s `function_matching`.
pub const DEFAULT_FUNCTION_STEPS: &[&str] = &[
    "functionHashMatch",
    "functionMdIndexCgMatch",
    "functionMdIndexMatch",
    "functionInstrCountMatch",
    "functionNameMatch",
    "functionDemangledNameMatch",
    "functionEdgeMdIndexMatch",
    "functionAddressMatch",
    "functionCallGraphNeighborMatch",
    "functionStringRefsMatch",
    "functionLoopHeadMatch",
];

/// Canonical ordering of the basic-block-level pipeline (spec §4.2).
pub const DEFAULT_BASIC_BLOCK_STEPS: &[&str] = &[
    "blockEntryMatch",
    "blockPrimeProductMatch",
    "blockMdIndexMatch",
    "blockNeighborInstrCountMatch",
    "blockEdgePropagationMatch",
    "blockSelfLoopMatch",
];

/// Per-feature weights for `similarity` (spec §4.4 table). Must sum to 1
/// within [`crate::fingerprint::EPSILON`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityWeights {
    pub basic_blocks_matched: f64,
    pub instructions_matched: f64,
    pub edges_matched: f64,
    pub md_index: f64,
    pub call_graph_md_index: f64,
    pub prime_product: f64,
    pub size_ratio: f64,
    pub loop_count_ratio: f64,
    pub entry_point: f64,
    pub name_equality: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            basic_blocks_matched: 0.15,
            instructions_matched: 0.10,
            edges_matched: 0.20,
            md_index: 0.10,
            call_graph_md_index: 0.05,
            prime_product: 0.10,
            size_ratio: 0.05,
            loop_count_ratio: 0.05,
            entry_point: 0.05,
            name_equality: 0.15,
        }
    }
}

impl SimilarityWeights {
    pub fn sum(&self) -> f64 {
        self.basic_blocks_matched
            + self.instructions_matched
            + self.edges_matched
            + self.md_index
            + self.call_graph_md_index
            + self.prime_product
            + self.size_ratio
            + self.loop_count_ratio
            + self.entry_point
            + self.name_equality
    }
}

/// Base confidence per producing step (spec §4.4): hash-equality ~1.0,
/// name-equality ~0.9, MD-index ~0.8, propagation ~0.6, fuzzy ~0.3.
pub fn default_step_confidence() -> FxHashMap<String, f64> {
    let table: &[(&str, f64)] = &[
        ("functionHashMatch", 1.0),
        ("functionMdIndexCgMatch", 0.8),
        ("functionMdIndexMatch", 0.8),
        ("functionInstrCountMatch", 0.7),
        ("functionNameMatch", 0.9),
        ("functionDemangledNameMatch", 0.9),
        ("functionEdgeMdIndexMatch", 0.75),
        ("functionAddressMatch", 0.6),
        ("functionCallGraphNeighborMatch", 0.6),
        ("functionStringRefsMatch", 0.5),
        ("functionLoopHeadMatch", 0.3),
    ];
    table.iter().map(|(name, conf)| (name.to_string(), *conf)).collect()
}

/// Input configuration to the core (spec §6).
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub function_matching: Vec<String>,
    pub basic_block_matching: Vec<String>,
    pub similarity_weights: SimilarityWeights,
    pub step_confidence: FxHashMap<String, f64>,
    pub min_confidence: f64,
    pub min_similarity: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            function_matching: DEFAULT_FUNCTION_STEPS.iter().map(|s| s.to_string()).collect(),
            basic_block_matching: DEFAULT_BASIC_BLOCK_STEPS.iter().map(|s| s.to_string()).collect(),
            similarity_weights: SimilarityWeights::default(),
            step_confidence: default_step_confidence(),
            min_confidence: 0.0,
            min_similarity: 0.0,
        }
    }
}

impl MatchingConfig {
    /// Validates the configuration before a single step runs (spec §7
    /// `ConfigError`): unknown step names, weights not summing to 1, or
    /// out-of-range thresholds are all fatal at setup.
    pub fn validate(&self) -> Result<()> {
        if (self.similarity_weights.sum() - 1.0).abs() > EPSILON {
            return Err(EngineError::Config(format!(
                "similarity_weights must sum to 1.0 (+/- {EPSILON}), got {}",
                self.similarity_weights.sum()
            )));
        }
        if self.function_matching.is_empty() {
            return Err(EngineError::Config("function_matching must not be empty".into()));
        }
        for name in &self.function_matching {
            if resolve_function_step(name).is_none() {
                return Err(EngineError::Config(format!("unknown function step: {name}")));
            }
        }
        for name in &self.basic_block_matching {
            if resolve_basic_block_step(name).is_none() {
                return Err(EngineError::Config(format!("unknown basic-block step: {name}")));
            }
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(EngineError::Config(format!("min_confidence out of [0,1]: {}", self.min_confidence)));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(EngineError::Config(format!("min_similarity out of [0,1]: {}", self.min_similarity)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = SimilarityWeights::default();
        assert!((w.sum() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn default_config_validates() {
        assert!(MatchingConfig::default().validate().is_ok());
    }

    #[test]
    fn unknown_step_name_is_rejected() {
        let mut config = MatchingConfig::default();
        config.function_matching.push("notAStep".into());
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn unbalanced_weights_are_rejected() {
        let mut config = MatchingConfig::default();
        config.similarity_weights.name_equality += 0.5;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }
}
