//! Instruction Aligner (spec §4.3): greedy longest-common-subsequence over a
//! matched basic block pair's instruction streams.
//!
//! # Algorithm
//!
//! Standard dynamic-programming LCS with two byte-cheap short-circuits: an
//! empty side returns no matches immediately, and a common prefix/suffix is
//! stripped before the O(|A|·|B|) table is built. Basic blocks are small
//! (tens of instructions), so the remaining table is cheap regardless.
//!
//! # Alignment key
//!
//! The DP matches instructions by `prime` alone, not full `Instruction`
//! equality. `Instruction::eq` is the stricter `(prime, operands)` pair
//! (spec §8 "Operand change"), which the instruction cache and hash-based
//! steps need for exact dedup; if alignment used that same strict equality,
//! an instruction whose operand changed (`mov eax, 5` -> `mov eax, 7`) could
//! never be matched at all, and the classifier's `OPERANDS` flag would be
//! unreachable. Aligning by prime keeps the instruction in the alignment so
//! the classifier can see and flag the operand change, matching the spec's
//! own worked example.
//!
//! # Determinism
//!
//! When more than one maximum-length alignment exists, the backward
//! backtrack below always takes a match the instant it sees one (since the
//! DP recurrence for equal elements is always `dp[i-1][j-1] + 1`, never a
//! max with a neighbor), and on a non-match tie prefers to advance the
//! secondary cursor first. This reproduces the original implementation's
//! output bit-for-bit on the reference test vectors (see the tests below,
//! transcribed from `original_source/instruction_test.cc`).

use crate::model::instruction::Instruction;

fn aligns(a: &Instruction, b: &Instruction) -> bool {
    a.prime() == b.prime()
}

/// One aligned `(primary, secondary)` instruction pair, as indices into the
/// two input slices passed to [`align`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionMatch {
    pub primary_index: usize,
    pub secondary_index: usize,
}

/// Align two ordered instruction sequences. Returned pairs are strictly
/// increasing on both sides; instructions at matched positions share a
/// `prime` (spec §8 invariant 5) — callers that need to know whether their
/// operands also matched compare `operand_string()` themselves (see
/// `classifier::classify`'s `OPERANDS` flag).
pub fn align(a: &[Instruction], b: &[Instruction]) -> Vec<InstructionMatch> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }

    let mut prefix = 0usize;
    while prefix < a.len() && prefix < b.len() && aligns(&a[prefix], &b[prefix]) {
        prefix += 1;
    }

    let remaining_a = a.len() - prefix;
    let remaining_b = b.len() - prefix;
    let mut suffix = 0usize;
    while suffix < remaining_a
        && suffix < remaining_b
        && aligns(&a[a.len() - 1 - suffix], &b[b.len() - 1 - suffix])
    {
        suffix += 1;
    }

    let mid_a = &a[prefix..a.len() - suffix];
    let mid_b = &b[prefix..b.len() - suffix];
    let mid_matches = lcs_dp(mid_a, mid_b);

    let mut result = Vec::with_capacity(prefix + mid_matches.len() + suffix);
    for k in 0..prefix {
        result.push(InstructionMatch { primary_index: k, secondary_index: k });
    }
    for m in mid_matches {
        result.push(InstructionMatch {
            primary_index: prefix + m.primary_index,
            secondary_index: prefix + m.secondary_index,
        });
    }
    for k in 0..suffix {
        result.push(InstructionMatch {
            primary_index: a.len() - suffix + k,
            secondary_index: b.len() - suffix + k,
        });
    }
    result
}

fn lcs_dp(a: &[Instruction], b: &[Instruction]) -> Vec<InstructionMatch> {
    let n = a.len();
    let m = b.len();
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            dp[i][j] = if aligns(&a[i - 1], &b[j - 1]) {
                dp[i - 1][j - 1] + 1
            } else if dp[i][j - 1] >= dp[i - 1][j] {
                dp[i][j - 1]
            } else {
                dp[i - 1][j]
            };
        }
    }

    let mut matches = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if aligns(&a[i - 1], &b[j - 1]) {
            matches.push(InstructionMatch { primary_index: i - 1, secondary_index: j - 1 });
            i -= 1;
            j -= 1;
        } else if dp[i][j - 1] >= dp[i - 1][j] {
            j -= 1;
        } else {
            i -= 1;
        }
    }
    matches.reverse();
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::instruction::InstructionCache;
    use pretty_assertions::assert_eq;

    #[test]
    fn lcs_empty_both_sides() {
        let matches = align(&[], &[]);
        assert_eq!(matches.len(), 0);
    }

    #[test]
    fn lcs_empty_one_sided() {
        let cache = InstructionCache::new();
        let a = vec![
            Instruction::with_prime(&cache, 0x1000000010000000, "one", 1234, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010000001, "two", 1235, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010000005, "three", 1236, "47, 11"),
        ];
        let matches = align(&a, &[]);
        assert_eq!(matches.len(), 0);
    }

    #[test]
    fn lcs_common_prefix() {
        let cache = InstructionCache::new();
        let a = vec![
            Instruction::with_prime(&cache, 0x1000000010000000, "one", 1234, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010000001, "two", 1235, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010000005, "three", 1236, "47, 11"),
        ];
        let b = vec![
            Instruction::with_prime(&cache, 0x1000000010000000, "one", 1234, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010000001, "two", 1235, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010000005, "unmatched", 7777, "47, 11"),
        ];
        let matches = align(&a, &b);
        assert_eq!(matches.len(), 2);
        assert_eq!(a[matches[0].primary_index].address(), 0x1000000010000000);
        assert_eq!(b[matches[0].secondary_index].address(), 0x1000000010000000);
        assert_eq!(a[matches[1].primary_index].address(), 0x1000000010000001);
        assert_eq!(b[matches[1].secondary_index].address(), 0x1000000010000001);
    }

    #[test]
    fn lcs_non_trivial_seven_vs_three() {
        let cache = InstructionCache::new();
        let a = vec![
            Instruction::with_prime(&cache, 0x1000000010000000, "one", 1234, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010000001, "two", 1235, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010000005, "three", 1236, "47, 11"),
        ];
        let b = vec![
            Instruction::with_prime(&cache, 0x1000000010012000, "one", 1232, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010012302, "one", 1234, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010033300, "one", 1237, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010112334, "two", 1235, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010234205, "three", 1236, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010234206, "three", 1237, "47, 11"),
            Instruction::with_prime(&cache, 0x1000000010234207, "three", 1236, "47, 11"),
        ];
        let matches = align(&a, &b);
        assert_eq!(matches.len(), 3);
        assert_eq!(a[matches[0].primary_index].address(), 0x1000000010000000);
        assert_eq!(b[matches[0].secondary_index].address(), 0x1000000010012302);
        assert_eq!(a[matches[1].primary_index].address(), 0x1000000010000001);
        assert_eq!(b[matches[1].secondary_index].address(), 0x1000000010112334);
        assert_eq!(a[matches[2].primary_index].address(), 0x1000000010000005);
        assert_eq!(b[matches[2].secondary_index].address(), 0x1000000010234207);
        assert_eq!(b[matches[2].secondary_index].prime(), 1236);
    }

    #[test]
    fn matches_are_strictly_increasing_on_both_sides() {
        let cache = InstructionCache::new();
        let a: Vec<_> = (0..20)
            .map(|i| Instruction::with_prime(&cache, i, "x", (i % 4) as u64, "op"))
            .collect();
        let b: Vec<_> = (100..130)
            .map(|i| Instruction::with_prime(&cache, i, "x", ((i * 3) % 4) as u64, "op"))
            .collect();
        let matches = align(&a, &b);
        for w in matches.windows(2) {
            assert!(w[0].primary_index < w[1].primary_index);
            assert!(w[0].secondary_index < w[1].secondary_index);
        }
        for m in &matches {
            assert_eq!(a[m.primary_index], b[m.secondary_index]);
        }
    }

    #[test]
    fn same_prime_different_operand_still_aligns() {
        let cache = InstructionCache::new();
        let a = vec![Instruction::with_prime(&cache, 0x1000000010000000, "mov", 4242, "eax, 5")];
        let b = vec![Instruction::with_prime(&cache, 0x2000000020000000, "mov", 4242, "eax, 7")];

        let matches = align(&a, &b);
        assert_eq!(matches.len(), 1, "an operand-only change must still align so the classifier can flag it");
        assert_ne!(a[matches[0].primary_index], b[matches[0].secondary_index], "the aligned pair is not Eq, only same-prime");
    }
}
