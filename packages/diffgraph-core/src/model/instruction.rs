//! Instructions and the per-comparison mnemonic interning cache (spec §3).
//!
//! Mnemonic storage dominates memory if every instruction owns its own
//! `String` — a dedicated interning table scoped to one comparison run is
//! mandatory (spec §9 "String interning for mnemonics"). A process-global
//! table is rejected because it would outlive the call graphs it serves.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

/// First few thousand primes, computed once via a sieve. Mnemonics are
/// assigned primes in encounter order, so the same input always yields the
/// same assignment (determinism, spec §5 "Ordering guarantees").
static PRIME_TABLE: LazyLock<Vec<u64>> = LazyLock::new(|| sieve_primes(200_000));

fn sieve_primes(limit: u64) -> Vec<u64> {
    let mut is_composite = vec![false; (limit + 1) as usize];
    let mut primes = Vec::new();
    for n in 2..=limit {
        if !is_composite[n as usize] {
            primes.push(n);
            let mut m = n * n;
            while m <= limit {
                is_composite[m as usize] = true;
                m += n;
            }
        }
    }
    primes
}

fn nth_prime(n: usize) -> u64 {
    let table = &*PRIME_TABLE;
    if n < table.len() {
        table[n]
    } else {
        // Table exhausted (comparison with an enormous mnemonic vocabulary);
        // fall back to the largest known prime raised by an odd offset.
        // This keeps the function total without reseeding the sieve mid-run.
        table[table.len() - 1] + 2 * (n - table.len() + 1) as u64 + 1
    }
}

/// A single `(prime, operand)` pair — the signature the original BinDiff
/// uses for de-duplicating instruction bodies (`instruction_test.cc`,
/// `InstructionTest.CacheEntry`).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub prime: u64,
    pub operands: String,
}

impl PartialEq for CacheEntry {
    fn eq(&self, other: &Self) -> bool {
        self.prime == other.prime && self.operands == other.operands
    }
}
impl Eq for CacheEntry {}

/// Process-local mnemonic interning table, scoped to one comparison run.
///
/// No instruction may outlive the cache it was created against — in Rust
/// terms, every [`Instruction`] holds an `Arc<str>` cloned out of this table
/// rather than a borrow, so the lifetime rule is enforced by construction
/// (`Instruction::new` requires a `&InstructionCache`) rather than the
/// borrow checker. Safe concurrent population is required because loaders
/// may build flow graphs for many functions in parallel (spec §5 notes the
/// cache is read-mostly during matching, but is written during load).
#[derive(Debug, Default)]
pub struct InstructionCache {
    mnemonics: DashMap<Arc<str>, u64>,
    next_index: AtomicUsize,
}

impl InstructionCache {
    pub fn new() -> Self {
        Self {
            mnemonics: DashMap::new(),
            next_index: AtomicUsize::new(0),
        }
    }

    /// Intern `mnemonic`, returning the canonical stored string and its
    /// deterministically assigned prime.
    pub fn intern(&self, mnemonic: &str) -> (Arc<str>, u64) {
        if let Some(existing) = self.mnemonics.get(mnemonic) {
            return (Arc::clone(existing.key()), *existing.value());
        }
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        let prime = nth_prime(index);
        let arc: Arc<str> = Arc::from(mnemonic);
        // Another thread may have raced us to insert the same mnemonic; the
        // entry API keeps whichever prime was assigned first.
        let assigned = *self.mnemonics.entry(Arc::clone(&arc)).or_insert(prime);
        (arc, assigned)
    }

    pub fn len(&self) -> usize {
        self.mnemonics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mnemonics.is_empty()
    }
}

/// An immutable disassembled instruction.
///
/// Equality and hashing are defined solely by `(prime, operands)` per spec
/// §3 — two instructions with different addresses or even different
/// mnemonic spellings (should the disassembler ever alias mnemonics) are
/// equal if their prime and operand string match.
#[derive(Debug, Clone)]
pub struct Instruction {
    address: u64,
    mnemonic: Arc<str>,
    prime: u64,
    operands: String,
}

impl Instruction {
    pub fn new(cache: &InstructionCache, address: u64, mnemonic: &str, operands: impl Into<String>) -> Self {
        let (mnemonic, prime) = cache.intern(mnemonic);
        Self {
            address,
            mnemonic,
            prime,
            operands: operands.into(),
        }
    }

    /// Construct directly from an already-known prime, bypassing mnemonic
    /// interning for the prime itself (used by the original test vectors in
    /// `original_source/instruction_test.cc`, which hand-pick primes rather
    /// than deriving them from a mnemonic).
    pub fn with_prime(cache: &InstructionCache, address: u64, mnemonic: &str, prime: u64, operands: impl Into<String>) -> Self {
        let (mnemonic, _) = cache.intern(mnemonic);
        Self {
            address,
            mnemonic,
            prime,
            operands: operands.into(),
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn prime(&self) -> u64 {
        self.prime
    }

    pub fn operand_string(&self) -> &str {
        &self.operands
    }

    pub fn cache_entry(&self) -> CacheEntry {
        CacheEntry {
            prime: self.prime,
            operands: self.operands.clone(),
        }
    }
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        self.prime == other.prime && self.operands == other.operands
    }
}
impl Eq for Instruction {}

/// Look up an instruction by address within an ordered sequence (mirrors
/// the original's free function `GetInstruction`).
pub fn instruction_at(instructions: &[Instruction], address: u64) -> Option<&Instruction> {
    instructions.iter().find(|i| i.address() == address)
}
