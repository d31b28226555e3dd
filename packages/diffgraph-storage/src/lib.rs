//! diffgraph-storage: the writer-side port for `diffgraph-core`'s matching
//! output, plus one concrete, dependency-light adapter.
//!
//! Spec §6 `[AMBIENT]` fixes the scope deliberately narrow: the
//! [`diffgraph_core::FixedPointWriter`] trait (re-exported here for
//! convenience) is the only port, and [`JsonLinesWriter`] the only
//! implementation this crate ships — enough for tests and examples to
//! observe engine output without standing up a database. A relational
//! schema is out of scope.

pub mod error;
pub mod fixture;
pub mod json_lines;

pub use diffgraph_core::FixedPointWriter;
pub use error::{Result, StorageError};
pub use fixture::JsonFixtureLoader;
pub use json_lines::JsonLinesWriter;
