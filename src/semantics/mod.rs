//! Symbolic semantics of snippets and the SMT-based equivalence decision

pub mod encoder;
pub mod equivalence;
pub mod smt;
pub mod terms;

// Re-export main functionality
pub use encoder::{Side, SnippetEncoder};
pub use equivalence::{EncodedQuery, EquivalenceChecker, Snippet, TimeBudget};
pub use smt::{SatResult, SmtBackend, SolverConfig, Z3Backend};
pub use terms::{SmtScript, SmtTerm, Sort};
