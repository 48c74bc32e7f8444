//! snipeq - SMT-based equivalence of divergent basic blocks
//!
//! Compares two versions of a function instruction by instruction. Where the
//! versions diverge, the SMT-based comparator finds the point where they
//! realign and proves that the instructions in between compute the same
//! values.

pub mod compare;
pub mod error;
pub mod ir;
pub mod parser;
pub mod semantics;

pub use compare::{CompareConfig, SmtBlockComparator, StructuralComparator, Verdict};
pub use error::CompareError;
