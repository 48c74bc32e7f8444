//! Comparison of divergent basic blocks
//!
//! The structural comparator walks two blocks in lockstep. When it hits a
//! mismatch, the SMT-based comparator searches for the point where the blocks
//! realign and proves the snippets before it equivalent.

pub mod mapping;
pub mod outer;
pub mod result;
pub mod smt_block;
pub mod structural;
pub mod sync;

pub use mapping::{Attempt, MappingSnapshot, MappingState, SerialNumber};
pub use outer::{BlockComparator, InlineDecision};
pub use result::{CompareStatistics, Verdict};
pub use smt_block::{CompareConfig, SmtBlockComparator};
pub use structural::StructuralComparator;
pub use sync::{find_snippet_end, SyncResult};
