//! Capabilities the snippet core needs from the outer structural comparator

use crate::compare::mapping::MappingState;
use crate::ir::{BasicBlock, Instruction};

/// Pending decision of the outer comparator to inline a pair of calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineDecision {
    pub left: Option<String>,
    pub right: Option<String>,
}

impl InlineDecision {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// The outer instruction-by-instruction comparator, as seen by the snippet core
///
/// The mapping state and the inlining decision are owned by the implementor;
/// the core only borrows them under snapshot/restore.
pub trait BlockComparator {
    /// Whether `inst` may be skipped during comparison (debug info and similar)
    fn may_skip_instruction(&self, inst: &Instruction) -> bool;

    /// Structurally compare the remainders of two blocks from the given
    /// positions, updating the mapping as matches are made
    ///
    /// Implementations must not call back into SMT-based comparison.
    fn cmp_blocks_from(
        &mut self,
        left: &BasicBlock,
        right: &BasicBlock,
        pos_l: usize,
        pos_r: usize,
    ) -> bool;

    /// Roll back the effects of the last (failed) comparison of the
    /// instructions at `pos_l` and `pos_r`
    fn undo_last_inst_compare(
        &mut self,
        left: &BasicBlock,
        right: &BasicBlock,
        pos_l: usize,
        pos_r: usize,
    );

    fn mapping(&self) -> &MappingState;

    fn mapping_mut(&mut self) -> &mut MappingState;

    fn inline_decision(&self) -> InlineDecision;

    fn set_inline_decision(&mut self, decision: InlineDecision);
}
