//! Synchronization search
//!
//! Scans position pairs in left-then-right order for the first pair from
//! which the structural comparator matches the remainders of both blocks.

use crate::compare::mapping::{Attempt, MappingSnapshot};
use crate::compare::outer::BlockComparator;
use crate::compare::result::CompareStatistics;
use crate::ir::BasicBlock;
use log::{debug, trace};

/// Outcome of a synchronization search
#[derive(Debug, Clone, PartialEq)]
pub enum SyncResult {
    /// The blocks realign at `(end_l, end_r)`; the mapping recorded by the
    /// structural comparison is kept and `pre_attempt` holds the state from
    /// before it
    Found {
        end_l: usize,
        end_r: usize,
        pre_attempt: MappingSnapshot,
    },
    NotFound,
}

/// Find the first synchronization point at or after `(inst_l, inst_r)`
///
/// Never invokes SMT-based comparison. Every rejected candidate is rolled
/// back before the next one is tried, so `NotFound` leaves the mapping and
/// the inlining decision as they were on entry.
pub fn find_snippet_end<C: BlockComparator + ?Sized>(
    outer: &mut C,
    left: &BasicBlock,
    right: &BasicBlock,
    inst_l: usize,
    inst_r: usize,
    stats: &mut CompareStatistics,
) -> SyncResult {
    for pos_l in inst_l..left.end() {
        if outer.may_skip_instruction(&left.instructions[pos_l]) {
            continue;
        }
        for pos_r in inst_r..right.end() {
            if outer.may_skip_instruction(&right.instructions[pos_r]) {
                continue;
            }
            stats.sync_candidates_tried += 1;

            let attempt = Attempt::begin(outer);
            if outer.cmp_blocks_from(left, right, pos_l, pos_r) {
                debug!("Blocks synchronize at ({}, {})", pos_l, pos_r);
                stats.sync_points_found += 1;
                return SyncResult::Found {
                    end_l: pos_l,
                    end_r: pos_r,
                    pre_attempt: attempt.commit(),
                };
            }
            trace!("Candidate ({}, {}) rejected", pos_l, pos_r);
            attempt.rollback(outer);
        }
    }
    SyncResult::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::mapping::MappingState;
    use crate::compare::outer::InlineDecision;
    use crate::ir::{InstKind, Instruction, Local, Operand, Type};

    /// Accepts exactly one position pair; every call dirties the mapping
    struct Oracle {
        accept: Option<(usize, usize)>,
        mapping: MappingState,
        inline: InlineDecision,
        calls: Vec<(usize, usize)>,
    }

    impl Oracle {
        fn new(accept: Option<(usize, usize)>) -> Self {
            Self {
                accept,
                mapping: MappingState::new(),
                inline: InlineDecision::none(),
                calls: Vec::new(),
            }
        }
    }

    impl BlockComparator for Oracle {
        fn may_skip_instruction(&self, inst: &Instruction) -> bool {
            inst.is_debug_info()
        }

        fn cmp_blocks_from(
            &mut self,
            _left: &BasicBlock,
            _right: &BasicBlock,
            pos_l: usize,
            pos_r: usize,
        ) -> bool {
            self.calls.push((pos_l, pos_r));
            let name = format!("v{}_{}", pos_l, pos_r);
            self.mapping.map_pair(
                &Local::new(name.clone(), Type::Int(32)),
                &Local::new(name.clone(), Type::Int(32)),
            );
            self.inline = InlineDecision {
                left: Some(name),
                right: None,
            };
            self.accept == Some((pos_l, pos_r))
        }

        fn undo_last_inst_compare(&mut self, _: &BasicBlock, _: &BasicBlock, _: usize, _: usize) {}

        fn mapping(&self) -> &MappingState {
            &self.mapping
        }

        fn mapping_mut(&mut self) -> &mut MappingState {
            &mut self.mapping
        }

        fn inline_decision(&self) -> InlineDecision {
            self.inline.clone()
        }

        fn set_inline_decision(&mut self, decision: InlineDecision) {
            self.inline = decision;
        }
    }

    fn opaque(n: usize) -> BasicBlock {
        let insts = (0..n)
            .map(|i| {
                Instruction::assign(
                    format!("t{}", i),
                    Type::Int(32),
                    InstKind::Opaque {
                        opcode: "freeze".to_string(),
                        operands: vec![Operand::local("a", Type::Int(32))],
                    },
                )
            })
            .collect();
        BasicBlock::new("entry", insts)
    }

    fn dbg() -> Instruction {
        Instruction::new(
            None,
            InstKind::Call {
                callee: "llvm.dbg.value".to_string(),
                args: vec![],
            },
        )
    }

    #[test]
    fn test_scan_order() {
        let (left, right) = (opaque(3), opaque(2));
        let mut outer = Oracle::new(Some((1, 1)));
        let mut stats = CompareStatistics::new();
        let result = find_snippet_end(&mut outer, &left, &right, 0, 0, &mut stats);
        assert!(matches!(result, SyncResult::Found { end_l: 1, end_r: 1, .. }));
        assert_eq!(outer.calls, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_eq!(stats.sync_candidates_tried, 4);
        assert_eq!(stats.sync_points_found, 1);
    }

    #[test]
    fn test_inner_scan_restarts_at_right_offset() {
        let (left, right) = (opaque(2), opaque(3));
        let mut outer = Oracle::new(None);
        let mut stats = CompareStatistics::new();
        find_snippet_end(&mut outer, &left, &right, 0, 1, &mut stats);
        assert_eq!(outer.calls, vec![(0, 1), (0, 2), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_found_keeps_matched_mapping() {
        let (left, right) = (opaque(2), opaque(2));
        let mut outer = Oracle::new(Some((1, 0)));
        let mut stats = CompareStatistics::new();
        let result = find_snippet_end(&mut outer, &left, &right, 0, 0, &mut stats);
        let SyncResult::Found { pre_attempt, .. } = result else {
            panic!("expected a synchronization point");
        };
        // Only the accepted candidate's mapping survives
        assert_eq!(outer.mapping.mapped_values_by_sn.len(), 1);
        assert!(outer.mapping.serial_l("v1_0").is_some());
        assert!(pre_attempt.state().mapped_values_by_sn.is_empty());
        assert_eq!(outer.inline.left.as_deref(), Some("v1_0"));
    }

    #[test]
    fn test_not_found_restores_everything() {
        let (left, right) = (opaque(2), opaque(2));
        let mut outer = Oracle::new(None);
        outer.mapping.map_pair(
            &Local::new("a", Type::Int(32)),
            &Local::new("a", Type::Int(32)),
        );
        let before = outer.mapping.clone();
        let mut stats = CompareStatistics::new();
        let result = find_snippet_end(&mut outer, &left, &right, 0, 0, &mut stats);
        assert_eq!(result, SyncResult::NotFound);
        assert_eq!(outer.mapping, before);
        assert!(outer.inline.is_empty());
    }

    #[test]
    fn test_skippable_positions_are_not_candidates() {
        let mut left = opaque(2);
        left.instructions.insert(1, dbg());
        let mut right = opaque(1);
        right.instructions.insert(0, dbg());
        let mut outer = Oracle::new(None);
        let mut stats = CompareStatistics::new();
        find_snippet_end(&mut outer, &left, &right, 0, 0, &mut stats);
        assert_eq!(outer.calls, vec![(0, 1), (2, 1)]);
    }
}
