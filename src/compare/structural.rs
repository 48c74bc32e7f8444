//! Instruction-by-instruction structural comparison of two blocks
//!
//! Two instructions match when they perform the same operation on operands
//! that correspond. Constants correspond by value, locals by serial number;
//! a pair of locals seen for the first time is given a fresh common serial
//! number. On the first mismatch the driver hands over to the SMT-based
//! comparator, if one is available.

use crate::compare::mapping::{MappingState, SerialNumber};
use crate::compare::outer::{BlockComparator, InlineDecision};
use crate::compare::result::Verdict;
use crate::compare::smt_block::SmtBlockComparator;
use crate::error::CompareError;
use crate::ir::{BasicBlock, Function, InstKind, Instruction, Local, Operand};
use crate::semantics::smt::SmtBackend;
use log::{debug, trace};

/// Reference outer comparator
#[derive(Debug, Clone, Default)]
pub struct StructuralComparator {
    mapping: MappingState,
    inline: InlineDecision,
    /// Serial numbers created by the most recent instruction comparison
    last_serials: Vec<SerialNumber>,
}

impl StructuralComparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare two functions: parameters positionally, then their blocks
    pub fn compare_functions<B: SmtBackend>(
        &mut self,
        left: &Function,
        right: &Function,
        smt: Option<&mut SmtBlockComparator<B>>,
    ) -> Result<Verdict, CompareError> {
        if left.return_type != right.return_type || left.params.len() != right.params.len() {
            debug!("Signatures of @{} and @{} differ", left.name, right.name);
            return Ok(Verdict::NotEquivalent);
        }
        for (l, r) in left.params.iter().zip(&right.params) {
            if l.ty != r.ty {
                debug!("Parameter {} of type {} vs {} of type {}", l, l.ty, r, r.ty);
                return Ok(Verdict::NotEquivalent);
            }
            self.mapping.map_pair(l, r);
        }
        self.compare_blocks(&left.block, &right.block, smt)
    }

    /// Walk both blocks in lockstep, falling back to SMT comparison on a
    /// structural mismatch
    pub fn compare_blocks<B: SmtBackend>(
        &mut self,
        left: &BasicBlock,
        right: &BasicBlock,
        mut smt: Option<&mut SmtBlockComparator<B>>,
    ) -> Result<Verdict, CompareError> {
        let (mut inst_l, mut inst_r) = (0usize, 0usize);
        loop {
            inst_l = self.skip_from(left, inst_l);
            inst_r = self.skip_from(right, inst_r);
            match (inst_l >= left.end(), inst_r >= right.end()) {
                (true, true) => return Ok(Verdict::Equivalent),
                (true, false) | (false, true) => {
                    debug!("Blocks {} and {} differ in length", left.label, right.label);
                    return Ok(Verdict::NotEquivalent);
                }
                (false, false) => {}
            }

            let (l, r) = (&left.instructions[inst_l], &right.instructions[inst_r]);
            if !self.cmp_instructions(l, r) {
                debug!("Mismatch at ({}, {}): `{}` vs `{}`", inst_l, inst_r, l, r);
                let Some(smt) = smt.as_deref_mut() else {
                    return Ok(Verdict::NotEquivalent);
                };
                if !smt
                    .compare(self, left, right, &mut inst_l, &mut inst_r)?
                    .is_equivalent()
                {
                    return Ok(Verdict::NotEquivalent);
                }
            }
            inst_l = inst_l.wrapping_add(1);
            inst_r = inst_r.wrapping_add(1);
        }
    }

    fn skip_from(&self, block: &BasicBlock, mut pos: usize) -> usize {
        while pos < block.end() && self.may_skip_instruction(&block.instructions[pos]) {
            pos += 1;
        }
        pos
    }

    /// Compare two instructions, mapping their operands and results on the way
    pub fn cmp_instructions(&mut self, left: &Instruction, right: &Instruction) -> bool {
        self.last_serials.clear();
        if left.result_type() != right.result_type() {
            return false;
        }

        let same_operation = match (&left.kind, &right.kind) {
            (InstKind::FNeg { .. }, InstKind::FNeg { .. })
            | (InstKind::Select { .. }, InstKind::Select { .. })
            | (InstKind::Ret { .. }, InstKind::Ret { .. })
            | (InstKind::Br { .. }, InstKind::Br { .. })
            | (InstKind::CondBr { .. }, InstKind::CondBr { .. }) => true,
            (
                InstKind::Binary { op: a, flags: fa, .. },
                InstKind::Binary { op: b, flags: fb, .. },
            ) => a == b && fa == fb,
            (InstKind::ICmp { pred: a, .. }, InstKind::ICmp { pred: b, .. }) => a == b,
            (InstKind::FCmp { pred: a, .. }, InstKind::FCmp { pred: b, .. }) => a == b,
            (InstKind::Cast { op: a, .. }, InstKind::Cast { op: b, .. }) => a == b,
            (InstKind::Call { callee: a, .. }, InstKind::Call { callee: b, .. }) => {
                if a != b {
                    self.inline = InlineDecision {
                        left: Some(a.clone()),
                        right: Some(b.clone()),
                    };
                }
                a == b
            }
            (InstKind::Opaque { opcode: a, .. }, InstKind::Opaque { opcode: b, .. }) => a == b,
            _ => false,
        };
        if !same_operation {
            return false;
        }

        let (ops_l, ops_r) = (left.operands(), right.operands());
        if ops_l.len() != ops_r.len() {
            return false;
        }
        for (l, r) in ops_l.into_iter().zip(ops_r) {
            if !self.cmp_operands(l, r) {
                trace!("Operands {} and {} differ", l, r);
                return false;
            }
        }

        match (&left.result, &right.result) {
            (Some(l), Some(r)) => self.cmp_locals(l, r),
            (None, None) => true,
            _ => false,
        }
    }

    fn cmp_operands(&mut self, left: &Operand, right: &Operand) -> bool {
        match (left, right) {
            (Operand::Const(l), Operand::Const(r)) => l.same_as(r),
            (Operand::Local(l), Operand::Local(r)) => self.cmp_locals(l, r),
            _ => false,
        }
    }

    fn cmp_locals(&mut self, left: &Local, right: &Local) -> bool {
        if left.ty != right.ty {
            return false;
        }
        match (
            self.mapping.serial_l(&left.name),
            self.mapping.serial_r(&right.name),
        ) {
            (Some(a), Some(b)) => a == b,
            (None, None) => {
                let sn = self.mapping.map_pair(left, right);
                self.last_serials.push(sn);
                true
            }
            _ => false,
        }
    }
}

impl BlockComparator for StructuralComparator {
    fn may_skip_instruction(&self, inst: &Instruction) -> bool {
        inst.is_debug_info()
            || matches!(&inst.kind, InstKind::Call { callee, .. } if callee.starts_with("llvm.lifetime."))
    }

    fn cmp_blocks_from(
        &mut self,
        left: &BasicBlock,
        right: &BasicBlock,
        pos_l: usize,
        pos_r: usize,
    ) -> bool {
        let (mut i, mut j) = (pos_l, pos_r);
        loop {
            i = self.skip_from(left, i);
            j = self.skip_from(right, j);
            match (i >= left.end(), j >= right.end()) {
                (true, true) => return true,
                (false, false) => {}
                _ => return false,
            }
            if !self.cmp_instructions(&left.instructions[i], &right.instructions[j]) {
                return false;
            }
            i += 1;
            j += 1;
        }
    }

    fn undo_last_inst_compare(
        &mut self,
        left: &BasicBlock,
        right: &BasicBlock,
        pos_l: usize,
        pos_r: usize,
    ) {
        for sn in std::mem::take(&mut self.last_serials) {
            if let Some((l, _)) = self.mapping.pair(sn).cloned() {
                self.mapping.unmap_l(&l.name);
            }
        }
        if let Some(result) = left.get(pos_l).and_then(|inst| inst.result.as_ref()) {
            self.mapping.unmap_l(&result.name);
        }
        if let Some(result) = right.get(pos_r).and_then(|inst| inst.result.as_ref()) {
            self.mapping.unmap_r(&result.name);
        }
    }

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
