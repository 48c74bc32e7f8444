//! Basic blocks and the single-block functions they are parsed from

use crate::ir::instructions::Instruction;
use crate::ir::types::{Local, Type};
use std::fmt;

/// An ordered, finite sequence of instructions, normally ending in a terminator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicBlock {
    pub label: String,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        Self {
            label: label.into(),
            instructions,
        }
    }

    /// Position one past the last instruction
    pub fn end(&self) -> usize {
        self.instructions.len()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&Instruction> {
        self.instructions.get(pos)
    }

    /// Whether `name` is defined by an instruction in `[start, end)`
    pub fn defines_in(&self, name: &str, start: usize, end: usize) -> bool {
        self.instructions
            .get(start..end.min(self.end()))
            .unwrap_or(&[])
            .iter()
            .any(|inst| inst.result.as_ref().is_some_and(|r| r.name == name))
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.label.is_empty() {
            writeln!(f, "{}:", self.label)?;
        }
        for inst in &self.instructions {
            writeln!(f, "  {}", inst)?;
        }
        Ok(())
    }
}

/// A function consisting of a single basic block
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Local>,
    pub block: BasicBlock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instructions::{BinaryFlags, BinaryOp, InstKind};
    use crate::ir::types::Operand;

    #[test]
    fn test_defines_in_range() {
        let add = Instruction::assign(
            "c",
            Type::Int(32),
            InstKind::Binary {
                op: BinaryOp::Add,
                flags: BinaryFlags::default(),
                lhs: Operand::local("a", Type::Int(32)),
                rhs: Operand::local("b", Type::Int(32)),
            },
        );
        let ret = Instruction::new(
            None,
            InstKind::Ret {
                value: Some(Operand::local("c", Type::Int(32))),
            },
        );
        let block = BasicBlock::new("entry", vec![add, ret]);

        assert!(block.defines_in("c", 0, 1));
        assert!(!block.defines_in("c", 1, 2));
        assert!(!block.defines_in("a", 0, 2));
        assert!(!block.defines_in("c", 0, 0));
        assert!(block.defines_in("c", 0, 10));
        assert_eq!(block.end(), 2);
    }
}
