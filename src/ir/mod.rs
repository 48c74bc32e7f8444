//! Intermediate Representation (IR) for the compared basic blocks

pub mod block;
pub mod instructions;
pub mod types;

// Re-export commonly used types
pub use block::{BasicBlock, Function};
pub use instructions::{
    BinaryFlags, BinaryOp, CastOp, FloatPredicate, InstKind, Instruction, IntPredicate,
};
pub use types::{ConstValue, Constant, Local, Operand, Type, MAX_INT_WIDTH};
