//! Instruction definitions for the snippet IR

use crate::ir::types::{Local, Operand, Type};
use std::fmt;

/// Two-operand arithmetic and bitwise operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    /// Operators that may carry `nsw`/`nuw`
    pub fn is_overflowing(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Shl
        )
    }

    /// Operators that may carry `exact`
    pub fn is_possibly_exact(&self) -> bool {
        matches!(
            self,
            BinaryOp::SDiv | BinaryOp::UDiv | BinaryOp::LShr | BinaryOp::AShr
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::UDiv => "udiv",
            BinaryOp::SRem => "srem",
            BinaryOp::URem => "urem",
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::FDiv => "fdiv",
            BinaryOp::FRem => "frem",
            BinaryOp::Shl => "shl",
            BinaryOp::LShr => "lshr",
            BinaryOp::AShr => "ashr",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        let op = match s {
            "add" => BinaryOp::Add,
            "sub" => BinaryOp::Sub,
            "mul" => BinaryOp::Mul,
            "sdiv" => BinaryOp::SDiv,
            "udiv" => BinaryOp::UDiv,
            "srem" => BinaryOp::SRem,
            "urem" => BinaryOp::URem,
            "fadd" => BinaryOp::FAdd,
            "fsub" => BinaryOp::FSub,
            "fmul" => BinaryOp::FMul,
            "fdiv" => BinaryOp::FDiv,
            "frem" => BinaryOp::FRem,
            "shl" => BinaryOp::Shl,
            "lshr" => BinaryOp::LShr,
            "ashr" => BinaryOp::AShr,
            "and" => BinaryOp::And,
            "or" => BinaryOp::Or,
            "xor" => BinaryOp::Xor,
            _ => return None,
        };
        Some(op)
    }
}

/// Poison-generating flags of a binary operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BinaryFlags {
    /// No signed wrap
    pub nsw: bool,
    /// No unsigned wrap
    pub nuw: bool,
    pub exact: bool,
}

impl BinaryFlags {
    pub fn nsw() -> Self {
        Self {
            nsw: true,
            ..Default::default()
        }
    }

    pub fn nuw() -> Self {
        Self {
            nuw: true,
            ..Default::default()
        }
    }

    pub fn exact() -> Self {
        Self {
            exact: true,
            ..Default::default()
        }
    }
}

/// Integer comparison predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        let pred = match s {
            "eq" => IntPredicate::Eq,
            "ne" => IntPredicate::Ne,
            "ugt" => IntPredicate::Ugt,
            "uge" => IntPredicate::Uge,
            "ult" => IntPredicate::Ult,
            "ule" => IntPredicate::Ule,
            "sgt" => IntPredicate::Sgt,
            "sge" => IntPredicate::Sge,
            "slt" => IntPredicate::Slt,
            "sle" => IntPredicate::Sle,
            _ => return None,
        };
        Some(pred)
    }
}

/// Floating-point comparison predicates
///
/// `O*` predicates are ordered (false if either operand is NaN), `U*`
/// predicates are unordered (true if either operand is NaN).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

impl FloatPredicate {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            FloatPredicate::False => "false",
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::One => "one",
            FloatPredicate::Ord => "ord",
            FloatPredicate::Ueq => "ueq",
            FloatPredicate::Ugt => "ugt",
            FloatPredicate::Uge => "uge",
            FloatPredicate::Ult => "ult",
            FloatPredicate::Ule => "ule",
            FloatPredicate::Une => "une",
            FloatPredicate::Uno => "uno",
            FloatPredicate::True => "true",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        let pred = match s {
            "false" => FloatPredicate::False,
            "oeq" => FloatPredicate::Oeq,
            "ogt" => FloatPredicate::Ogt,
            "oge" => FloatPredicate::Oge,
            "olt" => FloatPredicate::Olt,
            "ole" => FloatPredicate::Ole,
            "one" => FloatPredicate::One,
            "ord" => FloatPredicate::Ord,
            "ueq" => FloatPredicate::Ueq,
            "ugt" => FloatPredicate::Ugt,
            "uge" => FloatPredicate::Uge,
            "ult" => FloatPredicate::Ult,
            "ule" => FloatPredicate::Ule,
            "une" => FloatPredicate::Une,
            "uno" => FloatPredicate::Uno,
            "true" => FloatPredicate::True,
            _ => return None,
        };
        Some(pred)
    }
}

/// Conversion operators; the destination type is the instruction's result type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    ZExt,
    SExt,
    Trunc,
    FPTrunc,
    FPExt,
    FPToUI,
    FPToSI,
    UIToFP,
    SIToFP,
    BitCast,
    PtrToInt,
    IntToPtr,
}

impl CastOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::Trunc => "trunc",
            CastOp::FPTrunc => "fptrunc",
            CastOp::FPExt => "fpext",
            CastOp::FPToUI => "fptoui",
            CastOp::FPToSI => "fptosi",
            CastOp::UIToFP => "uitofp",
            CastOp::SIToFP => "sitofp",
            CastOp::BitCast => "bitcast",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Self> {
        let op = match s {
            "zext" => CastOp::ZExt,
            "sext" => CastOp::SExt,
            "trunc" => CastOp::Trunc,
            "fptrunc" => CastOp::FPTrunc,
            "fpext" => CastOp::FPExt,
            "fptoui" => CastOp::FPToUI,
            "fptosi" => CastOp::FPToSI,
            "uitofp" => CastOp::UIToFP,
            "sitofp" => CastOp::SIToFP,
            "bitcast" => CastOp::BitCast,
            "ptrtoint" => CastOp::PtrToInt,
            "inttoptr" => CastOp::IntToPtr,
            _ => return None,
        };
        Some(op)
    }
}

/// The operation performed by an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    FNeg {
        operand: Operand,
    },
    Binary {
        op: BinaryOp,
        flags: BinaryFlags,
        lhs: Operand,
        rhs: Operand,
    },
    ICmp {
        pred: IntPredicate,
        lhs: Operand,
        rhs: Operand,
    },
    FCmp {
        pred: FloatPredicate,
        lhs: Operand,
        rhs: Operand,
    },
    Cast {
        op: CastOp,
        operand: Operand,
    },
    Select {
        cond: Operand,
        on_true: Operand,
        on_false: Operand,
    },
    Call {
        callee: String,
        args: Vec<Operand>,
    },
    Ret {
        value: Option<Operand>,
    },
    Br {
        target: String,
    },
    CondBr {
        cond: Operand,
        on_true: String,
        on_false: String,
    },
    /// Any instruction without dedicated support; kept so that the
    /// structural comparator can still match it
    Opaque {
        opcode: String,
        operands: Vec<Operand>,
    },
}

/// A single instruction, optionally defining a result value
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub result: Option<Local>,
    pub kind: InstKind,
}

impl Instruction {
    pub fn new(result: Option<Local>, kind: InstKind) -> Self {
        Self { result, kind }
    }

    /// Instruction defining `%name` of type `ty`
    pub fn assign(name: impl Into<String>, ty: Type, kind: InstKind) -> Self {
        Self {
            result: Some(Local::new(name, ty)),
            kind,
        }
    }

    pub fn opcode(&self) -> &str {
        match &self.kind {
            InstKind::FNeg { .. } => "fneg",
            InstKind::Binary { op, .. } => op.mnemonic(),
            InstKind::ICmp { .. } => "icmp",
            InstKind::FCmp { .. } => "fcmp",
            InstKind::Cast { op, .. } => op.mnemonic(),
            InstKind::Select { .. } => "select",
            InstKind::Call { .. } => "call",
            InstKind::Ret { .. } => "ret",
            InstKind::Br { .. } | InstKind::CondBr { .. } => "br",
            InstKind::Opaque { opcode, .. } => opcode,
        }
    }

    /// All value operands in source order
    pub fn operands(&self) -> Vec<&Operand> {
        match &self.kind {
            InstKind::FNeg { operand } | InstKind::Cast { operand, .. } => vec![operand],
            InstKind::Binary { lhs, rhs, .. }
            | InstKind::ICmp { lhs, rhs, .. }
            | InstKind::FCmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstKind::Select {
                cond,
                on_true,
                on_false,
            } => vec![cond, on_true, on_false],
            InstKind::Call { args, .. } => args.iter().collect(),
            InstKind::Ret { value } => value.iter().collect(),
            InstKind::Br { .. } => Vec::new(),
            InstKind::CondBr { cond, .. } => vec![cond],
            InstKind::Opaque { operands, .. } => operands.iter().collect(),
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            InstKind::Ret { .. } | InstKind::Br { .. } | InstKind::CondBr { .. }
        )
    }

    /// Calls to debug-info intrinsics (`llvm.dbg.*`)
    pub fn is_debug_info(&self) -> bool {
        matches!(&self.kind, InstKind::Call { callee, .. } if callee.starts_with("llvm.dbg."))
    }

    /// Type of the defined value, `void` if none
    pub fn result_type(&self) -> Type {
        self.result
            .as_ref()
            .map(|local| local.ty.clone())
            .unwrap_or(Type::Void)
    }
}

fn fmt_typed(f: &mut fmt::Formatter<'_>, operand: &Operand) -> fmt::Result {
    write!(f, "{} {}", operand.ty(), operand)
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = &self.result {
            write!(f, "{} = ", result)?;
        }
        match &self.kind {
            InstKind::FNeg { operand } => {
                write!(f, "fneg ")?;
                fmt_typed(f, operand)
            }
            InstKind::Binary {
                op,
                flags,
                lhs,
                rhs,
            } => {
                write!(f, "{}", op.mnemonic())?;
                if flags.exact {
                    write!(f, " exact")?;
                }
                if flags.nuw {
                    write!(f, " nuw")?;
                }
                if flags.nsw {
                    write!(f, " nsw")?;
                }
                write!(f, " {} {}, {}", lhs.ty(), lhs, rhs)
            }
            InstKind::ICmp { pred, lhs, rhs } => {
                write!(f, "icmp {} {} {}, {}", pred.mnemonic(), lhs.ty(), lhs, rhs)
            }
            InstKind::FCmp { pred, lhs, rhs } => {
                write!(f, "fcmp {} {} {}, {}", pred.mnemonic(), lhs.ty(), lhs, rhs)
            }
            InstKind::Cast { op, operand } => {
                write!(f, "{} ", op.mnemonic())?;
                fmt_typed(f, operand)?;
                write!(f, " to {}", self.result_type())
            }
            InstKind::Select {
                cond,
                on_true,
                on_false,
            } => {
                write!(f, "select ")?;
                fmt_typed(f, cond)?;
                write!(f, ", ")?;
                fmt_typed(f, on_true)?;
                write!(f, ", ")?;
                fmt_typed(f, on_false)
            }
            InstKind::Call { callee, args } => {
                write!(f, "call {} @{}(", self.result_type(), callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    fmt_typed(f, arg)?;
                }
                write!(f, ")")
            }
            InstKind::Ret { value: Some(value) } => {
                write!(f, "ret ")?;
                fmt_typed(f, value)
            }
            InstKind::Ret { value: None } => write!(f, "ret void"),
            InstKind::Br { target } => write!(f, "br label %{}", target),
            InstKind::CondBr {
                cond,
                on_true,
                on_false,
            } => {
                write!(f, "br ")?;
                fmt_typed(f, cond)?;
                write!(f, ", label %{}, label %{}", on_true, on_false)
            }
            InstKind::Opaque { opcode, operands } => {
                write!(f, "{}", opcode)?;
                for (i, operand) in operands.iter().enumerate() {
                    write!(f, "{}", if i == 0 { " " } else { ", " })?;
                    fmt_typed(f, operand)?;
                }
                Ok(())
            }
        }
    }
}
