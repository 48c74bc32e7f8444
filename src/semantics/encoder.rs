//! SMT encoding of snippet instructions
//!
//! Every supported instruction becomes exactly one assertion relating its
//! result variable to its operands. SSA names make the naming trivial: a
//! value `%v` on side `s` becomes the constant `<prefix(s)>v`, so the two
//! sides never share a variable unless an equality is asserted explicitly.
//!
//! Instructions whose result is poison under some precondition (`nsw`,
//! `nuw`, `exact`) are encoded as `precondition => (res == value)`, which
//! leaves the result unconstrained exactly when the precondition fails.

use crate::compare::mapping::SerialNumber;
use crate::error::CompareError;
use crate::ir::{
    BasicBlock, BinaryFlags, BinaryOp, CastOp, ConstValue, Constant, FloatPredicate, InstKind,
    Instruction, IntPredicate, Local, Operand, Type, MAX_INT_WIDTH,
};
use crate::semantics::terms::{RoundingMode, SmtOp, SmtScript, SmtTerm, Sort};
use std::collections::{BTreeMap, HashMap};

/// Pure math functions modeled as uninterpreted functions over doubles
pub const UNINTERPRETED_MATH_FUNCTIONS: &[&str] = &[
    "acos", "asin", "atan", "cos", "cosh", "sin", "sinh", "tanh", "exp", "log", "log10", "sqrt",
];

const RNE: RoundingMode = RoundingMode::NearestEven;

/// Which version of the code a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn prefix(&self) -> &'static str {
        match self {
            Side::Left => "L_",
            Side::Right => "R_",
        }
    }
}

/// SMT sort of an IR type
pub fn sort_of_type(ty: &Type) -> Result<Sort, CompareError> {
    match ty {
        Type::Int(1) => Ok(Sort::Bool),
        Type::Int(width) if *width > 0 && *width <= MAX_INT_WIDTH => Ok(Sort::BitVec(*width)),
        Type::Float => Ok(Sort::FLOAT32),
        Type::Double => Ok(Sort::FLOAT64),
        other => Err(CompareError::unsupported(format!(
            "Unsupported operand type {}",
            other
        ))),
    }
}

/// Literal term for a constant operand
pub fn constant_term(constant: &Constant) -> Result<SmtTerm, CompareError> {
    match (&constant.ty, constant.value) {
        (Type::Int(1), ConstValue::Int(value)) => Ok(SmtTerm::bool(value != 0)),
        (Type::Int(width), ConstValue::Int(value)) => Ok(SmtTerm::bv(value, *width)),
        (Type::Float, ConstValue::Fp(value)) => Ok(SmtTerm::fp(value, Sort::FLOAT32)),
        (Type::Double, ConstValue::Fp(value)) => Ok(SmtTerm::fp(value, Sort::FLOAT64)),
        _ => Err(CompareError::unsupported(format!(
            "Unsupported constant type {}",
            constant.ty
        ))),
    }
}

/// Encodes instructions of either side into a shared script
pub struct SnippetEncoder<'a> {
    script: &'a mut SmtScript,
}

impl<'a> SnippetEncoder<'a> {
    pub fn new(script: &'a mut SmtScript) -> Self {
        Self { script }
    }

    /// Variable for a local value of the given side
    pub fn local_term(&mut self, side: Side, local: &Local) -> Result<SmtTerm, CompareError> {
        let sort = sort_of_type(&local.ty)?;
        let name = format!("{}{}", side.prefix(), local.name);
        self.script
            .declare_const(&name, sort)
            .map_err(CompareError::UnsupportedOperation)?;
        Ok(SmtTerm::var(name))
    }

    /// Literal for constants, side-prefixed variable otherwise
    pub fn operand_term(&mut self, side: Side, operand: &Operand) -> Result<SmtTerm, CompareError> {
        match operand {
            Operand::Const(constant) => constant_term(constant),
            Operand::Local(local) => self.local_term(side, local),
        }
    }

    /// Assert `left == right` for every operand of a left instruction whose
    /// serial number has a cross-mapped pair
    pub fn seed_input_equalities(
        &mut self,
        inst: &Instruction,
        sn_map_l: &HashMap<String, SerialNumber>,
        mapped_values_by_sn: &BTreeMap<SerialNumber, (Local, Local)>,
    ) -> Result<(), CompareError> {
        for operand in inst.operands() {
            let Some(local) = operand.as_local() else {
                continue;
            };
            let Some(sn) = sn_map_l.get(&local.name) else {
                continue;
            };
            if let Some((left, right)) = mapped_values_by_sn.get(sn) {
                self.assert_equal_across(left, right)?;
            }
        }
        Ok(())
    }

    /// Assert that a left and a right value are equal
    pub fn assert_equal_across(&mut self, left: &Local, right: &Local) -> Result<(), CompareError> {
        if sort_of_type(&left.ty)? != sort_of_type(&right.ty)? {
            return Err(CompareError::unsupported(format!(
                "cannot equate {} of type {} with {} of type {}",
                left, left.ty, right, right.ty
            )));
        }
        let l = self.local_term(Side::Left, left)?;
        let r = self.local_term(Side::Right, right)?;
        self.script.assert(l.eq(r));
        Ok(())
    }

    /// Encode the instructions in `[start, end)` of `block`
    pub fn encode_range(
        &mut self,
        side: Side,
        block: &BasicBlock,
        start: usize,
        end: usize,
    ) -> Result<(), CompareError> {
        let range = block.instructions.get(start..end.min(block.end())).unwrap_or(&[]);
        for inst in range {
            self.encode_instruction(side, inst)?;
        }
        Ok(())
    }

    /// Add the assertion defining the result of `inst`
    pub fn encode_instruction(&mut self, side: Side, inst: &Instruction) -> Result<(), CompareError> {
        if inst.is_debug_info() {
            return Ok(());
        }
        let Some(result) = &inst.result else {
            return Err(unsupported_opcode(inst));
        };
        let res = self.local_term(side, result)?;
        let res_ty = &result.ty;

        let assertion = match &inst.kind {
            InstKind::FNeg { operand } => {
                require_floating(operand.ty())?;
                require_same(operand.ty(), res_ty)?;
                let op = self.operand_term(side, operand)?;
                res.eq(SmtTerm::unary(SmtOp::FpNeg, op))
            }
            InstKind::Binary {
                op,
                flags,
                lhs,
                rhs,
            } => self.encode_binary(side, res, res_ty, *op, *flags, lhs, rhs)?,
            InstKind::ICmp { pred, lhs, rhs } => {
                require_bool(res_ty)?;
                res.eq(self.encode_icmp(side, *pred, lhs, rhs)?)
            }
            InstKind::FCmp { pred, lhs, rhs } => {
                require_bool(res_ty)?;
                res.eq(self.encode_fcmp(side, *pred, lhs, rhs)?)
            }
            InstKind::Cast { op, operand } => self.encode_cast(side, res, res_ty, *op, operand)?,
            InstKind::Select {
                cond,
                on_true,
                on_false,
            } => {
                require_bool(cond.ty())?;
                require_same(on_true.ty(), res_ty)?;
                require_same(on_false.ty(), res_ty)?;
                let c = self.operand_term(side, cond)?;
                let t = self.operand_term(side, on_true)?;
                let f = self.operand_term(side, on_false)?;
                res.eq(SmtTerm::ite(c, t, f))
            }
            InstKind::Call { callee, args } => self.encode_call(side, res, res_ty, callee, args)?,
            InstKind::Ret { .. }
            | InstKind::Br { .. }
            | InstKind::CondBr { .. }
            | InstKind::Opaque { .. } => return Err(unsupported_opcode(inst)),
        };

        self.script.assert(assertion);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_binary(
        &mut self,
        side: Side,
        res: SmtTerm,
        res_ty: &Type,
        op: BinaryOp,
        flags: BinaryFlags,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<SmtTerm, CompareError> {
        let ty = lhs.ty();
        require_same(ty, rhs.ty())?;
        require_same(ty, res_ty)?;
        let a = self.operand_term(side, lhs)?;
        let b = self.operand_term(side, rhs)?;

        let fp = |fp_op: SmtOp, a: SmtTerm, b: SmtTerm| -> Result<SmtTerm, CompareError> {
            require_floating(ty)?;
            Ok(SmtTerm::rounded(fp_op, RNE, vec![a, b]))
        };

        let value = match op {
            BinaryOp::FAdd => fp(SmtOp::FpAdd, a, b)?,
            BinaryOp::FSub => fp(SmtOp::FpSub, a, b)?,
            BinaryOp::FMul => fp(SmtOp::FpMul, a, b)?,
            BinaryOp::FDiv => fp(SmtOp::FpDiv, a, b)?,
            BinaryOp::FRem => {
                require_floating(ty)?;
                SmtTerm::binary(SmtOp::FpRem, a, b)
            }
            // Bitwise operators pick the boolean or bit-vector primitive
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor if ty.is_bool() => {
                let bool_op = match op {
                    BinaryOp::And => SmtOp::And,
                    BinaryOp::Or => SmtOp::Or,
                    _ => SmtOp::Xor,
                };
                SmtTerm::binary(bool_op, a, b)
            }
            _ => {
                let width = require_bitvector(ty)?;
                return Ok(encode_integer_binary(res, op, flags, a, b, width));
            }
        };
        Ok(res.eq(value))
    }

    fn encode_icmp(
        &mut self,
        side: Side,
        pred: IntPredicate,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<SmtTerm, CompareError> {
        require_same(lhs.ty(), rhs.ty())?;
        if !lhs.ty().is_integer() {
            return Err(CompareError::unsupported(format!(
                "icmp on non-integer type {}",
                lhs.ty()
            )));
        }
        let a = self.operand_term(side, lhs)?;
        let b = self.operand_term(side, rhs)?;

        if lhs.ty().is_bool() {
            return match pred {
                IntPredicate::Eq => Ok(a.eq(b)),
                IntPredicate::Ne => Ok(a.eq(b).not()),
                _ => Err(CompareError::unsupported(format!(
                    "relational icmp {} on i1",
                    pred.mnemonic()
                ))),
            };
        }

        let bv_op = match pred {
            IntPredicate::Eq => return Ok(a.eq(b)),
            IntPredicate::Ne => return Ok(a.eq(b).not()),
            IntPredicate::Ugt => SmtOp::BvUgt,
            IntPredicate::Uge => SmtOp::BvUge,
            IntPredicate::Ult => SmtOp::BvUlt,
            IntPredicate::Ule => SmtOp::BvUle,
            IntPredicate::Sgt => SmtOp::BvSgt,
            IntPredicate::Sge => SmtOp::BvSge,
            IntPredicate::Slt => SmtOp::BvSlt,
            IntPredicate::Sle => SmtOp::BvSle,
        };
        Ok(SmtTerm::binary(bv_op, a, b))
    }

    fn encode_fcmp(
        &mut self,
        side: Side,
        pred: FloatPredicate,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<SmtTerm, CompareError> {
        match pred {
            FloatPredicate::True => return Ok(SmtTerm::bool(true)),
            FloatPredicate::False => return Ok(SmtTerm::bool(false)),
            _ => {}
        }
        require_floating(lhs.ty())?;
        require_same(lhs.ty(), rhs.ty())?;
        let a = self.operand_term(side, lhs)?;
        let b = self.operand_term(side, rhs)?;
        let a_nan = SmtTerm::unary(SmtOp::FpIsNaN, a.clone());
        let b_nan = SmtTerm::unary(SmtOp::FpIsNaN, b.clone());

        let relation = |op: SmtOp| SmtTerm::binary(op, a.clone(), b.clone());
        let ordered = |rel: SmtTerm| {
            SmtTerm::and(vec![a_nan.clone().not(), b_nan.clone().not(), rel])
        };
        let unordered = |rel: SmtTerm| SmtTerm::or(vec![a_nan.clone(), b_nan.clone(), rel]);

        let term = match pred {
            FloatPredicate::Oeq => ordered(relation(SmtOp::FpEq)),
            FloatPredicate::Ogt => ordered(relation(SmtOp::FpGt)),
            FloatPredicate::Oge => ordered(relation(SmtOp::FpGeq)),
            FloatPredicate::Olt => ordered(relation(SmtOp::FpLt)),
            FloatPredicate::Ole => ordered(relation(SmtOp::FpLeq)),
            FloatPredicate::One => ordered(relation(SmtOp::FpEq).not()),
            FloatPredicate::Ord => SmtTerm::and(vec![a_nan.clone().not(), b_nan.clone().not()]),
            FloatPredicate::Ueq => unordered(relation(SmtOp::FpEq)),
            FloatPredicate::Ugt => unordered(relation(SmtOp::FpGt)),
            FloatPredicate::Uge => unordered(relation(SmtOp::FpGeq)),
            FloatPredicate::Ult => unordered(relation(SmtOp::FpLt)),
            FloatPredicate::Ule => unordered(relation(SmtOp::FpLeq)),
            FloatPredicate::Une => unordered(relation(SmtOp::FpEq).not()),
            FloatPredicate::Uno => SmtTerm::or(vec![a_nan.clone(), b_nan.clone()]),
            FloatPredicate::True | FloatPredicate::False => unreachable!("handled above"),
        };
        Ok(term)
    }

    fn encode_cast(
        &mut self,
        side: Side,
        res: SmtTerm,
        dest: &Type,
        op: CastOp,
        operand: &Operand,
    ) -> Result<SmtTerm, CompareError> {
        let src = operand.ty();
        let x = self.operand_term(side, operand)?;

        let value = match op {
            CastOp::ZExt | CastOp::SExt => {
                let (sw, dw) = (require_int(src)?, require_int(dest)?);
                if dw <= sw {
                    return Err(bad_cast(op, src, dest));
                }
                if src.is_bool() {
                    let on = if op == CastOp::ZExt { 1 } else { -1 };
                    SmtTerm::ite(x, SmtTerm::bv(on, dw), SmtTerm::bv(0, dw))
                } else if op == CastOp::ZExt {
                    SmtTerm::unary(SmtOp::ZeroExtend(dw - sw), x)
                } else {
                    SmtTerm::unary(SmtOp::SignExtend(dw - sw), x)
                }
            }
            CastOp::Trunc => {
                let (sw, dw) = (require_int(src)?, require_int(dest)?);
                if dw >= sw {
                    return Err(bad_cast(op, src, dest));
                }
                bv_as_result(SmtTerm::unary(SmtOp::Extract(dw - 1, 0), x), dest)
            }
            CastOp::FPTrunc | CastOp::FPExt => {
                require_floating(src)?;
                let Sort::Float { ebits, sbits } = float_sort(dest)? else {
                    return Err(bad_cast(op, src, dest));
                };
                SmtTerm::rounded(SmtOp::ToFp { ebits, sbits }, RNE, vec![x])
            }
            CastOp::FPToUI | CastOp::FPToSI => {
                require_floating(src)?;
                let dw = require_int(dest)?;
                let conv = if op == CastOp::FPToUI {
                    SmtOp::FpToUbv(dw)
                } else {
                    SmtOp::FpToSbv(dw)
                };
                // Float-to-int conversion truncates toward zero
                bv_as_result(
                    SmtTerm::rounded(conv, RoundingMode::TowardZero, vec![x]),
                    dest,
                )
            }
            CastOp::UIToFP | CastOp::SIToFP => {
                require_int(src)?;
                let sort = float_sort(dest)?;
                let Sort::Float { ebits, sbits } = sort else {
                    return Err(bad_cast(op, src, dest));
                };
                if src.is_bool() {
                    let on = if op == CastOp::UIToFP { 1.0 } else { -1.0 };
                    SmtTerm::ite(x, SmtTerm::fp(on, sort), SmtTerm::fp(0.0, sort))
                } else if op == CastOp::UIToFP {
                    SmtTerm::rounded(SmtOp::ToFpUnsigned { ebits, sbits }, RNE, vec![x])
                } else {
                    SmtTerm::rounded(SmtOp::ToFp { ebits, sbits }, RNE, vec![x])
                }
            }
            CastOp::BitCast | CastOp::PtrToInt | CastOp::IntToPtr => {
                return Err(CompareError::unsupported(format!(
                    "Unsupported cast {}",
                    op.mnemonic()
                )))
            }
        };
        Ok(res.eq(value))
    }

    fn encode_call(
        &mut self,
        side: Side,
        res: SmtTerm,
        res_ty: &Type,
        callee: &str,
        args: &[Operand],
    ) -> Result<SmtTerm, CompareError> {
        if callee.starts_with("llvm.fmuladd.") {
            let [a, b, c] = args else {
                return Err(CompareError::unsupported(format!(
                    "{} expects 3 arguments",
                    callee
                )));
            };
            require_floating(res_ty)?;
            for arg in args {
                require_same(arg.ty(), res_ty)?;
            }
            let a = self.operand_term(side, a)?;
            let b = self.operand_term(side, b)?;
            let c = self.operand_term(side, c)?;
            let product = SmtTerm::rounded(SmtOp::FpMul, RNE, vec![a, b]);
            return Ok(res.eq(SmtTerm::rounded(SmtOp::FpAdd, RNE, vec![product, c])));
        }

        if UNINTERPRETED_MATH_FUNCTIONS.contains(&callee) {
            let [arg] = args else {
                return Err(CompareError::unsupported(format!(
                    "{} expects 1 argument",
                    callee
                )));
            };
            if *arg.ty() != Type::Double || *res_ty != Type::Double {
                return Err(CompareError::unsupported(format!(
                    "{} is only modeled over double",
                    callee
                )));
            }
            let func = format!("fn_{}", callee);
            self.script
                .declare_fun(&func, vec![Sort::FLOAT64], Sort::FLOAT64)
                .map_err(CompareError::UnsupportedOperation)?;
            let x = self.operand_term(side, arg)?;
            return Ok(res.eq(SmtTerm::unary(SmtOp::Uf(func), x)));
        }

        Err(CompareError::unsupported(format!(
            "Unsupported function call {}",
            callee
        )))
    }
}

/// Integer arithmetic, with `nsw`/`nuw`/`exact` preconditions
fn encode_integer_binary(
    res: SmtTerm,
    op: BinaryOp,
    flags: BinaryFlags,
    a: SmtTerm,
    b: SmtTerm,
    width: u32,
) -> SmtTerm {
    let bin = |op: SmtOp, x: &SmtTerm, y: &SmtTerm| SmtTerm::binary(op, x.clone(), y.clone());
    let sext = |bits: u32, x: &SmtTerm| SmtTerm::unary(SmtOp::SignExtend(bits), x.clone());
    let zext = |bits: u32, x: &SmtTerm| SmtTerm::unary(SmtOp::ZeroExtend(bits), x.clone());

    let bv_op = match op {
        BinaryOp::Add => SmtOp::BvAdd,
        BinaryOp::Sub => SmtOp::BvSub,
        BinaryOp::Mul => SmtOp::BvMul,
        BinaryOp::SDiv => SmtOp::BvSDiv,
        BinaryOp::UDiv => SmtOp::BvUDiv,
        BinaryOp::SRem => SmtOp::BvSRem,
        BinaryOp::URem => SmtOp::BvURem,
        BinaryOp::Shl => SmtOp::BvShl,
        BinaryOp::LShr => SmtOp::BvLShr,
        BinaryOp::AShr => SmtOp::BvAShr,
        BinaryOp::And => SmtOp::BvAnd,
        BinaryOp::Or => SmtOp::BvOr,
        BinaryOp::Xor => SmtOp::BvXor,
        BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv | BinaryOp::FRem => {
            unreachable!("floating operators are encoded separately")
        }
    };
    let value = bin(bv_op, &a, &b);
    let zero = SmtTerm::bv(0, width);

    let mut preconditions = Vec::new();
    match op {
        BinaryOp::Add | BinaryOp::Sub => {
            if flags.nsw {
                // The operation is exact in width + 1 bits
                let wide = bin(bv_op.clone(), &sext(1, &a), &sext(1, &b));
                preconditions.push(wide.eq(sext(1, &value)));
            }
            if flags.nuw {
                if op == BinaryOp::Add {
                    let wide = bin(SmtOp::BvAdd, &zext(1, &a), &zext(1, &b));
                    let carry = SmtTerm::unary(SmtOp::Extract(width, width), wide);
                    preconditions.push(carry.eq(SmtTerm::bv(0, 1)));
                } else {
                    preconditions.push(bin(SmtOp::BvUge, &a, &b));
                }
            }
        }
        BinaryOp::Mul => {
            if flags.nsw {
                let wide = bin(SmtOp::BvMul, &sext(width, &a), &sext(width, &b));
                preconditions.push(wide.eq(sext(width, &value)));
            }
            if flags.nuw {
                let wide = bin(SmtOp::BvMul, &zext(width, &a), &zext(width, &b));
                let high = SmtTerm::unary(SmtOp::Extract(2 * width - 1, width), wide);
                preconditions.push(high.eq(zero.clone()));
            }
        }
        BinaryOp::Shl => {
            if flags.nsw || flags.nuw {
                preconditions.push(bin(SmtOp::BvUlt, &b, &SmtTerm::bv(width as i64, width)));
            }
            // Shifting back must restore the operand: no zero bits (nuw) or
            // sign bits (nsw) were lost
            if flags.nuw {
                preconditions.push(bin(SmtOp::BvLShr, &value, &b).eq(a.clone()));
            }
            if flags.nsw {
                preconditions.push(bin(SmtOp::BvAShr, &value, &b).eq(a.clone()));
            }
        }
        BinaryOp::SDiv if flags.exact => {
            preconditions.push(bin(SmtOp::BvSRem, &a, &b).eq(zero.clone()));
        }
        BinaryOp::UDiv if flags.exact => {
            preconditions.push(bin(SmtOp::BvURem, &a, &b).eq(zero.clone()));
        }
        BinaryOp::LShr | BinaryOp::AShr if flags.exact => {
            preconditions.push(bin(SmtOp::BvShl, &value, &b).eq(a.clone()));
        }
        _ => {}
    }

    let definition = res.eq(value);
    if preconditions.is_empty() {
        definition
    } else {
        SmtTerm::and(preconditions).implies(definition)
    }
}

fn unsupported_opcode(inst: &Instruction) -> CompareError {
    CompareError::unsupported(format!(
        "Unsupported instruction with opcode {}",
        inst.opcode()
    ))
}

fn bad_cast(op: CastOp, src: &Type, dest: &Type) -> CompareError {
    CompareError::unsupported(format!(
        "invalid {} from {} to {}",
        op.mnemonic(),
        src,
        dest
    ))
}

/// A bit-vector result as a boolean for `i1` destinations, where `term` is
/// one bit wide
fn bv_as_result(term: SmtTerm, dest: &Type) -> SmtTerm {
    if dest.is_bool() {
        term.eq(SmtTerm::bv(1, 1))
    } else {
        term
    }
}

fn require_same(a: &Type, b: &Type) -> Result<(), CompareError> {
    if a == b {
        Ok(())
    } else {
        Err(CompareError::unsupported(format!(
            "operand type mismatch: {} vs {}",
            a, b
        )))
    }
}

fn require_bool(ty: &Type) -> Result<(), CompareError> {
    if ty.is_bool() {
        Ok(())
    } else {
        Err(CompareError::unsupported(format!("expected i1, found {}", ty)))
    }
}

fn require_int(ty: &Type) -> Result<u32, CompareError> {
    ty.int_width()
        .filter(|w| *w > 0)
        .ok_or_else(|| CompareError::unsupported(format!("expected integer, found {}", ty)))
}

fn require_bitvector(ty: &Type) -> Result<u32, CompareError> {
    match ty {
        Type::Int(1) => Err(CompareError::unsupported(
            "arithmetic on i1 is not modeled",
        )),
        _ => require_int(ty),
    }
}

fn require_floating(ty: &Type) -> Result<(), CompareError> {
    if ty.is_floating() {
        Ok(())
    } else {
        Err(CompareError::unsupported(format!(
            "expected floating type, found {}",
            ty
        )))
    }
}

fn float_sort(ty: &Type) -> Result<Sort, CompareError> {
    require_floating(ty)?;
    sort_of_type(ty)
}
