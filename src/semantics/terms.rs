//! Solver-agnostic SMT terms over booleans, bit-vectors and IEEE floats
//!
//! Terms are built by the encoder and printed as SMT-LIB2, which is the form
//! handed to the solver backend.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// SMT sorts used by the encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sort {
    Bool,
    BitVec(u32),
    Float { ebits: u32, sbits: u32 },
}

impl Sort {
    /// IEEE-754 binary32
    pub const FLOAT32: Sort = Sort::Float { ebits: 8, sbits: 24 };
    /// IEEE-754 binary64
    pub const FLOAT64: Sort = Sort::Float {
        ebits: 11,
        sbits: 53,
    };
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::BitVec(width) => write!(f, "(_ BitVec {})", width),
            Sort::Float { ebits, sbits } => write!(f, "(_ FloatingPoint {} {})", ebits, sbits),
        }
    }
}

/// IEEE rounding modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    NearestEven,
    TowardZero,
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingMode::NearestEven => write!(f, "RNE"),
            RoundingMode::TowardZero => write!(f, "RTZ"),
        }
    }
}

/// Function symbols applied by [`SmtTerm::App`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtOp {
    // Core
    Not,
    And,
    Or,
    Xor,
    Implies,
    Eq,
    Ite,

    // Bit-vectors
    BvAdd,
    BvSub,
    BvMul,
    BvSDiv,
    BvUDiv,
    BvSRem,
    BvURem,
    BvShl,
    BvLShr,
    BvAShr,
    BvAnd,
    BvOr,
    BvXor,
    BvUlt,
    BvUle,
    BvUgt,
    BvUge,
    BvSlt,
    BvSle,
    BvSgt,
    BvSge,
    ZeroExtend(u32),
    SignExtend(u32),
    Extract(u32, u32),

    // Floating point
    FpAdd,
    FpSub,
    FpMul,
    FpDiv,
    FpRem,
    FpNeg,
    FpEq,
    FpLt,
    FpLeq,
    FpGt,
    FpGeq,
    FpIsNaN,
    ToFp { ebits: u32, sbits: u32 },
    ToFpUnsigned { ebits: u32, sbits: u32 },
    FpToUbv(u32),
    FpToSbv(u32),

    /// Uninterpreted function declared in the script
    Uf(String),
}

impl fmt::Display for SmtOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SmtOp::Not => "not",
            SmtOp::And => "and",
            SmtOp::Or => "or",
            SmtOp::Xor => "xor",
            SmtOp::Implies => "=>",
            SmtOp::Eq => "=",
            SmtOp::Ite => "ite",
            SmtOp::BvAdd => "bvadd",
            SmtOp::BvSub => "bvsub",
            SmtOp::BvMul => "bvmul",
            SmtOp::BvSDiv => "bvsdiv",
            SmtOp::BvUDiv => "bvudiv",
            SmtOp::BvSRem => "bvsrem",
            SmtOp::BvURem => "bvurem",
            SmtOp::BvShl => "bvshl",
            SmtOp::BvLShr => "bvlshr",
            SmtOp::BvAShr => "bvashr",
            SmtOp::BvAnd => "bvand",
            SmtOp::BvOr => "bvor",
            SmtOp::BvXor => "bvxor",
            SmtOp::BvUlt => "bvult",
            SmtOp::BvUle => "bvule",
            SmtOp::BvUgt => "bvugt",
            SmtOp::BvUge => "bvuge",
            SmtOp::BvSlt => "bvslt",
            SmtOp::BvSle => "bvsle",
            SmtOp::BvSgt => "bvsgt",
            SmtOp::BvSge => "bvsge",
            SmtOp::ZeroExtend(bits) => return write!(f, "(_ zero_extend {})", bits),
            SmtOp::SignExtend(bits) => return write!(f, "(_ sign_extend {})", bits),
            SmtOp::Extract(hi, lo) => return write!(f, "(_ extract {} {})", hi, lo),
            SmtOp::FpAdd => "fp.add",
            SmtOp::FpSub => "fp.sub",
            SmtOp::FpMul => "fp.mul",
            SmtOp::FpDiv => "fp.div",
            SmtOp::FpRem => "fp.rem",
            SmtOp::FpNeg => "fp.neg",
            SmtOp::FpEq => "fp.eq",
            SmtOp::FpLt => "fp.lt",
            SmtOp::FpLeq => "fp.leq",
            SmtOp::FpGt => "fp.gt",
            SmtOp::FpGeq => "fp.geq",
            SmtOp::FpIsNaN => "fp.isNaN",
            SmtOp::ToFp { ebits, sbits } => return write!(f, "(_ to_fp {} {})", ebits, sbits),
            SmtOp::ToFpUnsigned { ebits, sbits } => {
                return write!(f, "(_ to_fp_unsigned {} {})", ebits, sbits)
            }
            SmtOp::FpToUbv(width) => return write!(f, "(_ fp.to_ubv {})", width),
            SmtOp::FpToSbv(width) => return write!(f, "(_ fp.to_sbv {})", width),
            SmtOp::Uf(name) => return write!(f, "|{}|", name),
        };
        f.write_str(name)
    }
}

/// Abstract SMT term
#[derive(Debug, Clone, PartialEq)]
pub enum SmtTerm {
    /// Constant declared in the script, referenced by name
    Var(String),
    BoolLit(bool),
    /// Bit-vector literal; `value` is sign-extended to `width`
    BvLit { value: i64, width: u32 },
    /// Floating literal of sort `sort`, printed from its exact bit pattern
    FpLit { value: f64, sort: Sort },
    RoundingMode(RoundingMode),
    App { op: SmtOp, args: Vec<SmtTerm> },
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn bv(value: i64, width: u32) -> Self {
        SmtTerm::BvLit { value, width }
    }

    pub fn fp(value: f64, sort: Sort) -> Self {
        SmtTerm::FpLit { value, sort }
    }

    pub fn rm(mode: RoundingMode) -> Self {
        SmtTerm::RoundingMode(mode)
    }

    pub fn app(op: SmtOp, args: Vec<SmtTerm>) -> Self {
        SmtTerm::App { op, args }
    }

    pub fn unary(op: SmtOp, arg: SmtTerm) -> Self {
        SmtTerm::app(op, vec![arg])
    }

    pub fn binary(op: SmtOp, lhs: SmtTerm, rhs: SmtTerm) -> Self {
        SmtTerm::app(op, vec![lhs, rhs])
    }

    /// Floating operation taking a leading rounding-mode argument
    pub fn rounded(op: SmtOp, mode: RoundingMode, args: Vec<SmtTerm>) -> Self {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(SmtTerm::rm(mode));
        all.extend(args);
        SmtTerm::app(op, all)
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::binary(SmtOp::Eq, self, other)
    }

    pub fn not(self) -> Self {
        SmtTerm::unary(SmtOp::Not, self)
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::binary(SmtOp::Implies, self, other)
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::app(SmtOp::Ite, vec![cond, then, els])
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        match terms.len() {
            0 => SmtTerm::bool(true),
            1 => terms.into_iter().next().unwrap_or(SmtTerm::bool(true)),
            _ => SmtTerm::app(SmtOp::And, terms),
        }
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        match terms.len() {
            0 => SmtTerm::bool(false),
            1 => terms.into_iter().next().unwrap_or(SmtTerm::bool(false)),
            _ => SmtTerm::app(SmtOp::Or, terms),
        }
    }

    fn write_smtlib(&self, out: &mut String) -> fmt::Result {
        match self {
            SmtTerm::Var(name) => write!(out, "|{}|", name),
            SmtTerm::BoolLit(b) => write!(out, "{}", b),
            SmtTerm::BvLit { value, width } => write_bv_literal(out, *value, *width),
            SmtTerm::FpLit { value, sort } => write_fp_literal(out, *value, *sort),
            SmtTerm::RoundingMode(mode) => write!(out, "{}", mode),
            SmtTerm::App { op, args } => {
                write!(out, "({}", op)?;
                for arg in args {
                    out.push(' ');
                    arg.write_smtlib(out)?;
                }
                out.push(')');
                Ok(())
            }
        }
    }

    /// Print as SMT-LIB2
    pub fn to_smtlib(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_smtlib(&mut out);
        out
    }
}

impl fmt::Display for SmtTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_smtlib())
    }
}

fn write_bv_literal(out: &mut String, value: i64, width: u32) -> fmt::Result {
    if width <= 64 {
        let mask = if width == 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        };
        write!(out, "(_ bv{} {})", (value as u64) & mask, width)
    } else {
        out.push_str("#b");
        for bit in (0..width).rev() {
            let shift = bit.min(63);
            out.push(if (value >> shift) & 1 == 1 { '1' } else { '0' });
        }
        Ok(())
    }
}

fn write_bits(out: &mut String, bits: u64, count: u32) {
    for bit in (0..count).rev() {
        out.push(if (bits >> bit) & 1 == 1 { '1' } else { '0' });
    }
}

fn write_fp_literal(out: &mut String, value: f64, sort: Sort) -> fmt::Result {
    let (bits, ebits, sbits) = match sort {
        Sort::Float { ebits: 8, sbits: 24 } => ((value as f32).to_bits() as u64, 8, 24),
        Sort::Float {
            ebits: 11,
            sbits: 53,
        } => (value.to_bits(), 11, 53),
        other => return write!(out, "((_ to_fp {}) RNE {:?})", other, value),
    };
    let mantissa_bits = sbits - 1;
    out.push_str("(fp #b");
    write_bits(out, bits >> (ebits + mantissa_bits), 1);
    out.push_str(" #b");
    write_bits(out, bits >> mantissa_bits, ebits);
    out.push_str(" #b");
    write_bits(out, bits, mantissa_bits);
    out.push(')');
    Ok(())
}

/// A complete query: declarations followed by assertions
#[derive(Debug, Clone, Default)]
pub struct SmtScript {
    constants: BTreeMap<String, Sort>,
    functions: BTreeMap<String, (Vec<Sort>, Sort)>,
    assertions: Vec<SmtTerm>,
}

impl SmtScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a constant; redeclaring with the same sort is a no-op
    pub fn declare_const(&mut self, name: &str, sort: Sort) -> Result<(), String> {
        match self.constants.get(name) {
            Some(existing) if *existing != sort => Err(format!(
                "constant {} declared as {} and {}",
                name, existing, sort
            )),
            Some(_) => Ok(()),
            None => {
                self.constants.insert(name.to_string(), sort);
                Ok(())
            }
        }
    }

    /// Declare an uninterpreted function; redeclaring with the same signature is a no-op
    pub fn declare_fun(&mut self, name: &str, domain: Vec<Sort>, range: Sort) -> Result<(), String> {
        match self.functions.get(name) {
            Some((d, r)) if *d != domain || *r != range => Err(format!(
                "function {} declared with conflicting signatures",
                name
            )),
            Some(_) => Ok(()),
            None => {
                self.functions.insert(name.to_string(), (domain, range));
                Ok(())
            }
        }
    }

    pub fn assert(&mut self, term: SmtTerm) {
        self.assertions.push(term);
    }

    pub fn assertions(&self) -> &[SmtTerm] {
        &self.assertions
    }

    pub fn sort_of(&self, name: &str) -> Option<Sort> {
        self.constants.get(name).copied()
    }

    /// Print the whole script as SMT-LIB2 (without `check-sat`)
    pub fn to_smtlib(&self) -> String {
        let mut out = String::new();
        for (name, (domain, range)) in &self.functions {
            let params: Vec<String> = domain.iter().map(|s| s.to_string()).collect();
            out.push_str(&format!(
                "(declare-fun |{}| ({}) {})\n",
                name,
                params.join(" "),
                range
            ));
        }
        for (name, sort) in &self.constants {
            out.push_str(&format!("(declare-const |{}| {})\n", name, sort));
        }
        for assertion in &self.assertions {
            out.push_str("(assert ");
            out.push_str(&assertion.to_smtlib());
            out.push_str(")\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_bv_literals() {
        assert_eq!(SmtTerm::bv(5, 32).to_smtlib(), "(_ bv5 32)");
        assert_eq!(SmtTerm::bv(-1, 8).to_smtlib(), "(_ bv255 8)");
        assert_eq!(
            SmtTerm::bv(-1, 64).to_smtlib(),
            format!("(_ bv{} 64)", u64::MAX)
        );
        let wide = SmtTerm::bv(-2, 66).to_smtlib();
        assert_eq!(wide, format!("#b{}0", "1".repeat(65)));
    }

    #[test]
    fn test_print_fp_literals() {
        assert_eq!(
            SmtTerm::fp(1.0, Sort::FLOAT32).to_smtlib(),
            format!("(fp #b0 #b01111111 #b{})", "0".repeat(23))
        );
        let nan = SmtTerm::fp(f64::NAN, Sort::FLOAT64).to_smtlib();
        assert!(nan.starts_with("(fp #b0 #b11111111111 #b1"));
        let neg_zero = SmtTerm::fp(-0.0, Sort::FLOAT64).to_smtlib();
        assert!(neg_zero.starts_with("(fp #b1 #b00000000000 #b0"));
    }

    #[test]
    fn test_print_applications() {
        let term = SmtTerm::var("L_c").eq(SmtTerm::binary(
            SmtOp::BvAdd,
            SmtTerm::var("L_a"),
            SmtTerm::bv(1, 32),
        ));
        assert_eq!(term.to_smtlib(), "(= |L_c| (bvadd |L_a| (_ bv1 32)))");

        let ext = SmtTerm::unary(SmtOp::ZeroExtend(24), SmtTerm::var("x"));
        assert_eq!(ext.to_smtlib(), "((_ zero_extend 24) |x|)");

        let add = SmtTerm::rounded(
            SmtOp::FpAdd,
            RoundingMode::NearestEven,
            vec![SmtTerm::var("a"), SmtTerm::var("b")],
        );
        assert_eq!(add.to_smtlib(), "(fp.add RNE |a| |b|)");
    }

    #[test]
    fn test_and_or_degenerate_cases() {
        assert_eq!(SmtTerm::and(vec![]).to_smtlib(), "true");
        assert_eq!(SmtTerm::or(vec![]).to_smtlib(), "false");
        assert_eq!(SmtTerm::or(vec![SmtTerm::var("p")]).to_smtlib(), "|p|");
    }

    #[test]
    fn test_script_declarations() {
        let mut script = SmtScript::new();
        script.declare_const("L_a", Sort::BitVec(32)).unwrap();
        script.declare_const("L_a", Sort::BitVec(32)).unwrap();
        assert!(script.declare_const("L_a", Sort::Bool).is_err());
        script
            .declare_fun("fn_sin", vec![Sort::FLOAT64], Sort::FLOAT64)
            .unwrap();
        script.assert(SmtTerm::var("L_a").eq(SmtTerm::bv(0, 32)));

        let text = script.to_smtlib();
        assert!(text.contains("(declare-fun |fn_sin| ((_ FloatingPoint 11 53)) (_ FloatingPoint 11 53))"));
        assert!(text.contains("(declare-const |L_a| (_ BitVec 32))"));
        assert!(text.ends_with("(assert (= |L_a| (_ bv0 32)))\n"));
        assert_eq!(script.sort_of("L_a"), Some(Sort::BitVec(32)));
    }
}
