//! Core value and type definitions for the snippet IR

use std::fmt;

/// Widest integer type accepted, as in LLVM
pub const MAX_INT_WIDTH: u32 = 1 << 23;

/// Static type of an instruction result or operand
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    /// Fixed-width integer; `Int(1)` is the boolean type
    Int(u32),
    /// IEEE-754 binary32
    Float,
    /// IEEE-754 binary64
    Double,
    Void,
    Ptr,
    Metadata,
}

impl Type {
    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Int(1))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::Float | Type::Double)
    }

    /// Bit width of an integer type
    pub fn int_width(&self) -> Option<u32> {
        match self {
            Type::Int(width) => Some(*width),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(width) => write!(f, "i{}", width),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Void => write!(f, "void"),
            Type::Ptr => write!(f, "ptr"),
            Type::Metadata => write!(f, "metadata"),
        }
    }
}

/// A non-constant SSA value: a function parameter or an instruction result
///
/// The name is unique within one side of the comparison and is the value's
/// identity for the serial-number maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Local {
    pub name: String,
    pub ty: Type,
}

impl Local {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name)
    }
}

/// Literal payload of a constant operand
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    /// Integer value, sign-extended to 64 bits
    Int(i64),
    /// Floating value; float constants are stored widened to f64
    Fp(f64),
    Null,
}

/// A constant operand together with its static type
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub ty: Type,
    pub value: ConstValue,
}

impl Constant {
    pub fn int(value: i64, width: u32) -> Self {
        Self {
            ty: Type::Int(width),
            value: ConstValue::Int(value),
        }
    }

    pub fn bool(value: bool) -> Self {
        Self::int(value as i64, 1)
    }

    pub fn double(value: f64) -> Self {
        Self {
            ty: Type::Double,
            value: ConstValue::Fp(value),
        }
    }

    pub fn float(value: f32) -> Self {
        Self {
            ty: Type::Float,
            value: ConstValue::Fp(value as f64),
        }
    }

    /// Bitwise identity, so that NaN constants compare equal to themselves
    pub fn same_as(&self, other: &Constant) -> bool {
        if self.ty != other.ty {
            return false;
        }
        match (self.value, other.value) {
            (ConstValue::Int(a), ConstValue::Int(b)) => a == b,
            (ConstValue::Fp(a), ConstValue::Fp(b)) => a.to_bits() == b.to_bits(),
            (ConstValue::Null, ConstValue::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            ConstValue::Int(v) if self.ty.is_bool() => write!(f, "{}", v != 0),
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Fp(v) if v.is_finite() => write!(f, "{:?}", v),
            ConstValue::Fp(v) => write!(f, "0x{:016X}", v.to_bits()),
            ConstValue::Null => write!(f, "null"),
        }
    }
}

/// Instruction operand: either a local value or a constant
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Local(Local),
    Const(Constant),
}

impl Operand {
    pub fn local(name: impl Into<String>, ty: Type) -> Self {
        Operand::Local(Local::new(name, ty))
    }

    pub fn ty(&self) -> &Type {
        match self {
            Operand::Local(local) => &local.ty,
            Operand::Const(constant) => &constant.ty,
        }
    }

    pub fn as_local(&self) -> Option<&Local> {
        match self {
            Operand::Local(local) => Some(local),
            Operand::Const(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Local(local) => write!(f, "{}", local),
            Operand::Const(constant) => write!(f, "{}", constant),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_queries() {
        assert!(Type::Int(1).is_bool());
        assert!(!Type::Int(8).is_bool());
        assert!(Type::Int(32).is_integer());
        assert!(Type::Double.is_floating());
        assert_eq!(Type::Int(64).int_width(), Some(64));
        assert_eq!(Type::Float.int_width(), None);
    }

    #[test]
    fn test_nan_constants_are_identical() {
        let a = Constant::double(f64::NAN);
        let b = Constant::double(f64::NAN);
        assert!(a.same_as(&b));
        assert!(!Constant::double(0.0).same_as(&Constant::double(-0.0)));
        assert!(!Constant::int(1, 32).same_as(&Constant::int(1, 64)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::Int(32).to_string(), "i32");
        assert_eq!(Constant::bool(true).to_string(), "true");
        assert_eq!(Operand::local("a", Type::Int(8)).to_string(), "%a");
    }
}
