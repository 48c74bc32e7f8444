//! Parser for a textual, LLVM-flavoured IR
//!
//! Each file holds one function with a single basic block:
//!
//! ```text
//! define i32 @f(i32 %a, i32 %b) {
//!   %c = sub nsw i32 %a, %b
//!   %d = mul i32 %c, 2
//!   call void @llvm.dbg.value(metadata i32 %d)
//!   ret i32 %d
//! }
//! ```
//!
//! Opcodes without dedicated support are kept as opaque instructions.

use std::fmt;
use std::path::Path;

use crate::ir::{
    BasicBlock, BinaryFlags, BinaryOp, CastOp, Constant, FloatPredicate, Function, InstKind,
    Instruction, IntPredicate, Local, Operand, Type, MAX_INT_WIDTH,
};

/// Parse error with location information
#[derive(Debug, Clone)]
pub struct ParseError {
    pub line_number: usize,
    pub column: Option<usize>,
    pub message: String,
    pub line_content: String,
}

impl ParseError {
    pub fn new(
        line_number: usize,
        message: impl Into<String>,
        line_content: impl Into<String>,
    ) -> Self {
        Self {
            line_number,
            column: None,
            message: message.into(),
            line_content: line_content.into(),
        }
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = self.column {
            write!(
                f,
                "line {}, column {}: {}\n  | {}\n  | {}^",
                self.line_number,
                col,
                self.message,
                self.line_content,
                " ".repeat(col.saturating_sub(1))
            )
        } else {
            write!(
                f,
                "line {}: {}\n  | {}",
                self.line_number, self.message, self.line_content
            )
        }
    }
}

impl std::error::Error for ParseError {}

/// Error inside one line: message and 1-based column
#[derive(Debug, Clone, PartialEq)]
pub struct LineError {
    pub message: String,
    pub column: usize,
}

/// Result of parsing a single line
#[derive(Debug)]
pub enum LineResult {
    /// `define <ty> @name(<params>) {`
    Define {
        name: String,
        return_type: Type,
        params: Vec<Local>,
    },
    Label(String),
    Instruction(Instruction),
    /// Closing brace of a function
    End,
    /// Empty line or comment
    Skip,
}

/// Character cursor over a single line
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '$')
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.text.len()
    }

    fn error(&self, message: impl Into<String>) -> LineError {
        LineError {
            message: message.into(),
            column: self.pos + 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest().chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), LineError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c)))
        }
    }

    /// Next run of identifier characters
    fn word(&mut self) -> Result<&'a str, LineError> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !is_ident_char(*c) && *c != '+')
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected a token"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    /// Word without consuming it
    fn peek_word(&mut self) -> Option<&'a str> {
        let saved = self.pos;
        let word = self.word().ok();
        self.pos = saved;
        word
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_word() == Some(keyword) {
            let _ = self.word();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), LineError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", keyword)))
        }
    }

    /// `%name` or `@name`, returning the name without its sigil
    fn sigil_name(&mut self, sigil: char) -> Result<&'a str, LineError> {
        if !self.eat(sigil) {
            return Err(self.error(format!("expected '{}'", sigil)));
        }
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !is_ident_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn ty(&mut self) -> Result<Type, LineError> {
        let start = self.pos;
        let word = self.word()?;
        parse_type(word).map_err(|message| LineError {
            message,
            column: start + 1,
        })
    }

    fn operand(&mut self, ty: &Type) -> Result<Operand, LineError> {
        if self.peek() == Some('%') {
            let name = self.sigil_name('%')?;
            return Ok(Operand::local(name, ty.clone()));
        }
        self.skip_ws();
        let start = self.pos;
        let word = self.word()?;
        parse_constant(word, ty)
            .map(Operand::Const)
            .map_err(|message| LineError {
                message,
                column: start + 1,
            })
    }

    fn typed_operand(&mut self) -> Result<Operand, LineError> {
        let ty = self.ty()?;
        self.operand(&ty)
    }
}

/// Parse a type name
pub fn parse_type(s: &str) -> Result<Type, String> {
    match s {
        "float" => Ok(Type::Float),
        "double" => Ok(Type::Double),
        "void" => Ok(Type::Void),
        "ptr" => Ok(Type::Ptr),
        "metadata" => Ok(Type::Metadata),
        _ => {
            let width = s
                .strip_prefix('i')
                .and_then(|w| w.parse::<u32>().ok())
                .filter(|w| *w > 0)
                .ok_or_else(|| format!("unknown type: {}", s))?;
            if width > MAX_INT_WIDTH {
                return Err(format!(
                    "integer width {} exceeds the maximum of {}",
                    width, MAX_INT_WIDTH
                ));
            }
            Ok(Type::Int(width))
        }
    }
}

/// Parse an integer literal (hex or decimal, optionally negative)
pub fn parse_integer(s: &str) -> Result<i64, String> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).map_err(|e| format!("invalid hex integer '{}': {}", s, e))?
    } else {
        digits
            .parse::<u64>()
            .map_err(|e| format!("invalid integer '{}': {}", s, e))?
    };
    let value = magnitude as i64;
    Ok(if negative { value.wrapping_neg() } else { value })
}

/// Parse a floating literal: decimal, LLVM hex double, `nan` or `inf`
pub fn parse_float(s: &str) -> Result<f64, String> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let value = match body {
        "nan" => f64::NAN,
        "inf" => f64::INFINITY,
        _ => {
            if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
                let bits = u64::from_str_radix(hex, 16)
                    .map_err(|e| format!("invalid hex float '{}': {}", s, e))?;
                f64::from_bits(bits)
            } else {
                body.parse::<f64>()
                    .map_err(|e| format!("invalid float '{}': {}", s, e))?
            }
        }
    };
    Ok(if negative { -value } else { value })
}

/// Sign-extend the low `width` bits of `value`
fn sign_extend(value: i64, width: u32) -> i64 {
    if width >= 64 {
        value
    } else {
        let shift = 64 - width;
        (value << shift) >> shift
    }
}

/// Parse a constant of the given type
pub fn parse_constant(s: &str, ty: &Type) -> Result<Constant, String> {
    match ty {
        Type::Int(1) => match s {
            "true" => Ok(Constant::bool(true)),
            "false" => Ok(Constant::bool(false)),
            _ => Ok(Constant::bool(parse_integer(s)? & 1 == 1)),
        },
        Type::Int(width) => Ok(Constant::int(sign_extend(parse_integer(s)?, *width), *width)),
        Type::Double => Ok(Constant::double(parse_float(s)?)),
        Type::Float => Ok(Constant::float(parse_float(s)? as f32)),
        Type::Ptr if s == "null" => Ok(Constant {
            ty: Type::Ptr,
            value: crate::ir::ConstValue::Null,
        }),
        _ => Err(format!("invalid constant '{}' of type {}", s, ty)),
    }
}

/// Strip a `;` comment from a line
fn strip_comments(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_define(cur: &mut Cursor<'_>) -> Result<LineResult, LineError> {
    let return_type = cur.ty()?;
    let name = cur.sigil_name('@')?.to_string();
    cur.expect('(')?;
    let mut params = Vec::new();
    if !cur.eat(')') {
        loop {
            let ty = cur.ty()?;
            let param = cur.sigil_name('%')?;
            params.push(Local::new(param, ty));
            if cur.eat(')') {
                break;
            }
            cur.expect(',')?;
        }
    }
    // Function attributes are ignored
    while let Some(c) = cur.peek().filter(|c| *c != '{') {
        cur.pos += c.len_utf8();
    }
    cur.expect('{')?;
    Ok(LineResult::Define {
        name,
        return_type,
        params,
    })
}

fn parse_binary(cur: &mut Cursor<'_>, op: BinaryOp) -> Result<(Type, InstKind), LineError> {
    let mut flags = BinaryFlags::default();
    loop {
        if op.is_overflowing() && cur.eat_keyword("nsw") {
            flags.nsw = true;
        } else if op.is_overflowing() && cur.eat_keyword("nuw") {
            flags.nuw = true;
        } else if op.is_possibly_exact() && cur.eat_keyword("exact") {
            flags.exact = true;
        } else {
            break;
        }
    }
    // Fast-math flags do not change the modeled semantics
    while matches!(
        cur.peek_word(),
        Some("fast" | "nnan" | "ninf" | "nsz" | "arcp" | "contract" | "afn" | "reassoc")
    ) {
        cur.word()?;
    }
    let ty = cur.ty()?;
    let lhs = cur.operand(&ty)?;
    cur.expect(',')?;
    let rhs = cur.operand(&ty)?;
    Ok((
        ty,
        InstKind::Binary {
            op,
            flags,
            lhs,
            rhs,
        },
    ))
}

/// Skip `!12`, `!DIExpression(...)` and similar after the `!`
fn skip_metadata_node(cur: &mut Cursor<'_>) -> Result<(), LineError> {
    cur.word()?;
    if cur.eat('(') {
        let mut depth = 1;
        while depth > 0 {
            let Some(c) = cur.rest().chars().next() else {
                return Err(cur.error("unterminated metadata node"));
            };
            cur.pos += c.len_utf8();
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
        }
    }
    Ok(())
}

fn parse_call(cur: &mut Cursor<'_>) -> Result<(Type, InstKind), LineError> {
    let ty = cur.ty()?;
    let callee = cur.sigil_name('@')?.to_string();
    cur.expect('(')?;
    let mut args = Vec::new();
    if !cur.eat(')') {
        loop {
            let arg_ty = cur.ty()?;
            if arg_ty == Type::Metadata {
                // Metadata arguments carry no value
                if cur.eat('!') {
                    skip_metadata_node(cur)?;
                } else {
                    cur.typed_operand()?;
                }
            } else {
                args.push(cur.operand(&arg_ty)?);
            }
            if cur.eat(')') {
                break;
            }
            cur.expect(',')?;
        }
    }
    Ok((ty, InstKind::Call { callee, args }))
}

/// Remaining comma-separated items of an unsupported instruction
fn parse_opaque(cur: &mut Cursor<'_>, opcode: &str) -> (Type, InstKind) {
    let mut result_type = None;
    let mut operands = Vec::new();
    for item in cur.rest().split(',') {
        let mut item_cur = Cursor::new(item);
        let Ok(ty) = item_cur.ty() else {
            continue;
        };
        if item_cur.at_end() {
            result_type.get_or_insert(ty);
            continue;
        }
        if let Ok(operand) = item_cur.operand(&ty) {
            result_type.get_or_insert_with(|| operand.ty().clone());
            operands.push(operand);
        }
    }
    cur.pos = cur.text.len();
    let result_type = match opcode {
        "alloca" | "getelementptr" => Type::Ptr,
        _ => result_type.unwrap_or(Type::Void),
    };
    (
        result_type,
        InstKind::Opaque {
            opcode: opcode.to_string(),
            operands,
        },
    )
}

/// Parse the part of an instruction after `%result =`
fn parse_operation(cur: &mut Cursor<'_>) -> Result<(Type, InstKind), LineError> {
    let opcode = cur.word()?;

    if let Some(op) = BinaryOp::from_mnemonic(opcode) {
        return parse_binary(cur, op);
    }
    if let Some(op) = CastOp::from_mnemonic(opcode) {
        let operand = cur.typed_operand()?;
        cur.expect_keyword("to")?;
        let dest = cur.ty()?;
        return Ok((dest, InstKind::Cast { op, operand }));
    }

    match opcode {
        "fneg" => {
            let operand = cur.typed_operand()?;
            Ok((operand.ty().clone(), InstKind::FNeg { operand }))
        }
        "icmp" => {
            let pred_start = cur.pos;
            let word = cur.word()?;
            let pred = IntPredicate::from_mnemonic(word).ok_or_else(|| LineError {
                message: format!("unknown icmp predicate: {}", word),
                column: pred_start + 1,
            })?;
            let ty = cur.ty()?;
            let lhs = cur.operand(&ty)?;
            cur.expect(',')?;
            let rhs = cur.operand(&ty)?;
            Ok((Type::Int(1), InstKind::ICmp { pred, lhs, rhs }))
        }
        "fcmp" => {
            let pred_start = cur.pos;
            let mut word = cur.word()?;
            while matches!(word, "fast" | "nnan" | "ninf" | "nsz" | "reassoc") {
                word = cur.word()?;
            }
            let pred = FloatPredicate::from_mnemonic(word).ok_or_else(|| LineError {
                message: format!("unknown fcmp predicate: {}", word),
                column: pred_start + 1,
            })?;
            let ty = cur.ty()?;
            let lhs = cur.operand(&ty)?;
            cur.expect(',')?;
            let rhs = cur.operand(&ty)?;
            Ok((Type::Int(1), InstKind::FCmp { pred, lhs, rhs }))
        }
        "select" => {
            let cond = cur.typed_operand()?;
            cur.expect(',')?;
            let on_true = cur.typed_operand()?;
            cur.expect(',')?;
            let on_false = cur.typed_operand()?;
            Ok((
                on_true.ty().clone(),
                InstKind::Select {
                    cond,
                    on_true,
                    on_false,
                },
            ))
        }
        "call" | "tail" => {
            if opcode == "tail" {
                cur.expect_keyword("call")?;
            }
            parse_call(cur)
        }
        "ret" => {
            if cur.eat_keyword("void") {
                return Ok((Type::Void, InstKind::Ret { value: None }));
            }
            let value = cur.typed_operand()?;
            Ok((Type::Void, InstKind::Ret { value: Some(value) }))
        }
        "br" => {
            if cur.eat_keyword("label") {
                let target = cur.sigil_name('%')?.to_string();
                return Ok((Type::Void, InstKind::Br { target }));
            }
            let cond = cur.typed_operand()?;
            cur.expect(',')?;
            cur.expect_keyword("label")?;
            let on_true = cur.sigil_name('%')?.to_string();
            cur.expect(',')?;
            cur.expect_keyword("label")?;
            let on_false = cur.sigil_name('%')?.to_string();
            Ok((
                Type::Void,
                InstKind::CondBr {
                    cond,
                    on_true,
                    on_false,
                },
            ))
        }
        _ => Ok(parse_opaque(cur, opcode)),
    }
}

/// Parse a single line of IR
pub fn parse_line(line: &str) -> Result<LineResult, LineError> {
    let text = strip_comments(line);
    let mut cur = Cursor::new(text);

    if cur.at_end() {
        return Ok(LineResult::Skip);
    }
    if cur.eat('}') {
        return Ok(LineResult::End);
    }
    if cur.eat_keyword("define") {
        return parse_define(&mut cur);
    }
    if let Some(label) = text.trim().strip_suffix(':') {
        if !label.is_empty() && label.chars().all(is_ident_char) {
            return Ok(LineResult::Label(label.to_string()));
        }
    }

    let result = if cur.peek() == Some('%') {
        let name = cur.sigil_name('%')?;
        cur.expect('=')?;
        Some(name)
    } else {
        None
    };

    let (ty, kind) = parse_operation(&mut cur)?;
    if !cur.at_end() {
        return Err(cur.error("unexpected trailing input"));
    }

    let result = match result {
        Some(name) if ty == Type::Void => {
            return Err(LineError {
                message: format!("%{} is assigned a void value", name),
                column: 1,
            })
        }
        Some(name) => Some(Local::new(name, ty)),
        None => None,
    };
    Ok(LineResult::Instruction(Instruction::new(result, kind)))
}

/// Parse a function from a file
pub fn parse_function_file(path: &Path) -> Result<Function, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ParseError::new(
            0,
            format!("failed to read file: {}", e),
            path.display().to_string(),
        )
    })?;

    parse_function_str(&content, path.display().to_string())
}

/// Parse the single function defined in `content`
pub fn parse_function_str(content: &str, source_name: String) -> Result<Function, ParseError> {
    let mut function: Option<Function> = None;
    let mut closed = false;

    for (line_num, line) in content.lines().enumerate() {
        let line_number = line_num + 1; // 1-indexed
        let parsed = parse_line(line).map_err(|e| {
            ParseError::new(line_number, e.message, line).with_column(e.column)
        })?;

        match parsed {
            LineResult::Skip => {}
            LineResult::Define {
                name,
                return_type,
                params,
            } => {
                if function.is_some() {
                    return Err(ParseError::new(
                        line_number,
                        "only one function per file is supported",
                        line,
                    ));
                }
                function = Some(Function {
                    name,
                    return_type,
                    params,
                    block: BasicBlock::new("", Vec::new()),
                });
            }
            other => {
                let Some(f) = function.as_mut() else {
                    return Err(ParseError::new(
                        line_number,
                        "instruction outside of a function",
                        line,
                    ));
                };
                if closed {
                    return Err(ParseError::new(
                        line_number,
                        "instruction after the end of the function",
                        line,
                    ));
                }
                match other {
                    LineResult::Label(label) => {
                        if !f.block.label.is_empty() || !f.block.is_empty() {
                            return Err(ParseError::new(
                                line_number,
                                "only a single basic block is supported",
                                line,
                            ));
                        }
                        f.block.label = label;
                    }
                    LineResult::Instruction(inst) => f.block.instructions.push(inst),
                    LineResult::End => closed = true,
                    LineResult::Skip | LineResult::Define { .. } => {}
                }
            }
        }
    }

    match function {
        Some(f) if closed => Ok(f),
        Some(_) => Err(ParseError::new(0, "missing closing '}'", source_name)),
        None => Err(ParseError::new(0, "no function found", source_name)),
    }
}
