//! Expression parsing and evaluation.
//!
//! Expressions are the guards of transitions and the right-hand sides of
//! operations. The language supports:
//!
//! - integer (`42`) and real (`2.5`, `1e3`) literals
//! - `true` / `false` in any letter case
//! - identifiers naming inputs or variables (`var_A`, `in_1`)
//! - `+ - * / // %` arithmetic, unary `-` and `+`
//! - `== != < <= > >=` comparisons, chained as in `0 < x < 10`
//! - `and` / `&&`, `or` / `||`, `not` / `!`
//! - `(expr)` grouping
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons, `+ -`,
//! `* / // %`, unary sign, primary.
//!
//! Arithmetic is strict about types: a boolean operand to `+` is a
//! [`ExprError::TypeMismatch`]. Logical connectives read numbers by
//! truthiness (non-zero is true) and short-circuit. `/` always yields a
//! real; `//` and `%` floor toward negative infinity.

use crate::env::{Number, Scope};
use crate::error::ExprError;
use std::fmt;

/// The result of evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Bool(bool),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Real(_) => "real",
            Value::Bool(_) => "boolean",
        }
    }

    /// Non-zero numbers and `true` are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Real(r) => *r != 0.0,
            Value::Bool(b) => *b,
        }
    }

    /// Converts to a storable number. Booleans become `1` / `0`.
    pub fn to_number(self) -> Number {
        match self {
            Value::Int(i) => Number::Int(i),
            Value::Real(r) => Number::Real(r),
            Value::Bool(b) => Number::Int(b as i64),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Value::Int(i),
            Number::Real(r) => Value::Real(r),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            other => write!(f, "{}", other.to_number()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parses an expression from a string.
    pub fn parse(s: &str) -> Result<Self, ExprError> {
        if s.trim().is_empty() {
            return Err(ExprError::syntax(0, "empty expression"));
        }

        let mut parser = Parser::new(s);
        let expr = parser.parse_expr()?;
        parser.skip_whitespace();
        if parser.pos < parser.input.len() {
            return Err(ExprError::syntax(
                parser.pos,
                format!("unexpected input '{}'", &parser.input[parser.pos..]),
            ));
        }
        Ok(expr)
    }

    /// Evaluates the expression against a scope.
    pub fn evaluate<S: Scope + ?Sized>(&self, scope: &S) -> Result<Value, ExprError> {
        match self {
            Expr::Literal(v) => Ok(*v),
            Expr::Ident(name) => scope
                .lookup(name)
                .map(Value::from)
                .ok_or_else(|| ExprError::UnknownIdentifier(name.clone())),
            Expr::Unary(op, inner) => {
                let v = inner.evaluate(scope)?;
                eval_unary(*op, v)
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                if !lhs.evaluate(scope)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(rhs.evaluate(scope)?.is_truthy()))
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                if lhs.evaluate(scope)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(rhs.evaluate(scope)?.is_truthy()))
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = lhs.evaluate(scope)?;
                let r = rhs.evaluate(scope)?;
                eval_binary(*op, l, r)
            }
        }
    }

    /// Returns every identifier the expression reads, in first-use order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Ident(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Unary(_, inner) => inner.collect_identifiers(out),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_identifiers(out);
                rhs.collect_identifiers(out);
            }
        }
    }
}

/// Parses and evaluates `src` in one step.
pub fn evaluate<S: Scope + ?Sized>(src: &str, scope: &S) -> Result<Value, ExprError> {
    Expr::parse(src)?.evaluate(scope)
}

fn eval_unary(op: UnaryOp, v: Value) -> Result<Value, ExprError> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (_, Value::Bool(_)) => Err(ExprError::TypeMismatch {
            op: if op == UnaryOp::Neg { "-" } else { "+" },
            expected: "number",
            found: "boolean",
        }),
        (UnaryOp::Plus, v) => Ok(v),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or(ExprError::Overflow { op: "-" }),
        (UnaryOp::Neg, Value::Real(r)) => Ok(Value::Real(-r)),
    }
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::FloorDiv
        | BinaryOp::Rem => arithmetic(op, l, r),
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match (l, r) {
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Bool(_), other) | (other, Value::Bool(_)) => {
                    return Err(mismatch(op, "matching operand types", other))
                }
                (a, b) => a.to_number().as_f64() == b.to_number().as_f64(),
            };
            Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (l, r) {
                (Value::Int(a), Value::Int(b)) => a.partial_cmp(&b),
                (Value::Bool(_), _) => return Err(mismatch(op, "number", l)),
                (_, Value::Bool(_)) => return Err(mismatch(op, "number", r)),
                (a, b) => a.to_number().as_f64().partial_cmp(&b.to_number().as_f64()),
            };
            // NaN compares false in every direction.
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators short-circuit"),
    }
}

fn mismatch(op: BinaryOp, expected: &'static str, found: Value) -> ExprError {
    ExprError::TypeMismatch {
        op: op.symbol(),
        expected,
        found: found.kind(),
    }
}

fn arithmetic(op: BinaryOp, l: Value, r: Value) -> Result<Value, ExprError> {
    if let Value::Bool(_) = l {
        return Err(mismatch(op, "number", l));
    }
    if let Value::Bool(_) = r {
        return Err(mismatch(op, "number", r));
    }

    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        let overflow = || ExprError::Overflow { op: op.symbol() };
        return match op {
            BinaryOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Div => {
                if b == 0 {
                    return Err(ExprError::DivisionByZero);
                }
                Ok(Value::Real(a as f64 / b as f64))
            }
            BinaryOp::FloorDiv => {
                if b == 0 {
                    return Err(ExprError::DivisionByZero);
                }
                let q = a.checked_div(b).ok_or_else(overflow)?;
                if a % b != 0 && ((a < 0) != (b < 0)) {
                    Ok(Value::Int(q - 1))
                } else {
                    Ok(Value::Int(q))
                }
            }
            _ => {
                if b == 0 {
                    return Err(ExprError::DivisionByZero);
                }
                let m = a.checked_rem(b).ok_or_else(overflow)?;
                if m != 0 && ((m < 0) != (b < 0)) {
                    Ok(Value::Int(m + b))
                } else {
                    Ok(Value::Int(m))
                }
            }
        };
    }

    let a = l.to_number().as_f64();
    let b = r.to_number().as_f64();
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Rem if b == 0.0 => {
            return Err(ExprError::DivisionByZero)
        }
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        _ => {
            let m = a % b;
            if m != 0.0 && ((m < 0.0) != (b < 0.0)) {
                m + b
            } else {
                m
            }
        }
    };
    Ok(Value::Real(result))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Recursive descent parser over the raw input.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_expr(&mut self) -> Result<Expr, ExprError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;

        loop {
            self.skip_whitespace();
            if self.peek_str("||") {
                self.pos += 2;
            } else if self.peek_keyword("or") {
                self.pos += 2;
            } else {
                break;
            }
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;

        loop {
            self.skip_whitespace();
            if self.peek_str("&&") {
                self.pos += 2;
            } else if self.peek_keyword("and") {
                self.pos += 3;
            } else {
                break;
            }
            let right = self.parse_not()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        self.skip_whitespace();

        if self.peek_char() == Some('!') && !self.peek_str("!=") {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        if self.peek_keyword("not") {
            self.pos += 3;
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }

        self.parse_comparison()
    }

    /// `a < b < c` becomes `a < b and b < c`. Evaluation is pure, so the
    /// shared middle operand may be evaluated twice.
    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let first = self.parse_additive()?;
        let mut prev = first.clone();
        let mut chain: Option<Expr> = None;

        while let Some(op) = self.peek_comparison() {
            let rhs = self.parse_additive()?;
            let cmp = Expr::Binary(op, Box::new(prev), Box::new(rhs.clone()));
            chain = Some(match chain {
                None => cmp,
                Some(acc) => Expr::Binary(BinaryOp::And, Box::new(acc), Box::new(cmp)),
            });
            prev = rhs;
        }

        Ok(chain.unwrap_or(first))
    }

    fn peek_comparison(&mut self) -> Option<BinaryOp> {
        self.skip_whitespace();
        let ops = [
            ("==", BinaryOp::Eq),
            ("!=", BinaryOp::Ne),
            ("<=", BinaryOp::Le),
            (">=", BinaryOp::Ge),
            ("<", BinaryOp::Lt),
            (">", BinaryOp::Gt),
        ];
        for (text, op) in ops {
            if self.peek_str(text) {
                self.pos += text.len();
                return Some(op);
            }
        }
        None
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_term()?;

        loop {
            self.skip_whitespace();
            let op = match self.peek_char() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;

        loop {
            self.skip_whitespace();
            let op = if self.peek_str("//") {
                self.pos += 2;
                BinaryOp::FloorDiv
            } else {
                match self.peek_char() {
                    Some('*') => BinaryOp::Mul,
                    Some('/') => BinaryOp::Div,
                    Some('%') => BinaryOp::Rem,
                    _ => break,
                }
            };
            if op != BinaryOp::FloorDiv {
                self.pos += 1;
            }
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        self.skip_whitespace();

        match self.peek_char() {
            Some('-') => {
                self.pos += 1;
                let inner = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)))
            }
            Some('+') => {
                self.pos += 1;
                let inner = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Plus, Box::new(inner)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        self.skip_whitespace();

        match self.peek_char() {
            Some('(') => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.skip_whitespace();
                if self.peek_char() != Some(')') {
                    return Err(ExprError::syntax(self.pos, "expected ')'"));
                }
                self.pos += 1;
                Ok(expr)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if is_ident_start(c) => self.parse_word(),
            Some(c) => Err(ExprError::syntax(self.pos, format!("unexpected '{}'", c))),
            None => Err(ExprError::syntax(self.pos, "unexpected end of expression")),
        }
    }

    fn parse_word(&mut self) -> Result<Expr, ExprError> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                self.pos += 1;
            } else {
                break;
            }
        }

        let word = &self.input[start..self.pos];
        if word.eq_ignore_ascii_case("true") {
            return Ok(Expr::Literal(Value::Bool(true)));
        }
        if word.eq_ignore_ascii_case("false") {
            return Ok(Expr::Literal(Value::Bool(false)));
        }
        if matches!(word, "and" | "or" | "not") {
            return Err(ExprError::syntax(
                start,
                format!("unexpected keyword '{}'", word),
            ));
        }

        Ok(Expr::Ident(word.to_string()))
    }

    fn parse_number(&mut self) -> Result<Expr, ExprError> {
        let start = self.pos;
        let mut real = false;

        self.skip_digits();
        if self.peek_char() == Some('.') {
            real = true;
            self.pos += 1;
            self.skip_digits();
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            real = true;
            self.pos += 1;
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.pos += 1;
            }
            self.skip_digits();
        }

        let text = &self.input[start..self.pos];
        if real {
            text.parse::<f64>()
                .map(|r| Expr::Literal(Value::Real(r)))
                .map_err(|_| ExprError::syntax(start, format!("invalid number: '{}'", text)))
        } else {
            text.parse::<i64>()
                .map(|i| Expr::Literal(Value::Int(i)))
                .map_err(|_| {
                    ExprError::syntax(start, format!("integer literal out of range: '{}'", text))
                })
        }
    }

    fn skip_digits(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_str(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        let rest = &self.input[self.pos..];
        rest.starts_with(kw)
            && !rest[kw.len()..]
                .chars()
                .next()
                .map(is_ident_continue)
                .unwrap_or(false)
    }
}
