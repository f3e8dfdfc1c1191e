//! Everything needed to handle values and expression trees.
//!
//! The important types are `Value`, a possibly relocatable quantity, `ValueArena`, the shared storage that symbols and
//! table entries hold handles into, and `Expr`, an expression tree evaluated against a `SymbolScope`.

use std::fmt;

use crate::common::*;

/// Name of the location counter's section (the text of the object segment).
pub const TEXT_SECTION: &str = "text";
/// Name of the stack frame "section" that temporaries are relative to.
pub const FRAME_SECTION: &str = "sp";

/// The supported operations in an expr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OP {
    Mul, Div,
    Add, Sub,

    Neg,
}
impl OP {
    /// Binding strength of a binary operator (larger binds tighter).
    pub(super) fn precedence(self) -> u8 {
        match self {
            OP::Mul | OP::Div => 2,
            OP::Add | OP::Sub => 1,
            OP::Neg => 3,
        }
    }
}
impl fmt::Display for OP {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            OP::Mul => "*",
            OP::Div => "/",
            OP::Add => "+",
            OP::Sub | OP::Neg => "-",
        })
    }
}

/// The relocation class of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// A pass-1 forward reference. Absorbs everything it is combined with.
    Unknown,
    Absolute,
    /// An address relative to the start of a section.
    Relocatable,
    /// An offset into the stack frame.
    Temporary,
    /// An offset into the linkage section for an external reference.
    SegRef,
    /// A local name bound to an external reference.
    Link,
}

/// A possibly relocatable 36-bit quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value {
    pub kind: ValueKind,
    pub payload: Word,
    /// The section a `Relocatable` or `Temporary` value is relative to.
    pub section: Option<&'static str>,
    /// Set when the value must be addressed through a pointer register (bit 29 of the instruction).
    pub pr_indirect: bool,
}
impl Value {
    pub fn unknown() -> Self {
        Value { kind: ValueKind::Unknown, payload: 0, section: None, pr_indirect: false }
    }
    pub fn absolute(v: i64) -> Self {
        Value { kind: ValueKind::Absolute, payload: to_word(v), section: None, pr_indirect: false }
    }
    pub fn relocatable(address: Word) -> Self {
        Value { kind: ValueKind::Relocatable, payload: address & WORD_MASK, section: Some(TEXT_SECTION), pr_indirect: false }
    }
    pub fn temporary(offset: Word) -> Self {
        Value { kind: ValueKind::Temporary, payload: offset & WORD_MASK, section: Some(FRAME_SECTION), pr_indirect: true }
    }
    pub fn segref(offset: Word) -> Self {
        Value { kind: ValueKind::SegRef, payload: offset & WORD_MASK, section: None, pr_indirect: true }
    }
    /// Copies a segref into a `Link` value, snapshotting its offset.
    pub fn link_to(segref: &Value) -> Self {
        Value { kind: ValueKind::Link, ..*segref }
    }

    pub fn is_known(&self) -> bool {
        self.kind != ValueKind::Unknown
    }
    /// The payload read as a signed quantity.
    pub fn signed(&self) -> i64 {
        from_word(self.payload)
    }
    fn with_payload(self, payload: i64) -> Self {
        Value { payload: to_word(payload), ..self }
    }

    /// Applies a binary operator under the relocation rules.
    pub(super) fn binary(op: OP, a: Value, b: Value) -> Result<Value, IllegalReason> {
        use ValueKind::*;
        if a.kind == Unknown || b.kind == Unknown { return Ok(Value::unknown()); }
        let (x, y) = (a.signed(), b.signed());
        match op {
            OP::Add => match (a.kind, b.kind) {
                (Absolute, Absolute) => Ok(Value::absolute(x.wrapping_add(y))),
                (_, Absolute) => Ok(a.with_payload(x.wrapping_add(y))),
                (Absolute, _) => Ok(b.with_payload(x.wrapping_add(y))),
                (l, r) => Err(IllegalReason::IncompatibleKinds(op, l, r)),
            }
            OP::Sub => match (a.kind, b.kind) {
                (Absolute, Absolute) => Ok(Value::absolute(x.wrapping_sub(y))),
                (_, Absolute) => Ok(a.with_payload(x.wrapping_sub(y))),
                (Relocatable, Relocatable) => match a.section == b.section {
                    true => Ok(Value::absolute(x.wrapping_sub(y))),
                    false => Err(IllegalReason::DifferentSections),
                }
                (l, r) => Err(IllegalReason::IncompatibleKinds(op, l, r)),
            }
            OP::Mul | OP::Div => match (a.kind, b.kind) {
                (Absolute, Absolute) => match op {
                    OP::Mul => Ok(Value::absolute(x.wrapping_mul(y))),
                    _ if y == 0 => Err(IllegalReason::DivideByZero),
                    _ => Ok(Value::absolute(x.wrapping_div(y))),
                }
                (l, r) => Err(IllegalReason::IncompatibleKinds(op, l, r)),
            }
            OP::Neg => unreachable!(), // unary only, the parser never builds a binary Neg node
        }
    }
    pub(super) fn negate(self) -> Result<Value, IllegalReason> {
        match self.kind {
            ValueKind::Unknown => Ok(self),
            ValueKind::Absolute => Ok(Value::absolute(self.signed().wrapping_neg())),
            k => Err(IllegalReason::IncompatibleKind(OP::Neg, k)),
        }
    }
}
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ValueKind::Unknown => write!(f, "unknown"),
            ValueKind::Absolute => write!(f, "{}", self.signed()),
            k => write!(f, "{:?} {:06o}", k, self.payload),
        }
    }
}

#[test]
fn test_relocation_rules() {
    let abs = Value::absolute;
    let rel = Value::relocatable;

    assert_eq!(Value::binary(OP::Add, abs(3), abs(4)), Ok(abs(7)));
    assert_eq!(Value::binary(OP::Mul, abs(-3), abs(4)), Ok(abs(-12)));
    assert_eq!(Value::binary(OP::Div, abs(7), abs(2)), Ok(abs(3)));
    assert_eq!(Value::binary(OP::Div, abs(7), abs(0)), Err(IllegalReason::DivideByZero));

    assert_eq!(Value::binary(OP::Add, rel(0o10), abs(2)), Ok(rel(0o12)));
    assert_eq!(Value::binary(OP::Add, abs(2), rel(0o10)), Ok(rel(0o12)));
    assert_eq!(Value::binary(OP::Sub, rel(0o10), abs(2)), Ok(rel(0o6)));
    assert_eq!(Value::binary(OP::Sub, rel(0o10), rel(0o4)), Ok(abs(4)));
    assert_eq!(Value::binary(OP::Add, rel(1), rel(2)), Err(IllegalReason::IncompatibleKinds(OP::Add, ValueKind::Relocatable, ValueKind::Relocatable)));
    assert_eq!(Value::binary(OP::Mul, rel(1), abs(2)), Err(IllegalReason::IncompatibleKinds(OP::Mul, ValueKind::Relocatable, ValueKind::Absolute)));
    assert_eq!(Value::binary(OP::Sub, abs(1), rel(2)), Err(IllegalReason::IncompatibleKinds(OP::Sub, ValueKind::Absolute, ValueKind::Relocatable)));
    assert_eq!(Value::binary(OP::Sub, Value::temporary(0o104), rel(2)), Err(IllegalReason::IncompatibleKinds(OP::Sub, ValueKind::Temporary, ValueKind::Relocatable)));

    let t = Value::binary(OP::Add, Value::temporary(0o100), abs(1)).unwrap();
    assert_eq!((t.kind, t.payload, t.pr_indirect), (ValueKind::Temporary, 0o101, true));
    let s = Value::binary(OP::Add, Value::segref(4), abs(2)).unwrap();
    assert_eq!((s.kind, s.payload), (ValueKind::SegRef, 6));

    assert_eq!(Value::binary(OP::Add, Value::unknown(), rel(2)), Ok(Value::unknown()));
    assert_eq!(Value::binary(OP::Div, abs(1), Value::unknown()), Ok(Value::unknown()));
    assert_eq!(Value::binary(OP::Mul, rel(1), Value::unknown()), Ok(Value::unknown()));

    assert_eq!(abs(5).negate(), Ok(abs(-5)));
    assert_eq!(rel(5).negate(), Err(IllegalReason::IncompatibleKind(OP::Neg, ValueKind::Relocatable)));
    assert_eq!(abs(-1).payload, WORD_MASK);
}
#[test]
fn test_link_snapshot() {
    let s = Value::segref(0o12);
    let l = Value::link_to(&s);
    assert_eq!((l.kind, l.payload, l.pr_indirect), (ValueKind::Link, 0o12, true));
}

/// A stable handle to a value in a `ValueArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(usize);

/// Storage for every named value of an assembly.
///
/// Symbols, segrefs and temporaries share values by holding the same `ValueId`.
/// Only the resolver responsible for a kind of value ever overwrites it, and only between passes.
#[derive(Debug, Default)]
pub struct ValueArena {
    values: Vec<Value>,
}
impl ValueArena {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn alloc(&mut self, value: Value) -> ValueId {
        self.values.push(value);
        ValueId(self.values.len() - 1)
    }
    pub fn get(&self, id: ValueId) -> &Value {
        &self.values[id.0]
    }
    pub(super) fn set(&mut self, id: ValueId, value: Value) {
        self.values[id.0] = value;
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
#[test]
fn test_arena_sharing() {
    let mut a = ValueArena::new();
    let t = a.alloc(Value::temporary(0));
    let other = a.alloc(Value::absolute(7));
    a.set(t, Value::temporary(0o104));
    assert_eq!(a.get(t).payload, 0o104);
    assert_eq!(*a.get(other), Value::absolute(7));
    assert_eq!(a.len(), 2);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalReason {
    IncompatibleKinds(OP, ValueKind, ValueKind),
    IncompatibleKind(OP, ValueKind),
    DifferentSections,
    DivideByZero,
}
impl fmt::Display for IllegalReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IllegalReason::IncompatibleKinds(op, a, b) => write!(f, "cannot apply '{}' to {:?} and {:?} values", op, a, b),
            IllegalReason::IncompatibleKind(op, a) => write!(f, "cannot apply unary '{}' to a {:?} value", op, a),
            IllegalReason::DifferentSections => write!(f, "cannot take the difference of addresses in different sections"),
            IllegalReason::DivideByZero => write!(f, "division by zero"),
        }
    }
}

/// The reason why an expression failed to be evaluated.
///
/// `UndefinedSymbol` is recoverable in pass 1 (the result is simply not known yet); `Illegal` never is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    Illegal(IllegalReason),
    UndefinedSymbol(String),
}
impl From<IllegalReason> for EvalError {
    fn from(reason: IllegalReason) -> Self {
        EvalError::Illegal(reason)
    }
}

/// What an expression is evaluated against.
pub trait SymbolScope {
    /// Gets the current value of a symbol, if defined.
    fn value_of(&self, name: &str) -> Option<Value>;
    /// The location counter (`*`).
    fn location(&self) -> Word;
}

/// An expression tree.
///
/// Equality is structural, which is what external references are deduplicated by.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Value(Value),
    Ident(String),
    /// The location counter, `*`.
    Location,
    Unary(OP, Box<Expr>),
    Binary(OP, Box<Expr>, Box<Expr>),
}
impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::Value(Value::absolute(v))
    }
}
impl Expr {
    pub fn ident<T: Into<String>>(name: T) -> Self {
        Expr::Ident(name.into())
    }
    pub fn binary(op: OP, left: Expr, right: Expr) -> Self {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }
    pub fn negate(inner: Expr) -> Self {
        Expr::Unary(OP::Neg, Box::new(inner))
    }

    /// Attempts to evaluate the expression.
    /// An undefined symbol anywhere in the tree fails the whole evaluation, but illegal operations take priority over it.
    pub fn eval(&self, scope: &dyn SymbolScope) -> Result<Value, EvalError> {
        match self {
            Expr::Value(v) => Ok(*v),
            Expr::Ident(name) => scope.value_of(name).ok_or_else(|| EvalError::UndefinedSymbol(name.clone())),
            Expr::Location => Ok(Value::relocatable(scope.location())),
            Expr::Unary(_, inner) => Ok(inner.eval(scope)?.negate()?),
            Expr::Binary(op, left, right) => {
                let (left, right) = (left.eval(scope), right.eval(scope));
                for side in &[&left, &right] {
                    if let Err(EvalError::Illegal(reason)) = side { return Err((*reason).into()); }
                }
                Ok(Value::binary(*op, left?, right?)?)
            }
        }
    }
}
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn nested(e: &Expr, f: &mut fmt::Formatter) -> fmt::Result {
            match e {
                Expr::Binary(..) => write!(f, "({})", e),
                _ => write!(f, "{}", e),
            }
        }
        match self {
            Expr::Value(v) => write!(f, "{}", v),
            Expr::Ident(name) => f.write_str(name),
            Expr::Location => f.write_str("*"),
            Expr::Unary(op, inner) => { write!(f, "{}", op)?; nested(inner, f) }
            Expr::Binary(op, left, right) => {
                nested(left, f)?;
                write!(f, "{}", op)?;
                nested(right, f)
            }
        }
    }
}

#[cfg(test)]
pub(super) struct TestScope(pub std::collections::HashMap<String, Value>, pub Word);
#[cfg(test)]
impl SymbolScope for TestScope {
    fn value_of(&self, name: &str) -> Option<Value> {
        self.0.get(name).copied()
    }
    fn location(&self) -> Word {
        self.1
    }
}

#[test]
fn test_eval() {
    let mut symbols = std::collections::HashMap::new();
    symbols.insert("start".to_string(), Value::relocatable(0o10));
    symbols.insert("len".to_string(), Value::absolute(3));
    let scope = TestScope(symbols, 0o20);

    let e = Expr::binary(OP::Add, Expr::ident("start"), Expr::binary(OP::Mul, Expr::ident("len"), Expr::from(2i64)));
    assert_eq!(e.eval(&scope), Ok(Value::relocatable(0o16)));
    assert_eq!(format!("{}", e), "start+(len*2)");

    let here = Expr::binary(OP::Sub, Expr::Location, Expr::ident("start"));
    assert_eq!(here.eval(&scope), Ok(Value::absolute(0o10)));

    assert_eq!(Expr::negate(Expr::ident("len")).eval(&scope), Ok(Value::absolute(-3)));
    assert_eq!(Expr::ident("later").eval(&scope), Err(EvalError::UndefinedSymbol("later".into())));

    // illegal beats undefined regardless of side
    let bad = Expr::binary(OP::Add, Expr::ident("later"), Expr::binary(OP::Add, Expr::ident("start"), Expr::ident("start")));
    assert_eq!(bad.eval(&scope), Err(EvalError::Illegal(IllegalReason::IncompatibleKinds(OP::Add, ValueKind::Relocatable, ValueKind::Relocatable))));
}
#[test]
fn test_structural_equality() {
    let a = Expr::binary(OP::Add, Expr::ident("x"), Expr::from(4i64));
    assert_eq!(a, Expr::binary(OP::Add, Expr::ident("x"), Expr::from(4i64)));
    assert_ne!(a, Expr::binary(OP::Add, Expr::ident("x"), Expr::from(5i64)));
    assert_ne!(a, Expr::binary(OP::Add, Expr::from(4i64), Expr::ident("x")));
}
