//! The linkage resolver: external references (`segment$symbol[+offset]`) and the linkage section that holds them.
//!
//! Every distinct reference gets one two-word ITS pair in the linkage section, which the code reaches indirectly through `lp` (`pr4`).
//! References are deduplicated structurally, so any number of identical operands share one pair.

use crate::common::*;
use super::{AsmError, AsmErrorKind};
use super::constants::NOP_WORD;
use super::expr::*;
use super::output::*;
use super::symbols::SymbolTable;

const WORDS_PER_SEGREF: Word = 2;

/// One external reference.
#[derive(Debug, Clone)]
pub struct SegRef {
    pub segment: String,
    pub symbol: String,
    pub offset: Option<Expr>,
    /// The value shared by every symbol bound directly to this reference.
    pub value: ValueId,
    pub line_num: usize,
}
impl SegRef {
    fn describe(&self) -> String {
        describe(&self.segment, &self.symbol, &self.offset)
    }
}
fn describe(segment: &str, symbol: &str, offset: &Option<Expr>) -> String {
    match offset {
        Some(offset) => format!("{}${}+{}", segment, symbol, offset),
        None => format!("{}${}", segment, symbol),
    }
}

#[derive(Debug, Default)]
pub struct Linkage {
    segrefs: Vec<SegRef>,
    /// Set once the section has been placed, after which no new references may appear.
    base: Option<Word>,
}
impl Linkage {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn len(&self) -> usize {
        self.segrefs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.segrefs.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &SegRef> {
        self.segrefs.iter()
    }
    /// Size of the linkage section in words.
    pub fn size(&self) -> Word {
        WORDS_PER_SEGREF * self.segrefs.len() as Word
    }
    pub fn base(&self) -> Option<Word> {
        self.base
    }

    fn find(&self, segment: &str, symbol: &str, offset: &Option<Expr>) -> Option<usize> {
        self.segrefs.iter().position(|s| s.segment == segment && s.symbol == symbol && &s.offset == offset)
    }
    /// The one place references are created: returns the existing reference if there is one.
    fn find_or_create(&mut self, values: &mut ValueArena, segment: &str, symbol: &str, offset: Option<Expr>, line_num: usize) -> Result<usize, AsmErrorKind> {
        if let Some(i) = self.find(segment, symbol, &offset) { return Ok(i); }
        if self.base.is_some() {
            return Err(AsmErrorKind::PhaseError { what: format!("external reference {}", describe(segment, symbol, &offset)), pass1: "absent".into(), pass2: "referenced".into() });
        }
        let value = values.alloc(Value::segref(self.size()));
        self.segrefs.push(SegRef { segment: segment.into(), symbol: symbol.into(), offset, value, line_num });
        Ok(self.segrefs.len() - 1)
    }

    /// Declares `segment$name` for each name and binds `name` locally to it.
    /// Names that are already symbols are reported and skipped.
    pub fn declare_segref(&mut self, symbols: &mut SymbolTable, values: &mut ValueArena, segment: &str, names: &[&str], line_num: usize) -> Vec<AsmErrorKind> {
        let mut errors = vec![];
        for &name in names {
            if let Some(prev) = symbols.lookup(name) {
                errors.push(AsmErrorKind::DuplicateSymbol { name: name.into(), prev_line_num: prev.line_num });
                continue;
            }
            let res = self.find_or_create(values, segment, name, None, line_num).and_then(|i| symbols.define(name, self.segrefs[i].value, line_num).map(|_| ()));
            if let Err(e) = res { errors.push(e); }
        }
        errors
    }
    /// Gets the value of an external reference, creating it if this is the first time it is seen.
    pub fn resolve_external(&mut self, values: &mut ValueArena, segment: &str, symbol: &str, offset: Option<Expr>, line_num: usize) -> Result<Value, AsmErrorKind> {
        let i = self.find_or_create(values, segment, symbol, offset, line_num)?;
        Ok(*values.get(self.segrefs[i].value))
    }
    /// Binds `local` to a copy of the reference's value.
    pub fn declare_link(&mut self, symbols: &mut SymbolTable, values: &mut ValueArena, local: &str, segment: &str, symbol: &str, offset: Option<Expr>, line_num: usize) -> Result<(), AsmErrorKind> {
        if let Some(prev) = symbols.lookup(local) {
            return Err(AsmErrorKind::DuplicateSymbol { name: local.into(), prev_line_num: prev.line_num });
        }
        let i = self.find_or_create(values, segment, symbol, offset, line_num)?;
        let link = values.alloc(Value::link_to(values.get(self.segrefs[i].value)));
        symbols.define(local, link, line_num)?;
        Ok(())
    }

    fn base_for(&self, current: Word) -> Word {
        match !self.segrefs.is_empty() && current % 2 != 0 {
            true => current + 1,
            false => current,
        }
    }
    /// Places the section at `current` (moved to an even address if there is anything in it) and freezes the reference list.
    pub fn finalize_base(&mut self, current: Word) -> Word {
        let base = self.base_for(current);
        self.base = Some(base);
        base
    }

    fn offset_value(segref: &SegRef, scope: &dyn SymbolScope) -> Result<Word, AsmErrorKind> {
        let offset = match &segref.offset {
            None => return Ok(0),
            Some(offset) => offset,
        };
        match offset.eval(scope) {
            Ok(v) if v.kind == ValueKind::Absolute => Ok(v.payload),
            Ok(v) => Err(AsmErrorKind::ValueNotAbsolute(v.kind)),
            Err(EvalError::UndefinedSymbol(name)) => Err(AsmErrorKind::UndefinedSymbol(name)),
            Err(EvalError::Illegal(reason)) => Err(AsmErrorKind::IllegalExpr(reason)),
        }
    }

    pub fn emit_directives(&self, scope: &dyn SymbolScope, out: &mut OutputStream) -> Vec<AsmError> {
        let mut errors = vec![];
        let base = match self.base {
            Some(base) if !self.segrefs.is_empty() => base,
            _ => return errors,
        };
        out.directive(DIRECTIVE_LINKAGE, vec![octal(base), self.segrefs.len().to_string()]);
        for (i, segref) in self.segrefs.iter().enumerate() {
            let offset = Self::offset_value(segref, scope).unwrap_or_else(|kind| {
                errors.push(AsmError { kind, line_num: segref.line_num });
                0
            });
            out.directive(DIRECTIVE_SEGREF, vec![segref.segment.clone(), segref.symbol.clone(), octal(base + WORDS_PER_SEGREF * i as Word), format!("{:o}", offset)]);
        }
        errors
    }
    /// Emits the linkage section (one ITS pair per reference, in declaration order) starting at the end of the pool.
    pub fn write_section(&self, current: Word, scope: &dyn SymbolScope, out: &mut OutputStream) -> Vec<AsmError> {
        let mut errors = vec![];
        if self.segrefs.is_empty() { return errors; }

        let base = self.base_for(current);
        if self.base != Some(base) {
            errors.push(AsmError {
                kind: AsmErrorKind::PhaseError {
                    what: "linkage section origin".into(),
                    pass1: self.base.map(octal).unwrap_or_else(|| "unplaced".into()),
                    pass2: octal(base),
                },
                line_num: 0,
            });
        }
        if base != current {
            let pad = out.word(current, NOP_WORD);
            out.annotate(pad, "even");
        }
        for (i, segref) in self.segrefs.iter().enumerate() {
            let offset = Self::offset_value(segref, scope).unwrap_or_else(|kind| {
                errors.push(AsmError { kind, line_num: segref.line_num });
                0
            });
            let address = base + WORDS_PER_SEGREF * i as Word;
            let first = out.word(address, TAG_ITS);
            out.word(address + 1, (offset & HALF_MASK) << 18);
            out.annotate(first, &segref.describe());
        }
        errors
    }
}

#[test]
fn test_linkage_dedup() {
    let mut values = ValueArena::new();
    let mut symbols = SymbolTable::new();
    let mut linkage = Linkage::new();

    let errors = linkage.declare_segref(&mut symbols, &mut values, "seg1", &["a", "b"], 1);
    assert!(errors.is_empty());
    assert_eq!(linkage.len(), 2);

    // inline references to the declared names land on the same entries
    let a = linkage.resolve_external(&mut values, "seg1", "a", None, 2).unwrap();
    let b = linkage.resolve_external(&mut values, "seg1", "b", None, 3).unwrap();
    assert_eq!((a.kind, a.payload), (ValueKind::SegRef, 0));
    assert_eq!((b.kind, b.payload), (ValueKind::SegRef, 2));
    assert_eq!(linkage.len(), 2);

    // and the local symbols share the reference's value
    let sym = symbols.lookup("b").unwrap();
    assert_eq!(*values.get(sym.value), b);

    // an offset makes it a different reference, but only once
    let off = Expr::binary(OP::Add, Expr::ident("k"), Expr::from(1i64));
    let c = linkage.resolve_external(&mut values, "seg1", "a", Some(off.clone()), 4).unwrap();
    let d = linkage.resolve_external(&mut values, "seg1", "a", Some(off), 5).unwrap();
    assert_eq!(c, d);
    assert_eq!(c.payload, 4);
    assert_eq!(linkage.len(), 3);

    // redeclaring is an error for the name only
    let errors = linkage.declare_segref(&mut symbols, &mut values, "seg2", &["a", "z"], 6);
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], AsmErrorKind::DuplicateSymbol { prev_line_num: 1, .. }));
    assert_eq!(linkage.len(), 4);
}
#[test]
fn test_link_declaration() {
    let mut values = ValueArena::new();
    let mut symbols = SymbolTable::new();
    let mut linkage = Linkage::new();

    linkage.declare_link(&mut symbols, &mut values, "out", "sys", "write", None, 1).unwrap();
    linkage.declare_link(&mut symbols, &mut values, "out2", "sys", "write", None, 2).unwrap();
    assert_eq!(linkage.len(), 1);
    let v = *values.get(symbols.lookup("out2").unwrap().value);
    assert_eq!((v.kind, v.payload, v.pr_indirect), (ValueKind::Link, 0, true));
    assert!(linkage.declare_link(&mut symbols, &mut values, "out", "sys", "read", None, 3).is_err());
}
#[test]
fn test_linkage_freeze() {
    let mut values = ValueArena::new();
    let mut linkage = Linkage::new();
    linkage.resolve_external(&mut values, "s", "x", None, 1).unwrap();
    assert_eq!(linkage.finalize_base(0o13), 0o14);

    // known references still resolve, new ones are phase errors
    assert!(linkage.resolve_external(&mut values, "s", "x", None, 1).is_ok());
    assert!(matches!(linkage.resolve_external(&mut values, "s", "y", None, 2), Err(AsmErrorKind::PhaseError { .. })));

    let empty = &mut Linkage::new();
    assert_eq!(empty.finalize_base(0o13), 0o13);
}
#[test]
fn test_linkage_section() {
    let mut values = ValueArena::new();
    let mut linkage = Linkage::new();
    linkage.resolve_external(&mut values, "seg1", "a", None, 1).unwrap();
    linkage.resolve_external(&mut values, "seg1", "b", Some(Expr::from(5i64)), 2).unwrap();
    assert_eq!(linkage.finalize_base(3), 4);

    let scope = TestScope(Default::default(), 0);
    let mut out = OutputStream::new();
    assert!(linkage.emit_directives(&scope, &mut out).is_empty());
    assert!(linkage.write_section(3, &scope, &mut out).is_empty());
    assert_eq!(out.lines(), &[
        "!LINKAGE 000004 2",
        "!segref seg1 a 000004 0",
        "!segref seg1 b 000006 5",
        "000003 xxxx 000000011000 even",
        "000004 xxxx 000000000043 seg1$a",
        "000005 xxxx 000000000000",
        "000006 xxxx 000000000043 seg1$b+5",
        "000007 xxxx 000005000000",
    ]);

    let errors = linkage.write_section(5, &scope, &mut OutputStream::new());
    assert!(matches!(&errors[0].kind, AsmErrorKind::PhaseError { what, .. } if what == "linkage section origin"));
}
