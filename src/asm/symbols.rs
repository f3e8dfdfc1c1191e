//! The symbol table: names bound to shared values.

use std::collections::HashMap;
use std::io::{self, Write};

use super::AsmErrorKind;
use super::expr::*;
use super::temps::TempId;

/// A named value.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub value: ValueId,
    /// Line where the symbol was defined.
    pub line_num: usize,
    /// Set when the symbol names a stack temporary.
    pub temporary: Option<TempId>,
}

/// Maps names to symbols. A name is defined at most once for the whole assembly.
///
/// The table makes no pass-aware guarantees of its own: pass 2 only ever looks symbols up.
#[derive(Debug, Default)]
pub struct SymbolTable {
    raw: HashMap<String, Symbol>,
}
impl SymbolTable {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn len(&self) -> usize {
        self.raw.len()
    }
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.raw.get(name)
    }
    /// Defines a new symbol. An existing definition is never overwritten.
    pub fn define(&mut self, name: &str, value: ValueId, line_num: usize) -> Result<&Symbol, AsmErrorKind> {
        if let Some(prev) = self.raw.get(name) {
            return Err(AsmErrorKind::DuplicateSymbol { name: name.into(), prev_line_num: prev.line_num });
        }
        let symbol = Symbol { name: name.into(), value, line_num, temporary: None };
        Ok(self.raw.entry(name.into()).or_insert(symbol))
    }
    pub(super) fn attach_temporary(&mut self, name: &str, id: TempId) {
        if let Some(symbol) = self.raw.get_mut(name) {
            symbol.temporary = Some(id);
        }
    }
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.raw.values()
    }

    /// Writes one `name value kind line` row per symbol, either sorted by name or in table order.
    pub fn dump<W: Write>(&self, values: &ValueArena, f: &mut W, sorted: bool) -> io::Result<()> {
        let mut rows: Vec<&Symbol> = self.raw.values().collect();
        if sorted {
            rows.sort_by(|a, b| a.name.cmp(&b.name));
        }
        for symbol in rows {
            let value = values.get(symbol.value);
            writeln!(f, "{:<16} {:012o} {:?} {}", symbol.name, value.payload, value.kind, symbol.line_num)?;
        }
        Ok(())
    }
}

#[test]
fn test_single_definition() {
    let mut values = ValueArena::new();
    let mut symbols = SymbolTable::new();
    let first = values.alloc(Value::relocatable(0));
    let second = values.alloc(Value::relocatable(4));

    assert_eq!(symbols.define("foo", first, 1).unwrap().value, first);
    match symbols.define("foo", second, 7) {
        Err(AsmErrorKind::DuplicateSymbol { name, prev_line_num: 1 }) => assert_eq!(name, "foo"),
        x => panic!("{:?}", x),
    }
    // the original binding survives
    assert_eq!(symbols.lookup("foo").unwrap().value, first);
    assert_eq!(symbols.lookup("foo").unwrap().line_num, 1);
    assert!(symbols.lookup("FOO").is_none());
    assert_eq!(symbols.len(), 1);
}
#[test]
fn test_dump_sorted() {
    let mut values = ValueArena::new();
    let mut symbols = SymbolTable::new();
    for (i, name) in ["zeta", "alpha", "mid"].iter().enumerate() {
        let v = values.alloc(Value::relocatable(i as u64));
        symbols.define(name, v, i + 1).unwrap();
    }
    let mut out = Vec::new();
    symbols.dump(&values, &mut out, true).unwrap();
    let text = String::from_utf8(out).unwrap();
    let names: Vec<&str> = text.lines().map(|l| l.split_whitespace().next().unwrap()).collect();
    assert_eq!(names, &["alpha", "mid", "zeta"]);
    assert!(text.lines().next().unwrap().contains("000000000001 Relocatable 2"));
}
