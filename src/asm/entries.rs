//! Entry points: externally callable names and the transfer vector that follows the text.

use std::collections::HashMap;

use crate::common::*;
use super::{AsmError, AsmErrorKind};
use super::constants::LP_SAVE_OFFSET;
use super::expr::*;
use super::output::*;

/// A declared entry point.
#[derive(Debug, Clone)]
pub struct EntryPoint {
    pub name: String,
    pub line_num: usize,
    /// Address of the named code inside the text.
    pub internal: Option<Word>,
    /// Address of the entry's transfer vector slot.
    pub external: Option<Word>,
}

/// Each resolved entry gets a two-word transfer slot: a fixed prologue word and a transfer to the code.
const WORDS_PER_ENTRY: Word = 2;

#[derive(Debug, Default)]
pub struct EntryTable {
    entries: Vec<EntryPoint>,
    names: HashMap<String, usize>,
    resolved: bool,
}
impl EntryTable {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &EntryPoint> {
        self.entries.iter()
    }

    pub fn declare(&mut self, name: &str, line_num: usize) -> Result<(), AsmErrorKind> {
        if let Some(&prev) = self.names.get(name) {
            return Err(AsmErrorKind::DuplicateSymbol { name: name.into(), prev_line_num: self.entries[prev].line_num });
        }
        self.names.insert(name.into(), self.entries.len());
        self.entries.push(EntryPoint { name: name.into(), line_num, internal: None, external: None });
        Ok(())
    }

    /// Resolves every entry against the symbols in scope and returns the transfer vector size along with any problems.
    ///
    /// The first call records the internal and external offsets; every later call verifies them instead.
    /// A name with no relocatable definition is reported by the first call only. It contributes no words and takes no slot,
    /// so every entry after it moves down and the section loses its two words.
    pub fn resolve_offsets(&mut self, external_base: Word, scope: &dyn SymbolScope) -> (Word, Vec<AsmError>) {
        let mut total = 0;
        let mut errors = vec![];
        let recording = !self.resolved;

        for entry in self.entries.iter_mut() {
            let internal = match scope.value_of(&entry.name) {
                None => {
                    if recording {
                        errors.push(AsmError { kind: AsmErrorKind::EntryNotFound(entry.name.clone()), line_num: entry.line_num });
                    }
                    continue;
                }
                Some(v) if v.kind != ValueKind::Relocatable => {
                    if recording {
                        errors.push(AsmError { kind: AsmErrorKind::EntryNotRelocatable { name: entry.name.clone(), kind: v.kind }, line_num: entry.line_num });
                    }
                    continue;
                }
                Some(v) => v.payload,
            };
            let external = external_base + total;
            total += WORDS_PER_ENTRY;

            if recording {
                entry.internal = Some(internal);
                entry.external = Some(external);
                continue;
            }
            for &(what, was, now) in &[("internal", entry.internal, internal), ("external", entry.external, external)] {
                if was != Some(now) {
                    errors.push(AsmError {
                        kind: AsmErrorKind::PhaseError {
                            what: format!("{} offset of entry {}", what, entry.name),
                            pass1: was.map(octal).unwrap_or_else(|| "unresolved".into()),
                            pass2: octal(now),
                        },
                        line_num: entry.line_num,
                    });
                }
            }
        }

        self.resolved = true;
        (total, errors)
    }

    pub fn emit_directives(&self, out: &mut OutputStream) {
        for entry in self.entries.iter() {
            if let (Some(internal), Some(external)) = (entry.internal, entry.external) {
                out.directive(DIRECTIVE_ENTRY, vec![entry.name.clone(), octal(internal), octal(external)]);
            }
        }
    }
    /// Emits the transfer vector: `epp4 pr6|LP_SAVE,*` and `tra <internal>` for every resolved entry.
    pub fn write_section(&self, out: &mut OutputStream) {
        let prologue = instruction_word(pr_address(PointerRegister::Sp, LP_SAVE_OFFSET), super::constants::encoding_for("epp4"), true, TAG_INDIRECT);
        let transfer = super::constants::encoding_for("tra");
        for entry in self.entries.iter() {
            if let (Some(internal), Some(external)) = (entry.internal, entry.external) {
                let first = out.word(external, prologue);
                out.word(external + 1, instruction_word(internal, transfer, false, 0));
                out.annotate(first, &format!("entry {}", entry.name));
            }
        }
    }
}

#[cfg(test)]
fn scope(pairs: &[(&str, Value)]) -> TestScope {
    TestScope(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(), 0)
}

#[test]
fn test_entry_sizing() {
    let mut entries = EntryTable::new();
    entries.declare("main", 1).unwrap();
    entries.declare("helper", 2).unwrap();
    entries.declare("other", 3).unwrap();
    assert!(matches!(entries.declare("main", 9), Err(AsmErrorKind::DuplicateSymbol { prev_line_num: 1, .. })));

    let s = scope(&[("main", Value::relocatable(0)), ("helper", Value::relocatable(0o10)), ("other", Value::relocatable(0o20))]);
    let (words, errors) = entries.resolve_offsets(0o40, &s);
    assert_eq!(words, 6);
    assert!(errors.is_empty());

    // same inputs, same answer, no complaints
    let (again, errors) = entries.resolve_offsets(0o40, &s);
    assert_eq!(again, words);
    assert!(errors.is_empty());

    let ext: Vec<_> = entries.iter().map(|e| e.external.unwrap()).collect();
    assert_eq!(ext, &[0o40, 0o42, 0o44]);
}
#[test]
fn test_entry_not_found_takes_no_slot() {
    let mut entries = EntryTable::new();
    entries.declare("missing", 1).unwrap();
    entries.declare("present", 2).unwrap();
    let s = scope(&[("present", Value::relocatable(4))]);

    let (words, errors) = entries.resolve_offsets(0o100, &s);
    assert_eq!(words, 2);
    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0].kind, AsmErrorKind::EntryNotFound(n) if n == "missing"));
    assert_eq!(errors[0].line_num, 1);
    // the entry after the missing one moves down into its slot
    assert_eq!(entries.iter().nth(1).unwrap().external, Some(0o100));
    assert_eq!(entries.iter().next().unwrap().external, None);
}
#[test]
fn test_entry_verification() {
    let mut entries = EntryTable::new();
    entries.declare("main", 1).unwrap();
    entries.declare("count", 2).unwrap();
    let (words, errors) = entries.resolve_offsets(0o10, &scope(&[("main", Value::relocatable(2)), ("count", Value::absolute(3))]));
    assert_eq!(words, 2);
    assert!(matches!(&errors[0].kind, AsmErrorKind::EntryNotRelocatable { kind: ValueKind::Absolute, .. }));

    let (_, errors) = entries.resolve_offsets(0o12, &scope(&[("main", Value::relocatable(2)), ("count", Value::absolute(3))]));
    // the bad entry was already reported
    assert_eq!(errors.len(), 1);
    match &errors[0].kind {
        AsmErrorKind::PhaseError { what, pass1, pass2 } => {
            assert_eq!(what, "external offset of entry main");
            assert_eq!((pass1.as_str(), pass2.as_str()), ("000010", "000012"));
        }
        x => panic!("{:?}", x),
    }
}
#[test]
fn test_entry_section() {
    let mut entries = EntryTable::new();
    entries.declare("main", 1).unwrap();
    entries.resolve_offsets(0o4, &scope(&[("main", Value::relocatable(1))]));

    let mut out = OutputStream::new();
    entries.emit_directives(&mut out);
    entries.write_section(&mut out);
    assert_eq!(out.lines(), &[
        "!entry main 000001 000004",
        "000004 xxxx 600024370120 entry main",
        "000005 xxxx 000001710000",
    ]);
}
