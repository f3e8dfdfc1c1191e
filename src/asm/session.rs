//! The pass driver: runs the statements twice, places the tables in between, and writes the trailing sections.

use std::collections::HashMap;
use std::path::Path;

use crate::common::*;
use super::{Assembly, AsmError, AsmErrorKind, Diagnostics, Pass};
use super::constants::{MAX_SEGMENT_WORDS, STACK_TEMP_BASE};
use super::entries::EntryTable;
use super::expr::*;
use super::linkage::Linkage;
use super::lines::SourceLine;
use super::literals::LiteralTable;
use super::output::*;
use super::symbols::SymbolTable;
use super::temps::StackTemps;

/// Symbols as seen by expressions: each name's current value in the arena.
pub(super) struct Scope<'a> {
    symbols: &'a SymbolTable,
    values: &'a ValueArena,
    location: Word,
}
impl<'a> Scope<'a> {
    pub(super) fn new(symbols: &'a SymbolTable, values: &'a ValueArena, location: Word) -> Self {
        Scope { symbols, values, location }
    }
}
impl SymbolScope for Scope<'_> {
    fn value_of(&self, name: &str) -> Option<Value> {
        self.symbols.lookup(name).map(|s| *self.values.get(s.value))
    }
    fn location(&self) -> Word {
        self.location
    }
}

/// All the state of one assembly.
///
/// The lifecycle is `new`, then `run` (pass 1, placement, pass 2, trailing sections), then `finish`.
/// Pass 2 only runs if pass 1 was free of errors.
pub struct AssemblySession {
    pub(super) name: String,
    pub(super) pass: Pass,
    /// The location counter.
    pub(super) counter: Word,
    pub(super) line_num: usize,
    /// Address of the statement being processed.
    pub(super) line_start: Word,
    /// Literals seen so far on the current line.
    pub(super) literal_seq: usize,

    pub(super) values: ValueArena,
    pub(super) symbols: SymbolTable,
    pub(super) literals: LiteralTable,
    pub(super) linkage: Linkage,
    pub(super) entries: EntryTable,
    pub(super) temps: StackTemps,
    pub(super) out: OutputStream,
    pub(super) diagnostics: Diagnostics,

    /// Names given to `segdef`, with their line numbers.
    pub(super) segdefs: Vec<(String, usize)>,
    /// Index registers stored by each `save`, by label.
    pub(super) saves: HashMap<String, Vec<u8>>,

    text_size: Option<Word>,
    complete: bool,
}
impl AssemblySession {
    /// Creates an empty session. The segment name defaults to the stem of `asm_name`.
    pub fn new(asm_name: &str) -> Self {
        let name = Path::new(asm_name).file_stem().and_then(|s| s.to_str()).unwrap_or(asm_name);
        AssemblySession {
            name: name.into(),
            pass: Pass::One,
            counter: 0,
            line_num: 0,
            line_start: 0,
            literal_seq: 0,

            values: ValueArena::new(),
            symbols: SymbolTable::new(),
            literals: LiteralTable::new(),
            linkage: Linkage::new(),
            entries: EntryTable::new(),
            temps: StackTemps::new(),
            out: OutputStream::new(),
            diagnostics: Diagnostics::new(),

            segdefs: vec![],
            saves: HashMap::new(),

            text_size: None,
            complete: false,
        }
    }
    pub fn pass(&self) -> Pass {
        self.pass
    }
    pub fn counter(&self) -> Word {
        self.counter
    }
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(super) fn error(&mut self, kind: AsmErrorKind) {
        self.diagnostics.error(AsmError { kind, line_num: self.line_num });
    }
    /// Warnings are only kept from the final pass, so each is reported once.
    pub(super) fn warning(&mut self, kind: AsmErrorKind) {
        if self.pass == Pass::Two {
            self.diagnostics.warning(AsmError { kind, line_num: self.line_num });
        }
    }
    fn errors(&mut self, errors: Vec<AsmError>) {
        for e in errors {
            self.diagnostics.error(e);
        }
    }

    /// Runs the whole assembly over `lines`.
    pub fn run(&mut self, lines: &[SourceLine]) {
        self.run_pass(Pass::One, lines);
        if self.diagnostics.error_count() != 0 {
            log::info!("{}: pass 1 had errors, skipping pass 2", self.name);
            return;
        }
        self.interpass();
        self.run_pass(Pass::Two, lines);
        self.postpass();
        self.complete = true;
    }

    fn run_pass(&mut self, pass: Pass, lines: &[SourceLine]) {
        log::debug!("{}: pass {:?}", self.name, pass);
        self.pass = pass;
        self.counter = 0;
        for line in lines {
            if !self.process_line(line) { break; }
        }
        log::debug!("{}: pass {:?} ended at {:06o}", self.name, pass, self.counter);
    }

    /// Places everything that follows the text and writes the header directives.
    fn interpass(&mut self) {
        self.line_num = 0;
        self.text_size = Some(self.counter);

        let scope = Scope::new(&self.symbols, &self.values, self.counter);
        let (entry_words, errors) = self.entries.resolve_offsets(self.counter, &scope);
        self.errors(errors);
        self.counter += entry_words;

        self.counter = self.literals.assign_addresses(self.counter);
        let frame_end = self.temps.allocate(STACK_TEMP_BASE, &mut self.values);
        let base = self.linkage.finalize_base(self.counter);
        self.counter = base + self.linkage.size();
        if self.counter > MAX_SEGMENT_WORDS {
            self.error(AsmErrorKind::CapacityExceeded { what: "segment", limit: MAX_SEGMENT_WORDS as usize, requested: self.counter as usize });
        }
        log::debug!("{}: {} entries, {} literals, frame ends at {:o}, linkage at {:06o}", self.name, self.entries.len(), self.literals.len(), frame_end, base);

        self.out.directive(DIRECTIVE_SIZE, vec![octal(self.counter)]);
        self.out.directive(DIRECTIVE_NAME, vec![self.name.clone()]);
        for (name, line_num) in self.segdefs.iter() {
            match self.symbols.lookup(name) {
                Some(symbol) => self.out.directive(DIRECTIVE_SEGDEF, vec![name.clone(), octal(self.values.get(symbol.value).payload)]),
                None => self.diagnostics.error(AsmError { kind: AsmErrorKind::UndefinedSymbol(name.clone()), line_num: *line_num }),
            }
        }
        self.entries.emit_directives(&mut self.out);
        let scope = Scope::new(&self.symbols, &self.values, self.counter);
        let errors = self.linkage.emit_directives(&scope, &mut self.out);
        self.errors(errors);
    }

    /// Writes the entry transfer vector, the literal pool and the linkage section, checking each against its placement.
    fn postpass(&mut self) {
        self.line_num = 0;
        if let Some(size) = self.text_size {
            if size != self.counter {
                self.error(AsmErrorKind::PhaseError { what: "end of text".into(), pass1: octal(size), pass2: octal(self.counter) });
            }
        }

        let scope = Scope::new(&self.symbols, &self.values, self.counter);
        let (entry_words, errors) = self.entries.resolve_offsets(self.counter, &scope);
        self.errors(errors);
        self.entries.write_section(&mut self.out);
        self.counter += entry_words;

        let errors = self.literals.verify();
        self.errors(errors);
        if let Some(start) = self.literals.pool_start() {
            if start != self.counter {
                self.error(AsmErrorKind::PhaseError { what: "literal pool origin".into(), pass1: octal(start), pass2: octal(self.counter) });
            }
        }
        for correction in self.literals.write_pool(&mut self.out) {
            self.diagnostics.warning(correction);
        }
        self.counter = self.literals.pool_end().unwrap_or(self.counter);

        let scope = Scope::new(&self.symbols, &self.values, self.counter);
        let errors = self.linkage.write_section(self.counter, &scope, &mut self.out);
        self.errors(errors);
        if let Some(base) = self.linkage.base() {
            self.counter = self.counter.max(base + self.linkage.size());
        }
    }

    /// Ends the session, handing back the listing and diagnostics.
    pub fn finish(self) -> Assembly {
        log::info!("{}: {}", self.name, self.diagnostics.summary());
        Assembly {
            name: self.name,
            complete: self.complete,
            output: self.out,
            diagnostics: self.diagnostics,
            symbols: self.symbols,
            values: self.values,
        }
    }
}
