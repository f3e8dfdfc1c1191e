//! Everything pertaining to assembling source text into a listing of 36-bit words and loader directives.
//!
//! Assembly is done in two passes over the same lines (see `AssemblySession`).
//! Pass 1 sizes everything and builds the tables, the tables are placed between the passes,
//! and pass 2 emits the words, checking along the way that it computes the same addresses pass 1 did.

use std::fmt;
use std::io::{self, BufRead, Write};

pub mod caseless;
pub mod expr;
pub mod symbols;
pub mod literals;
pub mod linkage;
pub mod entries;
pub mod temps;
pub mod output;
mod constants;
mod lines;
mod statements;
mod session;

use expr::*;
use symbols::SymbolTable;
use output::OutputStream;
use crate::common::Word;
use crate::common::util::Punctuated;

pub use constants::{encoding_for, opcode_number_for, MAX_LITERAL_WORDS, MAX_SAVE_REGISTERS, MAX_SEGMENT_WORDS, STACK_TEMP_BASE};
pub use lines::{read_source, SourceLine};
pub use session::AssemblySession;

/// The two scans over the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    One,
    Two,
}

/// The kinds of errors that can occur during assembly.
/// These are meant to be specific enough to have customized, detailed error messages.
#[derive(Debug)]
pub enum AsmErrorKind {
    /// A read error occurred, which causes assembly to halt prematurely.
    ReadError(io::Error),

    // --------------------------------------------------------------------------

    DuplicateSymbol { name: String, prev_line_num: usize },
    UndefinedSymbol(String),
    /// A symbol used where its value must already be known in pass 1.
    ForwardReference(String),
    InvalidSymbolName(String),
    /// A value computed differently in pass 2 than in pass 1.
    PhaseError { what: String, pass1: String, pass2: String },
    /// A table or field grew past a fixed limit.
    CapacityExceeded { what: &'static str, limit: usize, requested: usize },
    /// Padding was inserted to move a pair of words to an even address. Only ever a warning.
    AlignmentCorrection { address: Word },

    // --------------------------------------------------------------------------

    UnrecognizedInstruction(String),
    /// This pseudo-op needs a label.
    LabelRequired(&'static str),
    /// Incorrect number of arguments supplied. Expected one of these counts.
    ArgsExpectedCount(&'static [usize], usize),
    ArgsExpectedCountAtLeast(usize),
    ExtraContentAfterArgs(String),

    ExpectedExprTerm,
    MissingCloseParen,
    ExtraContentAfterExpr(String),
    IllFormedNumericLiteral(String),
    IllegalExpr(IllegalReason),
    ValueNotAbsolute(ValueKind),
    NegativeCount(i64),

    ExpectedString,
    IncompleteString,
    InvalidEscape(char),

    UnknownTag(String),
    UnknownPointerRegister(String),
    BadIndexRegister(String),
    BadExternalReference(String),

    BadLiteral(String),
    BadVfdField(String),
    FloatOutOfRange(String),
    BadSizeClass { got: u8, expected: String },

    EntryNotFound(String),
    EntryNotRelocatable { name: String, kind: ValueKind },
    /// `return` names something that is not the label of a `save`.
    ReturnWithoutSave(String),
}
impl From<IllegalReason> for AsmErrorKind {
    fn from(reason: IllegalReason) -> Self {
        AsmErrorKind::IllegalExpr(reason)
    }
}
impl fmt::Display for AsmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use AsmErrorKind::*;
        match self {
            ReadError(e) => write!(f, "failed to read source: {}", e),

            DuplicateSymbol { name, prev_line_num } => write!(f, "symbol '{}' was already defined on line {}", name, prev_line_num),
            UndefinedSymbol(name) => write!(f, "undefined symbol '{}'", name),
            ForwardReference(name) => write!(f, "'{}' must be defined before it is used here", name),
            InvalidSymbolName(name) => write!(f, "'{}' is not a valid symbol name", name),
            PhaseError { what, pass1, pass2 } => write!(f, "phase error: {} was {} in pass 1 but {} in pass 2", what, pass1, pass2),
            CapacityExceeded { what, limit, requested } => write!(f, "{} needs {} but the limit is {}", what, requested, limit),
            AlignmentCorrection { address } => write!(f, "inserted a nop at {:06o} to reach an even address", address),

            UnrecognizedInstruction(name) => write!(f, "unrecognized instruction '{}'", name),
            LabelRequired(op) => write!(f, "{} requires a label", op),
            ArgsExpectedCount(expected, got) => write!(f, "expected {} operands but got {}", Punctuated::or(expected), got),
            ArgsExpectedCountAtLeast(n) => write!(f, "expected at least {} operands", n),
            ExtraContentAfterArgs(rest) => write!(f, "unexpected '{}' after operands", rest),

            ExpectedExprTerm => write!(f, "expected an expression term"),
            MissingCloseParen => write!(f, "missing close parenthesis"),
            ExtraContentAfterExpr(rest) => write!(f, "unexpected '{}' after expression", rest),
            IllFormedNumericLiteral(text) => write!(f, "ill-formed number '{}'", text),
            IllegalExpr(reason) => write!(f, "illegal expression: {}", reason),
            ValueNotAbsolute(kind) => write!(f, "expected an absolute value but got a {:?} value", kind),
            NegativeCount(v) => write!(f, "count {} is negative", v),

            ExpectedString => write!(f, "expected a quoted string"),
            IncompleteString => write!(f, "string is missing its closing quote"),
            InvalidEscape(c) => write!(f, "invalid escape '\\{}'", c),

            UnknownTag(tag) => write!(f, "unknown modifier tag '{}'", tag),
            UnknownPointerRegister(pr) => write!(f, "unknown pointer register '{}'", pr),
            BadIndexRegister(x) => write!(f, "'{}' is not an index register", x),
            BadExternalReference(text) => write!(f, "ill-formed external reference '{}'", text),

            BadLiteral(why) => write!(f, "bad literal: {}", why),
            BadVfdField(why) => write!(f, "bad vfd field: {}", why),
            FloatOutOfRange(text) => write!(f, "{} is out of range for the float format", text),
            BadSizeClass { got, expected } => write!(f, "size class {} is not {}", got, expected),

            EntryNotFound(name) => write!(f, "entry '{}' is not defined", name),
            EntryNotRelocatable { name, kind } => write!(f, "entry '{}' must be a code address but is a {:?} value", name, kind),
            ReturnWithoutSave(name) => write!(f, "'{}' is not the label of a save", name),
        }
    }
}

#[derive(Debug)]
pub struct AsmError {
    /// The type of error that was encountered.
    pub kind: AsmErrorKind,
    /// Line number of the error (zero for the sections placed after the text).
    pub line_num: usize,
}
impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.line_num {
            0 => write!(f, "{}", self.kind),
            n => write!(f, "line {}: {}", n, self.kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}
#[derive(Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub error: AsmError,
}

/// Every diagnostic of an assembly, in the order they were raised. Each one is logged as it is recorded.
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}
impl Diagnostics {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn error(&mut self, error: AsmError) {
        log::error!("{}", error);
        self.records.push(Diagnostic { severity: Severity::Error, error });
    }
    pub fn warning(&mut self, error: AsmError) {
        log::warn!("{}", error);
        self.records.push(Diagnostic { severity: Severity::Warning, error });
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }
    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|d| d.severity == Severity::Error).count()
    }
    pub fn warning_count(&self) -> usize {
        self.records.iter().filter(|d| d.severity == Severity::Warning).count()
    }
    /// The closing tally, e.g. `1 error(s), 0 warning(s)`.
    pub fn summary(&self) -> String {
        format!("{} error(s), {} warning(s)", self.error_count(), self.warning_count())
    }
}

/// The result of an assembly: the listing plus everything that was diagnosed while producing it.
///
/// A listing is produced whenever pass 1 was clean, even if pass 2 found problems.
/// If pass 1 had errors, the listing is empty.
#[derive(Debug)]
pub struct Assembly {
    /// The segment name (`!NAME`).
    pub name: String,
    /// Whether pass 2 ran.
    pub complete: bool,
    output: OutputStream,
    diagnostics: Diagnostics,
    symbols: SymbolTable,
    values: ValueArena,
}
impl Assembly {
    pub fn output(&self) -> &OutputStream {
        &self.output
    }
    /// The listing, one line per directive or word, in the order they are written out.
    pub fn lines(&self) -> Vec<String> {
        self.output.lines()
    }
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }
    pub fn warning_count(&self) -> usize {
        self.diagnostics.warning_count()
    }
    pub fn summary(&self) -> String {
        self.diagnostics.summary()
    }
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }
    /// Gets the final value of a symbol.
    pub fn value_of(&self, name: &str) -> Option<Value> {
        self.symbols.lookup(name).map(|s| *self.values.get(s.value))
    }
    pub fn dump_symbols<W: Write>(&self, f: &mut W, sorted: bool) -> io::Result<()> {
        self.symbols.dump(&self.values, f, sorted)
    }
    /// Writes the listing to `f`.
    pub fn drain<W: Write>(self, f: &mut W) -> io::Result<()> {
        self.output.drain(f)
    }
}

/// Assembles `asm` into a listing.
/// It is not required that `asm` be an actual file - it can just be in memory.
/// `asm_name` is the effective name of the source file; its stem is the default segment name (see the `name` pseudo-op).
///
/// Only failing to read the source is an `Err`. Everything else is reported through `Assembly::diagnostics`.
pub fn assemble(asm_name: &str, asm: &mut dyn BufRead) -> Result<Assembly, AsmError> {
    let lines = read_source(asm)?;
    let mut session = AssemblySession::new(asm_name);
    session.run(&lines);
    Ok(session.finish())
}
