//! Statement handlers: labels, one handler per pseudo-op, and machine instructions.
//!
//! Handlers run in both passes. In pass 1 they only move the location counter and fill the tables;
//! in pass 2 they emit words and compare what they compute against what pass 1 recorded.

use crate::common::*;
use super::{AsmErrorKind, Pass};
use super::caseless::Caseless;
use super::constants::*;
use super::expr::*;
use super::lines::*;
use super::literals::{self, LiteralKind, Operand, VfdField};
use super::output::octal;
use super::session::{AssemblySession, Scope};
use super::temps::SizeClass;

fn expect_count(args: &[&str], counts: &'static [usize]) -> Result<(), AsmErrorKind> {
    match counts.contains(&args.len()) {
        true => Ok(()),
        false => Err(AsmErrorKind::ArgsExpectedCount(counts, args.len())),
    }
}
fn expect_at_least(args: &[&str], n: usize) -> Result<(), AsmErrorKind> {
    match args.len() >= n {
        true => Ok(()),
        false => Err(AsmErrorKind::ArgsExpectedCountAtLeast(n)),
    }
}
fn symbol_name(text: &str) -> Result<&str, AsmErrorKind> {
    match is_valid_symbol_name(text) {
        true => Ok(text),
        false => Err(AsmErrorKind::InvalidSymbolName(text.into())),
    }
}
/// Reads a value as a plain number. Values not known yet (pass 1) read as zero.
fn absolute(value: Value) -> Result<i64, AsmErrorKind> {
    match value.kind {
        ValueKind::Unknown => Ok(0),
        ValueKind::Absolute => Ok(value.signed()),
        k => Err(AsmErrorKind::ValueNotAbsolute(k)),
    }
}
/// The address field, pointer register flag and extra tag bits an operand value encodes as.
/// Values flagged `pr_indirect` go through the linkage pointer (external references) or the stack pointer.
fn encode_value(value: Value) -> (Word, bool, Word) {
    if !value.pr_indirect {
        return (value.payload & HALF_MASK, false, 0);
    }
    match value.kind {
        ValueKind::SegRef | ValueKind::Link => (pr_address(PointerRegister::Lp, value.payload), true, TAG_INDIRECT),
        _ => (pr_address(PointerRegister::Sp, value.payload), true, 0),
    }
}
#[test]
fn test_encode_value() {
    assert_eq!(encode_value(Value::relocatable(0o12)), (0o12, false, 0));
    assert_eq!(encode_value(Value::temporary(0o104)), (0o600104, true, 0));
    assert_eq!(encode_value(Value::segref(2)), (0o400002, true, TAG_INDIRECT));
    // the flag decides, not the kind
    assert_eq!(encode_value(Value { pr_indirect: false, ..Value::temporary(0o104) }), (0o104, false, 0));
}
fn pr_word(mnemonic: &str, pr: PointerRegister, offset: Word, tag: Word) -> Word {
    instruction_word(pr_address(pr, offset), encoding_for(mnemonic), true, tag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VfdMode {
    Decimal,
    Octal,
    Ascii,
}
/// Splits a vfd field `[o|a]width/value`.
fn split_vfd_field(text: &str) -> Result<(VfdMode, u32, &str), AsmErrorKind> {
    let text = text.trim();
    let slash = text.find('/').ok_or_else(|| AsmErrorKind::BadVfdField(format!("'{}' has no width", text)))?;
    let (shape, value) = (&text[..slash], text[slash + 1..].trim());
    let (mode, width) = match shape.as_bytes().first() {
        Some(b'o') | Some(b'O') => (VfdMode::Octal, &shape[1..]),
        Some(b'a') | Some(b'A') => (VfdMode::Ascii, &shape[1..]),
        _ => (VfdMode::Decimal, shape),
    };
    match width.trim().parse::<u32>() {
        Ok(width) => Ok((mode, width, value)),
        Err(_) => Err(AsmErrorKind::BadVfdField(format!("'{}' is not a width", width))),
    }
}
#[test]
fn test_split_vfd_field() {
    assert_eq!(split_vfd_field("18/1").unwrap(), (VfdMode::Decimal, 18, "1"));
    assert_eq!(split_vfd_field(" o18/777 ").unwrap(), (VfdMode::Octal, 18, "777"));
    assert_eq!(split_vfd_field("a9/\"x\"").unwrap(), (VfdMode::Ascii, 9, "\"x\""));
    assert!(matches!(split_vfd_field("18"), Err(AsmErrorKind::BadVfdField(_))));
    assert!(matches!(split_vfd_field("x/1"), Err(AsmErrorKind::BadVfdField(_))));
}

fn integer(text: &str, radix: u32) -> Result<i64, AsmErrorKind> {
    parse_integer(text, radix).ok_or_else(|| AsmErrorKind::IllFormedNumericLiteral(text.trim().into()))
}
/// Whether a number is written in one of the float forms (`1.5`, `2e3`, `3b17`, any of them with a `d` suffix).
fn is_float_form(text: &str) -> bool {
    let text = text.trim();
    text.starts_with(|c: char| c.is_ascii_digit() || c == '.' || c == '-' || c == '+')
        && text.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | 'b' | 'B' | 'd' | 'D' | '+' | '-'))
        && text.contains(|c: char| matches!(c, '.' | 'e' | 'E' | 'b' | 'B' | 'd' | 'D'))
}
/// Parses a number in decimal literal syntax: an integer, or one of the float forms.
fn parse_number(text: &str) -> Result<(LiteralKind, Operand), AsmErrorKind> {
    let text = text.trim();
    let (body, double) = match text.strip_suffix(|c: char| c == 'd' || c == 'D') {
        Some(body) => (body, true),
        None => (text, false),
    };
    if let Some(b) = body.find(|c: char| c == 'b' || c == 'B') {
        let point = integer(&body[b + 1..], 10)?;
        let kind = if double { LiteralKind::ScaledDouble } else { LiteralKind::Scaled };
        return Ok((kind, Operand::List(vec![Operand::Float(body[..b].into()), Operand::Integer(point)])));
    }
    if double || body.contains(|c: char| c == '.' || c == 'e' || c == 'E') {
        let kind = if double { LiteralKind::Double } else { LiteralKind::Single };
        return Ok((kind, Operand::Float(body.into())));
    }
    Ok((LiteralKind::Generic, Operand::Integer(integer(body, 10)?)))
}

/// Reads a value as a literal field. Addresses count as their offset; values not known yet read as zero.
fn field_value(value: Value) -> Result<i64, AsmErrorKind> {
    match value.kind {
        ValueKind::Relocatable => Ok(value.payload as i64),
        _ => absolute(value),
    }
}

/// Evaluates one field of a literal in the given radix.
pub(super) type FieldEval<'a> = dyn FnMut(&str, u32) -> Result<i64, AsmErrorKind> + 'a;

/// Parses the text of a literal (after the `=`). Pointer offsets and vfd values go through `eval`.
pub(super) fn parse_literal(text: &str, eval: &mut FieldEval<'_>) -> Result<(LiteralKind, Operand), AsmErrorKind> {
    let text = text.trim();
    if let Some(args) = split_call(text, "its") {
        let args = split_operands(args);
        expect_count(&args, &[2])?;
        let (segment, offset) = (eval(args[0], 8)?, eval(args[1], 8)?);
        return Ok((LiteralKind::Its, Operand::List(vec![Operand::Integer(TAG_ITS as i64), Operand::Integer(segment), Operand::Integer(offset)])));
    }
    if let Some(args) = split_call(text, "itp") {
        let args = split_operands(args);
        expect_count(&args, &[2])?;
        let pr = pointer_register_for(args[0]).ok_or_else(|| AsmErrorKind::UnknownPointerRegister(args[0].into()))?;
        let offset = eval(args[1], 8)?;
        return Ok((LiteralKind::Its, Operand::List(vec![Operand::Integer(TAG_ITP as i64), Operand::Integer(pr as i64), Operand::Integer(offset)])));
    }

    let mut chars = text.chars();
    match chars.next() {
        Some('a') | Some('A') => {
            let (s, rest) = extract_string(chars.as_str())?;
            match rest.trim() {
                "" => Ok((LiteralKind::String, Operand::String(s))),
                rest => Err(AsmErrorKind::ExtraContentAfterArgs(rest.into())),
            }
        }
        Some('o') | Some('O') => Ok((LiteralKind::Generic, Operand::Integer(integer(chars.as_str(), 8)?))),
        Some('v') | Some('V') => {
            let mut fields = vec![];
            for field in split_operands(chars.as_str()) {
                let (mode, width, value) = split_vfd_field(field)?;
                let value = match mode {
                    VfdMode::Decimal => Operand::Integer(eval(value, 10)?),
                    VfdMode::Octal => Operand::Integer(eval(value, 8)?),
                    VfdMode::Ascii => Operand::String(extract_string(value)?.0),
                };
                fields.push(Operand::List(vec![Operand::Integer(width as i64), value]));
            }
            Ok((LiteralKind::Vfd, Operand::List(fields)))
        }
        _ => parse_number(text),
    }
}
#[cfg(test)]
fn parse_constant_literal(text: &str) -> Result<(LiteralKind, Operand), AsmErrorKind> {
    parse_literal(text, &mut integer)
}
#[test]
fn test_parse_literal() {
    use Operand::*;
    assert_eq!(parse_constant_literal("5").unwrap(), (LiteralKind::Generic, Integer(5)));
    assert_eq!(parse_constant_literal("-12").unwrap(), (LiteralKind::Generic, Integer(-12)));
    assert_eq!(parse_constant_literal("o777").unwrap(), (LiteralKind::Generic, Integer(0o777)));
    assert_eq!(parse_constant_literal("1.5").unwrap(), (LiteralKind::Single, Float("1.5".into())));
    assert_eq!(parse_constant_literal("1.5d").unwrap(), (LiteralKind::Double, Float("1.5".into())));
    assert_eq!(parse_constant_literal("3b17").unwrap(), (LiteralKind::Scaled, List(vec![Float("3".into()), Integer(17)])));
    assert_eq!(parse_constant_literal("3b35d").unwrap(), (LiteralKind::ScaledDouble, List(vec![Float("3".into()), Integer(35)])));
    assert_eq!(parse_constant_literal("a\"text\"").unwrap(), (LiteralKind::String, String("text".into())));
    assert_eq!(parse_constant_literal("v18/1,o18/777").unwrap(), (LiteralKind::Vfd, List(vec![
        List(vec![Integer(18), Integer(1)]),
        List(vec![Integer(18), Integer(0o777)]),
    ])));
    assert_eq!(parse_constant_literal("its(12,100)").unwrap(), (LiteralKind::Its, List(vec![Integer(TAG_ITS as i64), Integer(0o12), Integer(0o100)])));
    assert_eq!(parse_constant_literal("itp(sp,20)").unwrap(), (LiteralKind::Its, List(vec![Integer(TAG_ITP as i64), Integer(6), Integer(0o20)])));

    assert!(matches!(parse_constant_literal("a\"x\" y"), Err(AsmErrorKind::ExtraContentAfterArgs(_))));
    assert!(matches!(parse_constant_literal("its(1)"), Err(AsmErrorKind::ArgsExpectedCount(_, 1))));
    assert!(matches!(parse_constant_literal("12x"), Err(AsmErrorKind::IllFormedNumericLiteral(_))));
}
#[test]
fn test_float_forms() {
    assert!(is_float_form("1.5"));
    assert!(is_float_form("2e3"));
    assert!(is_float_form("3b17"));
    assert!(is_float_form("-0.5d"));
    assert!(!is_float_form("12"));
    assert!(!is_float_form("beta"));
    assert!(!is_float_form("x+1"));
    assert!(!is_float_form("2*b"));
}

impl AssemblySession {
    /// Processes one line. Returns false once the assembly should stop reading (`end`).
    pub(super) fn process_line(&mut self, line: &SourceLine) -> bool {
        self.line_num = line.line_num;
        self.line_start = self.counter;
        self.literal_seq = 0;

        let op = line.mnemonic.as_deref().map(|m| (m, PSEUDO_OPS.get(&Caseless(m)).copied()));
        if let Some(label) = &line.label {
            match op {
                Some((_, Some(PseudoOp::Equ))) | Some((_, Some(PseudoOp::Bool))) => (),
                _ => self.define_label(label),
            }
        }

        let res = match op {
            None => Ok(()),
            Some((_, Some(PseudoOp::End))) => return false,
            Some((_, Some(op))) => self.process_pseudo(op, line),
            Some((mnemonic, None)) => self.process_instruction(mnemonic, line),
        };
        if let Err(kind) = res {
            self.error(kind);
        }
        true
    }

    fn define_label(&mut self, name: &str) {
        if !is_valid_symbol_name(name) {
            self.error(AsmErrorKind::InvalidSymbolName(name.into()));
            return;
        }
        match self.pass {
            Pass::One => {
                let id = self.values.alloc(Value::relocatable(self.counter));
                if let Err(e) = self.symbols.define(name, id, self.line_num) {
                    self.error(e);
                }
            }
            Pass::Two => {
                let value = match self.symbols.lookup(name) {
                    Some(symbol) if symbol.line_num == self.line_num => *self.values.get(symbol.value),
                    _ => return,
                };
                if value.kind == ValueKind::Relocatable && value.payload != self.counter {
                    self.error(AsmErrorKind::PhaseError { what: format!("address of label {}", name), pass1: octal(value.payload), pass2: octal(self.counter) });
                }
            }
        }
    }

    /// Fails if `words` more words would run past the end of the segment.
    pub(super) fn reserve(&self, words: Word) -> Result<(), AsmErrorKind> {
        let end = self.counter.saturating_add(words);
        match end <= MAX_SEGMENT_WORDS {
            true => Ok(()),
            false => Err(AsmErrorKind::CapacityExceeded { what: "segment", limit: MAX_SEGMENT_WORDS as usize, requested: end as usize }),
        }
    }
    /// Emits `words` at the location counter and advances past them.
    /// Words only reach the output in pass 2; the first one is annotated with `text`.
    pub(super) fn emit(&mut self, words: &[Word], text: &str) -> Result<(), AsmErrorKind> {
        self.reserve(words.len() as Word)?;
        if self.pass == Pass::Two {
            let mut first = None;
            for (i, &w) in words.iter().enumerate() {
                let index = self.out.word(self.counter + i as Word, w & WORD_MASK);
                first.get_or_insert(index);
            }
            if let Some(first) = first {
                self.out.annotate(first, text);
            }
        }
        self.counter += words.len() as Word;
        Ok(())
    }
    /// Moves the location counter to an even address with a `nop`.
    fn pad_even(&mut self, warn: bool) -> Result<(), AsmErrorKind> {
        if self.counter % 2 == 0 { return Ok(()); }
        if warn {
            self.warning(AsmErrorKind::AlignmentCorrection { address: self.counter });
        }
        self.emit(&[NOP_WORD], "even")
    }

    /// Evaluates an expression. In pass 1 an undefined symbol just means the value is not known yet;
    /// in pass 2 it is reported and the value reads as zero so the statement still takes its space.
    fn eval(&mut self, text: &str, radix: u32) -> Result<Value, AsmErrorKind> {
        let expr = parse_expr(text, radix)?;
        let scope = Scope::new(&self.symbols, &self.values, self.line_start);
        match expr.eval(&scope) {
            Ok(v) => Ok(v),
            Err(EvalError::Illegal(reason)) => Err(reason.into()),
            Err(EvalError::UndefinedSymbol(name)) => {
                if self.pass == Pass::Two {
                    self.error(AsmErrorKind::UndefinedSymbol(name));
                }
                Ok(Value::unknown())
            }
        }
    }
    /// Evaluates an expression that must be fully known in pass 1.
    fn eval_defined(&mut self, text: &str, radix: u32) -> Result<Value, AsmErrorKind> {
        let expr = parse_expr(text, radix)?;
        let scope = Scope::new(&self.symbols, &self.values, self.line_start);
        match expr.eval(&scope) {
            Ok(v) if v.is_known() => Ok(v),
            Ok(_) => Err(AsmErrorKind::ForwardReference(text.trim().into())),
            Err(EvalError::UndefinedSymbol(name)) => Err(AsmErrorKind::ForwardReference(name)),
            Err(EvalError::Illegal(reason)) => Err(reason.into()),
        }
    }
    fn eval_count(&mut self, text: &str) -> Result<Word, AsmErrorKind> {
        let v = absolute(self.eval_defined(text, 10)?)?;
        match v >= 0 {
            true => Ok(v as Word),
            false => Err(AsmErrorKind::NegativeCount(v)),
        }
    }

    fn external(&mut self, text: &str) -> Result<Value, AsmErrorKind> {
        let bad = || AsmErrorKind::BadExternalReference(text.trim().into());
        let (segment, symbol, offset) = split_external(text).ok_or_else(bad)?;
        if !is_valid_symbol_name(segment) || !is_valid_symbol_name(symbol) { return Err(bad()); }
        let offset = match offset {
            Some(offset) => Some(parse_expr(offset, 10)?),
            None => None,
        };
        self.linkage.resolve_external(&mut self.values, segment, symbol, offset, self.line_num)
    }
    fn literal(&mut self, text: &str) -> Result<Value, AsmErrorKind> {
        let (kind, operand) = parse_literal(text, &mut |field, radix| field_value(self.eval(field, radix)?))?;
        let key = (self.line_start, self.literal_seq);
        self.literal_seq += 1;
        let handle = self.literals.add(key, kind, &operand, self.pass, self.line_num, text.trim())?;
        Ok(match self.literals.address(handle) {
            Some(address) => Value::relocatable(address),
            None => Value::unknown(),
        })
    }
    /// Works out the address field of an instruction operand: `=literal`, `pr|offset`, `segment$symbol[+offset]` or an expression.
    fn operand_address(&mut self, text: &str) -> Result<(Word, bool, Word), AsmErrorKind> {
        if let Some(literal) = text.strip_prefix(LITERAL_CHAR) {
            return Ok(encode_value(self.literal(literal)?));
        }
        if let Some(bar) = text.find(PR_SEPARATOR) {
            let name = text[..bar].trim();
            let pr = pointer_register_for(name).ok_or_else(|| AsmErrorKind::UnknownPointerRegister(name.into()))?;
            let offset = self.eval(&text[bar + 1..], 10)?;
            return Ok((pr_address(pr, offset.payload), true, 0));
        }
        if text.contains(EXTERNAL_CHAR as char) {
            return Ok(encode_value(self.external(text)?));
        }
        Ok(encode_value(self.eval(text, 10)?))
    }

    fn process_instruction(&mut self, mnemonic: &str, line: &SourceLine) -> Result<(), AsmErrorKind> {
        if !is_instruction(mnemonic) {
            return Err(AsmErrorKind::UnrecognizedInstruction(mnemonic.into()));
        }
        let mut args: Vec<String> = split_operands(&line.operands).into_iter().map(String::from).collect();
        // the fields of a vfd literal are comma separated too
        if args.first().and_then(|a| a.get(..2)).map_or(false, |p| p.eq_ignore_ascii_case("=v")) {
            while args.len() > 1 && args[1].contains('/') {
                let field = args.remove(1);
                args[0].push(',');
                args[0].push_str(&field);
            }
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        expect_count(&args, &[0, 1, 2])?;

        let tag = match args.get(1) {
            Some(t) => tag_for(t).ok_or_else(|| AsmErrorKind::UnknownTag((*t).into()))?,
            None => 0,
        };
        let (address, pr, extra_tag) = match args.first() {
            Some(a) if !a.is_empty() => self.operand_address(a)?,
            _ => (0, false, 0),
        };
        let word = instruction_word(address, encoding_for(mnemonic), pr, tag | extra_tag);
        self.emit(&[word], line.text.trim())?;
        Ok(())
    }

    fn process_pseudo(&mut self, op: PseudoOp, line: &SourceLine) -> Result<(), AsmErrorKind> {
        let text = line.text.trim();
        let args = split_operands(&line.operands);
        match op {
            PseudoOp::Name => {
                expect_count(&args, &[1])?;
                let name = symbol_name(args[0])?;
                self.name = name.into();
            }
            PseudoOp::Segdef => {
                expect_at_least(&args, 1)?;
                for &arg in args.iter() {
                    let name = symbol_name(arg)?;
                    if self.pass == Pass::One {
                        self.segdefs.push((name.into(), self.line_num));
                    }
                }
            }
            PseudoOp::Segref => {
                expect_at_least(&args, 2)?;
                let segment = symbol_name(args[0])?;
                for &name in &args[1..] {
                    symbol_name(name)?;
                }
                if self.pass == Pass::One {
                    let errors = self.linkage.declare_segref(&mut self.symbols, &mut self.values, segment, &args[1..], self.line_num);
                    for e in errors {
                        self.error(e);
                    }
                }
            }
            PseudoOp::Link => {
                expect_count(&args, &[2])?;
                let local = symbol_name(args[0])?;
                let bad = || AsmErrorKind::BadExternalReference(args[1].into());
                let (segment, symbol, offset) = split_external(args[1]).ok_or_else(bad)?;
                if !is_valid_symbol_name(segment) || !is_valid_symbol_name(symbol) { return Err(bad()); }
                let offset = match offset {
                    Some(offset) => Some(parse_expr(offset, 10)?),
                    None => None,
                };
                if self.pass == Pass::One {
                    self.linkage.declare_link(&mut self.symbols, &mut self.values, local, segment, symbol, offset, self.line_num)?;
                }
            }
            PseudoOp::Entry => {
                expect_at_least(&args, 1)?;
                for &arg in args.iter() {
                    let name = symbol_name(arg)?;
                    if self.pass == Pass::One {
                        if let Err(e) = self.entries.declare(name, self.line_num) {
                            self.error(e);
                        }
                    }
                }
            }
            PseudoOp::Equ | PseudoOp::Bool => {
                let label = line.label.as_deref().ok_or(AsmErrorKind::LabelRequired(if op == PseudoOp::Equ { "equ" } else { "bool" }))?;
                let name = symbol_name(label)?;
                expect_count(&args, &[1])?;
                let value = self.eval_defined(args[0], if op == PseudoOp::Bool { 8 } else { 10 })?;
                match self.pass {
                    Pass::One => {
                        let id = self.values.alloc(value);
                        self.symbols.define(name, id, self.line_num)?;
                    }
                    Pass::Two => {
                        let prev = match self.symbols.lookup(name) {
                            Some(symbol) if symbol.line_num == self.line_num => *self.values.get(symbol.value),
                            _ => return Ok(()),
                        };
                        if prev != value {
                            return Err(AsmErrorKind::PhaseError { what: format!("value of {}", name), pass1: prev.to_string(), pass2: value.to_string() });
                        }
                    }
                }
            }
            PseudoOp::Bss => {
                expect_count(&args, &[1])?;
                let count = self.eval_count(args[0])?;
                self.reserve(count)?;
                match self.pass {
                    Pass::One => self.counter += count,
                    Pass::Two => self.emit(&vec![0; count as usize], text)?,
                }
            }
            PseudoOp::Dec | PseudoOp::Oct => {
                expect_at_least(&args, 1)?;
                let mut words = Vec::with_capacity(args.len());
                for &arg in args.iter() {
                    if op == PseudoOp::Dec && is_float_form(arg) {
                        let (kind, operand) = parse_number(arg)?;
                        words.extend(literals::build_words(kind, &operand)?);
                        continue;
                    }
                    let value = self.eval(arg, if op == PseudoOp::Oct { 8 } else { 10 })?;
                    words.push(value.payload);
                }
                self.emit(&words, text)?;
            }
            PseudoOp::Aci => {
                let (s, rest) = extract_string(&line.operands)?;
                match rest.trim() {
                    "" => (),
                    rest => return Err(AsmErrorKind::ExtraContentAfterArgs(rest.into())),
                }
                let words = literals::pack_ascii(&s);
                if words.len() > MAX_LITERAL_WORDS {
                    return Err(AsmErrorKind::CapacityExceeded { what: "aci string", limit: MAX_LITERAL_WORDS, requested: words.len() });
                }
                self.emit(&words, text)?;
            }
            PseudoOp::Vfd => {
                expect_at_least(&args, 1)?;
                let mut fields = Vec::with_capacity(args.len());
                for &arg in args.iter() {
                    let (mode, width, value) = split_vfd_field(arg)?;
                    fields.push(match mode {
                        VfdMode::Ascii => VfdField::Chars(width, extract_string(value)?.0),
                        VfdMode::Decimal => VfdField::Bits(width, absolute(self.eval(value, 10)?)?),
                        VfdMode::Octal => VfdField::Bits(width, absolute(self.eval(value, 8)?)?),
                    });
                }
                let words = literals::pack_vfd(&fields)?;
                self.emit(&words, text)?;
            }
            PseudoOp::Its | PseudoOp::Itp => {
                expect_count(&args, &[2, 3])?;
                let tag = match args.get(2) {
                    Some(t) => tag_for(t).ok_or_else(|| AsmErrorKind::UnknownTag((*t).into()))?,
                    None => 0,
                };
                let (modifier, first) = match op {
                    PseudoOp::Its => (TAG_ITS, to_word(absolute(self.eval(args[0], 8)?)?)),
                    _ => {
                        let pr = pointer_register_for(args[0]).ok_or_else(|| AsmErrorKind::UnknownPointerRegister(args[0].into()))?;
                        (TAG_ITP, pr as Word)
                    }
                };
                let offset = self.eval(args[1], 10)?.payload;
                self.pad_even(true)?;
                self.emit(&literals::pointer_pair(modifier, first, offset, tag), text)?;
            }
            PseudoOp::Even => {
                expect_count(&args, &[0])?;
                self.pad_even(false)?;
            }
            PseudoOp::Temp(words) => {
                expect_at_least(&args, 1)?;
                let class = SizeClass::from_words(words)?;
                for &arg in args.iter() {
                    let (name, count) = match arg.find('(') {
                        Some(p) => {
                            let count = arg[p + 1..].strip_suffix(')').ok_or(AsmErrorKind::MissingCloseParen)?;
                            (arg[..p].trim(), self.eval_count(count)?)
                        }
                        None => (arg, 1),
                    };
                    let name = symbol_name(name)?;
                    if self.pass == Pass::One {
                        self.declare_temporary(name, class, count);
                    }
                }
            }
            PseudoOp::Push => {
                expect_count(&args, &[0, 1])?;
                let frame = match args.first() {
                    Some(size) => round_up(self.eval_count(size)?, FRAME_ALIGN),
                    None => self.temps.frame_size(STACK_TEMP_BASE),
                };
                let words = [
                    instruction_word(frame, encoding_for("eax7"), false, 0),
                    pr_word("tsp2", PointerRegister::Ap, PUSH_OPERATOR_OFFSET, 0),
                ];
                self.emit(&words, text)?;
            }
            PseudoOp::Save => {
                let label = line.label.as_deref().ok_or(AsmErrorKind::LabelRequired("save"))?;
                if args.len() > MAX_SAVE_REGISTERS {
                    return Err(AsmErrorKind::CapacityExceeded { what: "save register list", limit: MAX_SAVE_REGISTERS, requested: args.len() });
                }
                let mut registers = Vec::with_capacity(args.len());
                for &arg in args.iter() {
                    registers.push(index_register_for(arg).ok_or_else(|| AsmErrorKind::BadIndexRegister(arg.into()))?);
                }

                let frame = self.temps.frame_size(STACK_TEMP_BASE);
                let mut words = vec![
                    instruction_word(frame, encoding_for("eax7"), false, 0),
                    pr_word("tsp2", PointerRegister::Ap, PUSH_OPERATOR_OFFSET, 0),
                    pr_word("spri4", PointerRegister::Sp, LP_SAVE_OFFSET, 0),
                    pr_word("sti", PointerRegister::Sp, IND_SAVE_OFFSET, 0),
                    pr_word("spri2", PointerRegister::Sp, RETURN_PTR_OFFSET, 0),
                ];
                for &x in registers.iter() {
                    words.push(pr_word(&format!("stx{}", x), PointerRegister::Sp, REG_SAVE_OFFSET + x as Word, 0));
                }
                self.emit(&words, text)?;

                if self.pass == Pass::One {
                    self.saves.entry(label.into()).or_insert(registers);
                }
            }
            PseudoOp::Return => {
                expect_count(&args, &[1])?;
                let label = args[0];
                let registers = match (self.symbols.lookup(label), self.saves.get(label)) {
                    (Some(_), Some(registers)) => registers.clone(),
                    // the counter is not moved, so everything after this line shifts if the save shows up later
                    _ => return match self.pass {
                        Pass::One => Ok(()),
                        Pass::Two => Err(AsmErrorKind::ReturnWithoutSave(label.into())),
                    },
                };
                let mut words = Vec::with_capacity(registers.len() + 1);
                for &x in registers.iter() {
                    words.push(pr_word(&format!("ldx{}", x), PointerRegister::Sp, REG_SAVE_OFFSET + x as Word, 0));
                }
                words.push(pr_word("rtcd", PointerRegister::Sp, RETURN_PTR_OFFSET, 0));
                self.emit(&words, text)?;
            }
            PseudoOp::End => (),
        }
        Ok(())
    }

    fn declare_temporary(&mut self, name: &str, class: SizeClass, count: Word) {
        let value = self.values.alloc(Value::temporary(0));
        if let Err(e) = self.symbols.define(name, value, self.line_num) {
            self.error(e);
            return;
        }
        match self.temps.declare(name, class, count, value, self.line_num) {
            Ok(id) => self.symbols.attach_temporary(name, id),
            Err(e) => self.error(e),
        }
    }
}
