//! Literals: constants written in place of an operand (`=5`, `=1.5d`, `=a"text"` ...) and the pool they are collected into.
//!
//! A literal is identified by where it was written: the address of its line and its position among the literals of that line.
//! Pass 1 creates literals, pass 2 finds the same ones again, and the words recorded in pass 1 are what ends up in the pool.

use std::collections::HashMap;
use std::fmt;

use crate::common::*;
use crate::common::float36::{self, FloatRangeError};
use super::{AsmError, AsmErrorKind, Pass};
use super::constants::{MAX_LITERAL_WORDS, NOP_WORD};
use super::output::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    /// A single word integer.
    Generic,
    Single,
    Double,
    Scaled,
    ScaledDouble,
    String,
    /// An ITS or ITP pointer pair.
    Its,
    Vfd,
}
impl LiteralKind {
    fn prefix(self) -> &'static str {
        match self {
            LiteralKind::Generic => "L",
            LiteralKind::Single => "F",
            LiteralKind::Double => "D",
            LiteralKind::Scaled => "S",
            LiteralKind::ScaledDouble => "SD",
            LiteralKind::String => "A",
            LiteralKind::Its => "P",
            LiteralKind::Vfd => "V",
        }
    }
    /// Double word quantities must start on an even address.
    pub fn even_aligned(self) -> bool {
        matches!(self, LiteralKind::Double | LiteralKind::ScaledDouble | LiteralKind::Its)
    }
}

/// The payload a literal is built from.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Integer(i64),
    /// Decimal text of a floating point value.
    Float(String),
    String(String),
    List(Vec<Operand>),
}
impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Integer(v) => write!(f, "{}", v),
            Operand::Float(v) => f.write_str(v),
            Operand::String(v) => write!(f, "\"{}\"", v),
            Operand::List(items) => {
                f.write_str("(")?;
                for (i, x) in items.iter().enumerate() {
                    if i != 0 { f.write_str(",")?; }
                    write!(f, "{}", x)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Packs text four 9-bit characters to a word, padding the last word with blanks.
pub fn pack_ascii(text: &str) -> Vec<Word> {
    let chars: Vec<Word> = text.chars().map(|c| c as Word & 0o777).collect();
    chars.chunks(4).map(|chunk| {
        (0..4).fold(0, |w, i| (w << 9) | chunk.get(i).copied().unwrap_or(b' ' as Word))
    }).collect()
}
/// Builds a pointer pair. `modifier` is `TAG_ITS` (first is a segment number) or `TAG_ITP` (first is a pointer register number).
pub fn pointer_pair(modifier: Word, first: Word, offset: Word, tag: Word) -> [Word; 2] {
    let word0 = match modifier {
        TAG_ITP => ((first & 0o7) << 33) | TAG_ITP,
        _ => ((first & PR_OFFSET_MASK) << 18) | TAG_ITS,
    };
    [word0, ((offset & HALF_MASK) << 18) | (tag & 0o77)]
}

/// One field of a VFD: its width in bits and its contents.
#[derive(Debug, Clone, PartialEq)]
pub enum VfdField {
    Bits(u32, i64),
    /// Characters, left justified and blank filled.
    Chars(u32, String),
}
/// Packs VFD fields left to right into as many words as they need.
pub fn pack_vfd(fields: &[VfdField]) -> Result<Vec<Word>, AsmErrorKind> {
    let total: u64 = fields.iter().map(|f| match f { VfdField::Bits(w, _) | VfdField::Chars(w, _) => *w as u64 }).sum();
    let needed = ((total + WORD_BITS as u64 - 1) / WORD_BITS as u64) as usize;
    if needed > MAX_LITERAL_WORDS {
        return Err(AsmErrorKind::CapacityExceeded { what: "vfd", limit: MAX_LITERAL_WORDS, requested: needed });
    }
    if total == 0 { return Err(AsmErrorKind::BadVfdField("no fields".into())); }

    fn push_bits(words: &mut Vec<Word>, cursor: &mut u64, value: Word, width: u32) {
        for i in (0..width).rev() {
            let (word, bit) = ((*cursor / WORD_BITS as u64) as usize, *cursor % WORD_BITS as u64);
            if word == words.len() { words.push(0); }
            words[word] |= ((value >> i) & 1) << (WORD_BITS as u64 - 1 - bit);
            *cursor += 1;
        }
    }

    let mut words = Vec::with_capacity(needed);
    let mut cursor = 0;
    for field in fields {
        match field {
            VfdField::Bits(width, value) => {
                if *width == 0 || *width > WORD_BITS { return Err(AsmErrorKind::BadVfdField(format!("width {} is not 1-36", width))); }
                push_bits(&mut words, &mut cursor, *value as u64, *width);
            }
            VfdField::Chars(width, text) => {
                let mut chars = text.chars().map(|c| c as Word & 0o777);
                let mut left = *width;
                while left > 0 {
                    let n = left.min(9);
                    let c = chars.next().unwrap_or(b' ' as Word);
                    push_bits(&mut words, &mut cursor, c >> (9 - n), n);
                    left -= n;
                }
            }
        }
    }
    Ok(words)
}

fn float_arg(text: &str) -> Result<rug::Float, AsmErrorKind> {
    float36::parse(text).ok_or_else(|| AsmErrorKind::BadLiteral(format!("'{}' is not a number", text)))
}
fn out_of_range(text: &str) -> impl FnOnce(FloatRangeError) -> AsmErrorKind + '_ {
    move |_| AsmErrorKind::FloatOutOfRange(text.into())
}
fn point_arg(v: i64) -> Result<u32, AsmErrorKind> {
    match v {
        0..=71 => Ok(v as u32),
        _ => Err(AsmErrorKind::BadLiteral(format!("binary point {} is out of range", v))),
    }
}

/// Builds the words of a literal of the given kind.
pub fn build_words(kind: LiteralKind, operand: &Operand) -> Result<Vec<Word>, AsmErrorKind> {
    use Operand::*;
    let mismatch = || AsmErrorKind::BadLiteral(format!("{:?} literal cannot hold {}", kind, operand));
    let words = match (kind, operand) {
        (LiteralKind::Generic, Integer(v)) => match fits_word(*v) {
            true => vec![to_word(*v)],
            false => return Err(AsmErrorKind::BadLiteral(format!("{} does not fit in a word", v))),
        }
        (LiteralKind::Single, Float(t)) => vec![float36::to_single(&float_arg(t)?).map_err(out_of_range(t))?],
        (LiteralKind::Double, Float(t)) => float36::to_double(&float_arg(t)?).map_err(out_of_range(t))?.to_vec(),
        (LiteralKind::Scaled, List(x)) => match x.as_slice() {
            [Float(t), Integer(p)] => vec![float36::to_scaled(&float_arg(t)?, point_arg(*p)?).map_err(out_of_range(t))?],
            _ => return Err(mismatch()),
        }
        (LiteralKind::ScaledDouble, List(x)) => match x.as_slice() {
            [Float(t), Integer(p)] => float36::to_scaled_double(&float_arg(t)?, point_arg(*p)?).map_err(out_of_range(t))?.to_vec(),
            _ => return Err(mismatch()),
        }
        (LiteralKind::String, String(s)) => {
            let words = pack_ascii(s);
            if words.len() > MAX_LITERAL_WORDS {
                return Err(AsmErrorKind::CapacityExceeded { what: "string literal", limit: MAX_LITERAL_WORDS, requested: words.len() });
            }
            words
        }
        (LiteralKind::Its, List(x)) => match x.as_slice() {
            [Integer(m), Integer(first), Integer(offset)] => pointer_pair(*m as Word, to_word(*first), to_word(*offset), 0).to_vec(),
            _ => return Err(mismatch()),
        }
        (LiteralKind::Vfd, List(x)) => {
            let mut fields = Vec::with_capacity(x.len());
            for field in x {
                fields.push(match field {
                    List(f) => match f.as_slice() {
                        [Integer(w), Integer(v)] if *w >= 0 => VfdField::Bits(*w as u32, *v),
                        [Integer(w), String(s)] if *w >= 0 => VfdField::Chars(*w as u32, s.clone()),
                        _ => return Err(mismatch()),
                    }
                    _ => return Err(mismatch()),
                });
            }
            pack_vfd(&fields)?
        }
        _ => return Err(mismatch()),
    };
    Ok(words)
}

/// Where a literal was written: the address of its line and its index among that line's literals.
pub type LiteralKey = (Word, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralHandle(usize);

#[derive(Debug)]
struct Literal {
    kind: LiteralKind,
    key: LiteralKey,
    words: Vec<Word>,
    signature: String,
    pass2_signature: Option<String>,
    address: Option<Word>,
    padded: bool,
    line_num: usize,
    text: String,
}

fn signature(kind: LiteralKind, words: &[Word]) -> String {
    let words: Vec<String> = words.iter().map(|w| format!("{:012o}", w)).collect();
    format!("{:?}:{}", kind, words.join(","))
}

#[derive(Debug, Default)]
pub struct LiteralTable {
    literals: Vec<Literal>,
    slots: HashMap<LiteralKey, usize>,
    pool: Option<(Word, Word)>,
}
impl LiteralTable {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn len(&self) -> usize {
        self.literals.len()
    }
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    /// Creates (pass 1) or finds again (pass 2) the literal written at `key`.
    /// Building the words can fail, in which case nothing is recorded.
    pub fn add(&mut self, key: LiteralKey, kind: LiteralKind, operand: &Operand, pass: Pass, line_num: usize, text: &str) -> Result<LiteralHandle, AsmErrorKind> {
        let words = build_words(kind, operand)?;
        let sig = signature(kind, &words);
        match pass {
            Pass::One => {
                if let Some(&i) = self.slots.get(&key) { return Ok(LiteralHandle(i)); }
                self.literals.push(Literal { kind, key, words, signature: sig, pass2_signature: None, address: None, padded: false, line_num, text: text.into() });
                self.slots.insert(key, self.literals.len() - 1);
                Ok(LiteralHandle(self.literals.len() - 1))
            }
            Pass::Two => match self.slots.get(&key) {
                Some(&i) => {
                    self.literals[i].pass2_signature = Some(sig);
                    Ok(LiteralHandle(i))
                }
                None => Err(AsmErrorKind::PhaseError { what: format!("literal ={} at {:06o}.{}", text, key.0, key.1), pass1: "absent".into(), pass2: sig }),
            }
        }
    }
    pub fn address(&self, handle: LiteralHandle) -> Option<Word> {
        self.literals[handle.0].address
    }
    /// The generated name of a placed literal, e.g. `D000124.1`.
    pub fn name(&self, handle: LiteralHandle) -> Option<String> {
        let lit = &self.literals[handle.0];
        lit.address.map(|a| format!("{}{:06o}.{}", lit.kind.prefix(), a, lit.key.1))
    }

    /// Places every literal, in creation order, starting at `start`. Returns the first address past the pool.
    pub fn assign_addresses(&mut self, start: Word) -> Word {
        let mut at = start;
        for lit in self.literals.iter_mut() {
            lit.padded = lit.kind.even_aligned() && at % 2 != 0;
            if lit.padded { at += 1; }
            lit.address = Some(at);
            at += lit.words.len() as Word;
        }
        self.pool = Some((start, at));
        at
    }
    pub fn pool_start(&self) -> Option<Word> {
        self.pool.map(|p| p.0)
    }
    pub fn pool_end(&self) -> Option<Word> {
        self.pool.map(|p| p.1)
    }

    /// Compares what pass 2 saw against pass 1.
    pub fn verify(&self) -> Vec<AsmError> {
        let mut errors = vec![];
        for (i, lit) in self.literals.iter().enumerate() {
            let pass2 = match &lit.pass2_signature {
                Some(s) if *s == lit.signature => continue,
                Some(s) => s.clone(),
                None => "not referenced".into(),
            };
            let name = self.name(LiteralHandle(i)).unwrap_or_else(|| format!("={}", lit.text));
            errors.push(AsmError { kind: AsmErrorKind::PhaseError { what: format!("literal {}", name), pass1: lit.signature.clone(), pass2 }, line_num: lit.line_num });
        }
        errors
    }
    /// Emits the pool: each literal's pass-1 words at its address, alignment padding as `nop`.
    /// Returns one `AlignmentCorrection` per padding word, for the line that wrote the padded literal.
    pub fn write_pool(&self, out: &mut OutputStream) -> Vec<AsmError> {
        let mut corrections = vec![];
        for (i, lit) in self.literals.iter().enumerate() {
            let address = match lit.address {
                Some(a) => a,
                None => continue,
            };
            if lit.padded {
                let pad = out.word(address - 1, NOP_WORD);
                out.annotate(pad, "even");
                corrections.push(AsmError { kind: AsmErrorKind::AlignmentCorrection { address: address - 1 }, line_num: lit.line_num });
            }
            let first = lit.words.iter().enumerate().map(|(j, &w)| out.word(address + j as Word, w)).min();
            if let (Some(first), Some(name)) = (first, self.name(LiteralHandle(i))) {
                out.annotate(first, &format!("{} ={}", name, lit.text));
            }
        }
        corrections
    }
}

#[test]
fn test_builders() {
    use Operand::*;
    assert_eq!(build_words(LiteralKind::Generic, &Integer(5)).unwrap(), &[5]);
    assert_eq!(build_words(LiteralKind::Generic, &Integer(-1)).unwrap(), &[WORD_MASK]);
    assert!(build_words(LiteralKind::Generic, &Integer(1 << 40)).is_err());
    assert_eq!(build_words(LiteralKind::Single, &Float("1.0".into())).unwrap(), &[0o002400000000]);
    assert_eq!(build_words(LiteralKind::Double, &Float("1.0".into())).unwrap(), &[0o002400000000, 0]);
    assert_eq!(build_words(LiteralKind::Scaled, &List(vec![Float("3".into()), Integer(17)])).unwrap(), &[0o000003000000]);
    assert_eq!(build_words(LiteralKind::String, &String("abcde".into())).unwrap(), &[0o141142143144, 0o145040040040]);
    assert_eq!(build_words(LiteralKind::Its, &List(vec![Integer(TAG_ITS as i64), Integer(0o12), Integer(0o100)])).unwrap(), &[0o000012000043, 0o000100000000]);
    assert_eq!(build_words(LiteralKind::Its, &List(vec![Integer(TAG_ITP as i64), Integer(6), Integer(0o20)])).unwrap(), &[0o600000000041, 0o000020000000]);
    assert!(matches!(build_words(LiteralKind::Single, &Integer(1)), Err(AsmErrorKind::BadLiteral(_))));
    assert!(matches!(build_words(LiteralKind::Single, &Float("1e300".into())), Err(AsmErrorKind::FloatOutOfRange(_))));
}
#[test]
fn test_vfd() {
    use Operand::*;
    let field = |w, v| List(vec![Integer(w), Integer(v)]);
    assert_eq!(build_words(LiteralKind::Vfd, &List(vec![field(18, 1), field(18, 0o777)])).unwrap(), &[0o000001000777]);
    assert_eq!(build_words(LiteralKind::Vfd, &List(vec![field(3, -1)])).unwrap(), &[0o700000000000]);
    assert_eq!(build_words(LiteralKind::Vfd, &List(vec![field(36, 1), field(1, 1)])).unwrap(), &[1, 0o400000000000]);
    assert_eq!(build_words(LiteralKind::Vfd, &List(vec![List(vec![Integer(18), String("ab".into())])])).unwrap(), &[0o141142000000]);
    assert!(matches!(build_words(LiteralKind::Vfd, &List(vec![field(37, 1)])), Err(AsmErrorKind::BadVfdField(_))));

    // 257 words worth of fields is one word too many
    let wide: Vec<Operand> = (0..257).map(|_| field(36, 0)).collect();
    match build_words(LiteralKind::Vfd, &List(wide)) {
        Err(AsmErrorKind::CapacityExceeded { limit: 256, requested: 257, .. }) => (),
        x => panic!("{:?}", x),
    }
    let full: Vec<Operand> = (0..256).map(|_| field(36, 0)).collect();
    assert_eq!(build_words(LiteralKind::Vfd, &List(full)).unwrap().len(), 256);
}
#[test]
fn test_pool_layout() {
    let mut table = LiteralTable::new();
    let a = table.add((0, 0), LiteralKind::Generic, &Operand::Integer(5), Pass::One, 1, "5").unwrap();
    let b = table.add((1, 0), LiteralKind::Double, &Operand::Float("1.0".into()), Pass::One, 2, "1.0d").unwrap();
    let c = table.add((1, 1), LiteralKind::String, &Operand::String("hi".into()), Pass::One, 2, "a\"hi\"").unwrap();
    assert_eq!(table.address(a), None);

    assert_eq!(table.assign_addresses(0o10), 0o15);
    assert_eq!(table.address(a), Some(0o10));
    assert_eq!(table.address(b), Some(0o12));
    assert_eq!(table.address(c), Some(0o14));
    assert_eq!(table.name(b).unwrap(), "D000012.0");
    assert_eq!(table.name(c).unwrap(), "A000014.1");

    let mut out = OutputStream::new();
    let corrections = table.write_pool(&mut out);
    assert!(matches!(&corrections[..], [AsmError { kind: AsmErrorKind::AlignmentCorrection { address: 0o11 }, line_num: 2 }]));
    assert_eq!(out.lines(), &[
        "000010 xxxx 000000000005 L000010.0 =5",
        "000011 xxxx 000000011000 even",
        "000012 xxxx 002400000000 D000012.0 =1.0d",
        "000013 xxxx 000000000000",
        "000014 xxxx 150151040040 A000014.1 =a\"hi\"",
    ]);
}
#[test]
fn test_literal_phases() {
    let mut table = LiteralTable::new();
    let h = table.add((4, 0), LiteralKind::Generic, &Operand::Integer(5), Pass::One, 3, "5").unwrap();
    assert_eq!(table.add((4, 0), LiteralKind::Generic, &Operand::Integer(5), Pass::Two, 3, "5").unwrap(), h);
    table.add((5, 0), LiteralKind::Generic, &Operand::Integer(6), Pass::One, 4, "6").unwrap();
    table.add((5, 0), LiteralKind::Generic, &Operand::Integer(7), Pass::Two, 4, "6").unwrap();
    table.add((6, 0), LiteralKind::Generic, &Operand::Integer(8), Pass::One, 5, "8").unwrap();
    assert!(matches!(table.add((9, 0), LiteralKind::Generic, &Operand::Integer(8), Pass::Two, 5, "8"), Err(AsmErrorKind::PhaseError { .. })));

    table.assign_addresses(0o20);
    let errors = table.verify();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].line_num, 4);
    match &errors[1].kind {
        AsmErrorKind::PhaseError { pass2, .. } => assert_eq!(pass2, "not referenced"),
        x => panic!("{:?}", x),
    }

    // failed builds leave nothing behind
    let mut table = LiteralTable::new();
    assert!(table.add((0, 0), LiteralKind::Generic, &Operand::Integer(1 << 40), Pass::One, 1, "").is_err());
    assert!(table.is_empty());
}
