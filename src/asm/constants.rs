//! Static tables and the fixed numbers of the assembler and of the calling convention it targets.

use std::collections::BTreeMap;

use crate::common::*;
use super::caseless::Caseless;

macro_rules! insert {
    ($m:ident : $key:expr => $val:expr) => {
        assert!($m.insert($key, $val).is_none())
    };
}
/// Inserts the eight indexed variants `name0` through `name7` of a mnemonic with consecutive opcodes.
macro_rules! insert_indexed {
    ($m:ident : $name:literal => $base:expr) => {
        insert!($m: Caseless(concat!($name, "0")) => ($base + 0, false));
        insert!($m: Caseless(concat!($name, "1")) => ($base + 1, false));
        insert!($m: Caseless(concat!($name, "2")) => ($base + 2, false));
        insert!($m: Caseless(concat!($name, "3")) => ($base + 3, false));
        insert!($m: Caseless(concat!($name, "4")) => ($base + 4, false));
        insert!($m: Caseless(concat!($name, "5")) => ($base + 5, false));
        insert!($m: Caseless(concat!($name, "6")) => ($base + 6, false));
        insert!($m: Caseless(concat!($name, "7")) => ($base + 7, false));
    };
    ($m:ident : $name:literal => $low:expr, $high:expr) => {
        insert!($m: Caseless(concat!($name, "0")) => ($low + 0, false));
        insert!($m: Caseless(concat!($name, "1")) => ($low + 1, false));
        insert!($m: Caseless(concat!($name, "2")) => ($low + 2, false));
        insert!($m: Caseless(concat!($name, "3")) => ($low + 3, false));
        insert!($m: Caseless(concat!($name, "4")) => ($high + 0, false));
        insert!($m: Caseless(concat!($name, "5")) => ($high + 1, false));
        insert!($m: Caseless(concat!($name, "6")) => ($high + 2, false));
        insert!($m: Caseless(concat!($name, "7")) => ($high + 3, false));
    };
}

pub(super) const COMMENT_CHAR: u8 = b';';
pub(super) const QUOTE_CHAR: u8 = b'"';
pub(super) const EXTERNAL_CHAR: u8 = b'$';
pub(super) const LABEL_DEF_CHAR: char = ':';
pub(super) const LITERAL_CHAR: char = '=';
pub(super) const PR_SEPARATOR: char = '|';

/// Largest literal, in words.
pub const MAX_LITERAL_WORDS: usize = 256;
/// `save` can name at most this many index registers (there are only eight).
pub const MAX_SAVE_REGISTERS: usize = 8;
/// Addresses are 18 bits, so a segment holds at most this many words.
pub const MAX_SEGMENT_WORDS: Word = 1 << 18;
/// Frame offset of the first stack temporary.
pub const STACK_TEMP_BASE: Word = 0o100;
/// Stack frames are sized in multiples of this many words.
pub const FRAME_ALIGN: Word = 8;

// standard stack frame header
pub const RETURN_PTR_OFFSET: Word = 0o20;
pub const IND_SAVE_OFFSET: Word = 0o22;
pub const LP_SAVE_OFFSET: Word = 0o24;
pub const REG_SAVE_OFFSET: Word = 0o26;

/// Offset of the stack-push operator in the operator segment (`pr0`).
pub const PUSH_OPERATOR_OFFSET: Word = 0o30;

/// Canonical padding word.
pub const NOP_WORD: Word = 0o011 << 9;

lazy_static! {
    /// Machine instructions: opcode number and opcode extension bit.
    pub(super) static ref INSTRUCTIONS: BTreeMap<Caseless<'static>, (Word, bool)> = {
        let mut m = BTreeMap::new();

        insert!(m: Caseless("nop") => (0o011, false));

        insert!(m: Caseless("lda") => (0o235, false));
        insert!(m: Caseless("ldq") => (0o236, false));
        insert!(m: Caseless("ldaq") => (0o237, false));
        insert!(m: Caseless("sta") => (0o755, false));
        insert!(m: Caseless("stq") => (0o756, false));
        insert!(m: Caseless("staq") => (0o757, false));
        insert!(m: Caseless("stz") => (0o450, false));

        insert!(m: Caseless("ada") => (0o075, false));
        insert!(m: Caseless("adq") => (0o076, false));
        insert!(m: Caseless("sba") => (0o175, false));
        insert!(m: Caseless("sbq") => (0o176, false));
        insert!(m: Caseless("cmpa") => (0o115, false));
        insert!(m: Caseless("cmpq") => (0o116, false));

        insert!(m: Caseless("tra") => (0o710, false));
        insert!(m: Caseless("tze") => (0o600, false));
        insert!(m: Caseless("tnz") => (0o601, false));
        insert!(m: Caseless("tmi") => (0o604, false));
        insert!(m: Caseless("tpl") => (0o605, false));
        insert!(m: Caseless("xec") => (0o716, false));
        insert!(m: Caseless("rtcd") => (0o610, false));

        insert!(m: Caseless("ldi") => (0o634, false));
        insert!(m: Caseless("sti") => (0o754, false));
        insert!(m: Caseless("sreg") => (0o753, false));
        insert!(m: Caseless("lreg") => (0o073, false));

        insert!(m: Caseless("ldp0") => (0o450, true));
        insert!(m: Caseless("stcd") => (0o357, false));

        insert_indexed!(m: "tsx" => 0o700);
        insert_indexed!(m: "eax" => 0o620);
        insert_indexed!(m: "ldx" => 0o220);
        insert_indexed!(m: "stx" => 0o740);
        insert_indexed!(m: "sxl" => 0o440);
        insert_indexed!(m: "lxl" => 0o720);

        insert_indexed!(m: "spri" => 0o250, 0o650);
        insert_indexed!(m: "epp" => 0o350, 0o370);
        insert_indexed!(m: "tsp" => 0o270, 0o670);

        m
    };

    /// Modifier tags (`,tag` on an instruction operand).
    pub(super) static ref TAGS: BTreeMap<Caseless<'static>, Word> = {
        let mut m = BTreeMap::new();

        insert!(m: Caseless("n") => 0o00);
        insert!(m: Caseless("au") => 0o01);
        insert!(m: Caseless("qu") => 0o02);
        insert!(m: Caseless("du") => 0o03);
        insert!(m: Caseless("ic") => 0o04);
        insert!(m: Caseless("al") => 0o05);
        insert!(m: Caseless("ql") => 0o06);
        insert!(m: Caseless("dl") => 0o07);
        insert!(m: Caseless("x0") => 0o10);
        insert!(m: Caseless("x1") => 0o11);
        insert!(m: Caseless("x2") => 0o12);
        insert!(m: Caseless("x3") => 0o13);
        insert!(m: Caseless("x4") => 0o14);
        insert!(m: Caseless("x5") => 0o15);
        insert!(m: Caseless("x6") => 0o16);
        insert!(m: Caseless("x7") => 0o17);

        m
    };

    pub(super) static ref POINTER_REGISTERS: BTreeMap<Caseless<'static>, PointerRegister> = {
        let mut m = BTreeMap::new();

        insert!(m: Caseless("ap") => PointerRegister::Ap);
        insert!(m: Caseless("ab") => PointerRegister::Ab);
        insert!(m: Caseless("bp") => PointerRegister::Bp);
        insert!(m: Caseless("bb") => PointerRegister::Bb);
        insert!(m: Caseless("lp") => PointerRegister::Lp);
        insert!(m: Caseless("lb") => PointerRegister::Lb);
        insert!(m: Caseless("sp") => PointerRegister::Sp);
        insert!(m: Caseless("sb") => PointerRegister::Sb);

        m
    };
}

/// The 18-bit base encoding of an instruction: opcode in bits 18-26 and the extension in bit 27.
/// Unknown mnemonics encode as zero.
pub fn encoding_for(mnemonic: &str) -> Word {
    match INSTRUCTIONS.get(&Caseless(mnemonic)) {
        Some(&(opcode, ext)) => (opcode << 9) | if ext { 1 << 8 } else { 0 },
        None => 0,
    }
}
/// The 9-bit opcode number of an instruction, or zero if unknown.
pub fn opcode_number_for(mnemonic: &str) -> Word {
    INSTRUCTIONS.get(&Caseless(mnemonic)).map(|x| x.0).unwrap_or(0)
}
pub(super) fn is_instruction(mnemonic: &str) -> bool {
    INSTRUCTIONS.contains_key(&Caseless(mnemonic))
}
#[test]
fn test_encodings() {
    assert_eq!(encoding_for("lda"), 0o235000);
    assert_eq!(encoding_for("LDA"), 0o235000);
    assert_eq!(encoding_for("nop"), NOP_WORD);
    assert_eq!(encoding_for("ldp0"), 0o450400);
    assert_eq!(encoding_for("stx3"), 0o743000);
    assert_eq!(encoding_for("spri3"), 0o253000);
    assert_eq!(encoding_for("spri4"), 0o650000);
    assert_eq!(encoding_for("epp4"), 0o370000);
    assert_eq!(encoding_for("tsp2"), 0o272000);
    assert_eq!(encoding_for("frobnicate"), 0);

    assert_eq!(opcode_number_for("tra"), 0o710);
    assert_eq!(opcode_number_for("eax7"), 0o627);
    assert_eq!(opcode_number_for("frobnicate"), 0);
    assert!(is_instruction("Ldx7"));
    assert!(!is_instruction("ldx8"));
}

/// Parses a modifier tag: a register tag, `*` (indirect) or a register tag followed by `*`.
pub(super) fn tag_for(text: &str) -> Option<Word> {
    let text = text.trim();
    if text == "*" { return Some(TAG_INDIRECT); }
    match text.strip_suffix('*') {
        Some(reg) => TAGS.get(&Caseless(reg.trim())).map(|t| TAG_INDIRECT | t),
        None => TAGS.get(&Caseless(text)).copied(),
    }
}
#[test]
fn test_tags() {
    assert_eq!(tag_for("au"), Some(0o01));
    assert_eq!(tag_for("DL"), Some(0o07));
    assert_eq!(tag_for("x7"), Some(0o17));
    assert_eq!(tag_for("*"), Some(0o20));
    assert_eq!(tag_for("x1*"), Some(0o31));
    assert_eq!(tag_for("n*"), Some(0o20));
    assert_eq!(tag_for("x8"), None);
    assert_eq!(tag_for(""), None);
}

/// Parses a pointer register name: `ap` through `sb`, or `pr0` through `pr7`.
pub(super) fn pointer_register_for(text: &str) -> Option<PointerRegister> {
    if let Some(&pr) = POINTER_REGISTERS.get(&Caseless(text)) { return Some(pr); }
    if text.is_ascii() && text.len() == 3 && text[..2].eq_ignore_ascii_case("pr") {
        return text[2..].parse::<u64>().ok().and_then(PointerRegister::from_number);
    }
    None
}
#[test]
fn test_pointer_register_names() {
    assert_eq!(pointer_register_for("sp"), Some(PointerRegister::Sp));
    assert_eq!(pointer_register_for("PR6"), Some(PointerRegister::Sp));
    assert_eq!(pointer_register_for("pr4"), Some(PointerRegister::Lp));
    assert_eq!(pointer_register_for("pr8"), None);
    assert_eq!(pointer_register_for("xp"), None);
}

/// Parses an index register name: `x0` through `x7`, or a bare digit.
pub(super) fn index_register_for(text: &str) -> Option<u8> {
    let digits = match text.as_bytes().first() {
        Some(b'x') | Some(b'X') => &text[1..],
        _ => text,
    };
    match digits.parse::<u8>() {
        Ok(n) if n < 8 && digits.len() == 1 => Some(n),
        _ => None,
    }
}
#[test]
fn test_index_registers() {
    assert_eq!(index_register_for("x0"), Some(0));
    assert_eq!(index_register_for("X7"), Some(7));
    assert_eq!(index_register_for("5"), Some(5));
    assert_eq!(index_register_for("x8"), None);
    assert_eq!(index_register_for("x"), None);
    assert_eq!(index_register_for("x01"), None);
}

/// Assembler pseudo-operations. Anything else in the mnemonic position must be an instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(super) enum PseudoOp {
    Name, Segdef, Segref, Link, Entry,
    Equ, Bool,
    Bss, Dec, Oct, Aci, Vfd, Its, Itp, Even,
    /// Stack temporaries of the given size class (in words).
    Temp(u8),
    Push, Save, Return,
    End,
}

lazy_static! {
    pub(super) static ref PSEUDO_OPS: BTreeMap<Caseless<'static>, PseudoOp> = {
        let mut m = BTreeMap::new();

        insert!(m: Caseless("name") => PseudoOp::Name);
        insert!(m: Caseless("segdef") => PseudoOp::Segdef);
        insert!(m: Caseless("segref") => PseudoOp::Segref);
        insert!(m: Caseless("link") => PseudoOp::Link);
        insert!(m: Caseless("entry") => PseudoOp::Entry);

        insert!(m: Caseless("equ") => PseudoOp::Equ);
        insert!(m: Caseless("bool") => PseudoOp::Bool);

        insert!(m: Caseless("bss") => PseudoOp::Bss);
        insert!(m: Caseless("dec") => PseudoOp::Dec);
        insert!(m: Caseless("oct") => PseudoOp::Oct);
        insert!(m: Caseless("aci") => PseudoOp::Aci);
        insert!(m: Caseless("vfd") => PseudoOp::Vfd);
        insert!(m: Caseless("its") => PseudoOp::Its);
        insert!(m: Caseless("itp") => PseudoOp::Itp);
        insert!(m: Caseless("even") => PseudoOp::Even);

        insert!(m: Caseless("temp") => PseudoOp::Temp(1));
        insert!(m: Caseless("tempd") => PseudoOp::Temp(2));
        insert!(m: Caseless("temp8") => PseudoOp::Temp(8));

        insert!(m: Caseless("push") => PseudoOp::Push);
        insert!(m: Caseless("save") => PseudoOp::Save);
        insert!(m: Caseless("return") => PseudoOp::Return);

        insert!(m: Caseless("end") => PseudoOp::End);

        m
    };
}
