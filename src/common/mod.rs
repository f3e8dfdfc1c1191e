//! Everything that describes the target machine rather than the assembler itself.
//!
//! Bits are numbered the way the hardware manuals number them: bit 0 is the most significant bit of a 36-bit word.

use num_traits::FromPrimitive;

pub mod float36;
pub(crate) mod util;

/// A machine word. Only the low 36 bits are meaningful; everything producing a `Word` masks with `WORD_MASK`.
pub type Word = u64;

pub const WORD_BITS: u32 = 36;
pub const WORD_MASK: Word = 0o777777777777;
/// Mask for an 18-bit half word (addresses, offsets, base encodings).
pub const HALF_MASK: Word = 0o777777;
/// When bit 29 is set the address field is `pr|offset`: 3 bits of register and 15 bits of offset.
pub const PR_OFFSET_MASK: Word = 0o77777;

/// Bit 29 of an instruction word ("address via pointer register").
pub const PR_FLAG: Word = 1 << (35 - 29);

/// Indirect modifier (`,*`).
pub const TAG_INDIRECT: Word = 0o20;
/// Modifier of the first word of an ITS pointer pair.
pub const TAG_ITS: Word = 0o43;
/// Modifier of the first word of an ITP pointer pair.
pub const TAG_ITP: Word = 0o41;

/// Truncates a signed quantity to a 36-bit two's complement word.
pub fn to_word(v: i64) -> Word {
    (v as u64) & WORD_MASK
}
/// Sign-extends a 36-bit word.
pub fn from_word(w: Word) -> i64 {
    (((w & WORD_MASK) << 28) as i64) >> 28
}
#[test]
fn test_word_sign() {
    assert_eq!(to_word(-1), WORD_MASK);
    assert_eq!(to_word(5), 5);
    assert_eq!(from_word(WORD_MASK), -1);
    assert_eq!(from_word(0o400000000000), -(1 << 35));
    assert_eq!(from_word(0o377777777777), (1 << 35) - 1);
    assert_eq!(from_word(to_word(-12345)), -12345);
}

/// Checks whether `v` is representable in a 36-bit word, either as signed or unsigned.
pub fn fits_word(v: i64) -> bool {
    v >= -(1 << 35) && v < (1 << 36)
}

/// Rounds `v` up to a multiple of `align` (which need not be a power of two).
pub fn round_up(v: Word, align: Word) -> Word {
    debug_assert!(align != 0);
    match v % align {
        0 => v,
        r => v + (align - r),
    }
}
#[test]
fn test_round_up() {
    assert_eq!(round_up(0, 8), 0);
    assert_eq!(round_up(1, 8), 8);
    assert_eq!(round_up(8, 8), 8);
    assert_eq!(round_up(0o101, 8), 0o110);
    assert_eq!(round_up(7, 2), 8);
    assert_eq!(round_up(7, 1), 7);
}

/// Assembles an instruction word from its fields.
/// `encoding` is the 18-bit base encoding (opcode in bits 18-26, extension in bit 27) as given by `encoding_for`.
pub fn instruction_word(address: Word, encoding: Word, pr: bool, tag: Word) -> Word {
    let pr = if pr { PR_FLAG } else { 0 };
    ((address & HALF_MASK) << 18) | (encoding & HALF_MASK) | pr | (tag & 0o77)
}
/// Builds the address field for `pr|offset` addressing.
pub fn pr_address(pr: PointerRegister, offset: Word) -> Word {
    ((pr as Word) << 15) | (offset & PR_OFFSET_MASK)
}
#[test]
fn test_instruction_word() {
    // lda 5 -> 000005 235 000
    assert_eq!(instruction_word(5, 0o235 << 9, false, 0), 0o000005235000);
    // lda pr6|12 -> 600012 235 100
    assert_eq!(instruction_word(pr_address(PointerRegister::Sp, 0o12), 0o235 << 9, true, 0), 0o600012235100);
    // addresses wrap at 18 bits and tags at 6
    assert_eq!(instruction_word(0o1000001, 0, false, 0o120), 0o000001000020);
}

/// The eight pointer registers, by number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, FromPrimitive)]
#[repr(u8)]
pub enum PointerRegister {
    /// Argument pointer / operator segment.
    Ap,
    Ab,
    Bp,
    Bb,
    /// Linkage pointer.
    Lp,
    Lb,
    /// Stack frame pointer.
    Sp,
    Sb,
}
impl PointerRegister {
    /// Gets a register from its number (`pr0` through `pr7`).
    pub fn from_number(n: u64) -> Option<PointerRegister> {
        PointerRegister::from_u64(n)
    }
    pub fn name(self) -> &'static str {
        match self {
            PointerRegister::Ap => "ap",
            PointerRegister::Ab => "ab",
            PointerRegister::Bp => "bp",
            PointerRegister::Bb => "bb",
            PointerRegister::Lp => "lp",
            PointerRegister::Lb => "lb",
            PointerRegister::Sp => "sp",
            PointerRegister::Sb => "sb",
        }
    }
}
#[test]
fn test_pointer_register_numbers() {
    assert_eq!(PointerRegister::from_number(4), Some(PointerRegister::Lp));
    assert_eq!(PointerRegister::from_number(6), Some(PointerRegister::Sp));
    assert_eq!(PointerRegister::from_number(8), None);
    assert_eq!(PointerRegister::Sb as u8, 7);
    assert_eq!(PointerRegister::Lp.name(), "lp");
}
