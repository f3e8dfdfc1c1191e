//! Conversion utilities between `rug::Float` and the machine's native binary formats.
//!
//! A native float is an 8-bit two's complement exponent (bits 0-7) followed by a two's complement mantissa
//! read as a fraction in `[-1, -0.5) ∪ [0.5, 1)`: 28 bits for single precision, 64 bits (spilling into a second word) for double precision.
//! Zero is a zero mantissa with the most negative exponent.
//!
//! Scaled fixed point values are plain two's complement integers with an implied binary point after bit `b`.

use std::cmp::Ordering;
use std::fmt;
use rug::{Float, Integer};
use rug::ops::NegAssign;

use super::{Word, WORD_BITS};

const EXPONENT_MIN: i32 = -128;
const EXPONENT_MAX: i32 = 127;

const SINGLE_FRACTION_BITS: u32 = 27;
const DOUBLE_FRACTION_BITS: u32 = 63;

/// Precision used for parsing decimal literals, comfortably above the 63 fraction bits of a double.
const PARSE_PRECISION: u32 = 128;

pub const SINGLE_ZERO: Word = 0o400000000000;
pub const DOUBLE_ZERO: [Word; 2] = [0o400000000000, 0];

/// The value could not be represented in the requested format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatRangeError;
impl fmt::Display for FloatRangeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "value out of range")
    }
}

/// Parses a decimal floating point literal (e.g. `1.5`, `-2e3`).
pub fn parse(text: &str) -> Option<Float> {
    Float::parse(text).ok().map(|v| Float::with_val(PARSE_PRECISION, v))
}

/// Low `n` bits of `v` in two's complement.
fn low_bits(v: &Integer, n: u32) -> Word {
    Integer::from(v.keep_bits_ref(n)).to_u64().unwrap_or_default()
}

/// Splits a finite value into a normalized two's complement mantissa with `fraction_bits` bits after the binary point and its exponent.
/// The mantissa is rounded to nearest.
fn normalize(value: &Float, fraction_bits: u32) -> Result<Option<(Integer, i32)>, FloatRangeError> {
    if value.is_zero() { return Ok(None); }
    let (mut sig, exp) = value.to_integer_exp().ok_or(FloatRangeError)?; // none for inf/nan
    let negative = match sig.cmp0() {
        Ordering::Less => { sig.neg_assign(); true }
        Ordering::Greater => false,
        Ordering::Equal => return Ok(None),
    };

    let dif = sig.significant_bits() as i32 - fraction_bits as i32;
    if dif > 0 { sig += Integer::from(1) << (dif - 1) as u32; } // round half away from zero
    sig >>= dif;
    let mut exp = exp + dif;
    if sig.significant_bits() > fraction_bits { // rounding carried into a new bit
        sig >>= 1;
        exp += 1;
    }
    exp += fraction_bits as i32; // sig is now read as a fraction

    if negative {
        // -0.5 has no normalized form, but -1 does
        if sig == (Integer::from(1) << (fraction_bits - 1)) {
            sig <<= 1;
            exp -= 1;
        }
        sig.neg_assign();
    }

    if exp < EXPONENT_MIN || exp > EXPONENT_MAX { return Err(FloatRangeError); }
    Ok(Some((sig, exp)))
}
fn exponent_field(exp: i32) -> Word {
    (exp as i8 as u8 as Word) << 28
}

/// Converts to single precision.
pub fn to_single(value: &Float) -> Result<Word, FloatRangeError> {
    Ok(match normalize(value, SINGLE_FRACTION_BITS)? {
        None => SINGLE_ZERO,
        Some((sig, exp)) => exponent_field(exp) | low_bits(&sig, 28),
    })
}
/// Converts to double precision (two words, most significant first).
pub fn to_double(value: &Float) -> Result<[Word; 2], FloatRangeError> {
    Ok(match normalize(value, DOUBLE_FRACTION_BITS)? {
        None => DOUBLE_ZERO,
        Some((sig, exp)) => {
            let high = Integer::from(&sig >> WORD_BITS);
            [exponent_field(exp) | low_bits(&high, 28), low_bits(&sig, WORD_BITS)]
        }
    })
}

/// Rounds `value * 2^fraction_bits` to an integer and checks it fits in `width` signed bits.
fn fixed(value: &Float, fraction_bits: u32, width: u32) -> Result<Integer, FloatRangeError> {
    let mut v = value.clone();
    v <<= fraction_bits;
    let v = v.to_integer().ok_or(FloatRangeError)?;
    let limit = Integer::from(1) << (width - 1);
    let min = Integer::from(-&limit);
    if v >= limit || v < min { return Err(FloatRangeError); }
    Ok(v)
}
/// Converts to single precision fixed point with the binary point after bit `point` (0-35).
pub fn to_scaled(value: &Float, point: u32) -> Result<Word, FloatRangeError> {
    if point >= WORD_BITS { return Err(FloatRangeError); }
    let v = fixed(value, WORD_BITS - 1 - point, WORD_BITS)?;
    Ok(low_bits(&v, WORD_BITS))
}
/// Converts to double precision fixed point with the binary point after bit `point` (0-71).
pub fn to_scaled_double(value: &Float, point: u32) -> Result<[Word; 2], FloatRangeError> {
    if point >= 2 * WORD_BITS { return Err(FloatRangeError); }
    let v = fixed(value, 2 * WORD_BITS - 1 - point, 2 * WORD_BITS)?;
    let high = Integer::from(&v >> WORD_BITS);
    Ok([low_bits(&high, WORD_BITS), low_bits(&v, WORD_BITS)])
}

#[cfg(test)]
fn f(text: &str) -> Float {
    parse(text).unwrap()
}

#[test]
fn test_single() {
    assert_eq!(to_single(&f("0")).unwrap(), SINGLE_ZERO);
    assert_eq!(to_single(&f("1")).unwrap(), 0o002400000000);
    assert_eq!(to_single(&f("0.5")).unwrap(), 0o000400000000);
    assert_eq!(to_single(&f("3")).unwrap(), 0o004600000000);
    assert_eq!(to_single(&f("-1")).unwrap(), 0o001000000000);
    assert_eq!(to_single(&f("-0.5")).unwrap(), 0o777000000000);
    assert_eq!(to_single(&f("-3")).unwrap(), 0o005200000000);

    // below the last mantissa bit rounds away
    assert_eq!(to_single(&f("1.0000000000001")).unwrap(), 0o002400000000);

    let mut big = Float::with_val(PARSE_PRECISION, 1);
    big <<= 200u32;
    assert_eq!(to_single(&big), Err(FloatRangeError));
    big >>= 400u32;
    assert_eq!(to_single(&big), Err(FloatRangeError));
}
#[test]
fn test_double() {
    assert_eq!(to_double(&f("0")).unwrap(), DOUBLE_ZERO);
    assert_eq!(to_double(&f("1")).unwrap(), [0o002400000000, 0]);
    assert_eq!(to_double(&f("-1")).unwrap(), [0o001000000000, 0]);

    // 1/3 needs the second word
    let third = Float::with_val(PARSE_PRECISION, 1) / 3u32;
    let [high, low] = to_double(&third).unwrap();
    assert_eq!(high >> 28, 0o377); // exponent -1
    assert_ne!(low, 0);
}
#[test]
fn test_scaled() {
    assert_eq!(to_scaled(&f("3"), 17).unwrap(), 0o000003000000);
    assert_eq!(to_scaled(&f("1"), 35).unwrap(), 1);
    assert_eq!(to_scaled(&f("-1"), 35).unwrap(), 0o777777777777);
    assert_eq!(to_scaled(&f("0.5"), 0).unwrap(), 0o200000000000);
    assert_eq!(to_scaled(&f("1"), 0), Err(FloatRangeError));
    assert_eq!(to_scaled(&f("1"), 36), Err(FloatRangeError));

    assert_eq!(to_scaled_double(&f("3"), 35).unwrap(), [0o000000000003, 0]);
    assert_eq!(to_scaled_double(&f("1"), 71).unwrap(), [0, 1]);
    assert_eq!(to_scaled_double(&f("-1"), 71).unwrap(), [0o777777777777, 0o777777777777]);
    assert_eq!(to_scaled_double(&f("1"), 72), Err(FloatRangeError));
}
