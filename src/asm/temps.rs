//! Stack temporaries: named, size-classed slots in the stack frame of the procedure being assembled.

use std::collections::HashMap;

use num_traits::FromPrimitive;

use crate::common::*;
use crate::common::util::Punctuated;
use super::AsmErrorKind;
use super::constants::FRAME_ALIGN;
use super::expr::*;

/// Slot sizes, in words. Slots are aligned to their own size.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive)]
#[repr(u8)]
pub enum SizeClass {
    Single = 1,
    Double = 2,
    Eight = 8,
}
impl SizeClass {
    pub fn from_words(words: u8) -> Result<SizeClass, AsmErrorKind> {
        SizeClass::from_u8(words).ok_or_else(|| AsmErrorKind::BadSizeClass {
            got: words,
            expected: format!("{}", Punctuated::or(&[1, 2, 8])),
        })
    }
    pub fn words(self) -> Word {
        self as Word
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TempId(usize);

#[derive(Debug)]
pub struct StackTemp {
    pub name: String,
    pub class: SizeClass,
    pub count: Word,
    /// The value shared with the temporary's symbol.
    pub value: ValueId,
    pub line_num: usize,
    offset: Option<Word>,
}
impl StackTemp {
    /// The frame offset, once allocated.
    pub fn offset(&self) -> Option<Word> {
        self.offset
    }
}

/// Allocates stack temporaries.
///
/// Temporaries are declared during pass 1 and laid out once afterwards, in declaration order.
#[derive(Debug, Default)]
pub struct StackTemps {
    temps: Vec<StackTemp>,
    names: HashMap<String, TempId>,
    total: Word,
}
impl StackTemps {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn len(&self) -> usize {
        self.temps.len()
    }
    pub fn is_empty(&self) -> bool {
        self.temps.is_empty()
    }
    pub fn get(&self, id: TempId) -> &StackTemp {
        &self.temps[id.0]
    }

    pub fn declare(&mut self, name: &str, class: SizeClass, count: Word, value: ValueId, line_num: usize) -> Result<TempId, AsmErrorKind> {
        if let Some(prev) = self.names.get(name) {
            return Err(AsmErrorKind::DuplicateSymbol { name: name.into(), prev_line_num: self.temps[prev.0].line_num });
        }
        let id = TempId(self.temps.len());
        self.temps.push(StackTemp { name: name.into(), class, count, value, line_num, offset: None });
        self.names.insert(name.into(), id);
        Ok(id)
    }

    /// Lays out every temporary starting at `base_offset` and updates the shared values to their final offsets.
    /// Returns the first offset past the last temporary.
    pub fn allocate(&mut self, base_offset: Word, values: &mut ValueArena) -> Word {
        let mut offset = base_offset;
        for temp in self.temps.iter_mut() {
            offset = round_up(offset, temp.class.words());
            temp.offset = Some(offset);
            values.set(temp.value, Value::temporary(offset));
            log::debug!("temporary {} ({} x {:?}) at sp|{:o}", temp.name, temp.count, temp.class, offset);
            offset += temp.class.words() * temp.count;
        }
        self.total = offset - base_offset;
        offset
    }
    /// Words taken by all temporaries, padding included. Zero before `allocate`.
    pub fn total_size(&self) -> Word {
        self.total
    }
    /// The frame size a push reserves: the header and temporaries, rounded up to the frame alignment.
    pub fn frame_size(&self, base_offset: Word) -> Word {
        round_up(base_offset + self.total, FRAME_ALIGN)
    }
}

#[test]
fn test_size_classes() {
    assert_eq!(SizeClass::from_words(2).unwrap(), SizeClass::Double);
    assert_eq!(SizeClass::Eight.words(), 8);
    match SizeClass::from_words(4) {
        Err(AsmErrorKind::BadSizeClass { got: 4, expected }) => assert_eq!(expected, "1, 2, or 8"),
        x => panic!("{:?}", x),
    }
}
#[test]
fn test_alignment() {
    let mut values = ValueArena::new();
    let mut temps = StackTemps::new();
    let a = values.alloc(Value::temporary(0));
    let b = values.alloc(Value::temporary(0));
    let c = values.alloc(Value::temporary(0));
    let d = values.alloc(Value::temporary(0));
    temps.declare("a", SizeClass::Single, 1, a, 1).unwrap();
    let tb = temps.declare("b", SizeClass::Double, 1, b, 2).unwrap();
    let tc = temps.declare("c", SizeClass::Eight, 2, c, 3).unwrap();
    temps.declare("d", SizeClass::Single, 3, d, 4).unwrap();
    assert!(temps.declare("b", SizeClass::Single, 1, d, 5).is_err());

    assert_eq!(temps.total_size(), 0);
    let end = temps.allocate(0o100, &mut values);

    assert_eq!(values.get(a).payload, 0o100);
    assert_eq!(values.get(b).payload, 0o102);
    assert_eq!(values.get(c).payload, 0o110);
    assert_eq!(values.get(d).payload, 0o130);
    assert_eq!(temps.get(tb).offset(), Some(0o102));
    assert_eq!(temps.get(tc).offset().unwrap() % 8, 0);
    assert_eq!(end, 0o133);
    assert_eq!(temps.total_size(), 0o33);
    assert_eq!(temps.frame_size(0o100), 0o140);
    assert!(values.get(a).pr_indirect);
}
#[test]
fn test_empty_frame() {
    let mut values = ValueArena::new();
    let mut temps = StackTemps::new();
    assert_eq!(temps.allocate(0o100, &mut values), 0o100);
    assert_eq!(temps.frame_size(0o100), 0o100);
}
