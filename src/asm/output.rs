//! The output stream: header directives and assembled words, in the order they were produced.

use std::fmt;
use std::io::{self, Write};

use crate::common::Word;
use crate::common::util::Punctuated;

pub const DIRECTIVE_SIZE: &str = "SIZE";
pub const DIRECTIVE_NAME: &str = "NAME";
pub const DIRECTIVE_SEGDEF: &str = "SEGDEF";
pub const DIRECTIVE_ENTRY: &str = "entry";
pub const DIRECTIVE_LINKAGE: &str = "LINKAGE";
pub const DIRECTIVE_SEGREF: &str = "segref";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputRecord {
    /// A loader directive (`!NAME args...`).
    Directive { name: &'static str, args: Vec<String> },
    /// An assembled word with an optional annotation (normally the source line).
    Word { address: Word, value: Word, text: Option<String> },
}
impl fmt::Display for OutputRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputRecord::Directive { name, args } => match args.is_empty() {
                true => write!(f, "!{}", name),
                false => write!(f, "!{} {}", name, Punctuated::join(&args[..], " ")),
            }
            OutputRecord::Word { address, value, text } => match text {
                Some(text) => write!(f, "{:06o} xxxx {:012o} {}", address, value, text),
                None => write!(f, "{:06o} xxxx {:012o}", address, value),
            }
        }
    }
}

/// Formats an address for a directive argument.
pub fn octal(v: Word) -> String {
    format!("{:06o}", v)
}

/// Append-only record of everything an assembly produces.
/// The only in-place change allowed is annotating a word after the fact.
#[derive(Debug, Default)]
pub struct OutputStream {
    records: Vec<OutputRecord>,
}
impl OutputStream {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    pub fn directive(&mut self, name: &'static str, args: Vec<String>) {
        self.records.push(OutputRecord::Directive { name, args });
    }
    /// Appends a word and returns its record index (for `annotate`).
    pub fn word(&mut self, address: Word, value: Word) -> usize {
        self.records.push(OutputRecord::Word { address, value, text: None });
        self.records.len() - 1
    }
    /// Attaches an annotation to a previously appended word. Directives cannot be annotated.
    pub fn annotate(&mut self, index: usize, annotation: &str) {
        match self.records.get_mut(index) {
            Some(OutputRecord::Word { text, .. }) => *text = Some(annotation.into()),
            _ => debug_assert!(false, "annotating a record that is not a word"),
        }
    }

    /// All words in emission order as `(address, value)` pairs.
    pub fn words(&self) -> impl Iterator<Item = (Word, Word)> + '_ {
        self.records.iter().filter_map(|r| match r {
            OutputRecord::Word { address, value, .. } => Some((*address, *value)),
            _ => None,
        })
    }
    /// The listing lines: every directive (in creation order) followed by every word (in creation order).
    pub fn lines(&self) -> Vec<String> {
        let directives = self.records.iter().filter(|r| matches!(r, OutputRecord::Directive { .. }));
        let words = self.records.iter().filter(|r| matches!(r, OutputRecord::Word { .. }));
        directives.chain(words).map(|r| r.to_string()).collect()
    }
    /// Writes the listing to `f`, consuming the stream.
    pub fn drain<W: Write>(self, f: &mut W) -> io::Result<()> {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[test]
fn test_record_format() {
    let w = OutputRecord::Word { address: 0o12, value: 0o235000, text: Some("lda 5".into()) };
    assert_eq!(w.to_string(), "000012 xxxx 000000235000 lda 5");
    let w = OutputRecord::Word { address: 1, value: 5, text: None };
    assert_eq!(w.to_string(), "000001 xxxx 000000000005");
    let d = OutputRecord::Directive { name: DIRECTIVE_SEGREF, args: vec!["seg1".into(), "a".into(), octal(0o10), "0".into()] };
    assert_eq!(d.to_string(), "!segref seg1 a 000010 0");
    let d = OutputRecord::Directive { name: DIRECTIVE_NAME, args: vec![] };
    assert_eq!(d.to_string(), "!NAME");
}
#[test]
fn test_drain_order() {
    let mut out = OutputStream::new();
    let first = out.word(0, 0o11000);
    out.directive(DIRECTIVE_SIZE, vec![octal(2)]);
    out.word(1, 7);
    out.annotate(first, "nop");
    out.directive(DIRECTIVE_NAME, vec!["demo".into()]);
    assert_eq!(out.words().collect::<Vec<_>>(), &[(0, 0o11000), (1, 7)]);

    let mut f = Vec::new();
    out.drain(&mut f).unwrap();
    assert_eq!(String::from_utf8(f).unwrap(), "!SIZE 000002\n!NAME demo\n000000 xxxx 000000011000 nop\n000001 xxxx 000000000007\n");
}
