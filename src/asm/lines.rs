//! The statement reader: splitting source lines into fields and parsing operand text.

use std::io::BufRead;

use memchr::{memchr, memchr2};

use super::{AsmError, AsmErrorKind};
use super::constants::*;
use super::expr::*;

/// One source line, split into its fields. Comments are already removed from `operands`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub line_num: usize,
    /// The line as written, without the line break.
    pub text: String,
    pub label: Option<String>,
    pub mnemonic: Option<String>,
    pub operands: String,
}
impl SourceLine {
    /// Splits a line of the form `[label:] [mnemonic [operands]] [; comment]`.
    pub fn parse(line_num: usize, raw: &str) -> SourceLine {
        let text = raw.trim_end().to_string();
        let code = strip_comment(raw).trim();

        let first_end = code.find(char::is_whitespace).unwrap_or(code.len());
        let (label, rest) = match code[..first_end].find(LABEL_DEF_CHAR) {
            Some(p) => (Some(code[..p].to_string()), code[p + 1..].trim_start()),
            None => (None, code),
        };
        let mnemonic_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let mnemonic = match mnemonic_end {
            0 => None,
            n => Some(rest[..n].to_string()),
        };
        let operands = rest[mnemonic_end..].trim().to_string();

        SourceLine { line_num, text, label, mnemonic, operands }
    }
}

/// Reads and splits every line of the source. Only I/O can fail here; everything else is diagnosed per statement later.
pub fn read_source(asm: &mut dyn BufRead) -> Result<Vec<SourceLine>, AsmError> {
    let mut lines = vec![];
    let mut buf = String::new();
    loop {
        buf.clear();
        match asm.read_line(&mut buf) {
            Err(e) => return Err(AsmError { kind: AsmErrorKind::ReadError(e), line_num: lines.len() + 1 }),
            Ok(0) => return Ok(lines),
            Ok(_) => lines.push(SourceLine::parse(lines.len() + 1, &buf)),
        }
    }
}

/// Removes a trailing comment, ignoring comment characters inside string literals.
pub(super) fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut pos = 0;
    let mut in_string = false;
    while pos < bytes.len() {
        let hit = match in_string {
            false => memchr2(COMMENT_CHAR, QUOTE_CHAR, &bytes[pos..]),
            true => memchr2(b'\\', QUOTE_CHAR, &bytes[pos..]),
        };
        let at = match hit {
            None => break,
            Some(i) => pos + i,
        };
        match bytes[at] {
            COMMENT_CHAR => return &line[..at],
            QUOTE_CHAR => in_string = !in_string,
            _ => { pos = at + 2; continue; } // escape inside a string
        }
        pos = at + 1;
    }
    line
}
#[test]
fn test_strip_comment() {
    assert_eq!(strip_comment("lda 5 ; load"), "lda 5 ");
    assert_eq!(strip_comment("aci \"a;b\" ; text"), "aci \"a;b\" ");
    assert_eq!(strip_comment("aci \"a\\\";b\""), "aci \"a\\\";b\"");
    assert_eq!(strip_comment("; only"), "");
    assert_eq!(strip_comment("nop"), "nop");
    assert_eq!(strip_comment("aci \"\\"), "aci \"\\");
}
#[test]
fn test_split_line() {
    let l = SourceLine::parse(3, "FOO:   bss  1   ; reserve\n");
    assert_eq!(l.line_num, 3);
    assert_eq!(l.text, "FOO:   bss  1   ; reserve");
    assert_eq!(l.label.as_deref(), Some("FOO"));
    assert_eq!(l.mnemonic.as_deref(), Some("bss"));
    assert_eq!(l.operands, "1");

    let l = SourceLine::parse(1, "  lda  pr6|4 , x1");
    assert_eq!((l.label, l.mnemonic.as_deref(), l.operands.as_str()), (None, Some("lda"), "pr6|4 , x1"));

    let l = SourceLine::parse(1, "s1:save x0,x1");
    assert_eq!((l.label.as_deref(), l.mnemonic.as_deref(), l.operands.as_str()), (Some("s1"), Some("save"), "x0,x1"));

    let l = SourceLine::parse(1, "here:");
    assert_eq!((l.label.as_deref(), l.mnemonic), (Some("here"), None));

    let l = SourceLine::parse(1, "   ");
    assert_eq!((l.label, l.mnemonic, l.operands.as_str()), (None, None, ""));
}
#[test]
fn test_read_source() {
    let src = "a: nop\n\n  tra a\n";
    let lines = read_source(&mut src.as_bytes()).unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2].line_num, 3);
    assert_eq!(lines[2].mnemonic.as_deref(), Some("tra"));
}

pub(super) fn is_valid_symbol_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some('_') | Some('.') => (),
        Some(c) if c.is_ascii_alphabetic() => (),
        _ => return false,
    }
    chars.all(|c| c == '_' || c == '.' || c.is_ascii_alphanumeric())
}
#[test]
fn test_valid_symname() {
    assert!(is_valid_symbol_name("foo"));
    assert!(is_valid_symbol_name(".tv_end"));
    assert!(is_valid_symbol_name("_x7"));
    assert!(is_valid_symbol_name("FOO.bar"));
    assert!(!is_valid_symbol_name(""));
    assert!(!is_valid_symbol_name("7up"));
    assert!(!is_valid_symbol_name("a$b"));
    assert!(!is_valid_symbol_name("a b"));
    assert!(!is_valid_symbol_name("é"));
}

/// Splits operands on commas that are outside parentheses and strings. Each operand is trimmed.
pub(super) fn split_operands(text: &str) -> Vec<&str> {
    let text = text.trim();
    if text.is_empty() { return vec![]; }

    let mut res = vec![];
    let (mut depth, mut in_string, mut escaped, mut start) = (0usize, false, false, 0);
    for (i, c) in text.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                res.push(text[start..i].trim());
                start = i + 1;
            }
            _ => (),
        }
    }
    res.push(text[start..].trim());
    res
}
#[test]
fn test_split_operands() {
    assert_eq!(split_operands(""), Vec::<&str>::new());
    assert_eq!(split_operands(" a "), &["a"]);
    assert_eq!(split_operands("a, b ,c"), &["a", "b", "c"]);
    assert_eq!(split_operands("=its(seg,4),x1"), &["=its(seg,4)", "x1"]);
    assert_eq!(split_operands("\"a,b\",2"), &["\"a,b\"", "2"]);
    assert_eq!(split_operands("a,"), &["a", ""]);
}

/// Reads a quoted string (allowing leading whitespace) and returns its contents and the text after the closing quote.
pub(super) fn extract_string(text: &str) -> Result<(String, &str), AsmErrorKind> {
    let text = text.trim_start();
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, '"')) => (),
        _ => return Err(AsmErrorKind::ExpectedString),
    }
    let mut res = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((res, &text[i + 1..])),
            '\\' => match chars.next() {
                Some((_, 'n')) => res.push('\n'),
                Some((_, 't')) => res.push('\t'),
                Some((_, '0')) => res.push('\0'),
                Some((_, e @ '\\')) | Some((_, e @ '"')) => res.push(e),
                Some((_, e)) => return Err(AsmErrorKind::InvalidEscape(e)),
                None => break,
            }
            _ => res.push(c),
        }
    }
    Err(AsmErrorKind::IncompleteString)
}
#[test]
fn test_extract_string() {
    assert_eq!(extract_string("\"hello\"").unwrap(), ("hello".to_string(), ""));
    assert_eq!(extract_string("  \"a b\" ,4").unwrap(), ("a b".to_string(), " ,4"));
    assert_eq!(extract_string("\"q\\\"t\\n\"").unwrap(), ("q\"t\n".to_string(), ""));
    assert!(matches!(extract_string("hello"), Err(AsmErrorKind::ExpectedString)));
    assert!(matches!(extract_string("\"open"), Err(AsmErrorKind::IncompleteString)));
    assert!(matches!(extract_string("\"bad\\q\""), Err(AsmErrorKind::InvalidEscape('q'))));
}

/// Splits `segment$symbol[+offset]`. Returns `None` if there is no `$`.
pub(super) fn split_external(text: &str) -> Option<(&str, &str, Option<&str>)> {
    let i = memchr(EXTERNAL_CHAR, text.as_bytes())?;
    let segment = text[..i].trim();
    let rest = text[i + 1..].trim_start();
    let symbol_end = rest.find(|c: char| !(c == '_' || c == '.' || c.is_ascii_alphanumeric())).unwrap_or(rest.len());
    let symbol = &rest[..symbol_end];
    let offset = rest[symbol_end..].trim();
    let offset = match offset {
        "" => None,
        _ => Some(offset.strip_prefix('+').unwrap_or(offset).trim()),
    };
    Some((segment, symbol, offset))
}
#[test]
fn test_split_external() {
    assert_eq!(split_external("seg1$a"), Some(("seg1", "a", None)));
    assert_eq!(split_external("sys$write + 4"), Some(("sys", "write", Some("4"))));
    assert_eq!(split_external("sys$tbl-1"), Some(("sys", "tbl", Some("-1"))));
    assert_eq!(split_external("plain+1"), None);
}

/// If `text` is `name(...)` (name matched case-insensitively), returns what is inside the parentheses.
pub(super) fn split_call<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let text = text.trim();
    let head = text.get(..name.len())?;
    if !head.eq_ignore_ascii_case(name) { return None; }
    let args = text[name.len()..].trim_start();
    args.strip_prefix('(')?.strip_suffix(')')
}
#[test]
fn test_split_call() {
    assert_eq!(split_call("its(seg, 4)", "its"), Some("seg, 4"));
    assert_eq!(split_call("ITP (6,0)", "itp"), Some("6,0"));
    assert_eq!(split_call("its(seg", "its"), None);
    assert_eq!(split_call("it", "its"), None);
}

/// Parses an integer with an optional sign in the given radix.
pub(super) fn parse_integer(text: &str, radix: u32) -> Option<i64> {
    i64::from_str_radix(text.trim(), radix).ok()
}

struct ExprParser<'a> {
    text: &'a str,
    pos: usize,
    radix: u32,
}
impl<'a> ExprParser<'a> {
    fn peek(&mut self) -> Option<u8> {
        while self.pos < self.text.len() && self.text.as_bytes()[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        self.text.as_bytes().get(self.pos).copied()
    }
    fn take_while(&mut self, f: fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.pos < self.text.len() && f(self.text.as_bytes()[self.pos]) {
            self.pos += 1;
        }
        &self.text[start..self.pos]
    }
    fn binary_op(&mut self) -> Option<OP> {
        match self.peek()? {
            b'+' => Some(OP::Add),
            b'-' => Some(OP::Sub),
            b'*' => Some(OP::Mul),
            b'/' => Some(OP::Div),
            _ => None,
        }
    }

    fn expr(&mut self, min_prec: u8) -> Result<Expr, AsmErrorKind> {
        let mut left = self.term()?;
        while let Some(op) = self.binary_op() {
            if op.precedence() < min_prec { break; }
            self.pos += 1;
            let right = self.expr(op.precedence() + 1)?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }
    fn term(&mut self) -> Result<Expr, AsmErrorKind> {
        let c = match self.peek() {
            None => return Err(AsmErrorKind::ExpectedExprTerm),
            Some(c) => c,
        };
        match c {
            b'-' => { self.pos += 1; Ok(Expr::negate(self.term()?)) }
            b'+' => { self.pos += 1; self.term() }
            b'*' => { self.pos += 1; Ok(Expr::Location) }
            b'(' => {
                self.pos += 1;
                let inner = self.expr(0)?;
                match self.peek() {
                    Some(b')') => { self.pos += 1; Ok(inner) }
                    _ => Err(AsmErrorKind::MissingCloseParen),
                }
            }
            b'0'..=b'9' => {
                let token = self.take_while(|c| c.is_ascii_alphanumeric());
                match parse_integer(token, self.radix) {
                    Some(v) => Ok(Expr::from(v)),
                    None => Err(AsmErrorKind::IllFormedNumericLiteral(token.into())),
                }
            }
            b'_' | b'.' | b'a'..=b'z' | b'A'..=b'Z' => {
                let token = self.take_while(|c| c == b'_' || c == b'.' || c.is_ascii_alphanumeric());
                Ok(Expr::ident(token))
            }
            _ => Err(AsmErrorKind::ExpectedExprTerm),
        }
    }
}

/// Parses an integer expression. Bare numbers are read in `radix`.
pub(super) fn parse_expr(text: &str, radix: u32) -> Result<Expr, AsmErrorKind> {
    let mut parser = ExprParser { text, pos: 0, radix };
    let expr = parser.expr(0)?;
    match parser.peek() {
        None => Ok(expr),
        Some(_) => Err(AsmErrorKind::ExtraContentAfterExpr(text[parser.pos..].into())),
    }
}
#[test]
fn test_parse_expr() {
    let scope = TestScope(vec![("a".to_string(), Value::absolute(10)), ("here".to_string(), Value::relocatable(0o20))].into_iter().collect(), 0o30);
    let eval = |text: &str| parse_expr(text, 10).unwrap().eval(&scope).unwrap();

    assert_eq!(eval("1 + 2 * 3"), Value::absolute(7));
    assert_eq!(eval("(1 + 2) * 3"), Value::absolute(9));
    assert_eq!(eval("10 - 4 - 3"), Value::absolute(3));
    assert_eq!(eval("a / 3"), Value::absolute(3));
    assert_eq!(eval("-a + 1"), Value::absolute(-9));
    assert_eq!(eval("*"), Value::relocatable(0o30));
    assert_eq!(eval("* - here"), Value::absolute(0o10));
    assert_eq!(parse_expr("**2", 10).unwrap(), Expr::binary(OP::Mul, Expr::Location, Expr::from(2i64)));

    assert_eq!(parse_expr("777", 8).unwrap(), Expr::from(0o777i64));
    assert_eq!(parse_expr("x+1", 10).unwrap(), Expr::binary(OP::Add, Expr::ident("x"), Expr::from(1i64)));

    assert!(matches!(parse_expr("", 10), Err(AsmErrorKind::ExpectedExprTerm)));
    assert!(matches!(parse_expr("(1+2", 10), Err(AsmErrorKind::MissingCloseParen)));
    assert!(matches!(parse_expr("1 2", 10), Err(AsmErrorKind::ExtraContentAfterExpr(r)) if r == "2"));
    assert!(matches!(parse_expr("89", 8), Err(AsmErrorKind::IllFormedNumericLiteral(t)) if t == "89"));
    assert!(matches!(parse_expr("1+", 10), Err(AsmErrorKind::ExpectedExprTerm)));
}
