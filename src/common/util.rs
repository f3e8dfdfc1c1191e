use std::fmt;

/// Displays a list of values either as an English alternative ("a, b, or c") or joined by a fixed separator.
pub(crate) struct Punctuated<'a, T> {
    vals: &'a [T],
    sep: &'static str,
    last: Option<&'static str>,
}
impl<'a, T> Punctuated<'a, T> {
    pub(crate) fn or(vals: &'a [T]) -> Self {
        Self { vals, sep: ", ", last: Some("or") }
    }
    pub(crate) fn join(vals: &'a [T], sep: &'static str) -> Self {
        Self { vals, sep, last: None }
    }
}
impl<'a, T: fmt::Display> fmt::Display for Punctuated<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let n = self.vals.len();
        for (i, x) in self.vals.iter().enumerate() {
            if i != 0 {
                match self.last {
                    Some(word) if i + 1 == n => {
                        if n == 2 { write!(f, " {} ", word)?; } else { write!(f, "{}{} ", self.sep, word)?; }
                    }
                    _ => f.write_str(self.sep)?,
                }
            }
            write!(f, "{}", x)?;
        }
        Ok(())
    }
}
#[test]
fn test_alternatives() {
    assert_eq!(format!("{}", Punctuated::or(&[] as &[u8])), "");
    assert_eq!(format!("{}", Punctuated::or(&[8])), "8");
    assert_eq!(format!("{}", Punctuated::or(&[1, 2])), "1 or 2");
    assert_eq!(format!("{}", Punctuated::or(&[1, 2, 8])), "1, 2, or 8");
    assert_eq!(format!("{}", Punctuated::or(&["x0", "x1", "x2", "x3"])), "x0, x1, x2, or x3");
}
#[test]
fn test_join() {
    assert_eq!(format!("{}", Punctuated::join(&[] as &[&str], " ")), "");
    assert_eq!(format!("{}", Punctuated::join(&["000012"], " ")), "000012");
    assert_eq!(format!("{}", Punctuated::join(&["seg1", "a", "000020", "0"], " ")), "seg1 a 000020 0");
    assert_eq!(format!("{}", Punctuated::join(&[1, 2, 3], ",")), "1,2,3");
}
