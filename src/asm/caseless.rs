use std::cmp::Ordering;
use std::fmt;

/// An ASCII-case-insensitive wrapper for mnemonics and register names, usable as an ordered map key.
#[derive(Clone, Copy, Debug)]
pub struct Caseless<'a>(pub &'a str);

impl Caseless<'_> {
    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl PartialEq<Caseless<'_>> for Caseless<'_> {
    fn eq(&self, other: &Caseless<'_>) -> bool {
        self.0.eq_ignore_ascii_case(other.0)
    }
}
impl Eq for Caseless<'_> {}

impl Ord for Caseless<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}
impl PartialOrd<Caseless<'_>> for Caseless<'_> {
    fn partial_cmp(&self, other: &Caseless<'_>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Caseless<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[test]
fn test_caseless() {
    assert_eq!(Caseless("LDA"), Caseless("lda"));
    assert_eq!(Caseless("Spri4"), Caseless("sPRI4"));
    assert_ne!(Caseless("stx"), Caseless("stx0"));

    assert!(Caseless("LDA") < Caseless("ldaq"));
    assert!(Caseless("ldx7") > Caseless("LDQ"));
    assert!(Caseless("epp4") < Caseless("EPP5"));
    assert_eq!(Caseless("Tra").cmp(&Caseless("tRA")), Ordering::Equal);
    // folding is to lower case, so '_' sorts before letters of either case
    assert!(Caseless("a_") < Caseless("AZ"));

    let mut m = std::collections::BTreeMap::new();
    m.insert(Caseless("tsp2"), 0o272);
    assert_eq!(m.get(&Caseless("TSP2")), Some(&0o272));
    assert_eq!(m.get(&Caseless("tsp3")), None);
    assert!(m.insert(Caseless("Tsp2"), 1).is_some());
}
