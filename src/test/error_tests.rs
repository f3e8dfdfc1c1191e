use super::*;

#[test]
fn test_pass_one_error_aborts() {
    let asm = assemble_dirty!(
        "    nop",
        "    frob 1",
    );
    assert!(!asm.complete);
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::UnrecognizedInstruction(m)] if m == "frob"));
    assert_eq!(asm.diagnostics().iter().next().unwrap().error.line_num, 2);
    assert!(asm.lines().is_empty());
}

#[test]
fn test_duplicate_label() {
    let asm = assemble_dirty!(
        "a: nop",
        "a: nop",
    );
    let d = asm.diagnostics().iter().next().unwrap();
    assert_eq!(d.error.line_num, 2);
    assert!(matches!(&d.error.kind, AsmErrorKind::DuplicateSymbol { name, prev_line_num: 1 } if name == "a"));
    assert_eq!(d.error.to_string(), "line 2: symbol 'a' was already defined on line 1");
}

#[test]
fn test_undefined_symbol_still_emits() {
    let asm = assemble_dirty!(
        "    lda nowhere",
        "    nop",
    );
    assert!(asm.complete);
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::UndefinedSymbol(n)] if n == "nowhere"));
    assert_eq!(words(&asm), &[(0, 0o000000235000), (1, NOP)]);
}

#[test]
fn test_forward_equ() {
    let asm = assemble_dirty!(
        "x: equ later",
        "later: nop",
    );
    assert!(!asm.complete);
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::ForwardReference(n)] if n == "later"));

    let asm = assemble_dirty!("    bss count", "count: equ 2");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::ForwardReference(_)]));
}

#[test]
fn test_entry_not_found() {
    let asm = assemble_dirty!(
        "    entry ghost, main",
        "main: nop",
    );
    assert!(asm.complete);
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::EntryNotFound(n)] if n == "ghost"));
    assert_eq!(asm.diagnostics().iter().next().unwrap().error.line_num, 1);
    // main takes the slot ghost would have had
    assert_eq!(directives(&asm), &["!SIZE 000003", "!NAME test", "!entry main 000000 000001"]);
    assert_eq!(&words(&asm)[1..], &[(1, 0o600024370120), (2, 0o000000710000)]);
}

#[test]
fn test_segment_overflow() {
    let asm = assemble_dirty!("    bss 34359738367");
    assert!(!asm.complete);
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::CapacityExceeded { what: "segment", requested: 34359738367, .. }]));

    let asm = assemble_dirty!(
        "    nop",
        "    bss 262144",
    );
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::CapacityExceeded { limit: 262144, requested: 262145, .. }]));
}

#[test]
fn test_literal_changed_between_passes() {
    // the offset is not known when pass 1 builds the pointer, so pass 2 computes different words
    let asm = assemble_dirty!(
        "        lda =its(12,target)",
        "target: nop",
    );
    assert!(asm.complete);
    let errors = errors(&asm);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], AsmErrorKind::PhaseError { what, .. } if what == "literal P000002.0"));
    assert_eq!(asm.diagnostics().iter().next().unwrap().error.line_num, 1);
    // the pool still holds what pass 1 built
    assert_eq!(words(&asm), &[
        (0, 0o000002235000),
        (1, NOP),
        (2, 0o000012000043), (3, 0),
    ]);
}

#[test]
fn test_save_errors() {
    let asm = assemble_dirty!("s: save 0, 1, 2, 3, 4, 5, 6, 7, 0");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::CapacityExceeded { limit: 8, requested: 9, .. }]));

    let asm = assemble_dirty!("    save x1");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::LabelRequired("save")]));

    let asm = assemble_dirty!("s: save x9");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::BadIndexRegister(x)] if x == "x9"));
}

#[test]
fn test_return_without_save() {
    let asm = assemble_dirty!(
        "here: nop",
        "      return here",
        "      return nothing",
    );
    // only pass 2 can tell, so the assembly still finishes
    assert!(asm.complete);
    let errors = errors(&asm);
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, AsmErrorKind::ReturnWithoutSave(_))));
    assert_eq!(words(&asm), &[(0, NOP)]);
}

#[test]
fn test_bad_operands() {
    let asm = assemble_dirty!("    lda 5,zz");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::UnknownTag(t)] if t == "zz"));

    let asm = assemble_dirty!("    lda pr9|4");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::UnknownPointerRegister(p)] if p == "pr9"));

    let asm = assemble_dirty!("    lda 1, dl, 3");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::ArgsExpectedCount(_, 3)]));

    let asm = assemble_dirty!("    lda (1+2");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::MissingCloseParen]));

    let asm = assemble_dirty!("    bss -2");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::NegativeCount(-2)]));

    let asm = assemble_dirty!("    lda 12$");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::BadExternalReference(_)]));

    let asm = assemble_dirty!("9x: nop");
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::InvalidSymbolName(n)] if n == "9x"));
}

#[test]
fn test_capacity_limits() {
    let long = "x".repeat(4 * MAX_LITERAL_WORDS + 1);
    let asm = assemble_str(&format!("    aci \"{}\"", long));
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::CapacityExceeded { limit: MAX_LITERAL_WORDS, requested, .. }] if *requested == MAX_LITERAL_WORDS + 1));

    let asm = assemble_str(&format!("    lda =a\"{}\"", long));
    assert!(matches!(errors(&asm)[..], [AsmErrorKind::CapacityExceeded { .. }]));
}

#[test]
fn test_read_error() {
    let mut src: &[u8] = b"    nop\n    lda \xff\xfe\n";
    match assemble("test.alm", &mut src) {
        Err(AsmError { kind: AsmErrorKind::ReadError(_), line_num: 2 }) => (),
        Err(e) => panic!("wrong error: {}", e),
        Ok(_) => panic!("invalid utf-8 was accepted"),
    }
}
