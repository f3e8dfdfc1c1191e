use super::*;
use crate::asm::expr::{Value, ValueKind};

#[test]
fn test_empty_source() {
    let asm = assemble_clean!("");
    assert!(asm.complete);
    assert_eq!(asm.lines(), &["!SIZE 000000", "!NAME test"]);
}

#[test]
fn test_instructions() {
    let asm = assemble_clean!(
        "here: lda 5,dl",
        "      lda pr6|4,*",
        "      tra here",
        "      eax7 -1",
        "      nop",
    );
    assert_eq!(words(&asm), &[
        (0, 0o000005235007),
        (1, 0o600004235120),
        (2, 0o000000710000),
        (3, 0o777777627000),
        (4, NOP),
    ]);
}

#[test]
fn test_name_and_segdef() {
    let asm = assemble_clean!(
        "    name mine",
        "    segdef start",
        "    nop",
        "start: nop",
    );
    assert_eq!(asm.name, "mine");
    assert_eq!(directives(&asm), &["!SIZE 000002", "!NAME mine", "!SEGDEF start 000001"]);
}

#[test]
fn test_equ_and_bool() {
    let asm = assemble_clean!(
        "size: equ 4*2",
        "mask: bool 777",
        "      lda size",
        "      lda mask",
    );
    assert_eq!(asm.value_of("size"), Some(Value::absolute(8)));
    assert_eq!(asm.value_of("mask"), Some(Value::absolute(0o777)));
    assert_eq!(&words(&asm)[..2], &[(0, 0o000010235000), (1, 0o000777235000)]);
}

#[test]
fn test_data_pseudo_ops() {
    let asm = assemble_clean!(
        "    dec 5, -1, 1.0",
        "    oct 777, -1",
        "    aci \"abcde\"",
        "    vfd 18/1, o18/777",
        "    vfd a9/\"x\", 27/0",
    );
    assert_eq!(words(&asm), &[
        (0, 5), (1, 0o777777777777), (2, 0o002400000000),
        (3, 0o777), (4, 0o777777777777),
        (5, 0o141142143144), (6, 0o145040040040),
        (7, 0o000001000777),
        (8, 0o170000000000),
    ]);
}

#[test]
fn test_even() {
    let asm = assemble_clean!(
        "    nop",
        "    even",
        "    even",
        "x:  nop",
    );
    assert_eq!(words(&asm), &[(0, NOP), (1, NOP), (2, NOP)]);
    assert_eq!(asm.value_of("x"), Some(Value::relocatable(2)));
    assert_eq!(asm.warning_count(), 0);
}

#[test]
fn test_literal_pool() {
    let asm = assemble_clean!(
        "    lda =5",
        "    ldaq =1.0d",
        "    lda =a\"abcde\"",
        "    lda =v18/1,o18/777,dl",
    );
    assert_eq!(directives(&asm), &["!SIZE 000013", "!NAME test"]);
    let lines = asm.lines();
    assert_eq!(&lines[2..], &[
        "000000 xxxx 000004235000 lda =5",
        "000001 xxxx 000006237000 ldaq =1.0d",
        "000002 xxxx 000010235000 lda =a\"abcde\"",
        "000003 xxxx 000012235007 lda =v18/1,o18/777,dl",
        "000004 xxxx 000000000005 L000004.0 =5",
        "000005 xxxx 000000011000 even",
        "000006 xxxx 002400000000 D000006.0 =1.0d",
        "000007 xxxx 000000000000",
        "000010 xxxx 141142143144 A000010.0 =a\"abcde\"",
        "000011 xxxx 145040040040",
        "000012 xxxx 000001000777 V000012.0 =v18/1,o18/777",
    ]);
    // the double was pushed to an even address
    assert!(matches!(warnings(&asm)[..], [AsmErrorKind::AlignmentCorrection { address: 5 }]));
}

#[test]
fn test_pointer_literal_alignment() {
    let asm = assemble_clean!(
        "    lda =1",
        "    lda =its(12,100)",
    );
    // the pool starts at 2, so the pointer pair is pushed from 3 to 4
    assert_eq!(words(&asm), &[
        (0, 0o000002235000),
        (1, 0o000004235000),
        (2, 1),
        (3, NOP),
        (4, 0o000012000043), (5, 0o000100000000),
    ]);
    assert_eq!(asm.warning_count(), 1);
    assert!(matches!(warnings(&asm)[..], [AsmErrorKind::AlignmentCorrection { address: 3 }]));
    assert_eq!(asm.diagnostics().iter().next().unwrap().error.line_num, 2);
}

#[test]
fn test_literal_fields_use_symbols() {
    let asm = assemble_clean!(
        "n:    equ 5",
        "here: nop",
        "      lda =v18/n,o18/17",
        "      lda =itp(sp,here+20)",
    );
    assert_eq!(words(&asm), &[
        (0, NOP),
        (1, 0o000003235000),
        (2, 0o000004235000),
        (3, 0o000005000017),
        (4, 0o600000000041), (5, 0o000020000000),
    ]);
    assert_eq!(asm.warning_count(), 0);
}

#[test]
fn test_temporaries_and_push() {
    let asm = assemble_clean!(
        "    temp a, b(2)",
        "    tempd d",
        "    temp8 e",
        "    push",
        "    lda a",
        "    sta d",
        "    staq e",
    );
    assert_eq!(asm.value_of("d"), Some(Value::temporary(0o104)));
    assert_eq!(asm.value_of("e"), Some(Value::temporary(0o110)));
    assert_eq!(words(&asm), &[
        (0, 0o000120627000),
        (1, 0o000030272100),
        (2, 0o600100235100),
        (3, 0o600104755100),
        (4, 0o600110757100),
    ]);
    assert!(asm.symbols().lookup("b").unwrap().temporary.is_some());
    assert!(asm.symbols().lookup("a").unwrap().temporary.is_some());

    let asm = assemble_clean!("    push 13");
    assert_eq!(words(&asm)[0], (0, 0o000020627000));
}

#[test]
fn test_entries() {
    let asm = assemble_clean!(
        "    entry main, helper",
        "main:   lda 1",
        "helper: tra main",
    );
    assert_eq!(directives(&asm), &[
        "!SIZE 000006",
        "!NAME test",
        "!entry main 000000 000002",
        "!entry helper 000001 000004",
    ]);
    assert_eq!(&words(&asm)[2..], &[
        (2, 0o600024370120), (3, 0o000000710000),
        (4, 0o600024370120), (5, 0o000001710000),
    ]);
    assert!(asm.lines().iter().any(|l| l == "000002 xxxx 600024370120 entry main"));
}

#[test]
fn test_link() {
    let asm = assemble_clean!(
        "    link ptr, sys$tbl+4",
        "    lda ptr",
        "    lda sys$tbl+4",
        "    lda sys$tbl",
    );
    let ptr = asm.value_of("ptr").unwrap();
    assert_eq!((ptr.kind, ptr.payload), (ValueKind::Link, 0));
    assert_eq!(directives(&asm), &[
        "!SIZE 000010",
        "!NAME test",
        "!LINKAGE 000004 2",
        "!segref sys tbl 000004 4",
        "!segref sys tbl 000006 0",
    ]);
    assert_eq!(words(&asm), &[
        (0, 0o400000235120),
        (1, 0o400000235120),
        (2, 0o400002235120),
        (3, NOP),
        (4, 0o000000000043), (5, 0o000004000000),
        (6, 0o000000000043), (7, 0),
    ]);
    assert!(asm.lines().iter().any(|l| l == "000004 xxxx 000000000043 sys$tbl+4"));
}

#[test]
fn test_save_and_return() {
    let asm = assemble_clean!(
        "main: save x2",
        "      return main",
    );
    assert_eq!(words(&asm), &[
        (0, 0o000100627000),
        (1, 0o000030272100),
        (2, 0o600024650100),
        (3, 0o600022754100),
        (4, 0o600020252100),
        (5, 0o600030742100),
        (6, 0o600030222100),
        (7, 0o600020610100),
    ]);
}

#[test]
fn test_end_stops_reading() {
    let asm = assemble_clean!(
        "    nop",
        "    end",
        "    frobnicate",
    );
    assert_eq!(words(&asm), &[(0, NOP)]);
}

#[test]
fn test_symbol_dump() {
    let asm = assemble_clean!(
        "b: nop",
        "a: nop",
        "seven: equ 7",
    );
    let mut f = vec![];
    asm.dump_symbols(&mut f, true).unwrap();
    assert_eq!(String::from_utf8(f).unwrap(), concat!(
        "a                000000000001 Relocatable 2\n",
        "b                000000000000 Relocatable 1\n",
        "seven            000000000007 Absolute 3\n",
    ));
}

#[test]
fn test_drain() {
    let asm = assemble_clean!("x: dec 3");
    let mut f = vec![];
    asm.drain(&mut f).unwrap();
    assert_eq!(String::from_utf8(f).unwrap(), "!SIZE 000001\n!NAME test\n000000 xxxx 000000000003 x: dec 3\n");
}
