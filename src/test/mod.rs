use crate::asm::*;
use crate::common::Word;

fn assemble_str(src: &str) -> Assembly {
    match assemble("test.alm", &mut src.as_bytes()) {
        Ok(asm) => asm,
        Err(e) => panic!("{}", e),
    }
}

/// Assembles the given lines and fails the test on any error diagnostic.
macro_rules! assemble_clean {
    ($($line:expr),* $(,)?) => {{
        let src = [$($line),*].join("\n");
        let asm = assemble_str(&src);
        if asm.error_count() != 0 {
            for d in asm.diagnostics().iter() {
                eprintln!("{}", d.error);
            }
            panic!("{}", asm.summary());
        }
        asm
    }};
}
/// Assembles the given lines, expecting problems.
macro_rules! assemble_dirty {
    ($($line:expr),* $(,)?) => {{
        let src = [$($line),*].join("\n");
        assemble_str(&src)
    }};
}

fn words(asm: &Assembly) -> Vec<(Word, Word)> {
    asm.output().words().collect()
}
fn directives(asm: &Assembly) -> Vec<String> {
    asm.lines().into_iter().filter(|l| l.starts_with('!')).collect()
}
fn errors(asm: &Assembly) -> Vec<&AsmErrorKind> {
    asm.diagnostics().iter().filter(|d| d.severity == Severity::Error).map(|d| &d.error.kind).collect()
}
fn warnings(asm: &Assembly) -> Vec<&AsmErrorKind> {
    asm.diagnostics().iter().filter(|d| d.severity == Severity::Warning).map(|d| &d.error.kind).collect()
}

const NOP: Word = 0o000000011000;

mod scenario_tests;
mod statement_tests;
mod error_tests;
