//! `ablc`: single-pass compiler for the ABC toy language, emitting
//! x86-64 AT&T-syntax assembly.
//!
//! The pipeline runs lexing/parsing, typechecking, IR lowering,
//! instruction selection, register allocation, and patching as distinct
//! stages gated on the previous stage's diagnostics: a lex/parse/type
//! error stops the pipeline before any code generation runs, since
//! codegen assumes a typechecked, structurally valid program and is not
//! expected to fail.

pub mod arena;
pub mod ast;
pub mod error;
pub mod ir;
pub mod ir_builder;
pub mod lexer;
pub mod parser;
pub mod patch;
pub mod printer;
pub mod regalloc;
pub mod scope;
pub mod selector;
pub mod token;
pub mod typecheck;
pub mod vec;
pub mod x64;

use std::fs;
use std::path::Path;

pub use ast::Program;
pub use error::{CompileError, DiagKind, Diagnostic};
pub use printer::Platform;
pub use x64::X64Program;

/// Lex, parse, and typecheck `source`, returning the annotated AST.
/// Every later stage assumes this has already succeeded.
pub fn check_source(source: &str) -> Result<Program, CompileError> {
    let mut parser = parser::Parser::new(source);
    let mut program = parser.parse()?;

    let arena = arena::Arena::new();
    let mut checker = typecheck::TypeChecker::new(&arena);
    checker.check(&mut program)?;

    Ok(program)
}

/// Run the full pipeline over `source`, producing assembly text.
pub fn compile_source(source: &str, platform: Platform) -> Result<String, CompileError> {
    let program = check_source(source)?;
    let ir = ir_builder::lower_program(&program);
    let mut x64 = selector::select_program(&ir);
    patch::patch_program(&mut x64);
    Ok(printer::print_program(&x64, platform))
}

/// Read `source_path`, compile it, and write the resulting assembly to
/// `output_path`.
pub fn compile_file(
    source_path: &Path,
    output_path: &Path,
    platform: Platform,
) -> Result<(), CompileError> {
    let source = fs::read_to_string(source_path)?;
    let asm = compile_source(&source, platform)?;
    fs::write(output_path, asm)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_source_rejects_a_program_with_no_main() {
        let err = compile_source("int f() { return 1; }", Platform::Elf).unwrap_err();
        assert!(err.has_kind(DiagKind::Type));
    }

    #[test]
    fn compile_source_emits_assembly_for_a_trivial_program() {
        let asm = compile_source("void main() { print(1); }", Platform::Elf).unwrap();
        assert!(asm.contains(".globl main"));
        assert!(asm.contains("callq printf"));
    }

    #[test]
    fn compile_source_stops_before_codegen_on_a_type_error() {
        // 1 + true is a type error; no assembly should ever be produced.
        let err = compile_source(
            "void main() { int x; x = 1 + true; }",
            Platform::Elf,
        )
        .unwrap_err();
        assert!(err.has_kind(DiagKind::Type));
    }

    #[test]
    fn check_source_surfaces_parse_errors_before_typecheck_runs() {
        let err = check_source("int main( { return 1; }").unwrap_err();
        assert!(err.has_kind(DiagKind::Parse));
    }

    #[test]
    fn compile_file_reads_source_and_writes_assembly_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source_path = dir.path().join("prog.al");
        let output_path = dir.path().join("prog.s");
        fs::write(&source_path, "void main() { print(1); }").expect("write source");

        compile_file(&source_path, &output_path, Platform::Elf).expect("compiles");

        let asm = fs::read_to_string(&output_path).expect("read output");
        assert!(asm.contains(".globl main"));
    }

    #[test]
    fn compile_file_surfaces_a_missing_source_file_as_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.al");
        let output_path = dir.path().join("prog.s");
        let err = compile_file(&missing, &output_path, Platform::Elf).unwrap_err();
        assert!(err.has_kind(DiagKind::Io));
    }
}
