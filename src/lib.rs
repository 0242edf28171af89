//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and builds the rule-shaped tree.
//! - `analyzer` constructs nested symbol scopes and free-variable sets.
//! - `jit` lowers the analyzed tree into LLVM IR and runs it in process.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod analyzer;
pub mod ast;
pub mod error;
pub mod parser;
pub mod tokenizer;

mod jit;

pub use error::{CompileError, CompileResult};

/// Tokenize and parse a source string into a syntax tree. `path` is only
/// used to anchor diagnostics.
pub fn parse_source(source: &str, path: &str) -> CompileResult<ast::Ast> {
  let tokens = tokenizer::tokenize(source, path)?;
  parser::parse(tokens, source, path)
}

/// Analyze a parsed program, JIT-compile it and execute it. Output produced
/// by the program goes to stdout; a runtime fault caught by the generated
/// top-level handler still counts as a successful run.
pub fn compile_and_run(ast: &mut ast::Ast) -> CompileResult<()> {
  let symbols = analyzer::analyze(ast)?;
  jit::run(ast, &symbols)
}
