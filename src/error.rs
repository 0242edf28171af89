//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose – a source-anchored error
//! renders as `path:line:col: message`, which is the one format every stage
//! (tokenizer, parser, analyzer, emitter) reports in.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(display("{path}:{line}:{column}: {message}"))]
  Diagnostic {
    path: String,
    line: usize,
    column: usize,
    message: String,
  },

  /// Failures of the LLVM infrastructure itself (target setup, module
  /// verification, engine creation). These carry no source location.
  #[snafu(display("{message}"))]
  Backend { message: String },

  #[snafu(context(false), display("invalid IR emitted: {source}"))]
  Builder {
    source: inkwell::builder::BuilderError,
  },
}

impl CompileError {
  /// Construct an error anchored at a source position.
  pub fn at(path: &str, line: usize, column: usize, message: impl Into<String>) -> Self {
    Self::Diagnostic {
      path: path.to_string(),
      line,
      column,
      message: message.into(),
    }
  }

  /// Construct a backend error with no source anchor.
  pub fn backend(message: impl Into<String>) -> Self {
    Self::Backend {
      message: message.into(),
    }
  }
}
