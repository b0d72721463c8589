//! Unrecoverable analyzer failures, as distinct from accumulated diagnostics.
//!
//! `Diagnostic`s (see `report.rs`) are never thrown; they are pushed onto the
//! report and analysis continues. `AnalyzerError` is for the other class from
//! the error-handling design: malformed input or a caller contract violation
//! that the visitor cannot recover from. It is caught once, at `analyze`'s
//! entry point, and folded into `Report { success: false, .. }`.

use derive_more::Display;

#[derive(Debug, Display, Clone)]
pub enum AnalyzerError {
    #[display(fmt = "malformed AST: {}", _0)]
    MalformedAst(String),
    #[display(fmt = "failed to parse input as an AST: {}", _0)]
    ParseFailure(String),
}

impl std::error::Error for AnalyzerError {}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
