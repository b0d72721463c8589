//! A flow-sensitive, path-joining static type-inference and data-flow
//! analyzer for a restricted, dynamically-typed scripting language. Consumes
//! an AST for one source unit (§6.1) and produces a [`Report`] of detected
//! issues plus the final per-variable state map (§6.2).
//!
//! The crate has exactly two entry points: [`analyze`] walks an already
//! parsed [`ast::AstNode`]; [`analyze_source`] is a convenience wrapper that
//! treats `source` as a JSON-encoded AST dump (see `analyzer.rs` for why
//! JSON, not a source-text grammar).

pub mod analyzer;
pub mod ast;
pub mod builtins;
pub mod error;
pub mod report;
pub mod scope;
pub mod state;
pub mod types;

pub use analyzer::Analyzer;
pub use ast::AstNode;
pub use error::AnalyzerError;
pub use report::{IssueData, IssueKind, Report};

/// `analyze(ast) -> Report`, the single core operation (§6.3).
pub fn analyze(ast: &AstNode) -> Report {
    Analyzer::analyze(ast)
}

/// Convenience wrapper: parses `source` as a JSON AST dump and analyzes it.
/// Parse failure yields `Report { success: false, error: Some(..), .. }`
/// rather than a `Result`, matching §7's rule that the analyzer never hands
/// a caller a partial report.
pub fn analyze_source(source: &str) -> Report {
    Analyzer::analyze_source(source)
}
