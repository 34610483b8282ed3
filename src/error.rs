//! Error types for expression compilation and evaluation.

use thiserror::Error;

/// Errors that can occur while compiling or evaluating a value graph.
#[derive(Error, Debug)]
pub enum Error {
    /// Expression text could not be parsed.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Range or weight invariant violated at construction.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// A `$reference` did not resolve to any known name.
    #[error("invalid reference name: {0}")]
    InvalidReferenceName(String),

    /// Proxies left without a delegate after the whole input was processed.
    #[error("unresolved references: {}", .0.join(", "))]
    UnresolvedReference(Vec<String>),

    /// Evaluation recursed back into a node that is still being evaluated.
    #[error("evaluation cycle detected at '{0}'")]
    EvaluationCycle(String),

    /// Format string could not be compiled, or a value could not be formatted.
    #[error("format error: {0}")]
    Format(String),

    /// Wrong number of arguments to a constructor.
    #[error("arity error: {0}")]
    Arity(String),

    /// A root name that was never defined was driven.
    #[error("unknown definition: {0}")]
    UnknownName(String),
}

/// Parse failure with source position and the rule that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error at line {line}, column {column} in rule '{rule}': {snippet:?}")]
pub struct ParseError {
    /// 1-based line of the failure.
    pub line: usize,
    /// 1-based column of the failure.
    pub column: usize,
    /// Byte offset of the failure.
    pub offset: usize,
    /// Grammar rule that failed.
    pub rule: &'static str,
    /// Source fragment around the failure position.
    pub snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError {
            line: 1,
            column: 8,
            offset: 7,
            rule: "longRange",
            snippet: "..".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 1"));
        assert!(msg.contains("column 8"));
        assert!(msg.contains("longRange"));
    }

    #[test]
    fn test_unresolved_reference_lists_all_names() {
        let err = Error::UnresolvedReference(vec!["a.b".to_string(), "c".to_string()]);
        assert_eq!(err.to_string(), "unresolved references: a.b, c");
    }
}
