//! Error taxonomy of the snippet comparison core

use thiserror::Error;

/// Conditions that abort a snippet comparison without a verdict
///
/// None of these are retried internally. The outer comparator reports them
/// as distinct diagnostics, never as a plain "not equal".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompareError {
    /// Scanning exhausted a block without finding a position pair from which
    /// the structural comparison succeeds
    #[error("no synchronization point found")]
    NoSynchronizationPoint,
    /// An instruction, operand type or call target without modeled semantics
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// The cumulative solver time budget is spent
    #[error("SMT solver time budget exhausted")]
    OutOfTime,
}

impl CompareError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        CompareError::UnsupportedOperation(msg.into())
    }

    /// Diagnostic category reported to the user
    pub fn category(&self) -> &'static str {
        match self {
            CompareError::NoSynchronizationPoint => "structural mismatch",
            CompareError::UnsupportedOperation(_) => "unsupported construct",
            CompareError::OutOfTime => "solver timeout",
        }
    }
}

/// Failure inside the solver integration itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("solver backend error: {0}")]
    Backend(String),
    #[error("solver backend panicked: {0}")]
    Panicked(String),
}

impl From<SolverError> for CompareError {
    fn from(err: SolverError) -> Self {
        CompareError::UnsupportedOperation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_are_distinct() {
        let categories = [
            CompareError::NoSynchronizationPoint.category(),
            CompareError::unsupported("x").category(),
            CompareError::OutOfTime.category(),
        ];
        assert_ne!(categories[0], categories[1]);
        assert_ne!(categories[1], categories[2]);
        assert_ne!(categories[0], categories[2]);
    }

    #[test]
    fn test_solver_error_becomes_unsupported() {
        let err: CompareError = SolverError::Backend("bad sort".to_string()).into();
        assert!(matches!(err, CompareError::UnsupportedOperation(msg) if msg.contains("bad sort")));
    }
}
