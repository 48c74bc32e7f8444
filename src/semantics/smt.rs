//! Solver configuration and backends for snippet queries

use crate::error::SolverError;
use crate::semantics::terms::SmtScript;
use log::trace;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use z3::{Config, Context, Params, Solver};

/// Configuration for the SMT solver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverConfig {
    /// Timeout for SMT solving (None means no timeout)
    pub timeout: Option<Duration>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl SolverConfig {
    /// Create a config with no timeout
    pub fn no_timeout() -> Self {
        Self { timeout: None }
    }

    /// Create a config with a specific timeout in seconds
    pub fn with_timeout_secs(secs: u64) -> Self {
        Self {
            timeout: Some(Duration::from_secs(secs)),
        }
    }

    /// Create a config from a whole-second setting where zero or a negative
    /// value means unlimited
    pub fn from_timeout_secs(secs: i64) -> Self {
        if secs > 0 {
            Self::with_timeout_secs(secs as u64)
        } else {
            Self::no_timeout()
        }
    }

    /// Create a config with a specific timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Outcome of a single satisfiability check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// Includes running into the per-call timeout
    Unknown,
}

/// A decision procedure that can check an [`SmtScript`]
pub trait SmtBackend {
    /// Check satisfiability of the conjunction of the script's assertions,
    /// giving up after `timeout` when one is set
    fn check(&mut self, script: &SmtScript, timeout: Option<Duration>)
        -> Result<SatResult, SolverError>;
}

/// Create a Z3 solver in `ctx` with the given per-call timeout
pub fn create_solver_with_timeout(ctx: &Context, timeout: Option<Duration>) -> Solver {
    let solver = Solver::new(ctx);
    if let Some(timeout) = timeout {
        let mut params = Params::new(ctx);
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX).max(1);
        params.set_u32("timeout", millis);
        solver.set_params(&params);
    }
    solver
}

/// Backend that runs every query on a fresh Z3 context
#[derive(Debug, Clone, Copy, Default)]
pub struct Z3Backend;

impl Z3Backend {
    pub fn new() -> Self {
        Self
    }
}

impl SmtBackend for Z3Backend {
    fn check(
        &mut self,
        script: &SmtScript,
        timeout: Option<Duration>,
    ) -> Result<SatResult, SolverError> {
        let text = script.to_smtlib();
        let expected = script.assertions().len();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let ctx = Context::new(&Config::new());
            let solver = create_solver_with_timeout(&ctx, timeout);
            solver.from_string(text);
            // Z3 reports parse and sort errors through a disabled error
            // handler, so a rejected script shows up as missing assertions
            let loaded = solver.get_assertions().len();
            if loaded != expected {
                return Err(SolverError::Backend(format!(
                    "solver loaded {} of {} assertions",
                    loaded, expected
                )));
            }
            let result = solver.check();
            if result == z3::SatResult::Unknown {
                trace!(
                    "Solver returned unknown: {}",
                    solver.get_reason_unknown().unwrap_or_default()
                );
            }
            Ok(result)
        }));

        match outcome {
            Ok(Ok(z3::SatResult::Unsat)) => Ok(SatResult::Unsat),
            Ok(Ok(z3::SatResult::Sat)) => Ok(SatResult::Sat),
            Ok(Ok(z3::SatResult::Unknown)) => Ok(SatResult::Unknown),
            Ok(Err(err)) => Err(err),
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(SolverError::Panicked(msg))
            }
        }
    }
}
