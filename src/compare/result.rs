//! Verdicts and statistics of snippet comparisons

use std::fmt;
use std::time::Duration;

/// Outcome of comparing two snippets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The solver proved that no input makes the outputs differ
    Equivalent,
    /// The solver found a difference or could not decide
    NotEquivalent,
}

impl Verdict {
    /// Integer convention of the outer comparator: 0 is equal, 1 is not
    pub fn code(&self) -> i32 {
        match self {
            Verdict::Equivalent => 0,
            Verdict::NotEquivalent => 1,
        }
    }

    pub fn is_equivalent(&self) -> bool {
        matches!(self, Verdict::Equivalent)
    }
}

impl From<Verdict> for i32 {
    fn from(verdict: Verdict) -> i32 {
        verdict.code()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Equivalent => write!(f, "EQUAL"),
            Verdict::NotEquivalent => write!(f, "NOT EQUAL"),
        }
    }
}

/// Counters collected across one or more snippet comparisons
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompareStatistics {
    /// Position pairs handed to the structural comparator
    pub sync_candidates_tried: u64,
    /// Position pairs from which the structural comparison succeeded
    pub sync_points_found: u64,
    /// Number of solver queries made
    pub solver_calls: u64,
    pub unsat_results: u64,
    pub sat_results: u64,
    pub unknown_results: u64,
    /// Snippet pairs rejected without a solver call
    pub short_circuited: u64,
    /// Wall-clock time spent inside the solver
    pub solver_time: Duration,
}

impl CompareStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rate of solver queries proving equivalence (0.0 to 1.0)
    pub fn unsat_rate(&self) -> f64 {
        if self.solver_calls == 0 {
            0.0
        } else {
            self.unsat_results as f64 / self.solver_calls as f64
        }
    }

    /// Merge statistics from another run
    pub fn merge(&mut self, other: &CompareStatistics) {
        self.sync_candidates_tried += other.sync_candidates_tried;
        self.sync_points_found += other.sync_points_found;
        self.solver_calls += other.solver_calls;
        self.unsat_results += other.unsat_results;
        self.sat_results += other.sat_results;
        self.unknown_results += other.unknown_results;
        self.short_circuited += other.short_circuited;
        self.solver_time += other.solver_time;
    }
}

impl fmt::Display for CompareStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Snippet comparison statistics:")?;
        writeln!(
            f,
            "  Sync candidates:   {} tried, {} matched",
            self.sync_candidates_tried, self.sync_points_found
        )?;
        writeln!(
            f,
            "  Solver calls:      {} ({} unsat, {} sat, {} unknown)",
            self.solver_calls, self.unsat_results, self.sat_results, self.unknown_results
        )?;
        writeln!(f, "  Short-circuited:   {}", self.short_circuited)?;
        write!(f, "  Solver time:       {:.3}s", self.solver_time.as_secs_f64())
    }
}
