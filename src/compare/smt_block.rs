//! Backtracking controller for SMT-based block comparison
//!
//! Entered by the outer comparator when two instructions fail to match
//! structurally. The controller searches for a synchronization point, asks
//! the solver whether the snippets up to it are equivalent and, if they are
//! not, retries with the next synchronization candidate.

use crate::compare::mapping::Attempt;
use crate::compare::outer::BlockComparator;
use crate::compare::result::{CompareStatistics, Verdict};
use crate::compare::sync::{find_snippet_end, SyncResult};
use crate::error::CompareError;
use crate::ir::BasicBlock;
use crate::semantics::equivalence::{EquivalenceChecker, Snippet, TimeBudget};
use crate::semantics::smt::{SmtBackend, SolverConfig, Z3Backend};
use log::{debug, warn};

/// Configuration of the snippet comparison
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompareConfig {
    pub solver: SolverConfig,
    /// Log every generated SMT-LIB2 query at info level
    pub dump_smt: bool,
}

impl CompareConfig {
    pub fn new(solver: SolverConfig) -> Self {
        Self {
            solver,
            dump_smt: false,
        }
    }
}

/// Where the controller stopped and with which verdict
struct Outcome {
    verdict: Verdict,
    pos_l: usize,
    pos_r: usize,
}

/// SMT-based comparator of divergent block suffixes
///
/// Every call to [`compare`](Self::compare) starts with the full configured
/// solver time, shared by all retries within that call.
pub struct SmtBlockComparator<B: SmtBackend = Z3Backend> {
    backend: B,
    config: CompareConfig,
    budget: TimeBudget,
    stats: CompareStatistics,
}

impl SmtBlockComparator<Z3Backend> {
    pub fn new(config: CompareConfig) -> Self {
        Self::with_backend(Z3Backend::new(), config)
    }
}

impl<B: SmtBackend> SmtBlockComparator<B> {
    pub fn with_backend(backend: B, config: CompareConfig) -> Self {
        let budget = TimeBudget::new(&config.solver);
        Self {
            backend,
            config,
            budget,
            stats: CompareStatistics::new(),
        }
    }

    pub fn statistics(&self) -> &CompareStatistics {
        &self.stats
    }

    /// Solver time left in the most recent comparison
    pub fn budget(&self) -> &TimeBudget {
        &self.budget
    }

    /// Compare the blocks from the cursors `inst_l` and `inst_r`, the
    /// positions of the instructions that just failed to match
    ///
    /// On a verdict the cursors point one instruction before the position
    /// where comparison resumes; the outer driver steps past it. On error they
    /// keep their entry values. In every case the mapping and the inlining
    /// decision are restored to their state on entry.
    pub fn compare<C: BlockComparator + ?Sized>(
        &mut self,
        outer: &mut C,
        left: &BasicBlock,
        right: &BasicBlock,
        inst_l: &mut usize,
        inst_r: &mut usize,
    ) -> Result<Verdict, CompareError> {
        debug!(
            "Starting SMT comparison at ({}, {}) of {} and {}",
            inst_l, inst_r, left.label, right.label
        );
        self.budget = TimeBudget::new(&self.config.solver);
        let entry = Attempt::begin(outer);
        outer.undo_last_inst_compare(left, right, *inst_l, *inst_r);

        let outcome = self.search_and_prove(outer, left, right, *inst_l, *inst_r);
        entry.rollback(outer);

        match outcome {
            Ok(Outcome {
                verdict,
                pos_l,
                pos_r,
            }) => {
                debug!("SMT comparison finished: {} at ({}, {})", verdict, pos_l, pos_r);
                *inst_l = pos_l.wrapping_sub(1);
                *inst_r = pos_r.wrapping_sub(1);
                Ok(verdict)
            }
            Err(err) => {
                match &err {
                    CompareError::UnsupportedOperation(_) | CompareError::OutOfTime => {
                        warn!("SMT comparison aborted: {}", err)
                    }
                    CompareError::NoSynchronizationPoint => debug!("SMT comparison aborted: {}", err),
                }
                Err(err)
            }
        }
    }

    fn search_and_prove<C: BlockComparator + ?Sized>(
        &mut self,
        outer: &mut C,
        left: &BasicBlock,
        right: &BasicBlock,
        start_l: usize,
        start_r: usize,
    ) -> Result<Outcome, CompareError> {
        let search_scope = Attempt::begin(outer);
        let (mut pos_l, mut pos_r) = (start_l, start_r);

        loop {
            let SyncResult::Found {
                end_l,
                end_r,
                pre_attempt,
            } = find_snippet_end(outer, left, right, pos_l, pos_r, &mut self.stats)
            else {
                return Err(CompareError::NoSynchronizationPoint);
            };

            let verdict = EquivalenceChecker::new(&mut self.backend, &mut self.budget, &mut self.stats)
                .dump_smt(self.config.dump_smt)
                .check(
                    &Snippet::new(left, start_l, end_l),
                    &Snippet::new(right, start_r, end_r),
                    pre_attempt.state(),
                    outer.mapping(),
                )?;

            if verdict.is_equivalent() {
                return Ok(Outcome {
                    verdict,
                    pos_l: end_l,
                    pos_r: end_r,
                });
            }

            search_scope.clone().rollback(outer);
            pos_l = end_l;
            pos_r = end_r + 1;
            if pos_r >= right.end() {
                pos_r = start_r;
                pos_l += 1;
                if pos_l >= left.end() {
                    debug!("All synchronization candidates exhausted");
                    return Ok(Outcome {
                        verdict: Verdict::NotEquivalent,
                        pos_l,
                        pos_r,
                    });
                }
            }
            debug!("Snippets not equal, retrying from ({}, {})", pos_l, pos_r);
        }
    }
}
