//! Equivalence decision for a pair of snippets
//!
//! Both snippets are encoded into one script. Inputs of the left snippet are
//! tied to their right counterparts through the mapping from before the
//! synchronization search, and the outputs are compared through the mapping
//! the search left behind. The snippets are equivalent iff the script
//! asserting that some output pair differs is unsatisfiable.

use crate::compare::mapping::MappingState;
use crate::compare::result::{CompareStatistics, Verdict};
use crate::error::CompareError;
use crate::ir::{BasicBlock, Local};
use crate::semantics::encoder::{sort_of_type, Side, SnippetEncoder};
use crate::semantics::smt::{SatResult, SmtBackend, SolverConfig};
use crate::semantics::terms::{SmtOp, SmtScript, SmtTerm, Sort};
use log::{debug, info, trace};
use std::time::{Duration, Instant};

/// Solver time left for the whole top-level comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudget {
    remaining: Option<Duration>,
}

impl TimeBudget {
    /// Budget equal to the configured timeout; no timeout means unlimited
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            remaining: config.timeout,
        }
    }

    pub fn unlimited() -> Self {
        Self { remaining: None }
    }

    /// Time left, which is also the timeout of the next solver call
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    /// Deduct time spent in a solver call that did not prove equivalence
    pub fn charge(&mut self, elapsed: Duration) -> Result<(), CompareError> {
        match self.remaining {
            None => Ok(()),
            Some(remaining) if elapsed >= remaining => {
                self.remaining = Some(Duration::ZERO);
                Err(CompareError::OutOfTime)
            }
            Some(remaining) => {
                self.remaining = Some(remaining - elapsed);
                Ok(())
            }
        }
    }
}

/// Half-open instruction range `[start, end)` of a block
#[derive(Debug, Clone, Copy)]
pub struct Snippet<'a> {
    pub block: &'a BasicBlock,
    pub start: usize,
    pub end: usize,
}

impl<'a> Snippet<'a> {
    pub fn new(block: &'a BasicBlock, start: usize, end: usize) -> Self {
        Self { block, start, end }
    }

    pub fn len(&self) -> usize {
        self.end.min(self.block.end()).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn defines(&self, name: &str) -> bool {
        self.block.defines_in(name, self.start, self.end)
    }
}

/// Script for one snippet pair, along with the output pairs it compares
#[derive(Debug, Clone)]
pub struct EncodedQuery {
    script: SmtScript,
    outputs: Vec<(Local, Local)>,
}

impl EncodedQuery {
    /// Encode both snippets
    ///
    /// `pre_attempt` seeds the inputs of the left snippet; `current` supplies
    /// the cross-mapped pairs, including those recorded by the synchronization
    /// search.
    pub fn build(
        left: &Snippet<'_>,
        right: &Snippet<'_>,
        pre_attempt: &MappingState,
        current: &MappingState,
    ) -> Result<Self, CompareError> {
        let mut script = SmtScript::new();
        let mut encoder = SnippetEncoder::new(&mut script);

        for inst in &left.block.instructions[left.start..left.end.min(left.block.end())] {
            encoder.seed_input_equalities(
                inst,
                &pre_attempt.sn_map_l,
                &current.mapped_values_by_sn,
            )?;
            encoder.encode_instruction(Side::Left, inst)?;
        }
        encoder.encode_range(Side::Right, right.block, right.start, right.end)?;

        let outputs: Vec<(Local, Local)> = current
            .mapped_values_by_sn
            .values()
            .filter(|(l, r)| left.defines(&l.name) || right.defines(&r.name))
            .cloned()
            .collect();

        let mut differences = Vec::with_capacity(outputs.len());
        for (l, r) in &outputs {
            let sort = sort_of_type(&l.ty)?;
            if sort != sort_of_type(&r.ty)? {
                return Err(CompareError::unsupported(format!(
                    "output {} of type {} paired with {} of type {}",
                    l, l.ty, r, r.ty
                )));
            }
            let lt = encoder.local_term(Side::Left, l)?;
            let rt = encoder.local_term(Side::Right, r)?;
            differences.push(values_equal(sort, lt, rt).not());
        }
        if !differences.is_empty() {
            script.assert(SmtTerm::or(differences));
        }

        Ok(Self { script, outputs })
    }

    pub fn script(&self) -> &SmtScript {
        &self.script
    }

    pub fn outputs(&self) -> &[(Local, Local)] {
        &self.outputs
    }

    /// Complete SMT-LIB2 text of the query, including `(check-sat)`
    pub fn to_smtlib(&self) -> String {
        let mut text = self.script.to_smtlib();
        text.push_str("(check-sat)\n");
        text
    }
}

/// Floating outputs are equal when IEEE-equal or both NaN
fn values_equal(sort: Sort, l: SmtTerm, r: SmtTerm) -> SmtTerm {
    match sort {
        Sort::Float { .. } => SmtTerm::or(vec![
            SmtTerm::binary(SmtOp::FpEq, l.clone(), r.clone()),
            SmtTerm::and(vec![
                SmtTerm::unary(SmtOp::FpIsNaN, l),
                SmtTerm::unary(SmtOp::FpIsNaN, r),
            ]),
        ]),
        _ => l.eq(r),
    }
}

/// Runs snippet queries against a backend under a shared time budget
pub struct EquivalenceChecker<'a, B: SmtBackend + ?Sized> {
    backend: &'a mut B,
    budget: &'a mut TimeBudget,
    stats: &'a mut CompareStatistics,
    dump_smt: bool,
}

impl<'a, B: SmtBackend + ?Sized> EquivalenceChecker<'a, B> {
    pub fn new(
        backend: &'a mut B,
        budget: &'a mut TimeBudget,
        stats: &'a mut CompareStatistics,
    ) -> Self {
        Self {
            backend,
            budget,
            stats,
            dump_smt: false,
        }
    }

    /// Log every query at info level
    pub fn dump_smt(mut self, dump: bool) -> Self {
        self.dump_smt = dump;
        self
    }

    /// Decide whether two snippets compute the same outputs
    pub fn check(
        &mut self,
        left: &Snippet<'_>,
        right: &Snippet<'_>,
        pre_attempt: &MappingState,
        current: &MappingState,
    ) -> Result<Verdict, CompareError> {
        if left.is_empty() || right.is_empty() {
            debug!(
                "Empty snippet ({} left, {} right instructions), not equal",
                left.len(),
                right.len()
            );
            self.stats.short_circuited += 1;
            return Ok(Verdict::NotEquivalent);
        }

        let query = EncodedQuery::build(left, right, pre_attempt, current)?;
        if query.outputs().is_empty() {
            debug!("Snippets have no mapped outputs, not equal");
            self.stats.short_circuited += 1;
            return Ok(Verdict::NotEquivalent);
        }

        if self.dump_smt {
            info!("SMT query:\n{}", query.to_smtlib());
        } else {
            trace!("SMT query:\n{}", query.to_smtlib());
        }

        let start = Instant::now();
        let result = self.backend.check(query.script(), self.budget.remaining());
        let elapsed = start.elapsed();
        self.stats.solver_calls += 1;
        self.stats.solver_time += elapsed;
        let result = result?;

        debug!("Solver returned {:?} after {:?}", result, elapsed);
        match result {
            SatResult::Unsat => {
                self.stats.unsat_results += 1;
                Ok(Verdict::Equivalent)
            }
            SatResult::Sat | SatResult::Unknown => {
                if result == SatResult::Sat {
                    self.stats.sat_results += 1;
                } else {
                    self.stats.unknown_results += 1;
                }
                self.budget.charge(elapsed)?;
                Ok(Verdict::NotEquivalent)
            }
        }
    }
}
