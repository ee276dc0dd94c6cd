//! Compiler module: turns a [`SequenceQuery`] into an executable [`SequenceMatcher`].
//!
//! Compilation checks slot usage in clause order and lowers the clauses into a flat
//! program of tests, splits and jumps for the matcher to run.

use crate::matcher::SequenceMatcher;
use crate::predicates::Predicate;
use crate::query::{Clause, SequenceQuery};
use crate::slot::{SlotKey, SlotWrite};
use crate::MutequivError;

/// Settings bound into a matcher at compile time.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    ignores: Option<Predicate>,
    bound: Vec<SlotKey>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions accepted by `ignores` are skipped during matching.
    pub fn with_ignores(mut self, ignores: Predicate) -> Self {
        self.ignores = Some(ignores);
        self
    }

    /// Declares a slot the caller binds in the context before matching.
    pub fn with_bound<T>(mut self, slot: SlotWrite<T>) -> Self {
        self.bound.push(slot.key());
        self
    }
}

/// One step of a lowered query.
#[derive(Debug, Clone)]
pub(crate) enum Inst {
    /// Consumes one instruction the predicate accepts.
    Test(Predicate),
    /// Continues at both targets; the first is preferred.
    Split(usize, usize),
    Jump(usize),
    Match,
}

pub struct QueryCompiler;

impl QueryCompiler {
    pub fn compile(query: SequenceQuery, params: QueryParams) -> Result<SequenceMatcher, MutequivError> {
        if let Some(ignores) = &params.ignores {
            if let Some(key) = ignores.usage().writes.first() {
                return Err(MutequivError::CapturingIgnore(key.name.to_string()));
            }
            if let Some(key) = ignores.usage().reads.first() {
                return Err(MutequivError::UnboundSlot(key.name.to_string()));
            }
        }
        let mut bound = params.bound.clone();
        check_slots(query.clauses(), &mut bound)?;
        let program = lower(query.clauses());
        Ok(SequenceMatcher::new(program, params.ignores))
    }
}

/// Walks the clauses in order, failing on the first read of a slot that is not
/// certainly bound at that point. `bound` is extended with the slots every path binds.
fn check_slots(clauses: &[Clause], bound: &mut Vec<SlotKey>) -> Result<(), MutequivError> {
    for clause in clauses {
        match clause {
            Clause::Match(p) => {
                check_reads(p, bound)?;
                for w in &p.usage().writes {
                    if !bound.contains(w) {
                        bound.push(*w);
                    }
                }
            }
            Clause::Not(p) => check_reads(p, bound)?,
            Clause::Or(left, right) => {
                let mut l = bound.clone();
                let mut r = bound.clone();
                check_slots(left.clauses(), &mut l)?;
                check_slots(right.clauses(), &mut r)?;
                for w in l {
                    if r.contains(&w) && !bound.contains(&w) {
                        bound.push(w);
                    }
                }
            }
            Clause::ZeroOrMore(inner) => {
                // may run zero times, so nothing it binds is guaranteed afterwards
                check_slots(inner.clauses(), &mut bound.clone())?;
            }
        }
    }
    Ok(())
}

fn check_reads(p: &Predicate, bound: &[SlotKey]) -> Result<(), MutequivError> {
    match p.usage().reads.iter().find(|r| !bound.contains(r)) {
        Some(key) => Err(MutequivError::UnboundSlot(key.name.to_string())),
        None => Ok(()),
    }
}

fn lower(clauses: &[Clause]) -> Vec<Inst> {
    let mut program = Vec::new();
    emit(clauses, &mut program);
    program.push(Inst::Match);
    program
}

fn emit(clauses: &[Clause], program: &mut Vec<Inst>) {
    for clause in clauses {
        match clause {
            Clause::Match(p) => program.push(Inst::Test(p.clone())),
            Clause::Not(p) => program.push(Inst::Test(p.clone().negate())),
            Clause::Or(left, right) => {
                let split = program.len();
                program.push(Inst::Split(split + 1, split + 1));
                emit(left.clauses(), program);
                let jump = program.len();
                program.push(Inst::Jump(jump));
                program[split] = Inst::Split(split + 1, program.len());
                emit(right.clauses(), program);
                program[jump] = Inst::Jump(program.len());
            }
            Clause::ZeroOrMore(inner) => {
                // lazy: leaving the loop is preferred over another round
                let split = program.len();
                program.push(Inst::Split(split + 1, split + 1));
                emit(inner.clauses(), program);
                program.push(Inst::Jump(split));
                program[split] = Inst::Split(program.len(), split + 1);
            }
        }
    }
}
