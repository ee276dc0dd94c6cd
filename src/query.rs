//! Query module: the declarative form of an instruction sequence pattern.
//!
//! Queries are built left to right from [`QueryStart`] and compiled into a
//! [`SequenceMatcher`](crate::SequenceMatcher) with [`SequenceQuery::compile`].
//!
//! ```
//! use mutequiv::*;
//!
//! let matcher = QueryStart::any()
//!     .zero_or_more(QueryStart::matching(any_instruction()))
//!     .then(opcode(Opcode::Iconst0))
//!     .then(opcode(Opcode::Ireturn))
//!     .compile(QueryParams::new().with_ignores(not_an_instruction()))
//!     .unwrap();
//!
//! let body = InstructionStream::new(vec![
//!     Instruction::op(Opcode::Iconst0),
//!     Instruction::Label(1),
//!     Instruction::op(Opcode::Ireturn),
//! ]);
//! assert!(matcher.matches(&mut Context::start(&body)));
//! ```

use crate::compiler::{QueryCompiler, QueryParams};
use crate::matcher::SequenceMatcher;
use crate::predicates::Predicate;
use crate::MutequivError;

#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Clause {
    /// Consumes one instruction the predicate accepts.
    Match(Predicate),
    /// Consumes one instruction the predicate rejects.
    Not(Predicate),
    /// Either sub-query, tried left first.
    Or(SequenceQuery, SequenceQuery),
    /// The sub-query repeated any number of times, as few as possible.
    ZeroOrMore(SequenceQuery),
}

#[derive(Debug, Clone, Default)]
pub struct SequenceQuery {
    clauses: Vec<Clause>,
}

impl SequenceQuery {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Appends a predicate, or every clause of another query.
    pub fn then(mut self, next: impl Into<SequenceQuery>) -> Self {
        self.clauses.extend(next.into().clauses);
        self
    }

    /// Appends a clause consuming one instruction that `p` rejects.
    pub fn not(mut self, p: Predicate) -> Self {
        self.clauses.push(Clause::Not(p));
        self
    }

    /// Replaces this query by the alternation of itself and `other`.
    pub fn or(self, other: impl Into<SequenceQuery>) -> Self {
        SequenceQuery { clauses: vec![Clause::Or(self, other.into())] }
    }

    pub fn zero_or_more(mut self, repeated: impl Into<SequenceQuery>) -> Self {
        self.clauses.push(Clause::ZeroOrMore(repeated.into()));
        self
    }

    pub fn one_or_more(self, repeated: impl Into<SequenceQuery>) -> Self {
        let repeated = repeated.into();
        self.then(repeated.clone()).zero_or_more(repeated)
    }

    pub fn compile(self, params: QueryParams) -> Result<SequenceMatcher, MutequivError> {
        QueryCompiler::compile(self, params)
    }
}

impl From<Predicate> for SequenceQuery {
    fn from(p: Predicate) -> Self {
        SequenceQuery { clauses: vec![Clause::Match(p)] }
    }
}

/// Entry points for building a query.
pub struct QueryStart;

impl QueryStart {
    /// An empty query; matching may begin anywhere.
    pub fn any() -> SequenceQuery {
        SequenceQuery::default()
    }

    pub fn matching(p: Predicate) -> SequenceQuery {
        SequenceQuery::from(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;
    use crate::predicates::{any_instruction, opcode};

    #[test]
    fn test_then_flattens() {
        let q = QueryStart::matching(opcode(Opcode::Iconst1))
            .then(QueryStart::matching(opcode(Opcode::Iconst0)).then(any_instruction()));
        assert_eq!(q.clauses().len(), 3);
        assert!(q.clauses().iter().all(|c| matches!(c, Clause::Match(_))));
    }

    #[test]
    fn test_or_wraps_both_sides() {
        let q = QueryStart::matching(opcode(Opcode::Iconst1))
            .then(opcode(Opcode::Ireturn))
            .or(opcode(Opcode::Iconst0));
        match q.clauses() {
            [Clause::Or(left, right)] => {
                assert_eq!(left.clauses().len(), 2);
                assert_eq!(right.clauses().len(), 1);
            }
            _ => panic!("Expected a single alternation"),
        }
    }

    #[test]
    fn test_one_or_more_expands() {
        let q = QueryStart::any().one_or_more(opcode(Opcode::Nop));
        match q.clauses() {
            [Clause::Match(_), Clause::ZeroOrMore(inner)] => assert_eq!(inner.clauses().len(), 1),
            _ => panic!("Expected match then repetition"),
        }
    }

    #[test]
    fn test_any_is_empty() {
        assert!(QueryStart::any().is_empty());
        let q = QueryStart::any().not(opcode(Opcode::Nop));
        assert!(matches!(q.clauses(), [Clause::Not(_)]));
    }
}
