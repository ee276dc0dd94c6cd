//! Matcher module: runs a compiled query against one instruction stream.
//!
//! The matcher steps through the instructions the ignore predicate lets through once,
//! keeping every partial match alive side by side (a Pike-style VM). A thread is a
//! program position plus its own [`Context`]; threads with the same position and the
//! same bindings are merged, so work per instruction is bounded by the program size and
//! nothing recurses on the input. The caller's context only ever receives the bindings
//! of a thread that reached the end of the pattern.

use crate::compiler::Inst;
use crate::context::Context;
use crate::ir::InsnRef;
use crate::predicates::Predicate;

/// A compiled, immutable query. Safe to share between threads and reuse for any number
/// of evaluations.
#[derive(Debug, Clone)]
pub struct SequenceMatcher {
    program: Vec<Inst>,
    ignores: Option<Predicate>,
}

/// Threads waiting on the same input position, highest priority first.
struct ThreadList<'a> {
    threads: Vec<(usize, Context<'a>)>,
    seen: Vec<Vec<Context<'a>>>,
}

impl<'a> ThreadList<'a> {
    fn new(program_len: usize) -> Self {
        Self { threads: Vec::new(), seen: vec![Vec::new(); program_len] }
    }

    /// Follows splits and jumps from `pc` without consuming input. Returns the context of
    /// the first thread to reach the end of the pattern.
    fn add(&mut self, program: &[Inst], pc: usize, ctx: Context<'a>) -> Option<Context<'a>> {
        let mut pending = vec![(pc, ctx)];
        while let Some((pc, ctx)) = pending.pop() {
            if self.seen[pc].iter().any(|other| other.same_bindings(&ctx)) {
                continue;
            }
            self.seen[pc].push(ctx.clone());
            match &program[pc] {
                Inst::Match => return Some(ctx),
                Inst::Jump(to) => pending.push((*to, ctx)),
                Inst::Split(first, second) => {
                    pending.push((*second, ctx.clone()));
                    pending.push((*first, ctx));
                }
                Inst::Test(_) => self.threads.push((pc, ctx)),
            }
        }
        None
    }
}

impl SequenceMatcher {
    pub(crate) fn new(program: Vec<Inst>, ignores: Option<Predicate>) -> Self {
        Self { program, ignores }
    }

    /// Looks for the pattern starting at any significant instruction. On a match `ctx`
    /// takes the bindings of the winning thread; otherwise it is left as it was.
    pub fn matches(&self, ctx: &mut Context<'_>) -> bool {
        let insns = self.significant(ctx);
        let mut current = ThreadList::new(self.program.len());
        for pos in 0..=insns.len() {
            // a fresh attempt from here, behind every thread already running
            if let Some(found) = current.add(&self.program, 0, ctx.clone()) {
                log::trace!("sequence matched ending at significant offset {}", pos);
                *ctx = found;
                return true;
            }
            let Some(insn) = insns.get(pos) else {
                break;
            };
            let mut next = ThreadList::new(self.program.len());
            for (pc, mut thread) in current.threads {
                let Inst::Test(p) = &self.program[pc] else {
                    continue;
                };
                if !p.test(&mut thread, insn) {
                    continue;
                }
                if let Some(found) = next.add(&self.program, pc + 1, thread) {
                    log::trace!("sequence matched ending at significant offset {}", pos + 1);
                    *ctx = found;
                    return true;
                }
            }
            current = next;
        }
        false
    }

    fn significant<'s>(&self, ctx: &Context<'s>) -> Vec<&'s InsnRef> {
        let stream = ctx.stream();
        match &self.ignores {
            Some(ignores) => {
                // ignore predicates never capture, the scratch context stays empty
                let mut scratch = ctx.clone();
                stream.iter().filter(|insn| !ignores.test(&mut scratch, insn)).collect()
            }
            None => stream.iter().collect(),
        }
    }
}
