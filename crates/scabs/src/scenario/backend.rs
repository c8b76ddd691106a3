//! Execution backends for the per-action probability loop.
//!
//! Actions are independent and only read shared data, so the loop is a pure
//! map. Backends differ in how they schedule it, never in the result order.

use std::thread;

use crate::actions::Action;

use super::engine::{NoiseSet, ProbabilityEngine, TransitionBounds};

/// Maps the probability computation over actions.
pub trait ActionBackend: Sync {
    fn name(&self) -> &'static str;

    /// One entry per action, in input order. Actions without enabled regions
    /// yield `None`.
    fn run(&self, engine: &ProbabilityEngine<'_>, actions: &[Action], noise: &NoiseSet) -> Vec<Option<TransitionBounds>>;
}

/// Plain loop on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential;

/// Fixed pool of scoped worker threads, one contiguous chunk each.
#[derive(Clone, Copy, Debug)]
pub struct Threaded {
    pub workers: usize,
}

fn compute_chunk(
    engine: &ProbabilityEngine<'_>,
    actions: &[Action],
    noise: &NoiseSet,
    print_every: usize,
) -> Vec<Option<TransitionBounds>> {
    actions
        .iter()
        .map(|a| {
            if a.enabled_in.is_empty() {
                return None;
            }
            let b = engine.for_action(a, noise);
            if a.idx % print_every == 0 {
                tracing::debug!(action = a.idx, transitions = b.successors.len(), "probabilities computed");
            }
            Some(b)
        })
        .collect()
}

fn print_every(n: usize) -> usize {
    (n / 10).clamp(1, 100)
}

impl ActionBackend for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn run(&self, engine: &ProbabilityEngine<'_>, actions: &[Action], noise: &NoiseSet) -> Vec<Option<TransitionBounds>> {
        compute_chunk(engine, actions, noise, print_every(actions.len()))
    }
}

impl ActionBackend for Threaded {
    fn name(&self) -> &'static str {
        "threaded"
    }

    fn run(&self, engine: &ProbabilityEngine<'_>, actions: &[Action], noise: &NoiseSet) -> Vec<Option<TransitionBounds>> {
        let workers = self.workers.max(1);
        if workers == 1 || actions.len() < 2 {
            return Sequential.run(engine, actions, noise);
        }
        let every = print_every(actions.len());
        let chunk = actions.len().div_ceil(workers);
        thread::scope(|s| {
            let handles: Vec<_> = actions
                .chunks(chunk)
                .map(|part| s.spawn(move || compute_chunk(engine, part, noise, every)))
                .collect();
            let mut out = Vec::with_capacity(actions.len());
            for h in handles {
                match h.join() {
                    Ok(part) => out.extend(part),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            out
        })
    }
}
