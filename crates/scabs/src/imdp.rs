//! Abstraction Assembler: the interval MDP and its PRISM exchange files.
//!
//! State layout
//! - `0` deadlock, `1` critical aggregate, `2` goal aggregate, `3 + r` region `r`.
//! - Specials, goal regions and critical regions are sinks: one unlabeled
//!   self-loop with probability `[1, 1]`. Regions without any usable action
//!   are sinks as well, so every state has at least one choice.
//!
//! Files (PRISM explicit format)
//! - `.sta` state list, `.lab` labels (`init`, `deadlock`, `reached`,
//!   `failed`), `.tra` transitions `s c t value a_<idx>`.

use std::io::{self, Write};

use crate::actions::ActionSet;
use crate::partition::Partition;
use crate::scenario::{SuccessorId, TransitionBounds};

pub const DEADLOCK_STATE: usize = 0;
pub const CRITICAL_STATE: usize = 1;
pub const GOAL_STATE: usize = 2;
/// Index of region 0; also the column/row offset of solver outputs.
pub const REGION_OFFSET: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MdpMode {
    /// Probability intervals.
    Interval,
    /// Point estimates only (a plain MDP).
    Estimate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemType {
    /// Probability of reaching the goal.
    Reachability,
    /// Probability of avoiding critical states; solved as `1 − P(failed)`.
    Safety,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Optimization {
    Max,
    Min,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub target: usize,
    pub lb: f64,
    pub ub: f64,
    pub estimate: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Choice {
    /// `None` for sink self-loops.
    pub action: Option<usize>,
    pub transitions: Vec<Transition>,
}

impl Choice {
    fn self_loop(state: usize) -> Self {
        Self {
            action: None,
            transitions: vec![Transition {
                target: state,
                lb: 1.0,
                ub: 1.0,
                estimate: 1.0,
            }],
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.action.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelSize {
    pub states: usize,
    pub choices: usize,
    pub transitions: usize,
}

/// Assembled interval MDP.
#[derive(Clone, Debug)]
pub struct Imdp {
    pub states: Vec<Vec<Choice>>,
    goal_states: Vec<usize>,
    failed_states: Vec<usize>,
}

pub fn state_of(successor: SuccessorId) -> usize {
    match successor {
        SuccessorId::Critical => CRITICAL_STATE,
        SuccessorId::Goal => GOAL_STATE,
        SuccessorId::Region(r) => REGION_OFFSET + r,
    }
}

impl Imdp {
    /// Merge enabled actions and their bounds; `transitions[a]` belongs to action `a`.
    pub fn assemble(partition: &Partition, actions: &ActionSet, transitions: &[Option<TransitionBounds>]) -> Self {
        let n_states = REGION_OFFSET + partition.len();
        let mut states: Vec<Vec<Choice>> = Vec::with_capacity(n_states);
        for s in 0..REGION_OFFSET {
            states.push(vec![Choice::self_loop(s)]);
        }
        let mut goal_states = vec![GOAL_STATE];
        let mut failed_states = vec![DEADLOCK_STATE, CRITICAL_STATE];
        for r in 0..partition.len() {
            let s = REGION_OFFSET + r;
            if partition.is_goal(r) {
                goal_states.push(s);
                states.push(vec![Choice::self_loop(s)]);
                continue;
            }
            if partition.is_critical(r) {
                failed_states.push(s);
                states.push(vec![Choice::self_loop(s)]);
                continue;
            }
            let mut choices: Vec<Choice> = actions.enabled[r]
                .iter()
                .filter_map(|&a| transitions.get(a).and_then(Option::as_ref).map(|b| (a, b)))
                .map(|(a, b)| {
                    let mut tr = vec![Transition {
                        target: DEADLOCK_STATE,
                        lb: b.deadlock.0,
                        ub: b.deadlock.1,
                        estimate: b.deadlock_estimate,
                    }];
                    tr.extend(b.successors.iter().map(|x| Transition {
                        target: state_of(x.target),
                        lb: x.lb,
                        ub: x.ub,
                        estimate: x.estimate,
                    }));
                    Choice {
                        action: Some(a),
                        transitions: tr,
                    }
                })
                .collect();
            if choices.is_empty() {
                choices.push(Choice::self_loop(s));
            }
            states.push(choices);
        }
        let imdp = Self {
            states,
            goal_states,
            failed_states,
        };
        let size = imdp.size(MdpMode::Interval);
        tracing::info!(
            states = size.states,
            choices = size.choices,
            transitions = size.transitions,
            "interval MDP assembled"
        );
        imdp
    }

    fn kept(mode: MdpMode, t: &Transition) -> bool {
        match mode {
            MdpMode::Interval => true,
            MdpMode::Estimate => t.estimate > 0.0,
        }
    }

    pub fn size(&self, mode: MdpMode) -> ModelSize {
        ModelSize {
            states: self.states.len(),
            choices: self.states.iter().map(Vec::len).sum(),
            transitions: self
                .states
                .iter()
                .flatten()
                .map(|c| c.transitions.iter().filter(|t| Self::kept(mode, t)).count())
                .sum(),
        }
    }

    /// States that carry a probabilistic (non-sink) choice.
    pub fn active_states(&self) -> impl Iterator<Item = usize> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, c)| c.iter().any(|c| !c.is_self_loop()))
            .map(|(s, _)| s)
    }

    pub fn write_sta(&self, w: &mut impl Write) -> io::Result<()> {
        writeln!(w, "(x)")?;
        for s in 0..self.states.len() {
            writeln!(w, "{s}:({s})")?;
        }
        Ok(())
    }

    pub fn write_lab(&self, w: &mut impl Write) -> io::Result<()> {
        writeln!(w, "0=\"init\" 1=\"deadlock\" 2=\"reached\" 3=\"failed\"")?;
        for s in 0..self.states.len() {
            let mut labels: Vec<&str> = Vec::new();
            if s >= REGION_OFFSET {
                labels.push("0");
            }
            if s == DEADLOCK_STATE {
                labels.push("1");
            }
            if self.goal_states.contains(&s) {
                labels.push("2");
            }
            if self.failed_states.contains(&s) {
                labels.push("3");
            }
            if !labels.is_empty() {
                writeln!(w, "{s}: {}", labels.join(" "))?;
            }
        }
        Ok(())
    }

    pub fn write_tra(&self, w: &mut impl Write, mode: MdpMode) -> io::Result<()> {
        let size = self.size(mode);
        writeln!(w, "{} {} {}", size.states, size.choices, size.transitions)?;
        for (s, choices) in self.states.iter().enumerate() {
            for (c, choice) in choices.iter().enumerate() {
                for t in choice.transitions.iter().filter(|t| Self::kept(mode, t)) {
                    let value = match mode {
                        MdpMode::Interval => format!("[{},{}]", t.lb, t.ub),
                        MdpMode::Estimate => format!("{}", t.estimate),
                    };
                    match choice.action {
                        Some(a) => writeln!(w, "{s} {c} {} {value} a_{a}", t.target)?,
                        None => writeln!(w, "{s} {c} {} {value}", t.target)?,
                    }
                }
            }
        }
        Ok(())
    }
}

/// PCTL property for the solver.
///
/// Interval models are solved robustly: the adversary picks probabilities
/// inside the intervals against the optimizing policy.
pub fn specification(problem: ProblemType, opt: Optimization, horizon: usize, mode: MdpMode) -> String {
    let (label, maximize_prob) = match (problem, opt) {
        (ProblemType::Reachability, Optimization::Max) => ("reached", true),
        (ProblemType::Reachability, Optimization::Min) => ("reached", false),
        // Maximal safety = minimal probability of failing.
        (ProblemType::Safety, Optimization::Max) => ("failed", false),
        (ProblemType::Safety, Optimization::Min) => ("failed", true),
    };
    let op = match (mode, maximize_prob) {
        (MdpMode::Interval, true) => "Pmaxmin",
        (MdpMode::Interval, false) => "Pminmax",
        (MdpMode::Estimate, true) => "Pmax",
        (MdpMode::Estimate, false) => "Pmin",
    };
    format!("{op}=? [ F<={horizon} \"{label}\" ]")
}
