//! Scenario Probability Engine.
//!
//! Purpose
//! - Turn i.i.d. noise samples into distribution-free transition intervals
//!   for every enabled action, using a precomputed scenario table.
//!
//! Conventions
//! - One noise set is drawn per run and shifted by each action's target.
//! - Successor lists put the critical aggregate first, then the goal
//!   aggregate, then ordinary regions in index order.
//! - Reported bounds follow the policy in `bounds`: 5 decimals, lower bounds
//!   at least `P_MIN`, upper bounds at most 1.

pub mod backend;
pub mod bounds;
mod cluster;
mod engine;
pub mod noise;
mod table;

pub use backend::{ActionBackend, Sequential, Threaded};
pub use cluster::{cluster_samples, singletons, Cluster};
pub use engine::{NoiseSet, ProbabilityEngine, ScenarioCfg, Successor, SuccessorId, TransitionBounds};
pub use noise::gaussian_samples;
pub use table::ScenarioTable;
