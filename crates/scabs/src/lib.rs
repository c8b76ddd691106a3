//! Scenario-based abstraction of linear stochastic control systems.
//!
//! Purpose
//! - Turn a continuous-state system with additive Gaussian noise into a
//!   finite interval MDP whose transition intervals hold with a chosen
//!   confidence, ready for an external model checker.
//!
//! Conventions
//! - Stages run in order: `partition` → `backreach` → `actions` →
//!   `scenario` → `imdp`; `pipeline::build` chains them.
//! - This crate never touches the filesystem or spawns processes; exchange
//!   files are written to any `std::io::Write` and solver results come back
//!   as `solution::RawSolution`.
//! - Configuration errors are `error::AbstractionError`; numeric
//!   degeneracies come back as `Option` or empty values.

pub mod actions;
pub mod backreach;
pub mod error;
pub mod geom;
pub mod imdp;
pub mod lp;
pub mod model;
pub mod partition;
pub mod pipeline;
pub mod scenario;
pub mod solution;
pub mod timing;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::{AbstractionError, Result};
pub use geom::GeomCfg;
pub use pipeline::{build, BuildOutput, Problem};

/// Common imports for callers assembling a problem by hand.
pub mod prelude {
    pub use crate::actions::{ActionSet, ActionSpec, TargetCfg};
    pub use crate::backreach::{BackreachCfg, ErrorBox};
    pub use crate::imdp::{Imdp, MdpMode, Optimization, ProblemType};
    pub use crate::model::{ActuationMode, DynamicsModel, LinearDynamics};
    pub use crate::partition::{BlockAxis, Partition, PartitionCfg, SpecBox, SpecRegion};
    pub use crate::pipeline::{build, BuildOutput, Problem};
    pub use crate::scenario::{ActionBackend, ScenarioCfg, ScenarioTable, Sequential, Threaded};
    pub use crate::solution::{RawSolution, Solution};
    pub use crate::GeomCfg;
}
