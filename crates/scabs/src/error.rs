//! Error taxonomy shared by all pipeline stages.
//!
//! Configuration defects and degenerate abstractions are fatal and surface as
//! `AbstractionError`. Numeric degeneracies (singular probes, empty successor
//! sets, flat hulls) are not errors; they come back as `Option` or empty values.

use std::fmt;

/// Errors surfaced by the abstraction pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum AbstractionError {
    /// A configuration value is malformed (non-positive widths, bad confidence, ...).
    InvalidConfig { reason: String },
    /// Two inputs disagree on a dimension.
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    /// The state matrix of a (sub)system is not invertible, so no BRS exists.
    SingularDynamics { states: Vec<usize> },
    /// The scenario table is incomplete or inconsistent.
    ScenarioTable { reason: String },
    /// No action is enabled in any region; the abstraction is unusable.
    NoActionsEnabled { actions: usize, regions: usize },
    /// Clustering lost or duplicated samples.
    ClusterMismatch { clustered: usize, samples: usize },
    /// Output read back from the external solver is malformed.
    SolverOutput { reason: String },
}

impl AbstractionError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn table(reason: impl Into<String>) -> Self {
        Self::ScenarioTable {
            reason: reason.into(),
        }
    }

    pub(crate) fn solver(reason: impl Into<String>) -> Self {
        Self::SolverOutput {
            reason: reason.into(),
        }
    }

    pub(crate) fn check_dim(what: &'static str, expected: usize, got: usize) -> Result<()> {
        if expected == got {
            Ok(())
        } else {
            Err(Self::DimensionMismatch {
                what,
                expected,
                got,
            })
        }
    }
}

impl fmt::Display for AbstractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            Self::DimensionMismatch {
                what,
                expected,
                got,
            } => write!(f, "{what}: expected dimension {expected}, got {got}"),
            Self::SingularDynamics { states } => write!(
                f,
                "state matrix restricted to dimensions {states:?} is singular; cannot build backward reachable set"
            ),
            Self::ScenarioTable { reason } => write!(f, "scenario table: {reason}"),
            Self::NoActionsEnabled { actions, regions } => write!(
                f,
                "none of the {actions} actions is enabled in any of the {regions} regions"
            ),
            Self::ClusterMismatch { clustered, samples } => write!(
                f,
                "clusters hold {clustered} samples but {samples} were drawn"
            ),
            Self::SolverOutput { reason } => write!(f, "solver output: {reason}"),
        }
    }
}

impl std::error::Error for AbstractionError {}

pub type Result<T> = std::result::Result<T, AbstractionError>;
