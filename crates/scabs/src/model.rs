//! Dynamics collaborator types.
//!
//! The system is the discrete-time affine map
//! `x⁺ = A x + B u + q + w`, `u ∈ [u_min, u_max]`, `w ~ N(0, Σ)`.
//!
//! Conventions
//! - `DynamicsModel` and `ActuationMode` are tagged variants; downstream code
//!   matches on them instead of probing optional fields.
//! - Subsystems are the connected components of the state/control coupling
//!   graph of `(A, B)`. A block-diagonal system splits into several.

use nalgebra::{DMatrix, DVector};

use crate::backreach::{BackreachCfg, ErrorBox};
use crate::error::{AbstractionError, Result};

/// Affine dynamics with a box of admissible controls and Gaussian noise.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearDynamics {
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>,
    pub q: DVector<f64>,
    pub u_min: DVector<f64>,
    pub u_max: DVector<f64>,
    pub noise_cov: DMatrix<f64>,
}

impl LinearDynamics {
    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    pub fn control_dim(&self) -> usize {
        self.b.ncols()
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.state_dim();
        AbstractionError::check_dim("A columns", n, self.a.ncols())?;
        AbstractionError::check_dim("B rows", n, self.b.nrows())?;
        AbstractionError::check_dim("q", n, self.q.len())?;
        AbstractionError::check_dim("u_min", self.control_dim(), self.u_min.len())?;
        AbstractionError::check_dim("u_max", self.control_dim(), self.u_max.len())?;
        AbstractionError::check_dim("noise covariance rows", n, self.noise_cov.nrows())?;
        AbstractionError::check_dim("noise covariance columns", n, self.noise_cov.ncols())?;
        if let Some(k) = (0..self.control_dim()).find(|&k| self.u_min[k] > self.u_max[k]) {
            return Err(AbstractionError::invalid(format!(
                "control bound {k} is empty: [{}, {}]",
                self.u_min[k], self.u_max[k]
            )));
        }
        if (&self.noise_cov - self.noise_cov.transpose()).amax() > 1e-9 * (1.0 + self.noise_cov.amax()) {
            return Err(AbstractionError::invalid("noise covariance is not symmetric"));
        }
        Ok(())
    }

    /// Dynamics of one subsystem in its reduced coordinates.
    pub fn restrict(&self, sub: &Subsystem) -> LinearDynamics {
        let s = &sub.states;
        let c = &sub.controls;
        LinearDynamics {
            a: DMatrix::from_fn(s.len(), s.len(), |i, j| self.a[(s[i], s[j])]),
            b: DMatrix::from_fn(s.len(), c.len(), |i, j| self.b[(s[i], c[j])]),
            q: DVector::from_fn(s.len(), |i, _| self.q[s[i]]),
            u_min: DVector::from_fn(c.len(), |k, _| self.u_min[c[k]]),
            u_max: DVector::from_fn(c.len(), |k, _| self.u_max[c[k]]),
            noise_cov: DMatrix::from_fn(s.len(), s.len(), |i, j| self.noise_cov[(s[i], s[j])]),
        }
    }
}

/// Nominal dynamics, optionally with a polytopic set of state matrices.
#[derive(Clone, Debug, PartialEq)]
pub enum DynamicsModel {
    Deterministic(LinearDynamics),
    /// `a_set` holds the vertices of the uncertainty set of `A`; the nominal
    /// matrix is `nominal.a`.
    Parametric {
        nominal: LinearDynamics,
        a_set: Vec<DMatrix<f64>>,
    },
}

impl DynamicsModel {
    pub fn nominal(&self) -> &LinearDynamics {
        match self {
            DynamicsModel::Deterministic(d) => d,
            DynamicsModel::Parametric { nominal, .. } => nominal,
        }
    }

    pub fn is_parametric(&self) -> bool {
        matches!(self, DynamicsModel::Parametric { .. })
    }

    pub fn validate(&self) -> Result<()> {
        let nominal = self.nominal();
        nominal.validate()?;
        if let DynamicsModel::Parametric { a_set, .. } = self {
            if a_set.is_empty() {
                return Err(AbstractionError::invalid("parametric model without parameter matrices"));
            }
            let n = nominal.state_dim();
            for a in a_set {
                AbstractionError::check_dim("parametric A rows", n, a.nrows())?;
                AbstractionError::check_dim("parametric A columns", n, a.ncols())?;
            }
        }
        Ok(())
    }

    pub fn restrict(&self, sub: &Subsystem) -> DynamicsModel {
        match self {
            DynamicsModel::Deterministic(d) => DynamicsModel::Deterministic(d.restrict(sub)),
            DynamicsModel::Parametric { nominal, a_set } => {
                let s = &sub.states;
                DynamicsModel::Parametric {
                    nominal: nominal.restrict(sub),
                    a_set: a_set
                        .iter()
                        .map(|a| DMatrix::from_fn(s.len(), s.len(), |i, j| a[(s[i], s[j])]))
                        .collect(),
                }
            }
        }
    }

    /// Epistemic error box over `points`: bounds of `(A_i − A) x`.
    ///
    /// Zero for deterministic models and for an empty point set.
    pub fn epistemic_error(&self, points: &[DVector<f64>]) -> ErrorBox {
        let n = self.nominal().state_dim();
        let DynamicsModel::Parametric { nominal, a_set } = self else {
            return ErrorBox::zeros(n);
        };
        let mut neg = DVector::zeros(n);
        let mut pos = DVector::zeros(n);
        for a_i in a_set {
            let delta = a_i - &nominal.a;
            for x in points {
                let d = &delta * x;
                for k in 0..n {
                    neg[k] = f64::min(neg[k], d[k]);
                    pos[k] = f64::max(pos[k], d[k]);
                }
            }
        }
        ErrorBox { neg, pos }
    }
}

/// How much of the target the controls can hit exactly.
#[derive(Clone, Debug, PartialEq)]
pub enum ActuationMode {
    /// Every target is reachable; control error is zero.
    FullyActuated,
    /// Targets are reached up to the error profiles in `BackreachCfg`.
    Underactuated(BackreachCfg),
}

impl ActuationMode {
    pub fn default_error(&self, n: usize) -> ErrorBox {
        match self {
            ActuationMode::FullyActuated => ErrorBox::zeros(n),
            ActuationMode::Underactuated(cfg) => cfg.default.clone(),
        }
    }

    /// Error profile for manually added targets; falls back to the default one.
    pub fn extra_error(&self, n: usize) -> ErrorBox {
        match self {
            ActuationMode::FullyActuated => ErrorBox::zeros(n),
            ActuationMode::Underactuated(cfg) => cfg.extra.clone().unwrap_or_else(|| cfg.default.clone()),
        }
    }
}

/// State and control indices of one independent block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subsystem {
    pub states: Vec<usize>,
    pub controls: Vec<usize>,
}

/// Split `(A, B)` into independent subsystems.
///
/// States are coupled when either `A[i,j]` or `A[j,i]` is non-zero, or when a
/// control acts on both. Subsystems are ordered by their smallest state index;
/// controls acting on no state are dropped.
pub fn connected_components(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Vec<Subsystem> {
    let n = a.nrows();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    fn union(parent: &mut [usize], i: usize, j: usize) {
        let ri = find(parent, i);
        let rj = find(parent, j);
        if ri != rj {
            parent[ri.max(rj)] = ri.min(rj);
        }
    }
    for i in 0..n {
        for j in 0..n {
            if i != j && a[(i, j)] != 0.0 {
                union(&mut parent, i, j);
            }
        }
    }
    for k in 0..b.ncols() {
        let acted: Vec<usize> = (0..n).filter(|&i| b[(i, k)] != 0.0).collect();
        for w in acted.windows(2) {
            union(&mut parent, w[0], w[1]);
        }
    }
    let mut subs: Vec<Subsystem> = Vec::new();
    let mut root_of_sub: Vec<usize> = Vec::new();
    for i in 0..n {
        let r = find(&mut parent, i);
        match root_of_sub.iter().position(|&x| x == r) {
            Some(s) => subs[s].states.push(i),
            None => {
                root_of_sub.push(r);
                subs.push(Subsystem {
                    states: vec![i],
                    controls: Vec::new(),
                });
            }
        }
    }
    for k in 0..b.ncols() {
        if let Some(i) = (0..n).find(|&i| b[(i, k)] != 0.0) {
            let r = find(&mut parent, i);
            if let Some(s) = root_of_sub.iter().position(|&x| x == r) {
                subs[s].controls.push(k);
            }
        }
    }
    subs
}

/// Square and numerically full rank.
pub fn is_invertible(a: &DMatrix<f64>) -> bool {
    if !a.is_square() || a.nrows() == 0 {
        return false;
    }
    let tol = 1e-12 * (1.0 + a.amax());
    a.rank(tol) == a.nrows()
}
