//! Backward reachable sets (BRS).
//!
//! For the affine step `x⁺ = A x + B u + q`, the states that reach a target
//! `t` with some admissible control are `A⁻¹ t + BRS₀`, where
//! `BRS₀ = { −A⁻¹ (B u + q) : u ∈ U }` is the zero-target set. It is a
//! polytope spanned by the images of the control-box vertices.
//!
//! The inflated set pads `BRS₀` by `A⁻¹ E` for the control-error box `E`:
//! a state is admitted when it can steer to some point of `t + E`. The error
//! box is then carried into the probability computation, so the abstraction
//! stays sound.
//!
//! One `BackreachSet` exists per (subsystem, error profile); actions share it
//! through `Arc` and differ only in the shift `A⁻¹ t`.

use nalgebra::{DMatrix, DVector, Vector2};

use crate::error::{AbstractionError, Result};
use crate::geom::{box_vertices, convex_hull_2d, dedup_points, GeomCfg};
use crate::lp::ContainmentLp;
use crate::model::{is_invertible, LinearDynamics};

/// Per-dimension error bounds `neg <= 0 <= pos`.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorBox {
    pub neg: DVector<f64>,
    pub pos: DVector<f64>,
}

impl ErrorBox {
    pub fn zeros(n: usize) -> Self {
        Self {
            neg: DVector::zeros(n),
            pos: DVector::zeros(n),
        }
    }

    /// Build from explicit bounds; requires `neg <= 0 <= pos` per axis.
    pub fn from_bounds(neg: DVector<f64>, pos: DVector<f64>) -> Result<Self> {
        AbstractionError::check_dim("error box", neg.len(), pos.len())?;
        if neg.iter().zip(pos.iter()).any(|(n, p)| !(*n <= 0.0 && *p >= 0.0)) {
            return Err(AbstractionError::invalid("error box must satisfy neg <= 0 <= pos"));
        }
        Ok(Self { neg, pos })
    }

    pub fn dim(&self) -> usize {
        self.neg.len()
    }

    pub fn is_zero(&self) -> bool {
        self.neg.iter().chain(self.pos.iter()).all(|v| *v == 0.0)
    }

    pub fn vertices(&self) -> Vec<DVector<f64>> {
        box_vertices(&self.neg, &self.pos)
    }

    pub fn restrict(&self, dims: &[usize]) -> ErrorBox {
        ErrorBox {
            neg: DVector::from_iterator(dims.len(), dims.iter().map(|&d| self.neg[d])),
            pos: DVector::from_iterator(dims.len(), dims.iter().map(|&d| self.pos[d])),
        }
    }

    /// Place a reduced box into `n` dimensions; other axes are zero.
    pub fn embed(&self, n: usize, dims: &[usize]) -> ErrorBox {
        let mut out = ErrorBox::zeros(n);
        for (j, &d) in dims.iter().enumerate() {
            out.neg[d] = self.neg[j];
            out.pos[d] = self.pos[j];
        }
        out
    }

    pub fn add(&self, other: &ErrorBox) -> ErrorBox {
        ErrorBox {
            neg: &self.neg + &other.neg,
            pos: &self.pos + &other.pos,
        }
    }
}

/// Error profiles of an underactuated system.
#[derive(Clone, Debug, PartialEq)]
pub struct BackreachCfg {
    pub default: ErrorBox,
    /// Profile for manually added targets.
    pub extra: Option<ErrorBox>,
}

/// Zero-target backward reachable set with its inflated variant.
#[derive(Clone, Debug)]
pub struct BackreachSet {
    pub name: String,
    pub error: ErrorBox,
    /// Images of the control-box vertices.
    pub verts: Vec<DVector<f64>>,
    /// `verts ⊕ A⁻¹ E`, reduced to extreme points in 2-D.
    pub verts_infl: Vec<DVector<f64>>,
    pub a_inv: DMatrix<f64>,
    lp: ContainmentLp,
}

impl BackreachSet {
    pub fn compute(name: impl Into<String>, dynamics: &LinearDynamics, error: ErrorBox, cfg: GeomCfg) -> Result<Self> {
        let name = name.into();
        let n = dynamics.state_dim();
        AbstractionError::check_dim("control error box", n, error.dim())?;
        if !is_invertible(&dynamics.a) {
            return Err(AbstractionError::SingularDynamics {
                states: (0..n).collect(),
            });
        }
        let a_inv = dynamics
            .a
            .clone()
            .try_inverse()
            .ok_or_else(|| AbstractionError::SingularDynamics {
                states: (0..n).collect(),
            })?;
        let mut verts: Vec<DVector<f64>> = box_vertices(&dynamics.u_min, &dynamics.u_max)
            .iter()
            .map(|u| -(&a_inv * (&dynamics.b * u + &dynamics.q)))
            .collect();
        dedup_points(&mut verts, cfg.eps_dedup);
        let shifts: Vec<DVector<f64>> = error.vertices().iter().map(|e| &a_inv * e).collect();
        let mut verts_infl: Vec<DVector<f64>> = verts
            .iter()
            .flat_map(|v| shifts.iter().map(move |s| v + s))
            .collect();
        if n == 2 {
            let planar: Vec<Vector2<f64>> = verts_infl.iter().map(|p| Vector2::new(p[0], p[1])).collect();
            if let Some(hull) = convex_hull_2d(&planar) {
                verts_infl = hull.iter().map(|p| DVector::from_column_slice(p.as_slice())).collect();
            }
        }
        dedup_points(&mut verts_infl, cfg.eps_dedup);
        let lp = ContainmentLp::new(&verts_infl, cfg);
        if !lp.uses_halfspaces() {
            tracing::warn!(
                brs = %name,
                vertices = verts_infl.len(),
                "inflated backward reachable set is not full-dimensional; using LP containment"
            );
        }
        tracing::debug!(brs = %name, vertices = verts_infl.len(), "backward reachable set computed");
        Ok(Self {
            name,
            error,
            verts,
            verts_infl,
            a_inv,
            lp,
        })
    }

    /// Translation of `BRS₀` for a target point.
    pub fn shift_for(&self, target: &DVector<f64>) -> DVector<f64> {
        &self.a_inv * target
    }

    /// Do all `points` lie in the inflated BRS of `target`?
    pub fn admits(&self, points: &[DVector<f64>], target: &DVector<f64>) -> bool {
        self.lp.contains_all(points, &self.shift_for(target))
    }
}
