//! Polytope containment feasibility.
//!
//! Purpose
//! - Decide whether every point of a query set (region corners) lies in a
//!   fixed convex polytope (an inflated BRS) after translating the query by a
//!   per-action shift.
//!
//! Conventions
//! - `ContainmentLp` is built once per polytope and re-used for every query;
//!   only the query points change between calls.
//! - When the polytope is full-dimensional and its facets are enumerable the
//!   check is a plain H-representation test. Otherwise each point is decided
//!   by a phase-1 simplex on `{λ >= 0 : Vλ = x, 1ᵀλ = 1}` with Bland's rule.
//! - A bounding-box test runs first; most regions are rejected there.

use nalgebra::{DMatrix, DVector};

use crate::geom::{halfspaces_from_points, GeomCfg, Hs};

#[derive(Clone, Debug)]
enum Repr {
    Halfspaces(Vec<Hs>),
    /// Columns are the polytope vertices.
    Vertices(DMatrix<f64>),
}

/// Containment oracle for one convex polytope given by its vertices.
#[derive(Clone, Debug)]
pub struct ContainmentLp {
    lo: DVector<f64>,
    hi: DVector<f64>,
    repr: Repr,
    eps: f64,
}

impl ContainmentLp {
    /// Parameterize the oracle. `verts` must be non-empty and share one dimension.
    pub fn new(verts: &[DVector<f64>], cfg: GeomCfg) -> Self {
        let dim = verts.first().map_or(0, |v| v.len());
        let mut lo = DVector::from_element(dim, f64::INFINITY);
        let mut hi = DVector::from_element(dim, f64::NEG_INFINITY);
        for v in verts {
            for d in 0..dim {
                lo[d] = lo[d].min(v[d]);
                hi[d] = hi[d].max(v[d]);
            }
        }
        let scale = 1.0 + lo.amax().max(hi.amax());
        let scale = if scale.is_finite() { scale } else { 1.0 };
        let repr = match halfspaces_from_points(verts, cfg) {
            Some(hs) => Repr::Halfspaces(hs),
            None => {
                tracing::debug!(
                    vertices = verts.len(),
                    dim,
                    "polytope not facet-enumerable; containment falls back to LP"
                );
                Repr::Vertices(DMatrix::from_fn(dim, verts.len(), |i, j| verts[j][i]))
            }
        };
        Self {
            lo,
            hi,
            repr,
            eps: cfg.eps_feas * scale,
        }
    }

    pub fn uses_halfspaces(&self) -> bool {
        matches!(self.repr, Repr::Halfspaces(_))
    }

    /// Is `x` inside the polytope?
    pub fn contains(&self, x: &DVector<f64>) -> bool {
        if !self.in_bbox(x) {
            return false;
        }
        match &self.repr {
            Repr::Halfspaces(hs) => hs.iter().all(|h| h.satisfies_eps(x, self.eps)),
            Repr::Vertices(v) => in_convex_hull(v, x, self.eps),
        }
    }

    /// Are all `points - shift` inside the polytope?
    pub fn contains_all(&self, points: &[DVector<f64>], shift: &DVector<f64>) -> bool {
        let moved: Vec<DVector<f64>> = points.iter().map(|p| p - shift).collect();
        // Cheap rejection first, then the exact test.
        moved.iter().all(|p| self.in_bbox(p)) && moved.iter().all(|p| self.contains(p))
    }

    fn in_bbox(&self, x: &DVector<f64>) -> bool {
        x.len() == self.lo.len()
            && (0..x.len()).all(|d| x[d] >= self.lo[d] - self.eps && x[d] <= self.hi[d] + self.eps)
    }
}

/// Phase-1 simplex: is `x` a convex combination of the columns of `v`?
pub(crate) fn in_convex_hull(v: &DMatrix<f64>, x: &DVector<f64>, eps: f64) -> bool {
    let dim = v.nrows();
    let k = v.ncols();
    if k == 0 || x.len() != dim {
        return false;
    }
    let m = dim + 1;
    let cols = k + m + 1;
    let rhs = cols - 1;
    let mut t = DMatrix::<f64>::zeros(m, cols);
    for i in 0..m {
        for j in 0..k {
            t[(i, j)] = if i < dim { v[(i, j)] } else { 1.0 };
        }
        t[(i, rhs)] = if i < dim { x[i] } else { 1.0 };
        if t[(i, rhs)] < 0.0 {
            for j in 0..k {
                t[(i, j)] = -t[(i, j)];
            }
            t[(i, rhs)] = -t[(i, rhs)];
        }
        t[(i, k + i)] = 1.0;
    }
    let mut basis: Vec<usize> = (k..k + m).collect();
    // Reduced costs of the phase-1 objective (sum of artificials).
    let mut z = DVector::<f64>::zeros(cols);
    for i in 0..m {
        for j in 0..k {
            z[j] += t[(i, j)];
        }
        z[rhs] += t[(i, rhs)];
    }
    let max_iter = 50 * (k + m);
    for _ in 0..max_iter {
        // Bland: smallest improving column.
        let Some(enter) = (0..k).find(|&j| z[j] > eps && !basis.contains(&j)) else {
            return z[rhs] <= eps * (m as f64);
        };
        let mut leave: Option<usize> = None;
        let mut best = f64::INFINITY;
        for i in 0..m {
            let a = t[(i, enter)];
            if a > eps {
                let ratio = t[(i, rhs)] / a;
                let better = match leave {
                    None => true,
                    Some(l) => ratio < best - eps || (ratio <= best + eps && basis[i] < basis[l]),
                };
                if better {
                    best = ratio;
                    leave = Some(i);
                }
            }
        }
        let Some(r) = leave else {
            // Unbounded direction cannot occur in phase 1; treat as infeasible.
            return false;
        };
        let piv = t[(r, enter)];
        for j in 0..cols {
            t[(r, j)] /= piv;
        }
        for i in 0..m {
            if i != r {
                let f = t[(i, enter)];
                if f != 0.0 {
                    for j in 0..cols {
                        t[(i, j)] -= f * t[(r, j)];
                    }
                }
            }
        }
        let f = z[enter];
        for j in 0..cols {
            z[j] -= f * t[(r, j)];
        }
        basis[r] = enter;
    }
    tracing::warn!(vertices = k, dim, "simplex iteration cap reached; reporting infeasible");
    false
}
