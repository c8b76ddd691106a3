//! Basic n-D types and tolerances.

use nalgebra::DVector;

/// Geometry configuration (tolerances and enumeration caps).
#[derive(Clone, Copy, Debug)]
pub struct GeomCfg {
    /// Slack for half-space membership and LP feasibility.
    pub eps_feas: f64,
    /// Singular values below this count as zero when building facet normals.
    pub eps_rank: f64,
    /// Points closer than this are merged.
    pub eps_dedup: f64,
    /// Upper bound on `C(#points, dim)` for facet enumeration in dim >= 3.
    pub max_facet_candidates: u64,
}

impl Default for GeomCfg {
    fn default() -> Self {
        Self {
            eps_feas: 1e-9,
            eps_rank: 1e-10,
            eps_dedup: 1e-12,
            max_facet_candidates: 200_000,
        }
    }
}

/// Closed half-space `n · x <= c` in R^n.
#[derive(Clone, Debug, PartialEq)]
pub struct Hs {
    pub n: DVector<f64>,
    pub c: f64,
}

impl Hs {
    #[inline]
    pub fn new(n: DVector<f64>, c: f64) -> Self {
        Self { n, c }
    }

    #[inline]
    pub fn satisfies_eps(&self, p: &DVector<f64>, eps: f64) -> bool {
        self.n.dot(p) <= self.c + eps
    }

    /// Same half-space after translating space by `t` (`x ↦ x + t`).
    #[inline]
    pub fn translated(&self, t: &DVector<f64>) -> Hs {
        Hs::new(self.n.clone(), self.c + self.n.dot(t))
    }
}
