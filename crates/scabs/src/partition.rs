//! Partition Indexer: a rectangular grid of axis-aligned regions.
//!
//! Purpose
//! - Tile the bounded domain `origin ± number·width/2` into regions, index
//!   them densely and map points and boxes back to region indices.
//!
//! Conventions
//! - Row-major enumeration: the last dimension varies fastest, so
//!   `index = Σ_d tuple[d] · stride[d]` with `stride[last] = 1`.
//! - Grid tuples hold per-axis cell indices in `0..number[d]`.
//! - Half-open cells: `x` belongs to cell `floor((x − lower)/width)`. Values
//!   within `GRID_SNAP` (relative to the width) of a grid line snap onto it.
//!   The upper end of a box uses the border-outside variant: exactly on a
//!   grid line means the cell below.
//! - Goal takes precedence over critical in `Region::kind`; the membership
//!   sets themselves are kept as given.

use std::collections::BTreeSet;

use nalgebra::DVector;

use crate::error::{AbstractionError, Result};
use crate::geom::{box_vertices, dedup_points};

const GRID_SNAP: f64 = 1e-9;

/// Grid parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionCfg {
    /// Regions per dimension.
    pub number: Vec<usize>,
    /// Region width per dimension.
    pub width: DVector<f64>,
    /// Center of the partitioned domain.
    pub origin: DVector<f64>,
}

impl PartitionCfg {
    /// Grid covering `boundary[d] = (lo, hi)` with `number[d]` cells per axis.
    pub fn from_boundary(boundary: &[(f64, f64)], number: Vec<usize>) -> Result<Self> {
        AbstractionError::check_dim("partition boundary", number.len(), boundary.len())?;
        let width = DVector::from_iterator(
            number.len(),
            boundary.iter().zip(&number).map(|(&(lo, hi), &n)| (hi - lo) / n.max(1) as f64),
        );
        let origin = DVector::from_iterator(boundary.len(), boundary.iter().map(|&(lo, hi)| 0.5 * (lo + hi)));
        let cfg = Self {
            number,
            width,
            origin,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn dim(&self) -> usize {
        self.number.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.number.is_empty() {
            return Err(AbstractionError::invalid("partition has no dimensions"));
        }
        AbstractionError::check_dim("partition width", self.dim(), self.width.len())?;
        AbstractionError::check_dim("partition origin", self.dim(), self.origin.len())?;
        if let Some(d) = self.number.iter().position(|&n| n == 0) {
            return Err(AbstractionError::invalid(format!("partition has zero regions along axis {d}")));
        }
        if let Some(d) = self.width.iter().position(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(AbstractionError::invalid(format!(
                "partition width along axis {d} must be positive, got {}",
                self.width[d]
            )));
        }
        if self.origin.iter().any(|o| !o.is_finite()) {
            return Err(AbstractionError::invalid("partition origin is not finite"));
        }
        Ok(())
    }

    pub fn region_count(&self) -> usize {
        self.number.iter().product()
    }

    /// Lower corner of the partitioned domain.
    pub fn lower_corner(&self) -> DVector<f64> {
        DVector::from_fn(self.dim(), |d, _| self.origin[d] - 0.5 * self.number[d] as f64 * self.width[d])
    }

    /// Upper corner of the partitioned domain.
    pub fn upper_corner(&self) -> DVector<f64> {
        DVector::from_fn(self.dim(), |d, _| self.origin[d] + 0.5 * self.number[d] as f64 * self.width[d])
    }

    /// Grid of the subspace spanned by `dims` (in the given order).
    pub fn restrict(&self, dims: &[usize]) -> PartitionCfg {
        PartitionCfg {
            number: dims.iter().map(|&d| self.number[d]).collect(),
            width: DVector::from_iterator(dims.len(), dims.iter().map(|&d| self.width[d])),
            origin: DVector::from_iterator(dims.len(), dims.iter().map(|&d| self.origin[d])),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionKind {
    Ordinary,
    Goal,
    Critical,
}

/// One cell of the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub idx: usize,
    pub center: DVector<f64>,
    pub low: DVector<f64>,
    pub upp: DVector<f64>,
    pub tuple: Vec<usize>,
    pub kind: RegionKind,
}

/// Closed axis-aligned box; `None` on an axis means unbounded.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecBox {
    pub bounds: Vec<Option<(f64, f64)>>,
}

impl SpecBox {
    pub fn contains(&self, x: &DVector<f64>) -> bool {
        self.bounds
            .iter()
            .enumerate()
            .all(|(d, b)| b.map_or(true, |(lo, hi)| x[d] >= lo && x[d] <= hi))
    }
}

/// Per-axis selection of region centers for a manual state block.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockAxis {
    All,
    Values(Vec<f64>),
}

/// A goal or critical set, given either as a box or as an explicit block.
#[derive(Clone, Debug, PartialEq)]
pub enum SpecRegion {
    /// Regions whose center lies in the closed box.
    Box(SpecBox),
    /// Cartesian product of explicit center coordinates per axis.
    Block(Vec<BlockAxis>),
}

/// Where an axis-aligned box falls relative to the grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoxSpan {
    /// No part of the box meets the partitioned domain.
    FullyOutside,
    /// Clipped inclusive cell range; `partially_outside` flags that some
    /// part of the box leaves the domain.
    Within {
        imin: Vec<usize>,
        imax: Vec<usize>,
        partially_outside: bool,
    },
}

impl BoxSpan {
    /// The unique region this span resolves to, if it is a single in-domain cell.
    pub fn single(&self, partition: &Partition) -> Option<usize> {
        match self {
            BoxSpan::Within {
                imin,
                imax,
                partially_outside: false,
            } if imin == imax => Some(partition.index_of(imin)),
            _ => None,
        }
    }

    pub fn is_partially_outside(&self) -> bool {
        matches!(
            self,
            BoxSpan::Within {
                partially_outside: true,
                ..
            }
        )
    }
}

/// The region grid together with goal and critical membership.
#[derive(Clone, Debug)]
pub struct Partition {
    cfg: PartitionCfg,
    lower: DVector<f64>,
    strides: Vec<usize>,
    regions: Vec<Region>,
    goal: BTreeSet<usize>,
    critical: BTreeSet<usize>,
}

impl Partition {
    /// Grid without goal or critical regions.
    pub fn new(cfg: PartitionCfg) -> Result<Self> {
        Self::build(cfg, &[], &[])
    }

    /// Grid with goal and critical sets resolved from their specifications.
    pub fn build(cfg: PartitionCfg, goal: &[SpecRegion], critical: &[SpecRegion]) -> Result<Self> {
        cfg.validate()?;
        let dim = cfg.dim();
        let mut strides = vec![1usize; dim];
        for d in (0..dim.saturating_sub(1)).rev() {
            strides[d] = strides[d + 1] * cfg.number[d + 1];
        }
        let lower = cfg.lower_corner();
        let count = cfg.region_count();
        let mut regions = Vec::with_capacity(count);
        for idx in 0..count {
            let tuple = tuple_from_index(idx, &strides, &cfg.number);
            let low = DVector::from_fn(dim, |d, _| lower[d] + tuple[d] as f64 * cfg.width[d]);
            let upp = &low + &cfg.width;
            let center = (&low + &upp) * 0.5;
            regions.push(Region {
                idx,
                center,
                low,
                upp,
                tuple,
                kind: RegionKind::Ordinary,
            });
        }
        let mut partition = Self {
            cfg,
            lower,
            strides,
            regions,
            goal: BTreeSet::new(),
            critical: BTreeSet::new(),
        };
        let mut goal_set = BTreeSet::new();
        for spec in goal {
            goal_set.extend(partition.resolve(spec)?);
        }
        let mut critical_set = BTreeSet::new();
        for spec in critical {
            critical_set.extend(partition.resolve(spec)?);
        }
        for r in &critical_set {
            partition.regions[*r].kind = RegionKind::Critical;
        }
        for r in &goal_set {
            partition.regions[*r].kind = RegionKind::Goal;
        }
        partition.goal = goal_set;
        partition.critical = critical_set;
        Ok(partition)
    }

    pub fn cfg(&self) -> &PartitionCfg {
        &self.cfg
    }

    pub fn dim(&self) -> usize {
        self.cfg.dim()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, idx: usize) -> &Region {
        &self.regions[idx]
    }

    pub fn goal(&self) -> &BTreeSet<usize> {
        &self.goal
    }

    pub fn critical(&self) -> &BTreeSet<usize> {
        &self.critical
    }

    pub fn is_goal(&self, idx: usize) -> bool {
        self.goal.contains(&idx)
    }

    pub fn is_critical(&self, idx: usize) -> bool {
        self.critical.contains(&idx)
    }

    /// Dense index of a grid tuple. The tuple must be in range.
    pub fn index_of(&self, tuple: &[usize]) -> usize {
        debug_assert_eq!(tuple.len(), self.dim());
        tuple.iter().zip(&self.strides).map(|(t, s)| t * s).sum()
    }

    pub fn tuple_of(&self, idx: usize) -> Vec<usize> {
        tuple_from_index(idx, &self.strides, &self.cfg.number)
    }

    /// Unclipped per-axis cell index of `x` (may be negative or `>= number`).
    pub fn raw_index(&self, x: &DVector<f64>, border_outside: bool) -> Vec<i64> {
        (0..self.dim())
            .map(|d| {
                let u = (x[d] - self.lower[d]) / self.cfg.width[d];
                let r = u.round();
                if (u - r).abs() <= GRID_SNAP {
                    if border_outside {
                        r as i64 - 1
                    } else {
                        r as i64
                    }
                } else {
                    u.floor() as i64
                }
            })
            .collect()
    }

    /// Region containing `x`, or `None` outside the domain.
    pub fn locate(&self, x: &DVector<f64>) -> Option<usize> {
        let raw = self.raw_index(x, false);
        let mut idx = 0;
        for (d, &i) in raw.iter().enumerate() {
            if i < 0 || i as usize >= self.cfg.number[d] {
                return None;
            }
            idx += i as usize * self.strides[d];
        }
        Some(idx)
    }

    /// Cell range touched by the closed box `[lo, hi]`.
    pub fn locate_box(&self, lo: &DVector<f64>, hi: &DVector<f64>) -> BoxSpan {
        let rmin = self.raw_index(lo, false);
        let rmax_border = self.raw_index(hi, true);
        let mut imin = Vec::with_capacity(self.dim());
        let mut imax = Vec::with_capacity(self.dim());
        let mut partially_outside = false;
        for d in 0..self.dim() {
            let n = self.cfg.number[d] as i64;
            // A degenerate box sitting on a grid line keeps its lower cell.
            let rmax = rmax_border[d].max(rmin[d]);
            if rmax < 0 || rmin[d] >= n {
                return BoxSpan::FullyOutside;
            }
            if rmin[d] < 0 || rmax >= n {
                partially_outside = true;
            }
            imin.push(rmin[d].clamp(0, n - 1) as usize);
            imax.push(rmax.clamp(0, n - 1) as usize);
        }
        BoxSpan::Within {
            imin,
            imax,
            partially_outside,
        }
    }

    /// All region indices in the inclusive tuple range `[imin, imax]`.
    pub fn regions_in_range(&self, imin: &[usize], imax: &[usize]) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = imin.to_vec();
        loop {
            out.push(self.index_of(&cur));
            let mut d = self.dim();
            loop {
                if d == 0 {
                    return out;
                }
                d -= 1;
                if cur[d] < imax[d] {
                    cur[d] += 1;
                    break;
                }
                cur[d] = imin[d];
            }
        }
    }

    /// Regions touched by a span (empty when fully outside).
    pub fn span_regions(&self, span: &BoxSpan) -> Vec<usize> {
        match span {
            BoxSpan::FullyOutside => Vec::new(),
            BoxSpan::Within { imin, imax, .. } => self.regions_in_range(imin, imax),
        }
    }

    /// Corner points of a region in `{0,1}^n` product order.
    pub fn corners(&self, idx: usize) -> Vec<DVector<f64>> {
        let r = &self.regions[idx];
        box_vertices(&r.low, &r.upp)
    }

    /// Union of the corner points of `regions`, duplicates removed.
    pub fn unique_corners<'a>(&self, regions: impl IntoIterator<Item = &'a usize>) -> Vec<DVector<f64>> {
        let mut pts: Vec<DVector<f64>> = regions.into_iter().flat_map(|&r| self.corners(r)).collect();
        let tol = GRID_SNAP * self.cfg.width.min();
        dedup_points(&mut pts, tol);
        pts
    }

    /// Centers of the cells along axis `d`.
    pub fn axis_centers(&self, d: usize) -> Vec<f64> {
        (0..self.cfg.number[d])
            .map(|i| self.lower[d] + (i as f64 + 0.5) * self.cfg.width[d])
            .collect()
    }

    /// Region indices selected by a goal/critical specification.
    pub fn resolve(&self, spec: &SpecRegion) -> Result<BTreeSet<usize>> {
        match spec {
            SpecRegion::Box(b) => {
                AbstractionError::check_dim("region box", self.dim(), b.bounds.len())?;
                Ok(self
                    .regions
                    .iter()
                    .filter(|r| b.contains(&r.center))
                    .map(|r| r.idx)
                    .collect())
            }
            SpecRegion::Block(axes) => self.state_block(axes),
        }
    }

    /// Regions of a manual block; axis values must be region centers.
    pub fn state_block(&self, axes: &[BlockAxis]) -> Result<BTreeSet<usize>> {
        AbstractionError::check_dim("state block", self.dim(), axes.len())?;
        let mut per_axis: Vec<Vec<usize>> = Vec::with_capacity(axes.len());
        for (d, axis) in axes.iter().enumerate() {
            let cells = match axis {
                BlockAxis::All => (0..self.cfg.number[d]).collect(),
                BlockAxis::Values(vals) => {
                    let centers = self.axis_centers(d);
                    let tol = 1e-6 * self.cfg.width[d];
                    vals.iter()
                        .map(|v| {
                            centers.iter().position(|c| (c - v).abs() <= tol).ok_or_else(|| {
                                AbstractionError::invalid(format!(
                                    "state block value {v} is not a region center on axis {d}"
                                ))
                            })
                        })
                        .collect::<Result<Vec<usize>>>()?
                }
            };
            if cells.is_empty() {
                return Ok(BTreeSet::new());
            }
            per_axis.push(cells);
        }
        let mut out = BTreeSet::new();
        let mut pick = vec![0usize; per_axis.len()];
        loop {
            let tuple: Vec<usize> = pick.iter().enumerate().map(|(d, &k)| per_axis[d][k]).collect();
            out.insert(self.index_of(&tuple));
            let mut d = per_axis.len();
            loop {
                if d == 0 {
                    return Ok(out);
                }
                d -= 1;
                if pick[d] + 1 < per_axis[d].len() {
                    pick[d] += 1;
                    break;
                }
                pick[d] = 0;
            }
        }
    }
}

fn tuple_from_index(idx: usize, strides: &[usize], number: &[usize]) -> Vec<usize> {
    strides.iter().zip(number).map(|(s, n)| (idx / s) % n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;
    use proptest::prelude::*;

    fn grid_4x4() -> Partition {
        Partition::new(PartitionCfg::from_boundary(&[(-2.0, 2.0), (-2.0, 2.0)], vec![4, 4]).unwrap()).unwrap()
    }

    #[test]
    fn regions_enumerate_row_major() {
        let p = grid_4x4();
        assert_eq!(p.len(), 16);
        assert_eq!(p.region(0).tuple, vec![0, 0]);
        assert_eq!(p.region(1).tuple, vec![0, 1]);
        assert_eq!(p.region(4).tuple, vec![1, 0]);
        assert_eq!(p.region(5).center, dvector![-0.5, -0.5]);
        assert_eq!(p.region(15).upp, dvector![2.0, 2.0]);
    }

    #[test]
    fn locate_uses_half_open_cells() {
        let p = grid_4x4();
        assert_eq!(p.locate(&dvector![-1.5, -1.5]), Some(0));
        // On the line x0 = -1: belongs to the upper cell.
        assert_eq!(p.locate(&dvector![-1.0, -1.5]), Some(4));
        assert_eq!(p.locate(&dvector![2.0, 0.0]), None);
        assert_eq!(p.locate(&dvector![-2.0, -2.0]), Some(0));
        assert_eq!(p.locate(&dvector![0.0, 5.0]), None);
    }

    #[test]
    fn locate_box_spans_and_borders() {
        let p = grid_4x4();
        // Box touching the grid line at its upper end stays in one cell.
        let s = p.locate_box(&dvector![-2.0, -2.0], &dvector![-1.0, -1.0]);
        assert_eq!(s.single(&p), Some(0));
        let s = p.locate_box(&dvector![-1.5, -1.5], &dvector![-0.5, -1.2]);
        assert_eq!(p.span_regions(&s), vec![0, 4]);
        let s = p.locate_box(&dvector![1.5, 1.5], &dvector![2.5, 1.7]);
        assert!(s.is_partially_outside());
        assert_eq!(p.span_regions(&s), vec![15]);
        assert_eq!(s.single(&p), None);
        assert_eq!(p.locate_box(&dvector![3.0, 0.0], &dvector![4.0, 1.0]), BoxSpan::FullyOutside);
        assert_eq!(p.locate_box(&dvector![-5.0, 0.0], &dvector![-2.0, 1.0]), BoxSpan::FullyOutside);
        // Degenerate point box on a grid line.
        let s = p.locate_box(&dvector![-1.0, 0.5], &dvector![-1.0, 0.5]);
        assert_eq!(s.single(&p), p.locate(&dvector![-1.0, 0.5]));
    }

    #[test]
    fn corners_and_unique_corners() {
        let p = grid_4x4();
        let c = p.corners(0);
        assert_eq!(c.len(), 4);
        assert_eq!(c[0], dvector![-2.0, -2.0]);
        assert_eq!(c[3], dvector![-1.0, -1.0]);
        let u = p.unique_corners(&[0usize, 1]);
        assert_eq!(u.len(), 6);
    }

    #[test]
    fn spec_regions_and_goal_precedence() {
        let cfg = PartitionCfg::from_boundary(&[(-2.0, 2.0), (-2.0, 2.0)], vec![4, 4]).unwrap();
        let goal = vec![SpecRegion::Box(SpecBox {
            bounds: vec![Some((1.0, 2.0)), None],
        })];
        let critical = vec![SpecRegion::Block(vec![BlockAxis::All, BlockAxis::Values(vec![1.5])])];
        let p = Partition::build(cfg, &goal, &critical).unwrap();
        assert_eq!(p.goal().iter().copied().collect::<Vec<_>>(), vec![12, 13, 14, 15]);
        assert_eq!(p.critical().iter().copied().collect::<Vec<_>>(), vec![3, 7, 11, 15]);
        assert_eq!(p.region(15).kind, RegionKind::Goal);
        assert_eq!(p.region(3).kind, RegionKind::Critical);
        assert_eq!(p.region(0).kind, RegionKind::Ordinary);
    }

    #[test]
    fn state_block_dimension_mismatch_is_config_error() {
        let p = grid_4x4();
        let err = p.state_block(&[BlockAxis::All]).unwrap_err();
        assert!(matches!(err, AbstractionError::DimensionMismatch { expected: 2, got: 1, .. }));
        let err = p.state_block(&[BlockAxis::All, BlockAxis::Values(vec![0.1])]).unwrap_err();
        assert!(matches!(err, AbstractionError::InvalidConfig { .. }));
    }

    #[test]
    fn invalid_partition_rejected() {
        assert!(PartitionCfg::from_boundary(&[(0.0, 1.0)], vec![0]).is_err());
        assert!(PartitionCfg::from_boundary(&[(1.0, 0.0)], vec![2]).is_err());
        assert!(PartitionCfg::from_boundary(&[(0.0, 1.0)], vec![2, 2]).is_err());
    }

    #[test]
    fn restrict_keeps_selected_axes() {
        let cfg = PartitionCfg::from_boundary(&[(0.0, 4.0), (0.0, 2.0), (-1.0, 1.0)], vec![4, 2, 5]).unwrap();
        let sub = cfg.restrict(&[2, 0]);
        assert_eq!(sub.number, vec![5, 4]);
        assert_eq!(sub.origin, dvector![0.0, 2.0]);
    }

    proptest! {
        #[test]
        fn tuple_index_bijection(n0 in 1usize..6, n1 in 1usize..6, n2 in 1usize..6) {
            let cfg = PartitionCfg::from_boundary(&[(0.0, 1.0), (-3.0, 3.0), (2.0, 2.5)], vec![n0, n1, n2]).unwrap();
            let p = Partition::new(cfg).unwrap();
            for idx in 0..p.len() {
                let t = p.tuple_of(idx);
                prop_assert_eq!(p.index_of(&t), idx);
                prop_assert_eq!(&p.region(idx).tuple, &t);
                prop_assert_eq!(p.locate(&p.region(idx).center), Some(idx));
            }
        }
    }
}
