//! Action Enabler.
//!
//! Purpose
//! - Create one action per target point and decide in which regions it is
//!   enabled: a region enables an action when all its corners lie in the
//!   action's inflated backward reachable set.
//!
//! Conventions
//! - Feasibility is decided per subsystem in reduced coordinates and composed
//!   by Cartesian product: sub-tuples are embedded into full length (zeros
//!   elsewhere) and summed. The same holds for target tuples and error boxes.
//! - Critical regions never enable an action. Goal regions may; the
//!   assembler treats them as sinks anyway.
//! - Extra targets bypass composition and are checked directly against every
//!   non-critical region in full coordinates.
//! - The result is immutable: every enabled set and error box is final when
//!   `ActionSet::build` returns.

use std::collections::BTreeSet;
use std::sync::Arc;

use nalgebra::DVector;

use crate::backreach::{BackreachSet, ErrorBox};
use crate::error::{AbstractionError, Result};
use crate::geom::GeomCfg;
use crate::model::{connected_components, ActuationMode, DynamicsModel, Subsystem};
use crate::partition::{Partition, PartitionCfg};

/// Placement of the default target points.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetCfg {
    /// One target at every region center.
    RegionCenters,
    /// `number[d]` evenly spaced points over `boundary[d]`, endpoints included.
    Grid {
        boundary: Vec<(f64, f64)>,
        number: Vec<usize>,
    },
}

/// Target points plus optional uniform uncertainty for composed actions.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionSpec {
    pub targets: TargetCfg,
    pub extra: Vec<DVector<f64>>,
    pub noise_uncertainty: Option<ErrorBox>,
}

impl ActionSpec {
    /// Number of actions `ActionSet::build` creates on `grid`, enabled or not.
    pub fn count(&self, grid: &PartitionCfg) -> usize {
        let default = match &self.targets {
            TargetCfg::RegionCenters => grid.region_count(),
            TargetCfg::Grid { number, .. } => number.iter().product(),
        };
        default + self.extra.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOrigin {
    /// Grid tuple of a default target.
    Grid(Vec<usize>),
    /// Position in the list of extra targets.
    Extra(usize),
}

#[derive(Clone, Debug)]
pub struct Action {
    pub idx: usize,
    pub center: DVector<f64>,
    pub origin: ActionOrigin,
    pub backreach: Arc<BackreachSet>,
    pub error: ErrorBox,
    pub enabled_in: BTreeSet<usize>,
}

/// All actions with their enabled regions.
#[derive(Clone, Debug)]
pub struct ActionSet {
    pub actions: Vec<Action>,
    /// Per region: indices of the actions enabled there.
    pub enabled: Vec<BTreeSet<usize>>,
}

impl ActionSet {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of actions enabled in at least one region.
    pub fn enabled_count(&self) -> usize {
        self.actions.iter().filter(|a| !a.enabled_in.is_empty()).count()
    }

    pub fn build(
        partition: &Partition,
        model: &DynamicsModel,
        actuation: &ActuationMode,
        spec: &ActionSpec,
        cfg: GeomCfg,
    ) -> Result<Self> {
        let n = partition.dim();
        AbstractionError::check_dim("dynamics", n, model.nominal().state_dim())?;
        let axes = target_axes(&spec.targets, partition.cfg())?;
        let default_error = actuation.default_error(n);
        AbstractionError::check_dim("default control error", n, default_error.dim())?;
        let default_brs = Arc::new(BackreachSet::compute("default", model.nominal(), default_error.clone(), cfg)?);

        let subsystems = connected_components(&model.nominal().a, &model.nominal().b);
        tracing::info!(
            targets = axes.iter().map(Vec::len).product::<usize>(),
            subsystems = subsystems.len(),
            "computing enabled actions"
        );
        let mut subs = Vec::with_capacity(subsystems.len());
        for sub in &subsystems {
            tracing::debug!(states = ?sub.states, controls = ?sub.controls, "enabling in subsystem");
            subs.push(enable_subsystem(partition.cfg(), model, sub, &default_error, &axes, cfg)?);
        }

        let mut actions = compose(partition, &subs, &axes, &default_brs, spec.noise_uncertainty.as_ref());

        if !spec.extra.is_empty() {
            let extra_error = actuation.extra_error(n);
            let extra_brs = Arc::new(BackreachSet::compute("extra", model.nominal(), extra_error.clone(), cfg)?);
            for (i, center) in spec.extra.iter().enumerate() {
                AbstractionError::check_dim("extra target", n, center.len())?;
                let enabled_in: BTreeSet<usize> = (0..partition.len())
                    .filter(|&r| !partition.is_critical(r))
                    .filter(|&r| extra_brs.admits(&partition.corners(r), center))
                    .collect();
                let epistemic = model.epistemic_error(&partition.unique_corners(&enabled_in));
                actions.push(Action {
                    idx: actions.len(),
                    center: center.clone(),
                    origin: ActionOrigin::Extra(i),
                    backreach: Arc::clone(&extra_brs),
                    error: extra_error.add(&epistemic),
                    enabled_in,
                });
            }
        }

        let mut enabled = vec![BTreeSet::new(); partition.len()];
        for a in &actions {
            for &r in &a.enabled_in {
                enabled[r].insert(a.idx);
            }
        }
        let set = ActionSet { actions, enabled };
        let count = set.enabled_count();
        tracing::info!(actions = set.len(), enabled = count, "enabled actions computed");
        if count == 0 {
            return Err(AbstractionError::NoActionsEnabled {
                actions: set.len(),
                regions: partition.len(),
            });
        }
        Ok(set)
    }
}

/// Per-axis target coordinates.
fn target_axes(targets: &TargetCfg, grid: &PartitionCfg) -> Result<Vec<Vec<f64>>> {
    match targets {
        TargetCfg::RegionCenters => {
            let lower = grid.lower_corner();
            Ok((0..grid.dim())
                .map(|d| {
                    (0..grid.number[d])
                        .map(|i| lower[d] + (i as f64 + 0.5) * grid.width[d])
                        .collect()
                })
                .collect())
        }
        TargetCfg::Grid { boundary, number } => {
            AbstractionError::check_dim("target boundary", grid.dim(), boundary.len())?;
            AbstractionError::check_dim("target number", grid.dim(), number.len())?;
            if number.iter().any(|&k| k == 0) {
                return Err(AbstractionError::invalid("target grid has an axis without points"));
            }
            Ok(boundary
                .iter()
                .zip(number)
                .map(|(&(lo, hi), &k)| linspace(lo, hi, k))
                .collect())
        }
    }
}

fn linspace(lo: f64, hi: f64, k: usize) -> Vec<f64> {
    if k == 1 {
        return vec![lo];
    }
    let step = (hi - lo) / (k - 1) as f64;
    (0..k).map(|i| lo + i as f64 * step).collect()
}

/// Enabled regions of every reduced target in one subsystem.
#[derive(Clone, Debug)]
pub(crate) struct SubEnabled {
    pub dims: Vec<usize>,
    /// Row-major over the reduced target grid.
    pub targets: Vec<SubTarget>,
}

#[derive(Clone, Debug)]
pub(crate) struct SubTarget {
    pub tuple: Vec<usize>,
    pub regions: Vec<Vec<usize>>,
    pub error: ErrorBox,
}

pub(crate) fn enable_subsystem(
    grid: &PartitionCfg,
    model: &DynamicsModel,
    sub: &Subsystem,
    default_error: &ErrorBox,
    axes: &[Vec<f64>],
    cfg: GeomCfg,
) -> Result<SubEnabled> {
    let dims = &sub.states;
    let sub_partition = Partition::new(grid.restrict(dims))?;
    let sub_model = model.restrict(sub);
    let sub_error = default_error.restrict(dims);
    let brs = BackreachSet::compute(format!("default{dims:?}"), sub_model.nominal(), sub_error.clone(), cfg).map_err(
        |e| match e {
            AbstractionError::SingularDynamics { .. } => AbstractionError::SingularDynamics { states: dims.clone() },
            other => other,
        },
    )?;
    let sub_axes: Vec<&Vec<f64>> = dims.iter().map(|&d| &axes[d]).collect();
    let sub_number: Vec<usize> = sub_axes.iter().map(|a| a.len()).collect();
    let total: usize = sub_number.iter().product();
    let corners: Vec<Vec<DVector<f64>>> = (0..sub_partition.len()).map(|r| sub_partition.corners(r)).collect();

    let mut targets = Vec::with_capacity(total);
    for t in 0..total {
        let tuple = unflatten(t, &sub_number);
        let center = DVector::from_iterator(dims.len(), tuple.iter().enumerate().map(|(j, &i)| sub_axes[j][i]));
        let enabled: Vec<usize> = (0..sub_partition.len())
            .filter(|&r| brs.admits(&corners[r], &center))
            .collect();
        let epistemic = sub_model.epistemic_error(&sub_partition.unique_corners(&enabled));
        targets.push(SubTarget {
            tuple,
            regions: enabled.iter().map(|&r| sub_partition.tuple_of(r)).collect(),
            error: sub_error.add(&epistemic),
        });
    }
    Ok(SubEnabled {
        dims: dims.clone(),
        targets,
    })
}

/// Compose subsystem results into full-state actions, in target-grid order.
fn compose(
    partition: &Partition,
    subs: &[SubEnabled],
    axes: &[Vec<f64>],
    brs: &Arc<BackreachSet>,
    noise_uncertainty: Option<&ErrorBox>,
) -> Vec<Action> {
    let n = partition.dim();
    let number: Vec<usize> = axes.iter().map(Vec::len).collect();
    let total: usize = number.iter().product();
    let mut actions: Vec<Option<Action>> = vec![None; total];

    for_each_product(&subs.iter().map(|s| s.targets.len()).collect::<Vec<_>>(), |pick| {
        let mut tuple = vec![0usize; n];
        let mut error = ErrorBox::zeros(n);
        for (s, &k) in subs.iter().zip(pick) {
            let st = &s.targets[k];
            for (j, &d) in s.dims.iter().enumerate() {
                tuple[d] += st.tuple[j];
            }
            error = error.add(&st.error.embed(n, &s.dims));
        }
        if let Some(u) = noise_uncertainty {
            error = error.add(u);
        }
        let mut enabled_in = BTreeSet::new();
        let lists: Vec<&Vec<Vec<usize>>> = subs.iter().zip(pick).map(|(s, &k)| &s.targets[k].regions).collect();
        if lists.iter().all(|l| !l.is_empty()) {
            for_each_product(&lists.iter().map(|l| l.len()).collect::<Vec<_>>(), |rp| {
                let mut region = vec![0usize; n];
                for ((s, l), &k) in subs.iter().zip(&lists).zip(rp) {
                    for (j, &d) in s.dims.iter().enumerate() {
                        region[d] += l[k][j];
                    }
                }
                let r = partition.index_of(&region);
                if !partition.is_critical(r) {
                    enabled_in.insert(r);
                }
            });
        }
        let idx = flatten(&tuple, &number);
        let center = DVector::from_iterator(n, tuple.iter().enumerate().map(|(d, &i)| axes[d][i]));
        actions[idx] = Some(Action {
            idx,
            center,
            origin: ActionOrigin::Grid(tuple),
            backreach: Arc::clone(brs),
            error,
            enabled_in,
        });
    });
    // Subsystems partition the state dimensions, so every target is produced once.
    actions.into_iter().flatten().collect()
}

/// Visit every index combination of `0..len[0] × … × 0..len[k-1]`, last fastest.
fn for_each_product(len: &[usize], mut f: impl FnMut(&[usize])) {
    if len.iter().any(|&l| l == 0) {
        return;
    }
    let mut cur = vec![0usize; len.len()];
    loop {
        f(&cur);
        let mut d = len.len();
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            if cur[d] + 1 < len[d] {
                cur[d] += 1;
                break;
            }
            cur[d] = 0;
        }
    }
}

fn unflatten(mut idx: usize, number: &[usize]) -> Vec<usize> {
    let mut out = vec![0usize; number.len()];
    for d in (0..number.len()).rev() {
        out[d] = idx % number[d];
        idx /= number[d];
    }
    out
}

fn flatten(tuple: &[usize], number: &[usize]) -> usize {
    tuple.iter().zip(number).fold(0, |acc, (t, n)| acc * n + t)
}
