//! Per-action transition probability intervals.
//!
//! Exact mode maps every shifted sample to one region. Interval mode works on
//! cluster boxes (padded by the action's error box) and separates certain
//! from possible hits; a box touching several regions only raises the upper
//! counts of each.

use std::collections::BTreeMap;

use nalgebra::DVector;

use super::bounds::{clamp_interval, deadlock_estimate, hoeffding_epsilon, round_estimate};
use super::cluster::{cluster_samples, singletons, Cluster};
use super::table::ScenarioTable;
use crate::actions::Action;
use crate::backreach::ErrorBox;
use crate::error::{AbstractionError, Result};
use crate::partition::{BoxSpan, Partition};

/// Sampling parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioCfg {
    pub samples: usize,
    /// Confidence level β; bounds hold with probability `1 − β`.
    pub confidence: f64,
    /// Clustering radius; `None` disables clustering.
    pub clustering: Option<f64>,
    pub seed: u64,
}

impl Default for ScenarioCfg {
    fn default() -> Self {
        Self {
            samples: 3200,
            confidence: 0.01,
            clustering: None,
            seed: 0,
        }
    }
}

impl ScenarioCfg {
    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(AbstractionError::invalid("number of noise samples must be positive"));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(AbstractionError::invalid(format!(
                "confidence level must lie in (0, 1), got {}",
                self.confidence
            )));
        }
        if let Some(r) = self.clustering {
            if !(r.is_finite() && r > 0.0) {
                return Err(AbstractionError::invalid(format!("clustering radius must be positive, got {r}")));
            }
        }
        Ok(())
    }

    /// The table must be computed for the same `N` and `β`.
    pub fn check_table(&self, table: &ScenarioTable) -> Result<()> {
        if table.samples() != self.samples {
            return Err(AbstractionError::table(format!(
                "table is for N = {}, run uses N = {}",
                table.samples(),
                self.samples
            )));
        }
        if (table.confidence() - self.confidence).abs() > 1e-12 {
            return Err(AbstractionError::table(format!(
                "table is for beta = {}, run uses beta = {}",
                table.confidence(),
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Successor of an action: a region or one of the two aggregate sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SuccessorId {
    Critical,
    Goal,
    Region(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Successor {
    pub target: SuccessorId,
    pub lb: f64,
    pub ub: f64,
    pub estimate: f64,
}

/// Intervals and point estimates of one action.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionBounds {
    pub successors: Vec<Successor>,
    pub deadlock: (f64, f64),
    pub deadlock_estimate: f64,
}

/// Zero-mean noise shared by all actions, optionally clustered.
#[derive(Clone, Debug)]
pub struct NoiseSet {
    samples: Vec<DVector<f64>>,
    clusters: Vec<Cluster>,
    clustered: bool,
}

impl NoiseSet {
    pub fn new(samples: Vec<DVector<f64>>, clustering: Option<f64>) -> Result<Self> {
        let (clusters, clustered) = match clustering {
            Some(r) => (cluster_samples(&samples, r)?, true),
            None => (singletons(&samples), false),
        };
        Ok(Self {
            samples,
            clusters,
            clustered,
        })
    }

    pub fn samples(&self) -> &[DVector<f64>] {
        &self.samples
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn is_clustered(&self) -> bool {
        self.clustered
    }
}

/// Read-only context shared by every per-action computation.
#[derive(Clone, Copy, Debug)]
pub struct ProbabilityEngine<'a> {
    partition: &'a Partition,
    table: &'a ScenarioTable,
    epsilon: f64,
}

impl<'a> ProbabilityEngine<'a> {
    pub fn new(partition: &'a Partition, table: &'a ScenarioTable) -> Self {
        Self {
            partition,
            table,
            epsilon: hoeffding_epsilon(table.samples(), table.confidence()),
        }
    }

    fn n(&self) -> f64 {
        self.table.samples() as f64
    }

    /// Bounds for one action; exact mode iff samples are unclustered and the
    /// action carries no error.
    pub fn for_action(&self, action: &Action, noise: &NoiseSet) -> TransitionBounds {
        if !noise.is_clustered() && action.error.is_zero() {
            self.exact(noise.samples(), &action.center)
        } else {
            self.interval(noise.clusters(), &action.center, &action.error)
        }
    }

    /// Point-sample mode: table lookup keyed by `N − count`.
    pub fn exact(&self, samples: &[DVector<f64>], center: &DVector<f64>) -> TransitionBounds {
        let n_total = self.table.samples();
        let mut counts: BTreeMap<SuccessorId, usize> = BTreeMap::new();
        let mut absorbed = 0usize;
        for w in samples {
            match self.partition.locate(&(center + w)) {
                Some(r) => *counts.entry(self.bucket(r)).or_insert(0) += 1,
                None => absorbed += 1,
            }
        }
        let inside: usize = counts.values().sum();
        // Samples beyond N (if any) are all counted as absorbed.
        let k_abs = n_total.saturating_sub(inside);
        let successors: Vec<Successor> = counts
            .into_iter()
            .map(|(target, count)| {
                let (lo, hi) = self.table.bounds(n_total.saturating_sub(count));
                let (lb, ub) = clamp_interval(lo, hi);
                Successor {
                    target,
                    lb,
                    ub,
                    estimate: round_estimate(count as f64 / self.n()),
                }
            })
            .collect();
        let (lo, hi) = self.table.bounds(k_abs);
        tracing::trace!(absorbed, successors = successors.len(), "exact-mode counts");
        self.finish(successors, (1.0 - hi, 1.0 - lo))
    }

    /// Box mode over clusters shifted by `center` and padded by `error`.
    pub fn interval(&self, clusters: &[Cluster], center: &DVector<f64>, error: &ErrorBox) -> TransitionBounds {
        let p = self.partition;
        let mut low: BTreeMap<usize, usize> = BTreeMap::new();
        let mut upp: BTreeMap<usize, usize> = BTreeMap::new();
        let mut est: BTreeMap<SuccessorId, usize> = BTreeMap::new();
        let (mut abs_low, mut abs_upp) = (0usize, 0usize);
        let (mut goal_low, mut goal_upp) = (0usize, 0usize);
        let (mut crit_low, mut crit_upp) = (0usize, 0usize);

        for c in clusters {
            let v = c.value;
            let moved = c.shifted(center);
            let lo = &moved.lb + &error.neg;
            let hi = &moved.ub + &error.pos;
            // Representative point for the point estimate.
            let mid = (&moved.lb + &moved.ub) * 0.5;
            if let Some(r) = p.locate(&mid) {
                *est.entry(self.bucket(r)).or_insert(0) += v;
            }

            let span = p.locate_box(&lo, &hi);
            if span == BoxSpan::FullyOutside {
                abs_low += v;
                abs_upp += v;
                continue;
            }
            let partial = span.is_partially_outside();
            if partial {
                abs_upp += v;
            }
            if let Some(r) = span.single(p) {
                match self.bucket(r) {
                    SuccessorId::Goal => {
                        goal_low += v;
                        goal_upp += v;
                    }
                    SuccessorId::Critical => {
                        crit_low += v;
                        crit_upp += v;
                    }
                    SuccessorId::Region(r) => {
                        *low.entry(r).or_insert(0) += v;
                        *upp.entry(r).or_insert(0) += v;
                    }
                }
                continue;
            }
            let touched = p.span_regions(&span);
            let mut any_goal = false;
            let mut any_crit = false;
            let mut all_goal = true;
            let mut all_crit = true;
            for &r in &touched {
                let g = p.is_goal(r);
                let k = p.is_critical(r);
                any_goal |= g;
                any_crit |= k;
                all_goal &= g;
                all_crit &= k;
                if !g && !k {
                    *upp.entry(r).or_insert(0) += v;
                }
            }
            if all_goal && !partial {
                goal_low += v;
                goal_upp += v;
            } else if all_crit && !partial {
                crit_low += v;
                crit_upp += v;
            } else {
                if any_goal {
                    goal_upp += v;
                }
                if any_crit {
                    crit_upp += v;
                }
            }
        }

        let n_total = self.table.samples();
        let mut rows: Vec<(SuccessorId, usize, usize)> = Vec::new();
        if !p.critical().is_empty() {
            rows.push((SuccessorId::Critical, crit_low, crit_upp));
        }
        if !p.goal().is_empty() {
            rows.push((SuccessorId::Goal, goal_low, goal_upp));
        }
        rows.extend(
            upp.iter()
                .filter(|(_, &cu)| cu > 0)
                .map(|(&r, &cu)| (SuccessorId::Region(r), low.get(&r).copied().unwrap_or(0), cu)),
        );
        let successors = rows
            .into_iter()
            .map(|(target, cl, cu)| {
                let lo = self.table.lower(n_total.saturating_sub(cl));
                let hi = (cu as f64 / self.n() + self.epsilon).min(1.0);
                let (lb, ub) = clamp_interval(lo, hi);
                let estimate = round_estimate(est.get(&target).copied().unwrap_or(0) as f64 / self.n());
                Successor {
                    target,
                    lb,
                    ub,
                    estimate,
                }
            })
            .collect();
        let dl_low = (abs_low as f64 / self.n() - self.epsilon).max(0.0);
        let dl_upp = 1.0 - self.table.lower(abs_upp);
        self.finish(successors, (dl_low, dl_upp))
    }

    fn bucket(&self, r: usize) -> SuccessorId {
        if self.partition.is_goal(r) {
            SuccessorId::Goal
        } else if self.partition.is_critical(r) {
            SuccessorId::Critical
        } else {
            SuccessorId::Region(r)
        }
    }

    fn finish(&self, successors: Vec<Successor>, deadlock: (f64, f64)) -> TransitionBounds {
        let deadlock_estimate = deadlock_estimate(successors.iter().map(|s| s.estimate));
        TransitionBounds {
            successors,
            deadlock: clamp_interval(deadlock.0, deadlock.1),
            deadlock_estimate,
        }
    }
}
