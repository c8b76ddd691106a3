//! Stage orchestration: partition → actions → noise → probabilities → iMDP.
//!
//! Every stage runs to completion before the next one starts and hands its
//! output on by value or shared reference. Timings are returned, not stored.

use crate::actions::{ActionSet, ActionSpec};
use crate::error::{AbstractionError, Result};
use crate::geom::GeomCfg;
use crate::imdp::{Imdp, MdpMode, Optimization, ProblemType};
use crate::model::{ActuationMode, DynamicsModel};
use crate::partition::{Partition, PartitionCfg, SpecRegion};
use crate::scenario::{gaussian_samples, ActionBackend, NoiseSet, ProbabilityEngine, ScenarioCfg, ScenarioTable, TransitionBounds};
use crate::timing::{StageTimer, Timings};

/// Everything the abstraction needs to know about one control problem.
#[derive(Clone, Debug, PartialEq)]
pub struct Problem {
    pub partition: PartitionCfg,
    pub goal: Vec<SpecRegion>,
    pub critical: Vec<SpecRegion>,
    pub actions: ActionSpec,
    pub horizon: usize,
    pub problem_type: ProblemType,
    pub optimization: Optimization,
    pub model: DynamicsModel,
    pub actuation: ActuationMode,
}

impl Problem {
    /// Checks that only need the configuration itself; region-level checks
    /// happen while building.
    pub fn validate(&self) -> Result<()> {
        self.partition.validate()?;
        self.model.validate()?;
        let n = self.partition.dim();
        AbstractionError::check_dim("dynamics", n, self.model.nominal().state_dim())?;
        if self.horizon == 0 {
            return Err(AbstractionError::invalid("horizon must be at least one step"));
        }
        if let ActuationMode::Underactuated(cfg) = &self.actuation {
            AbstractionError::check_dim("default error profile", n, cfg.default.dim())?;
            if let Some(extra) = &cfg.extra {
                AbstractionError::check_dim("extra error profile", n, extra.dim())?;
            }
        }
        if let Some(e) = &self.actions.noise_uncertainty {
            AbstractionError::check_dim("noise uncertainty", n, e.dim())?;
        }
        for x in &self.actions.extra {
            AbstractionError::check_dim("extra target", n, x.len())?;
        }
        Ok(())
    }

    pub fn specification(&self, mode: MdpMode) -> String {
        crate::imdp::specification(self.problem_type, self.optimization, self.horizon, mode)
    }
}

/// Outputs of all stages.
#[derive(Debug)]
pub struct BuildOutput {
    pub partition: Partition,
    pub actions: ActionSet,
    /// One entry per action, `None` for actions enabled nowhere.
    pub transitions: Vec<Option<TransitionBounds>>,
    pub imdp: Imdp,
    pub timings: Timings,
}

/// Run the abstraction pipeline end to end.
pub fn build(
    problem: &Problem,
    table: &ScenarioTable,
    scenario: &ScenarioCfg,
    backend: &dyn ActionBackend,
    geom: GeomCfg,
) -> Result<BuildOutput> {
    problem.validate()?;
    scenario.validate()?;
    scenario.check_table(table)?;
    let mut timings = Timings::default();

    let timer = StageTimer::start("partition");
    let partition = Partition::build(problem.partition.clone(), &problem.goal, &problem.critical)?;
    tracing::info!(
        regions = partition.len(),
        goal = partition.goal().len(),
        critical = partition.critical().len(),
        "partition built"
    );
    timer.finish(&mut timings);

    let timer = StageTimer::start("actions");
    let actions = ActionSet::build(&partition, &problem.model, &problem.actuation, &problem.actions, geom)?;
    tracing::info!(actions = actions.len(), enabled = actions.enabled_count(), "actions enabled");
    timer.finish(&mut timings);

    let timer = StageTimer::start("noise");
    let samples = gaussian_samples(&problem.model.nominal().noise_cov, scenario.samples, scenario.seed)?;
    let noise = NoiseSet::new(samples, scenario.clustering)?;
    tracing::info!(samples = scenario.samples, clusters = noise.clusters().len(), "noise drawn");
    timer.finish(&mut timings);

    let timer = StageTimer::start("probabilities");
    let engine = ProbabilityEngine::new(&partition, table);
    tracing::info!(backend = backend.name(), "computing transition probabilities");
    let transitions = backend.run(&engine, &actions.actions, &noise);
    timer.finish(&mut timings);

    let timer = StageTimer::start("assemble");
    let imdp = Imdp::assemble(&partition, &actions, &transitions);
    timer.finish(&mut timings);

    Ok(BuildOutput {
        partition,
        actions,
        transitions,
        imdp,
        timings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::TargetCfg;
    use crate::imdp::REGION_OFFSET;
    use crate::model::LinearDynamics;
    use crate::partition::SpecBox;
    use crate::scenario::{Sequential, Threaded};
    use nalgebra::{dvector, DMatrix, DVector};

    fn table(n: usize) -> ScenarioTable {
        let rows = (0..=n).map(|k| {
            let p = (n - k) as f64 / n as f64;
            (k, (p - 0.05).max(0.0), (p + 0.05).min(1.0))
        });
        ScenarioTable::from_rows(n, 0.01, rows).unwrap()
    }

    fn problem() -> Problem {
        Problem {
            partition: PartitionCfg::from_boundary(&[(0.0, 4.0), (0.0, 4.0)], vec![4, 4]).unwrap(),
            goal: vec![SpecRegion::Box(SpecBox {
                bounds: vec![Some((3.0, 4.0)), Some((3.0, 4.0))],
            })],
            critical: vec![SpecRegion::Box(SpecBox {
                bounds: vec![Some((2.0, 3.0)), Some((0.0, 1.0))],
            })],
            actions: ActionSpec {
                targets: TargetCfg::RegionCenters,
                extra: Vec::new(),
                noise_uncertainty: None,
            },
            horizon: 8,
            problem_type: ProblemType::Reachability,
            optimization: Optimization::Max,
            model: DynamicsModel::Deterministic(LinearDynamics {
                a: DMatrix::identity(2, 2),
                b: DMatrix::identity(2, 2),
                q: DVector::zeros(2),
                u_min: dvector![-1.5, -1.5],
                u_max: dvector![1.5, 1.5],
                noise_cov: DMatrix::identity(2, 2) * 0.05,
            }),
            actuation: ActuationMode::FullyActuated,
        }
    }

    fn scenario() -> ScenarioCfg {
        ScenarioCfg {
            samples: 200,
            confidence: 0.01,
            clustering: None,
            seed: 3,
        }
    }

    #[test]
    fn end_to_end_small_grid() {
        let p = problem();
        let out = build(&p, &table(200), &scenario(), &Sequential, GeomCfg::default()).unwrap();
        assert_eq!(out.partition.len(), 16);
        assert_eq!(out.imdp.states.len(), REGION_OFFSET + 16);
        assert_eq!(out.transitions.len(), out.actions.len());
        for b in out.transitions.iter().flatten() {
            let mass: f64 = b.successors.iter().map(|s| s.estimate).sum::<f64>() + b.deadlock_estimate;
            assert!((mass - 1.0).abs() < 1e-4, "mass {mass}");
            for s in &b.successors {
                assert!(0.0 <= s.lb && s.lb <= s.ub && s.ub <= 1.0, "{s:?}");
            }
        }
        // Every ordinary region can steer at least to its own center.
        for r in 0..out.partition.len() {
            if !out.partition.is_goal(r) && !out.partition.is_critical(r) {
                assert!(
                    out.imdp.states[REGION_OFFSET + r].iter().any(|c| !c.is_self_loop()),
                    "region {r} has no action"
                );
            }
        }
        let stages: Vec<&str> = out.timings.stages().iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(stages, ["partition", "actions", "noise", "probabilities", "assemble"]);
        assert_eq!(p.specification(MdpMode::Interval), "Pmaxmin=? [ F<=8 \"reached\" ]");
    }

    #[test]
    fn backends_agree() {
        let mut cfg = scenario();
        cfg.clustering = Some(0.2);
        let t = table(200);
        let a = build(&problem(), &t, &cfg, &Sequential, GeomCfg::default()).unwrap();
        let b = build(&problem(), &t, &cfg, &Threaded { workers: 3 }, GeomCfg::default()).unwrap();
        assert_eq!(a.transitions, b.transitions);
    }

    #[test]
    fn rejects_mismatched_inputs() {
        let mut p = problem();
        p.horizon = 0;
        assert!(matches!(
            build(&p, &table(200), &scenario(), &Sequential, GeomCfg::default()),
            Err(AbstractionError::InvalidConfig { .. })
        ));
        assert!(matches!(
            build(&problem(), &table(100), &scenario(), &Sequential, GeomCfg::default()),
            Err(AbstractionError::ScenarioTable { .. })
        ));
        let mut p = problem();
        p.actions.extra.push(dvector![1.0]);
        assert!(matches!(
            build(&p, &table(200), &scenario(), &Sequential, GeomCfg::default()),
            Err(AbstractionError::DimensionMismatch { .. })
        ));
    }
}
