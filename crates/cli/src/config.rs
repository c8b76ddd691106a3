//! JSON problem files and their conversion into library types.
//!
//! Matrices are row lists, intervals are `[lo, hi]` pairs. Optional parts
//! (`actuation`, `a_set`, `noise_uncertainty`) select the tagged library
//! variants by presence.

use anyhow::{bail, Context, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use scabs::prelude::*;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProblemFile {
    pub partition: PartitionFile,
    #[serde(default)]
    pub goal: Vec<RegionFile>,
    #[serde(default)]
    pub critical: Vec<RegionFile>,
    #[serde(default)]
    pub targets: TargetsFile,
    #[serde(default)]
    pub extra_targets: Vec<Vec<f64>>,
    #[serde(default)]
    pub noise_uncertainty: Option<ErrorFile>,
    pub horizon: usize,
    #[serde(default)]
    pub problem_type: ProblemTypeFile,
    #[serde(default)]
    pub optimization: OptimizationFile,
    pub dynamics: DynamicsFile,
    #[serde(default)]
    pub actuation: Option<ActuationFile>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PartitionFile {
    pub boundary: Vec<[f64; 2]>,
    pub number: Vec<usize>,
}

/// Goal or critical set: a box over region centers (`null` = whole axis) or
/// an explicit block of center coordinates (`null` = every center).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionFile {
    Box(Vec<Option<[f64; 2]>>),
    Block(Vec<Option<Vec<f64>>>),
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetsFile {
    #[default]
    RegionCenters,
    Grid {
        boundary: Vec<[f64; 2]>,
        number: Vec<usize>,
    },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ErrorFile {
    pub neg: Vec<f64>,
    pub pos: Vec<f64>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemTypeFile {
    #[default]
    Reachability,
    Safety,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationFile {
    #[default]
    Max,
    Min,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DynamicsFile {
    #[serde(rename = "A")]
    pub a: Vec<Vec<f64>>,
    #[serde(rename = "B")]
    pub b: Vec<Vec<f64>>,
    #[serde(default)]
    pub q: Option<Vec<f64>>,
    pub u_min: Vec<f64>,
    pub u_max: Vec<f64>,
    pub noise_cov: Vec<Vec<f64>>,
    /// Vertices of the parametric uncertainty set of `A`.
    #[serde(default)]
    pub a_set: Vec<Vec<Vec<f64>>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ActuationFile {
    pub default: ErrorFile,
    #[serde(default)]
    pub extra: Option<ErrorFile>,
}

pub fn load(path: &Path) -> Result<ProblemFile> {
    let bytes = fs::read(path).with_context(|| format!("reading problem file {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing problem file {}", path.display()))
}

fn matrix(what: &str, rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some(r) = rows.iter().position(|r| r.len() != ncols) {
        bail!("{what}: row {r} has {} entries, expected {ncols}", rows[r].len());
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

fn error_box(e: &ErrorFile) -> Result<ErrorBox> {
    Ok(ErrorBox::from_bounds(
        DVector::from_vec(e.neg.clone()),
        DVector::from_vec(e.pos.clone()),
    )?)
}

fn pairs(v: &[[f64; 2]]) -> Vec<(f64, f64)> {
    v.iter().map(|&[lo, hi]| (lo, hi)).collect()
}

fn region(r: &RegionFile) -> SpecRegion {
    match r {
        RegionFile::Box(bounds) => SpecRegion::Box(SpecBox {
            bounds: bounds.iter().map(|b| b.map(|[lo, hi]| (lo, hi))).collect(),
        }),
        RegionFile::Block(axes) => SpecRegion::Block(
            axes.iter()
                .map(|a| match a {
                    None => BlockAxis::All,
                    Some(values) => BlockAxis::Values(values.clone()),
                })
                .collect(),
        ),
    }
}

impl ProblemFile {
    pub fn to_problem(&self) -> Result<Problem> {
        let d = &self.dynamics;
        let a = matrix("A", &d.a)?;
        let nominal = LinearDynamics {
            q: d.q.clone().map_or_else(|| DVector::zeros(a.nrows()), DVector::from_vec),
            b: matrix("B", &d.b)?,
            u_min: DVector::from_vec(d.u_min.clone()),
            u_max: DVector::from_vec(d.u_max.clone()),
            noise_cov: matrix("noise_cov", &d.noise_cov)?,
            a,
        };
        let model = if d.a_set.is_empty() {
            DynamicsModel::Deterministic(nominal)
        } else {
            DynamicsModel::Parametric {
                nominal,
                a_set: d.a_set.iter().map(|m| matrix("a_set", m)).collect::<Result<_>>()?,
            }
        };
        let actuation = match &self.actuation {
            None => ActuationMode::FullyActuated,
            Some(act) => ActuationMode::Underactuated(BackreachCfg {
                default: error_box(&act.default)?,
                extra: act.extra.as_ref().map(error_box).transpose()?,
            }),
        };
        let targets = match &self.targets {
            TargetsFile::RegionCenters => TargetCfg::RegionCenters,
            TargetsFile::Grid { boundary, number } => TargetCfg::Grid {
                boundary: pairs(boundary),
                number: number.clone(),
            },
        };
        let problem = Problem {
            partition: PartitionCfg::from_boundary(&pairs(&self.partition.boundary), self.partition.number.clone())?,
            goal: self.goal.iter().map(region).collect(),
            critical: self.critical.iter().map(region).collect(),
            actions: ActionSpec {
                targets,
                extra: self.extra_targets.iter().map(|x| DVector::from_vec(x.clone())).collect(),
                noise_uncertainty: self.noise_uncertainty.as_ref().map(error_box).transpose()?,
            },
            horizon: self.horizon,
            problem_type: match self.problem_type {
                ProblemTypeFile::Reachability => ProblemType::Reachability,
                ProblemTypeFile::Safety => ProblemType::Safety,
            },
            optimization: match self.optimization {
                OptimizationFile::Max => Optimization::Max,
                OptimizationFile::Min => Optimization::Min,
            },
            model,
            actuation,
        };
        problem.validate()?;
        Ok(problem)
    }
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"{
    "partition": { "boundary": [[0, 4], [0, 4]], "number": [4, 4] },
    "goal": [ { "box": [[3, 4], [3, 4]] } ],
    "critical": [ { "block": [[2.5], null] } ],
    "horizon": 6,
    "dynamics": {
        "A": [[1, 0], [0, 1]],
        "B": [[1, 0], [0, 1]],
        "u_min": [-1.5, -1.5],
        "u_max": [1.5, 1.5],
        "noise_cov": [[0.05, 0], [0, 0.05]]
    }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_problem_converts() {
        let file: ProblemFile = serde_json::from_str(SAMPLE).unwrap();
        let p = file.to_problem().unwrap();
        assert_eq!(p.partition.number, vec![4, 4]);
        assert_eq!(p.horizon, 6);
        assert!(matches!(p.model, DynamicsModel::Deterministic(_)));
        assert_eq!(p.actuation, ActuationMode::FullyActuated);
        assert_eq!(p.actions.targets, TargetCfg::RegionCenters);
        assert_eq!(p.problem_type, ProblemType::Reachability);
        assert!(matches!(&p.critical[0], SpecRegion::Block(axes) if axes[1] == BlockAxis::All));
    }

    #[test]
    fn parametric_and_underactuated_variants() {
        let mut file: ProblemFile = serde_json::from_str(SAMPLE).unwrap();
        file.dynamics.a_set = vec![vec![vec![1.1, 0.0], vec![0.0, 1.0]]];
        file.actuation = Some(ActuationFile {
            default: ErrorFile {
                neg: vec![-0.1, -0.1],
                pos: vec![0.1, 0.1],
            },
            extra: None,
        });
        file.problem_type = ProblemTypeFile::Safety;
        let p = file.to_problem().unwrap();
        assert!(p.model.is_parametric());
        assert!(matches!(p.actuation, ActuationMode::Underactuated(_)));
        assert_eq!(p.problem_type, ProblemType::Safety);
    }

    #[test]
    fn ragged_matrix_rejected() {
        let mut file: ProblemFile = serde_json::from_str(SAMPLE).unwrap();
        file.dynamics.a = vec![vec![1.0, 0.0], vec![0.0]];
        assert!(file.to_problem().is_err());
    }
}
