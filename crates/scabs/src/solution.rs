//! Re-import of solver results.
//!
//! The solver writes one policy row per time step (last step first) with one
//! column per state, and one value per state. Both use the state layout of
//! `imdp`, so the first `REGION_OFFSET` columns/rows belong to the special
//! states and are dropped here.

use crate::error::{AbstractionError, Result};
use crate::imdp::{ProblemType, REGION_OFFSET};

pub const POLICY_COLUMN_OFFSET: usize = REGION_OFFSET;
pub const VALUE_ROW_OFFSET: usize = REGION_OFFSET;
/// Policy cell value meaning "no action".
pub const NO_ACTION: i64 = -1;

/// Solver output as read from disk: raw cells, nothing interpreted yet.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSolution {
    /// Rows as written (last time step first); empty cells are `None`.
    pub policy_rows: Vec<Vec<Option<String>>>,
    /// One value per state, special states included.
    pub values: Vec<f64>,
}

/// Policy and values per region, time running forward.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    /// `policy[k][r]`: action to take in region `r` at step `k`.
    pub policy: Vec<Vec<Option<usize>>>,
    /// Reach or safety probability per region.
    pub values: Vec<f64>,
}

/// Parse one policy cell: `a_<idx>`, a bare index, empty, or `-1`.
fn parse_action(cell: Option<&str>, actions: usize) -> Result<Option<usize>> {
    let Some(raw) = cell.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let digits = raw.split_once('_').map_or(raw, |(_, rest)| rest);
    let idx: i64 = digits
        .parse()
        .map_err(|_| AbstractionError::solver(format!("unreadable policy entry '{raw}'")))?;
    if idx == NO_ACTION {
        return Ok(None);
    }
    if idx < 0 || idx as usize >= actions {
        return Err(AbstractionError::solver(format!(
            "policy refers to action {idx}, but only {actions} actions exist"
        )));
    }
    Ok(Some(idx as usize))
}

impl Solution {
    /// Validate shapes against the abstraction and convert to forward time.
    pub fn from_raw(
        raw: &RawSolution,
        regions: usize,
        horizon: usize,
        actions: usize,
        problem: ProblemType,
    ) -> Result<Self> {
        if raw.policy_rows.len() != horizon {
            return Err(AbstractionError::solver(format!(
                "policy has {} time steps, expected {horizon}",
                raw.policy_rows.len()
            )));
        }
        let mut policy = Vec::with_capacity(horizon);
        for (k, row) in raw.policy_rows.iter().rev().enumerate() {
            if row.len() != POLICY_COLUMN_OFFSET + regions {
                return Err(AbstractionError::solver(format!(
                    "policy row {k} has {} columns, expected {}",
                    row.len(),
                    POLICY_COLUMN_OFFSET + regions
                )));
            }
            policy.push(
                row[POLICY_COLUMN_OFFSET..]
                    .iter()
                    .map(|c| parse_action(c.as_deref(), actions))
                    .collect::<Result<Vec<_>>>()?,
            );
        }
        if raw.values.len() != VALUE_ROW_OFFSET + regions {
            return Err(AbstractionError::solver(format!(
                "value vector has {} entries, expected {}",
                raw.values.len(),
                VALUE_ROW_OFFSET + regions
            )));
        }
        let values = raw.values[VALUE_ROW_OFFSET..]
            .iter()
            .map(|&v| {
                if !(v.is_finite() && (-1e-9..=1.0 + 1e-9).contains(&v)) {
                    return Err(AbstractionError::solver(format!("value {v} is not a probability")));
                }
                let v = v.clamp(0.0, 1.0);
                Ok(match problem {
                    ProblemType::Reachability => v,
                    ProblemType::Safety => 1.0 - v,
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(Self { policy, values })
    }

    pub fn horizon(&self) -> usize {
        self.policy.len()
    }
}
