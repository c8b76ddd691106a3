//! Scenario-approach confidence table.

use crate::error::{AbstractionError, Result};

/// Dense lookup `k ↦ (lower, upper)` for `k = 0..=N` discarded samples.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioTable {
    samples: usize,
    confidence: f64,
    rows: Vec<(f64, f64)>,
}

impl ScenarioTable {
    /// Build from `(k, lower, upper)` rows. Every `k` in `0..=samples` must
    /// appear exactly once and satisfy `0 <= lower <= upper <= 1`.
    pub fn from_rows(
        samples: usize,
        confidence: f64,
        rows: impl IntoIterator<Item = (usize, f64, f64)>,
    ) -> Result<Self> {
        if samples == 0 {
            return Err(AbstractionError::table("sample count must be positive"));
        }
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(AbstractionError::table(format!(
                "confidence level must lie in (0, 1), got {confidence}"
            )));
        }
        let mut dense: Vec<Option<(f64, f64)>> = vec![None; samples + 1];
        for (k, lo, hi) in rows {
            if k > samples {
                return Err(AbstractionError::table(format!("row {k} exceeds sample count {samples}")));
            }
            if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
                return Err(AbstractionError::table(format!("row {k} has invalid bounds [{lo}, {hi}]")));
            }
            if dense[k].replace((lo, hi)).is_some() {
                return Err(AbstractionError::table(format!("row {k} appears twice")));
            }
        }
        let missing = dense.iter().filter(|r| r.is_none()).count();
        if missing > 0 {
            let first = dense.iter().position(Option::is_none).unwrap_or(0);
            return Err(AbstractionError::table(format!(
                "{missing} of {} rows missing (first missing: {first})",
                samples + 1
            )));
        }
        Ok(Self {
            samples,
            confidence,
            rows: dense.into_iter().flatten().collect(),
        })
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Bounds for `k` discarded samples; `k` beyond `N` is clamped to `N`.
    pub fn bounds(&self, k: usize) -> (f64, f64) {
        self.rows[k.min(self.samples)]
    }

    pub fn lower(&self, k: usize) -> f64 {
        self.bounds(k).0
    }

    pub fn upper(&self, k: usize) -> f64 {
        self.bounds(k).1
    }

    /// Conventional file name of a precomputed table.
    pub fn file_name(samples: usize, confidence: f64) -> String {
        format!("SaD_probabilityTable_N={samples}_beta={confidence}.csv")
    }
}
