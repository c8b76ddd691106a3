//! File boundary: scenario tables, PRISM exchange files and solver outputs.
//!
//! CSV files are read with polars as all-string frames and parsed here, so a
//! malformed cell is reported with its position instead of becoming a null.

use anyhow::{anyhow, bail, Context, Result};
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use scabs::imdp::{Imdp, MdpMode};
use scabs::scenario::ScenarioTable;
use scabs::solution::{RawSolution, Solution};

fn read_strings(path: &Path, has_header: bool) -> Result<DataFrame> {
    LazyCsvReader::new(path)
        .with_has_header(has_header)
        .with_infer_schema_length(Some(0))
        .finish()
        .and_then(|lf| lf.collect())
        .with_context(|| format!("reading CSV {}", path.display()))
}

fn parse_column<T: FromStr>(df: &DataFrame, col: usize, what: &str) -> Result<Vec<T>> {
    let series = &df.get_columns()[col];
    series
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, cell)| {
            let cell = cell.map(str::trim).ok_or_else(|| anyhow!("{what}: empty cell in row {row}"))?;
            cell.parse::<T>()
                .map_err(|_| anyhow!("{what}: cannot parse '{cell}' in row {row}"))
        })
        .collect()
}

/// `SaD_probabilityTable_N=<N>_beta=<β>.csv` inside `dir`.
pub fn default_table_path(dir: &Path, samples: usize, confidence: f64) -> PathBuf {
    dir.join(ScenarioTable::file_name(samples, confidence))
}

/// Scenario table with a header row; first column `k`, last two columns
/// the lower and upper bound.
pub fn load_table(path: &Path, samples: usize, confidence: f64) -> Result<ScenarioTable> {
    if !path.exists() {
        bail!(
            "scenario table {} not found; tables are computed per (N, beta) and must be provided",
            path.display()
        );
    }
    let df = read_strings(path, true)?;
    if df.width() < 3 {
        bail!("scenario table {} has {} columns, expected at least 3", path.display(), df.width());
    }
    let k: Vec<usize> = parse_column(&df, 0, "table k")?;
    let lo: Vec<f64> = parse_column(&df, df.width() - 2, "table lower bound")?;
    let hi: Vec<f64> = parse_column(&df, df.width() - 1, "table upper bound")?;
    let rows = k.into_iter().zip(lo).zip(hi).map(|((k, lo), hi)| (k, lo, hi));
    let table = ScenarioTable::from_rows(samples, confidence, rows)
        .with_context(|| format!("validating scenario table {}", path.display()))?;
    tracing::info!(path = %path.display(), samples, confidence, "scenario table loaded");
    Ok(table)
}

/// Headerless policy (one row per step, one string cell per state) and
/// value vector (one value per line).
pub fn load_solver_output(policy: &Path, vector: &Path) -> Result<RawSolution> {
    let df = read_strings(policy, false)?;
    let columns = df
        .get_columns()
        .iter()
        .map(|s| s.str().map(|c| c.into_iter().map(|v| v.map(str::to_string)).collect::<Vec<_>>()))
        .collect::<PolarsResult<Vec<_>>>()?;
    let policy_rows = (0..df.height())
        .map(|row| columns.iter().map(|c| c[row].clone()).collect())
        .collect();
    let values_df = read_strings(vector, false)?;
    if values_df.width() == 0 {
        bail!("value vector {} is empty", vector.display());
    }
    let values = parse_column(&values_df, 0, "value vector")?;
    Ok(RawSolution { policy_rows, values })
}

/// Paths of one exported model.
#[derive(Clone, Debug, Serialize)]
pub struct ExchangeFiles {
    pub sta: PathBuf,
    pub lab: PathBuf,
    pub tra: PathBuf,
    pub pctl: PathBuf,
}

impl ExchangeFiles {
    pub fn new(dir: &Path, mode: MdpMode) -> Self {
        let stem = match mode {
            MdpMode::Interval => "model_interval",
            MdpMode::Estimate => "model_estimate",
        };
        Self {
            sta: dir.join(format!("{stem}.sta")),
            lab: dir.join(format!("{stem}.lab")),
            tra: dir.join(format!("{stem}.tra")),
            pctl: dir.join(format!("{stem}.pctl")),
        }
    }

    /// Argument for `-importmodel`: the shared stem with extension `.all`.
    pub fn import_arg(&self) -> PathBuf {
        self.tra.with_extension("all")
    }

    pub fn write(&self, imdp: &Imdp, mode: MdpMode, specification: &str) -> Result<()> {
        if let Some(parent) = self.tra.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let create = |p: &Path| -> Result<BufWriter<File>> {
            Ok(BufWriter::new(File::create(p).with_context(|| format!("creating {}", p.display()))?))
        };
        let mut w = create(&self.sta)?;
        imdp.write_sta(&mut w)?;
        w.flush()?;
        let mut w = create(&self.lab)?;
        imdp.write_lab(&mut w)?;
        w.flush()?;
        let mut w = create(&self.tra)?;
        imdp.write_tra(&mut w, mode)?;
        w.flush()?;
        fs::write(&self.pctl, format!("{specification}\n"))
            .with_context(|| format!("writing {}", self.pctl.display()))?;
        tracing::info!(tra = %self.tra.display(), "exchange files written");
        Ok(())
    }
}

#[derive(Serialize)]
struct SolutionDoc<'a> {
    specification: &'a str,
    horizon: usize,
    policy: &'a [Vec<Option<usize>>],
    values: &'a [f64],
}

pub fn write_solution(path: &Path, solution: &Solution, specification: &str) -> Result<()> {
    let doc = SolutionDoc {
        specification,
        horizon: solution.horizon(),
        policy: &solution.policy,
        values: &solution.values,
    };
    fs::write(path, serde_json::to_vec_pretty(&doc)?).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scabs::imdp::ProblemType;
    use tempfile::tempdir;

    #[test]
    fn table_round_trip_from_csv() {
        let dir = tempdir().unwrap();
        let path = default_table_path(dir.path(), 4, 0.01);
        assert!(path.ends_with("SaD_probabilityTable_N=4_beta=0.01.csv"));
        let mut csv = String::from("k,N,beta,p_low,p_upp\n");
        for k in 0..=4 {
            let p = (4 - k) as f64 / 4.0;
            csv.push_str(&format!("{k},4,0.01,{},{}\n", (p - 0.1f64).max(0.0), (p + 0.1f64).min(1.0)));
        }
        fs::write(&path, csv).unwrap();
        let table = load_table(&path, 4, 0.01).unwrap();
        assert_eq!(table.bounds(0), (0.9, 1.0));
        assert!(load_table(&path, 5, 0.01).is_err());
        assert!(load_table(&dir.path().join("missing.csv"), 4, 0.01).is_err());
    }

    #[test]
    fn solver_output_parsed_and_validated() {
        let dir = tempdir().unwrap();
        let policy = dir.path().join("policy.csv");
        let vector = dir.path().join("vector.csv");
        // Two steps (last first), three specials plus two regions.
        fs::write(&policy, ",,,a_2,\n,,,a_0,a_1\n").unwrap();
        fs::write(&vector, "0\n1\n0\n0.4\n0.7\n").unwrap();
        let raw = load_solver_output(&policy, &vector).unwrap();
        assert_eq!(raw.policy_rows.len(), 2);
        assert_eq!(raw.policy_rows[0][3].as_deref(), Some("a_2"));
        assert_eq!(raw.policy_rows[0][4], None);
        let s = Solution::from_raw(&raw, 2, 2, 3, ProblemType::Reachability).unwrap();
        assert_eq!(s.policy[0], vec![Some(0), Some(1)]);
        assert_eq!(s.policy[1], vec![Some(2), None]);
        assert_eq!(s.values, vec![0.4, 0.7]);

        let out = dir.path().join("solution.json");
        write_solution(&out, &s, "Pmaxmin=? [ F<=2 \"reached\" ]").unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&fs::read(out).unwrap()).unwrap();
        assert_eq!(doc["horizon"], 2);
        assert_eq!(doc["policy"][1][1], serde_json::Value::Null);
    }
}
