//! Synchronous PRISM invocation on exported explicit models.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Solver binary and JVM memory limit in GB.
#[derive(Clone, Debug)]
pub struct Prism {
    pub binary: PathBuf,
    pub java_mem_gb: u32,
}

/// Where the solver writes its results.
#[derive(Clone, Debug)]
pub struct SolverOutputs {
    pub policy: PathBuf,
    pub vector: PathBuf,
}

impl SolverOutputs {
    pub fn in_dir(dir: &Path, prefix: &str) -> Self {
        Self {
            policy: dir.join(format!("{prefix}_policy.csv")),
            vector: dir.join(format!("{prefix}_vector.csv")),
        }
    }
}

impl Prism {
    pub fn args(&self, model: &Path, specification: &str, out: &SolverOutputs) -> Vec<OsString> {
        vec![
            "-javamaxmem".into(),
            format!("{}g", self.java_mem_gb).into(),
            "-importmodel".into(),
            model.into(),
            "-pf".into(),
            specification.into(),
            "-ex".into(),
            "-exportadv".into(),
            out.policy.as_os_str().to_owned(),
            "-exportvector".into(),
            out.vector.as_os_str().to_owned(),
        ]
    }

    /// Run to completion. A non-zero exit or a missing output file is fatal
    /// for this run; stale outputs are removed first.
    pub fn solve(&self, model: &Path, specification: &str, out: &SolverOutputs) -> Result<()> {
        for p in [&out.policy, &out.vector] {
            if p.exists() {
                std::fs::remove_file(p).with_context(|| format!("removing stale {}", p.display()))?;
            }
        }
        tracing::info!(binary = %self.binary.display(), specification, "starting PRISM");
        let status = Command::new(&self.binary)
            .args(self.args(model, specification, out))
            .status()
            .with_context(|| format!("launching {}", self.binary.display()))?;
        if !status.success() {
            bail!("PRISM exited with {status}");
        }
        for p in [&out.policy, &out.vector] {
            if !p.exists() {
                bail!("PRISM finished but did not write {}", p.display());
            }
        }
        tracing::info!("PRISM finished");
        Ok(())
    }
}
