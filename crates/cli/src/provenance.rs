use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use scabs::timing::Timings;

/// Metadata recorded next to an artifact.
pub struct Payload {
    pub params: Value,
    pub timings: Option<Timings>,
    pub extra: Map<String, Value>,
}

impl Payload {
    pub fn new(params: Value) -> Self {
        Self {
            params,
            timings: None,
            extra: Map::new(),
        }
    }

    pub fn with_timings(mut self, timings: &Timings) -> Self {
        self.timings = Some(timings.clone());
        self
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

fn timings_json(t: &Timings) -> Value {
    let stages: Map<String, Value> = t
        .stages()
        .iter()
        .map(|(name, d)| (name.clone(), json!(d.as_secs_f64())))
        .collect();
    json!({ "stages_s": stages, "total_s": t.total().as_secs_f64() })
}

/// Write `<artifact>.provenance.json` with code revision, version, params,
/// stage timings and outputs.
pub fn write_sidecar<P: AsRef<Path>>(artifact: P, outputs: &[PathBuf], payload: Payload) -> Result<PathBuf> {
    let artifact = artifact.as_ref();
    let provenance_path = provenance_path(artifact);
    if let Some(parent) = provenance_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating provenance dir {}", parent.display()))?;
        }
    }
    let mut doc = json!({
        "code_rev": current_git_rev(),
        "version": scabs::VERSION,
        "params": payload.params,
        "timings": payload.timings.as_ref().map(timings_json),
        "outputs": outputs.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
    });
    if let Value::Object(map) = &mut doc {
        map.extend(payload.extra);
    }
    fs::write(&provenance_path, serde_json::to_vec_pretty(&doc)?)
        .with_context(|| format!("writing {}", provenance_path.display()))?;
    Ok(provenance_path)
}

fn provenance_path(artifact: &Path) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("artifact"));
    let mut name = stem;
    name.push(".provenance.json");
    artifact.with_file_name(name)
}

pub fn current_git_rev() -> String {
    if let Some(from_env) = option_env!("GIT_COMMIT") {
        if !from_env.is_empty() {
            return from_env.to_string();
        }
    }
    if let Ok(env_override) = std::env::var("GIT_COMMIT") {
        if !env_override.is_empty() {
            return env_override;
        }
    }
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn provenance_path_rewrites_extension() {
        let base = Path::new("/tmp/output/model_interval.tra");
        assert_eq!(provenance_path(base), Path::new("/tmp/output/model_interval.provenance.json"));
    }

    #[test]
    fn sidecar_records_timings_and_outputs() {
        let dir = tempdir().unwrap();
        let tra = dir.path().join("model_interval.tra");
        let artifact = tra.clone();
        let mut timings = Timings::default();
        timings.record("partition", Duration::from_millis(250));
        let payload = Payload::new(json!({"samples": 3200}))
            .with_timings(&timings)
            .with("model_size", json!({"states": 7}));
        let path = write_sidecar(&artifact, &[tra.clone()], payload).unwrap();
        let parsed: Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(parsed["outputs"][0], tra.to_string_lossy().as_ref());
        assert_eq!(parsed["timings"]["stages_s"]["partition"], 0.25);
        assert_eq!(parsed["model_size"]["states"], 7);
        assert_eq!(parsed["params"]["samples"], 3200);
    }
}
