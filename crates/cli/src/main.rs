use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::SubscriberBuilder;

use scabs::imdp::MdpMode;
use scabs::scenario::{ActionBackend, ScenarioCfg, Sequential, Threaded};
use scabs::solution::Solution;
use scabs::{BuildOutput, GeomCfg, Problem};

mod config;
mod io;
mod prism;
mod provenance;

#[derive(Parser)]
#[command(name = "scabs")]
#[command(about = "Scenario-based interval MDP abstraction of linear stochastic systems")]
struct Cmd {
    /// Log per-action progress
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Build the abstraction and write PRISM exchange files
    Build(BuildArgs),
    /// Build, run PRISM, and import its policy and values
    Solve {
        #[command(flatten)]
        build: BuildArgs,
        /// PRISM executable
        #[arg(long)]
        prism: PathBuf,
        /// JVM memory limit in GB
        #[arg(long, default_value_t = 8)]
        java_mem: u32,
    },
    /// Parse existing solver outputs against a problem file
    Import {
        #[arg(long)]
        problem: PathBuf,
        #[arg(long)]
        policy: PathBuf,
        #[arg(long)]
        vector: PathBuf,
        /// Where to write solution.json (defaults next to the policy file)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Model the outputs were computed on
        #[arg(long, value_enum, default_value_t = ModeArg::Interval)]
        mode: ModeArg,
    },
    /// Print a small provenance JSON block
    Report,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Interval,
    Estimate,
}

impl From<ModeArg> for MdpMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Interval => MdpMode::Interval,
            ModeArg::Estimate => MdpMode::Estimate,
        }
    }
}

#[derive(Args)]
struct BuildArgs {
    /// Problem definition (JSON)
    #[arg(long)]
    problem: PathBuf,
    /// Scenario table CSV; overrides --table-dir
    #[arg(long)]
    table: Option<PathBuf>,
    /// Directory holding SaD_probabilityTable_N=<N>_beta=<beta>.csv
    #[arg(long, default_value = "input")]
    table_dir: PathBuf,
    /// Output directory
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 3200)]
    samples: usize,
    #[arg(long, default_value_t = 0.01)]
    confidence: f64,
    /// Cluster noise samples within this radius
    #[arg(long)]
    clustering: Option<f64>,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Worker threads for the probability computation
    #[arg(long, default_value_t = 1)]
    threads: usize,
    #[arg(long, value_enum, default_value_t = ModeArg::Interval)]
    mode: ModeArg,
}

impl BuildArgs {
    fn scenario(&self) -> ScenarioCfg {
        ScenarioCfg {
            samples: self.samples,
            confidence: self.confidence,
            clustering: self.clustering,
            seed: self.seed,
        }
    }

    fn params(&self) -> serde_json::Value {
        json!({
            "problem": self.problem,
            "samples": self.samples,
            "confidence": self.confidence,
            "clustering": self.clustering,
            "seed": self.seed,
            "threads": self.threads,
            "mode": format!("{:?}", self.mode).to_lowercase(),
        })
    }
}

struct Built {
    problem: Problem,
    output: BuildOutput,
    files: io::ExchangeFiles,
    mode: MdpMode,
    specification: String,
}

fn main() -> Result<()> {
    let cmd = Cmd::parse();
    let level = if cmd.verbose { Level::DEBUG } else { Level::INFO };
    SubscriberBuilder::default().with_target(false).with_max_level(level).init();
    match cmd.action {
        Action::Build(args) => build(&args).map(|_| ()),
        Action::Solve { build: args, prism, java_mem } => solve(&args, prism, java_mem),
        Action::Import {
            problem,
            policy,
            vector,
            out,
            mode,
        } => import(&problem, &policy, &vector, out, mode.into()),
        Action::Report => report(),
    }
}

fn build(args: &BuildArgs) -> Result<Built> {
    let problem = config::load(&args.problem)?.to_problem()?;
    let table_path = args
        .table
        .clone()
        .unwrap_or_else(|| io::default_table_path(&args.table_dir, args.samples, args.confidence));
    let table = io::load_table(&table_path, args.samples, args.confidence)?;
    let backend: Box<dyn ActionBackend> = if args.threads > 1 {
        Box::new(Threaded { workers: args.threads })
    } else {
        Box::new(Sequential)
    };
    tracing::info!(problem = %args.problem.display(), backend = backend.name(), "build");
    let output = scabs::build(&problem, &table, &args.scenario(), backend.as_ref(), GeomCfg::default())
        .context("building abstraction")?;

    let mode: MdpMode = args.mode.into();
    let specification = problem.specification(mode);
    let files = io::ExchangeFiles::new(&args.out, mode);
    files.write(&output.imdp, mode, &specification)?;
    let size = output.imdp.size(mode);
    tracing::info!(
        states = size.states,
        choices = size.choices,
        transitions = size.transitions,
        "model size"
    );

    let payload = provenance::Payload::new(args.params())
        .with_timings(&output.timings)
        .with("specification", json!(specification))
        .with(
            "model_size",
            json!({"states": size.states, "choices": size.choices, "transitions": size.transitions}),
        )
        .with("regions", json!(output.partition.len()))
        .with("actions", json!(output.actions.len()))
        .with("table", json!(table_path));
    provenance::write_sidecar(
        &files.tra,
        &[files.sta.clone(), files.lab.clone(), files.tra.clone(), files.pctl.clone()],
        payload,
    )?;
    Ok(Built {
        problem,
        output,
        files,
        mode,
        specification,
    })
}

fn solve(args: &BuildArgs, binary: PathBuf, java_mem_gb: u32) -> Result<()> {
    let built = build(args)?;
    let prefix = match built.mode {
        MdpMode::Interval => "PRISM_interval",
        MdpMode::Estimate => "PRISM_estimate",
    };
    let outputs = prism::SolverOutputs::in_dir(&args.out, prefix);
    let solver = prism::Prism { binary, java_mem_gb };
    solver.solve(&built.files.import_arg(), &built.specification, &outputs)?;

    let raw = io::load_solver_output(&outputs.policy, &outputs.vector)?;
    let solution = Solution::from_raw(
        &raw,
        built.output.partition.len(),
        built.problem.horizon,
        built.output.actions.len(),
        built.problem.problem_type,
    )?;
    let out = args.out.join("solution.json");
    io::write_solution(&out, &solution, &built.specification)?;
    log_summary(&solution);
    provenance::write_sidecar(
        &out,
        &[out.clone()],
        provenance::Payload::new(args.params()).with("prism", json!(solver.binary)),
    )?;
    Ok(())
}

fn import(problem_path: &Path, policy: &Path, vector: &Path, out: Option<PathBuf>, mode: MdpMode) -> Result<()> {
    let problem = config::load(problem_path)?.to_problem()?;
    let raw = io::load_solver_output(policy, vector)?;
    let solution = Solution::from_raw(
        &raw,
        problem.partition.region_count(),
        problem.horizon,
        problem.actions.count(&problem.partition),
        problem.problem_type,
    )?;
    let out = out.unwrap_or_else(|| policy.with_file_name("solution.json"));
    io::write_solution(&out, &solution, &problem.specification(mode))?;
    log_summary(&solution);
    Ok(())
}

fn log_summary(solution: &Solution) {
    let best = solution.values.iter().copied().fold(0.0, f64::max);
    let mean = solution.values.iter().sum::<f64>() / solution.values.len().max(1) as f64;
    tracing::info!(
        regions = solution.values.len(),
        horizon = solution.horizon(),
        best,
        mean,
        "solution imported"
    );
}

fn report() -> Result<()> {
    let obj = json!({
        "code_rev": provenance::current_git_rev(),
        "version": scabs::VERSION,
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_table(dir: &Path, n: usize) {
        let mut csv = String::from("k,p_low,p_upp\n");
        for k in 0..=n {
            let p = (n - k) as f64 / n as f64;
            csv.push_str(&format!("{k},{},{}\n", (p - 0.05f64).max(0.0), (p + 0.05f64).min(1.0)));
        }
        fs::write(io::default_table_path(dir, n, 0.01), csv).unwrap();
    }

    #[test]
    fn build_writes_exchange_files_and_provenance() {
        let dir = tempdir().unwrap();
        let problem = dir.path().join("problem.json");
        fs::write(&problem, config::SAMPLE).unwrap();
        write_table(dir.path(), 100);
        let args = BuildArgs::from_flags([
            "--problem",
            problem.to_str().unwrap(),
            "--table-dir",
            dir.path().to_str().unwrap(),
            "--out",
            dir.path().join("out").to_str().unwrap(),
            "--samples",
            "100",
        ]);
        let built = build(&args).unwrap();
        assert!(built.files.tra.exists());
        let tra = fs::read_to_string(&built.files.tra).unwrap();
        let header: Vec<usize> = tra
            .lines()
            .next()
            .unwrap()
            .split(' ')
            .map(|x| x.parse().unwrap())
            .collect();
        assert_eq!(header[0], 3 + 16);
        let prov = dir.path().join("out").join("model_interval.provenance.json");
        let doc: serde_json::Value = serde_json::from_slice(&fs::read(prov).unwrap()).unwrap();
        assert_eq!(doc["regions"], 16);
        assert_eq!(doc["params"]["samples"], 100);
        assert!(doc["timings"]["stages_s"]["probabilities"].is_number());
    }

    #[test]
    fn import_records_the_property_of_its_mode() {
        let dir = tempdir().unwrap();
        let problem = dir.path().join("problem.json");
        fs::write(&problem, config::SAMPLE).unwrap();
        let policy = dir.path().join("policy.csv");
        let vector = dir.path().join("vector.csv");
        // Horizon 6 over 3 specials plus 16 regions.
        let row = format!(",,,{}\n", vec!["a_0"; 16].join(","));
        fs::write(&policy, row.repeat(6)).unwrap();
        let values: String = (0..19).map(|i| format!("{}\n", if i < 3 { 0.0 } else { 0.5 })).collect();
        fs::write(&vector, values).unwrap();

        let read_spec = |out: &Path| {
            let doc: serde_json::Value = serde_json::from_slice(&fs::read(out).unwrap()).unwrap();
            doc["specification"].as_str().unwrap().to_string()
        };
        let out = dir.path().join("estimate.json");
        import(&problem, &policy, &vector, Some(out.clone()), MdpMode::Estimate).unwrap();
        assert_eq!(read_spec(&out), "Pmax=? [ F<=6 \"reached\" ]");
        let out = dir.path().join("interval.json");
        import(&problem, &policy, &vector, Some(out.clone()), MdpMode::Interval).unwrap();
        assert_eq!(read_spec(&out), "Pmaxmin=? [ F<=6 \"reached\" ]");
    }

    #[test]
    fn missing_table_is_reported() {
        let dir = tempdir().unwrap();
        let problem = dir.path().join("problem.json");
        fs::write(&problem, config::SAMPLE).unwrap();
        let args = BuildArgs::from_flags([
            "--problem",
            problem.to_str().unwrap(),
            "--table-dir",
            dir.path().to_str().unwrap(),
            "--out",
            dir.path().to_str().unwrap(),
        ]);
        let err = build(&args).err().unwrap();
        assert!(format!("{err:#}").contains("not found"));
    }

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: BuildArgs,
    }

    impl BuildArgs {
        fn from_flags<'a>(args: impl IntoIterator<Item = &'a str>) -> BuildArgs {
            Wrapper::try_parse_from(std::iter::once("scabs").chain(args)).unwrap().args
        }
    }
}
