use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use humantime::Duration;

use crate::{
    echidna::{
        artifacts, coverage,
        process::{EchidnaProcess, FuzzRequest},
    },
    corpus::io,
    pipeline,
    symbolic::engine::ExternalSolver,
};

#[derive(Parser, Clone)]
pub(crate) struct SolverOpts {
    /// Program reading abstract transactions on stdin and printing a model.
    #[clap(long, env = "HYBRIDFUZZ_SOLVER")]
    solver: PathBuf,
    #[clap(long = "solver-arg", allow_hyphen_values = true)]
    solver_args: Vec<String>,
    #[clap(long, default_value = "60s")]
    solver_timeout: Duration,
}

impl SolverOpts {
    fn engine(&self) -> ExternalSolver {
        ExternalSolver {
            program: self.solver.clone(),
            args: self.solver_args.clone(),
            timeout: self.solver_timeout.into(),
        }
    }
}

#[derive(Parser, Clone)]
pub(crate) struct SolveOpts {
    /// Corpus entry or corpus directory.
    input: PathBuf,
    #[clap(flatten)]
    solver: SolverOpts,
}

pub(crate) fn run_solve(opts: SolveOpts) -> anyhow::Result<()> {
    let mut engine = opts.solver.engine();
    let solved = if opts.input.is_dir() {
        pipeline::solve_corpus(&io::entry_dir(&opts.input), &mut engine)?
    } else {
        pipeline::solve_entry(&opts.input, &mut engine)
            .with_context(|| format!("couldn't solve {:?}", opts.input))?
            .into_iter()
            .collect()
    };
    if solved.is_empty() {
        println!("No new inputs.");
    }
    for file in solved {
        println!("{} {}", "Solved".green(), file.display());
    }
    Ok(())
}

#[derive(Parser, Clone)]
pub(crate) struct FuzzOpts {
    /// Solidity file or project to fuzz.
    target: PathBuf,
    #[clap(long)]
    contract: Option<String>,
    /// Fuzzer YAML config.
    #[clap(long)]
    config: Option<PathBuf>,
    #[clap(long)]
    corpus_dir: PathBuf,
    #[clap(long)]
    test_limit: Option<u64>,
    #[clap(long, env = "ECHIDNA_BIN", default_value = "echidna")]
    echidna: PathBuf,
    #[clap(long, default_value = "1h")]
    fuzz_timeout: Duration,
    #[clap(flatten)]
    solver: SolverOpts,
}

pub(crate) fn run_fuzz(opts: FuzzOpts) -> anyhow::Result<()> {
    if let Some(config) = &opts.config {
        if let Some(init) = artifacts::init_file(config)? {
            tracing::info!("Fuzzer initializes state from {init}");
        }
    }
    std::fs::create_dir_all(&opts.corpus_dir)
        .with_context(|| format!("couldn't create corpus dir {:?}", opts.corpus_dir))?;

    let req = FuzzRequest {
        target: opts.target.clone(),
        contract: opts.contract.clone(),
        config: opts.config.clone(),
        corpus_dir: opts.corpus_dir.clone(),
        test_limit: opts.test_limit,
    };
    let mut fuzzer = EchidnaProcess {
        binary: opts.echidna.clone(),
        timeout: opts.fuzz_timeout.into(),
    };
    let mut engine = opts.solver.engine();
    let summary = pipeline::fuzz_round(&mut fuzzer, &mut engine, &req)?;

    super::print_cases(&summary.cases);
    println!("{} unique PCs", summary.unique_pcs);
    if let Some(file) = coverage::latest_coverage_file(&opts.corpus_dir) {
        println!("{} covered lines", coverage::count_cov_lines(&file)?);
    }
    println!("{} new inputs from the solver", summary.solved.len());
    Ok(())
}
