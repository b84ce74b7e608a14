use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::{
    corpus::io,
    echidna::{artifacts, coverage, report},
    symbolic::VarContext,
};

mod seeds;
mod solve;

#[derive(Parser)]
#[clap(version, about)]
pub(crate) struct Opts {
    #[clap(subcommand)]
    subcmd: Subcommand,
}

#[derive(Parser)]
pub(crate) enum Subcommand {
    /// Write dataflow-guided call sequences into a corpus directory.
    Seeds(seeds::SeedsOpts),
    /// Print the abstract transactions of a corpus entry.
    Show { file: PathBuf },
    /// Apply a model (JSON object of variable assignments) to a corpus entry.
    Apply { file: PathBuf, model: PathBuf },
    /// Solve a corpus entry, or every entry of a corpus directory.
    Solve(solve::SolveOpts),
    /// Run a fuzzing campaign followed by a solving pass over its corpus.
    Fuzz(solve::FuzzOpts),
    /// List the failing properties of a fuzzer JSON report.
    Cases { report: PathBuf },
    /// Report coverage of a corpus directory.
    Coverage {
        corpus_dir: PathBuf,
        /// Fuzzer JSON report to count unique program counters in.
        #[clap(long)]
        report: Option<PathBuf>,
    },
    /// Extract the bytecode of a compiled contract from a crytic-export dir.
    Bytecode {
        crytic_dir: PathBuf,
        #[clap(long)]
        contract: Option<String>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub(crate) fn main() -> anyhow::Result<()> {
    let opts: Opts = Opts::parse();
    init_logging();

    match opts.subcmd {
        Subcommand::Seeds(opts) => seeds::run(opts)?,
        Subcommand::Show { file } => show(&file)?,
        Subcommand::Apply { file, model } => {
            let text = std::fs::read_to_string(&model)
                .with_context(|| format!("couldn't read model {model:?}"))?;
            let Some(model) = VarContext::from_assignment_json(&text)? else {
                println!("Model is null, nothing to apply.");
                return Ok(());
            };
            let new_file = io::store_sequence(&file, &model)
                .with_context(|| format!("couldn't apply model to {file:?}"))?;
            println!("{} {}", "Wrote".green(), new_file.display());
        }
        Subcommand::Solve(opts) => solve::run_solve(opts)?,
        Subcommand::Fuzz(opts) => solve::run_fuzz(opts)?,
        Subcommand::Cases { report } => {
            let output = std::fs::read_to_string(&report)
                .with_context(|| format!("couldn't read report {report:?}"))?;
            print_cases(&report::extract_cases(&output)?);
        }
        Subcommand::Coverage { corpus_dir, report } => {
            match coverage::latest_coverage_file(&corpus_dir) {
                Some(file) => {
                    let lines = coverage::count_cov_lines(&file)?;
                    println!("{lines} covered lines ({})", file.display());
                }
                None => println!("No coverage file in {}", corpus_dir.display()),
            }
            if let Some(report) = report {
                let output = std::fs::read_to_string(&report)
                    .with_context(|| format!("couldn't read report {report:?}"))?;
                println!("{} unique PCs", report::count_unique_pc(&output)?);
            }
        }
        Subcommand::Bytecode {
            crytic_dir,
            contract,
        } => match artifacts::extract_contract_bytecode(&crytic_dir, contract.as_deref())? {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("no bytecode extracted from {crytic_dir:?}"),
        },
    }
    Ok(())
}

fn show(file: &Path) -> anyhow::Result<()> {
    let seq = io::load_sequence(file).with_context(|| format!("couldn't load {file:?}"))?;
    for (i, abs) in seq.iter().enumerate() {
        println!("{}", format!("{}:", io::tx_name(i)).bold());
        println!("{abs}");
        if let Some(data) = abs.tx.as_ref().and_then(|tx| tx.data.concretize(&abs.ctx)) {
            println!("calldata:  0x{}", hex::encode(data));
        }
        let vars: Vec<String> = abs
            .ctx
            .names()
            .map(|name| format!("{name}:{}", abs.ctx.bits(name).unwrap_or_default()))
            .collect();
        println!("variables: {}", vars.join(" "));
    }
    Ok(())
}

pub(crate) fn print_cases(cases: &[Vec<String>]) {
    if cases.is_empty() {
        println!("{}", "No failing properties.".green());
    }
    for case in cases {
        println!("{} {}", "Failed:".red(), case.join(" -> "));
    }
}
