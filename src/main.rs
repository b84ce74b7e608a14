//! Hybrid smart contract fuzzing: dataflow-guided seed sequences for Echidna
//! and a bridge that turns its corpus into symbolic transactions and solver
//! models back into corpus entries.

mod abi;
mod cli;
mod corpus;
mod dataflow;
mod echidna;
mod error;
mod pipeline;
mod symbolic;
mod translate;
mod util;

pub(crate) use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

#[cfg(test)]
mod tests;

fn main() -> anyhow::Result<()> {
    cli::main()
}
