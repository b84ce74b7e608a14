use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::{
    corpus::{CorpusGenerator, EchidnaSeeds, SeedDumper, io},
    dataflow::{AnalysisBackend, GraphFile},
};

#[derive(Parser, Clone)]
pub(crate) struct SeedsOpts {
    /// JSON file with the dataflow graph of each contract.
    #[clap(long)]
    graph: PathBuf,
    #[clap(long)]
    contract: String,
    /// Corpus to take per-function templates from and to write seeds into.
    #[clap(long)]
    corpus_dir: PathBuf,
    /// Calls to prepend to every single-call sequence.
    #[clap(long, default_value = "1")]
    rounds: usize,
    #[clap(long)]
    verbose: bool,
}

pub(crate) fn run(opts: SeedsOpts) -> anyhow::Result<()> {
    let mut backend = GraphFile::new(&opts.graph);
    let Some(graph) = backend
        .dataflow_graph(&opts.contract)
        .with_context(|| format!("couldn't load dataflow graph from {:?}", opts.graph))?
    else {
        anyhow::bail!("no dataflow graph for {}", opts.contract);
    };

    if graph.is_empty() {
        println!("Dataflow graph of {} has no functions.", opts.contract);
        return Ok(());
    }
    let mut generator = CorpusGenerator::new(graph);
    generator.step(opts.rounds);
    if opts.verbose {
        println!("{generator}");
    }
    if generator.current_seq_len() == 0 {
        println!("No dependent call sequences after {} rounds.", opts.rounds);
        return Ok(());
    }

    let entries = io::entry_dir(&opts.corpus_dir);
    let seeds = EchidnaSeeds::from_corpus_dir(&entries)
        .with_context(|| format!("couldn't read corpus {entries:?}"))?;
    if opts.verbose {
        println!("templates: {}", seeds.signatures().collect::<Vec<_>>().join(" "));
    }
    let written = seeds.dump_tx_sequences(&generator, &entries)?;
    println!(
        "Wrote {} of {} sequences of length {} for {} to {}",
        written.len(),
        generator.sequences().len(),
        generator.current_seq_len(),
        generator.graph().contract(),
        entries.display()
    );
    Ok(())
}
