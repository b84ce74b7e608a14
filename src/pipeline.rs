//! Glue between the corpus, the symbolic engine and the fuzzer.

use std::path::{Path, PathBuf};

use crate::{
    corpus::io,
    echidna::process::{FuzzRequest, FuzzerEngine},
    error::Result,
    symbolic::engine::SymbolicEngine,
};

/// Ask `engine` for a model of the sequence in `file` and store the solved
/// input next to it. `None` when no model was found.
pub(crate) fn solve_entry(file: &Path, engine: &mut dyn SymbolicEngine) -> Result<Option<PathBuf>> {
    let seq = io::load_sequence(file)?;
    let Some(model) = engine.solve(&seq)? else {
        tracing::debug!("No model for {file:?}");
        return Ok(None);
    };
    if model.is_empty() {
        tracing::warn!("Engine returned an empty model for {file:?}");
    } else {
        tracing::debug!("Model with {} assignments for {file:?}", model.len());
    }
    io::store_sequence(file, &model).map(Some)
}

/// Solve every corpus entry of `corpus_dir` that isn't itself a solver
/// output. Entries the engine fails on are logged and skipped.
pub(crate) fn solve_corpus(corpus_dir: &Path, engine: &mut dyn SymbolicEngine) -> Result<Vec<PathBuf>> {
    let mut solved = Vec::new();
    for file in io::corpus_files(corpus_dir)? {
        let is_solved_input = file
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(io::SOLVED_INPUT_PREFIX));
        if is_solved_input {
            continue;
        }
        match solve_entry(&file, engine) {
            Ok(Some(new_file)) => solved.push(new_file),
            Ok(None) => {}
            Err(err @ crate::error::Error::Engine(_)) => {
                tracing::warn!("Skipping {file:?}: {err}");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(solved)
}

/// Outcome of one fuzzing campaign followed by a solving pass.
#[derive(Debug)]
pub(crate) struct RoundSummary {
    pub cases: Vec<Vec<String>>,
    pub unique_pcs: usize,
    pub solved: Vec<PathBuf>,
}

/// Run the fuzzer once, then feed its corpus entries to the symbolic engine.
/// Solved inputs land next to the entries, where the next campaign reloads
/// them.
pub(crate) fn fuzz_round(
    fuzzer: &mut dyn FuzzerEngine,
    engine: &mut dyn SymbolicEngine,
    req: &FuzzRequest,
) -> Result<RoundSummary> {
    let report = fuzzer.run(req)?;
    let cases = report.cases();
    let unique_pcs = report.unique_pcs();
    tracing::info!(
        "Fuzzing done: {} failing properties, {unique_pcs} unique PCs",
        cases.len()
    );
    let entries = io::entry_dir(&req.corpus_dir);
    let solved = if entries.is_dir() {
        solve_corpus(&entries, engine)?
    } else {
        Vec::new()
    };
    tracing::info!("Solved {} new inputs", solved.len());
    Ok(RoundSummary {
        cases,
        unique_pcs,
        solved,
    })
}
