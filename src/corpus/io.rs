use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{
    echidna::EchidnaTx,
    error::{Error, Result},
    symbolic::{AbstractTx, VarContext},
    translate,
};

/// Prefix of corpus files written from a solver model.
pub(crate) const SOLVED_INPUT_PREFIX: &str = "solved_input";
pub(crate) const CORPUS_SUFFIX: &str = ".txt";
/// Subdirectory of a fuzzer corpus dir holding the replayable entries.
pub(crate) const ENTRY_SUBDIR: &str = "coverage";
const MAX_FILENAME_COUNTER: u32 = 100_000;

/// Name of the `i`-th transaction of a sequence in the symbolic namespace.
pub(crate) fn tx_name(i: usize) -> String {
    format!("tx{i}")
}

pub(crate) fn read_records(file: &Path) -> Result<Vec<EchidnaTx>> {
    let data = std::fs::read(file)?;
    serde_json::from_slice(&data).map_err(Error::from_corpus_json)
}

pub(crate) fn write_records(file: &Path, records: &[EchidnaTx]) -> Result<()> {
    std::fs::write(file, serde_json::to_vec(records)?)?;
    Ok(())
}

/// Directory of the replayable entries of `corpus_dir`: its `coverage/`
/// subdirectory once the fuzzer created one, `corpus_dir` itself otherwise.
pub(crate) fn entry_dir(corpus_dir: &Path) -> PathBuf {
    let sub = corpus_dir.join(ENTRY_SUBDIR);
    if sub.is_dir() { sub } else { corpus_dir.to_owned() }
}

/// Corpus files directly inside `dir`, sorted by name. Coverage reports
/// living next to them are left out.
pub(crate) fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                return false;
            };
            path.is_file() && name.ends_with(CORPUS_SUFFIX) && !name.starts_with("covered.")
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Abstract transactions for a corpus file, in execution order.
pub(crate) fn load_sequence(file: &Path) -> Result<Vec<AbstractTx>> {
    let seq = read_records(file)?
        .iter()
        .enumerate()
        .map(|(i, tx)| translate::load_tx(tx, &tx_name(i)))
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!("Loaded {} transactions from {file:?}", seq.len());
    Ok(seq)
}

/// Apply `model` to the transactions of `original_file` and write them to a
/// fresh sibling file. The original is re-read from disk and left untouched.
pub(crate) fn store_sequence(original_file: &Path, model: &VarContext) -> Result<PathBuf> {
    let updated = read_records(original_file)?
        .iter()
        .enumerate()
        .map(|(i, tx)| translate::update_tx(tx, model, &tx_name(i)))
        .collect::<Result<Vec<_>>>()?;
    let dir = original_file.parent().unwrap_or(Path::new(""));
    let new_file = get_available_filename(&dir.join(SOLVED_INPUT_PREFIX), CORPUS_SUFFIX)?;
    write_records(&new_file, &updated)?;
    tracing::debug!("Stored solved input derived from {original_file:?} in {new_file:?}");
    Ok(new_file)
}

/// First `<prefix>_<n><suffix>` that doesn't exist yet. Concurrent callers
/// may race for the same name.
pub(crate) fn get_available_filename(prefix: &Path, suffix: &str) -> Result<PathBuf> {
    let candidate = |n: u32| {
        let mut name = OsString::from(prefix.as_os_str());
        name.push(format!("_{n}{suffix}"));
        PathBuf::from(name)
    };
    (0..MAX_FILENAME_COUNTER)
        .map(candidate)
        .find(|path| !path.exists())
        .ok_or_else(|| Error::NoAvailableFilename {
            prefix: prefix.display().to_string(),
            suffix: suffix.to_owned(),
        })
}
