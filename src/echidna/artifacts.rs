use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct CombinedSolc {
    contracts: BTreeMap<String, CompiledContract>,
}

#[derive(Debug, Deserialize)]
struct CompiledContract {
    bin: String,
}

fn name_from_path(path: &str) -> &str {
    path.rsplit(':').next().unwrap_or(path)
}

/// Write the bytecode of `contract_name` from the `crytic-export` dir left
/// behind by a fuzzing campaign into a fresh file and return its path.
///
/// Without a name, the only compiled contract is used. An unknown or
/// ambiguous target is logged together with the available contracts and
/// yields `None`.
pub(crate) fn extract_contract_bytecode(
    crytic_dir: &Path,
    contract_name: Option<&str>,
) -> Result<Option<PathBuf>> {
    let solc_file = crytic_dir.join("combined_solc.json");
    let data: CombinedSolc = serde_json::from_slice(&std::fs::read(&solc_file)?)?;
    let available = data
        .contracts
        .keys()
        .map(|path| name_from_path(path))
        .collect::<Vec<_>>()
        .join(",");

    let contract_name = match contract_name {
        Some(name) => name,
        None if data.contracts.len() == 1 => match data.contracts.keys().next() {
            Some(path) => name_from_path(path),
            None => return Ok(None),
        },
        None => {
            tracing::error!("Please specify the target contract among: {available}");
            return Ok(None);
        }
    };

    let Some(contract) = data
        .contracts
        .iter()
        .find(|(path, _)| name_from_path(path) == contract_name)
        .map(|(_, contract)| contract)
    else {
        tracing::error!(
            "Couldn't find bytecode for contract {contract_name} in {solc_file:?}. \
             Available contracts: {available}"
        );
        return Ok(None);
    };

    let mut file = tempfile::Builder::new()
        .prefix("hybridfuzz_contract_")
        .suffix(".bin")
        .tempfile()?;
    file.write_all(contract.bin.as_bytes())?;
    let (_, path) = file.keep().map_err(|err| Error::Io(err.error))?;
    tracing::debug!("Bytecode for contract {contract_name} written in {path:?}");
    Ok(Some(path))
}

/// The `initialize` entry of the fuzzer's YAML config, if set.
pub(crate) fn init_file(config: &Path) -> Result<Option<String>> {
    let text = std::fs::read_to_string(config)?;
    let value: serde_yaml::Value =
        serde_yaml::from_str(&text).map_err(|source| Error::Config {
            path: config.to_owned(),
            source,
        })?;
    Ok(value
        .get("initialize")
        .and_then(|v| v.as_str())
        .map(ToOwned::to_owned))
}
