use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use super::{
    generator::CorpusGenerator,
    io::{self, CORPUS_SUFFIX},
};
use crate::{
    abi::AbiValue,
    echidna::{EchidnaTx, TxCall},
    error::Result,
};

/// Prefix of corpus files written from dataflow sequences.
pub(crate) const SEED_PREFIX: &str = "dataflow_seed";

/// Writes the generator's current sequences as fuzzer input files.
pub(crate) trait SeedDumper {
    fn dump_tx_sequences(
        &self,
        generator: &CorpusGenerator,
        corpus_dir: &Path,
    ) -> Result<Vec<PathBuf>>;
}

/// Builds seeds from transactions the fuzzer already produced: the first
/// call seen for each function serves as its template.
#[derive(Debug, Default)]
pub(crate) struct EchidnaSeeds {
    templates: BTreeMap<String, EchidnaTx>,
}

fn tx_signature(tx: &EchidnaTx) -> Option<String> {
    match &tx.call {
        TxCall::SolCall(func_name, args) => {
            let types: Vec<String> = args.iter().map(AbiValue::type_string).collect();
            Some(format!("{func_name}({})", types.join(",")))
        }
        TxCall::NoCall => None,
    }
}

impl EchidnaSeeds {
    /// Collect templates from every corpus file in `corpus_dir`. Files that
    /// can't be parsed are skipped.
    pub(crate) fn from_corpus_dir(corpus_dir: &Path) -> Result<Self> {
        let mut seeds = Self::default();
        for file in io::corpus_files(corpus_dir)? {
            let records = match io::read_records(&file) {
                Ok(records) => records,
                Err(err) => {
                    tracing::warn!("Skipping corpus file {file:?}: {err}");
                    continue;
                }
            };
            for tx in records {
                seeds.add_template(tx);
            }
        }
        tracing::debug!(
            "Found templates for {} functions in {corpus_dir:?}",
            seeds.templates.len()
        );
        Ok(seeds)
    }

    /// Keeps the first template per function.
    pub(crate) fn add_template(&mut self, tx: EchidnaTx) {
        if let Some(signature) = tx_signature(&tx) {
            self.templates.entry(signature).or_insert(tx);
        }
    }

    pub(crate) fn template(&self, signature: &str) -> Option<&EchidnaTx> {
        self.templates.get(signature)
    }

    pub(crate) fn signatures(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

impl SeedDumper for EchidnaSeeds {
    fn dump_tx_sequences(
        &self,
        generator: &CorpusGenerator,
        corpus_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let graph = generator.graph();
        let mut written = Vec::new();
        'seqs: for seq in generator.sequences() {
            let mut records = Vec::with_capacity(seq.len());
            for id in seq {
                let signature = graph.node(*id).signature();
                let Some(tx) = self.template(signature) else {
                    tracing::debug!(
                        "No template for {signature}, skipping {}",
                        generator.render_sequence(seq)
                    );
                    continue 'seqs;
                };
                records.push(tx.clone());
            }
            let file = io::get_available_filename(&corpus_dir.join(SEED_PREFIX), CORPUS_SUFFIX)?;
            io::write_records(&file, &records)?;
            written.push(file);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::graph;

    fn record(func: &str, args: &str) -> String {
        format!(
            r#"{{"_call": {{"tag": "SolCall", "contents": ["{func}", [{args}]]}},
                "_src": "0x10000", "_dst": "0x20000", "_gas'": "0xffffffff",
                "_gasprice'": "0x0", "_value": "0x0", "_delay": ["0x0", "0x0"]}}"#
        )
    }

    const UINT: &str = r#"{"tag": "AbiUInt", "contents": [256, "1"]}"#;
    const ADDR: &str = r#"{"tag": "AbiAddress", "contents": "0x00000000000000000000000000000000000000aa"}"#;

    #[test]
    fn test_templates_from_corpus_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.txt"),
            format!(
                "[{}, {}]",
                record("mint", UINT),
                record("transfer", &format!("{ADDR}, {UINT}"))
            ),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.txt"),
            format!("[{}]", record("mint", r#"{"tag": "AbiUInt", "contents": [256, "99"]}"#)),
        )
        .unwrap();
        std::fs::write(dir.path().join("covered.1.txt"), "*  | x").unwrap();
        std::fs::write(dir.path().join("junk.txt"), "not json").unwrap();

        let seeds = EchidnaSeeds::from_corpus_dir(dir.path()).unwrap();
        assert_eq!(
            seeds.signatures().collect::<Vec<_>>(),
            ["mint(uint256)", "transfer(address,uint256)"]
        );
        // the first file wins
        let TxCall::SolCall(_, args) = &seeds.template("mint(uint256)").unwrap().call else {
            panic!("expected a call");
        };
        assert_eq!(args, &[AbiValue::AbiUInt(256, "1".to_owned())]);
    }

    #[test]
    fn test_dump_tx_sequences() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.txt"),
            format!(
                "[{}, {}]",
                record("mint", UINT),
                record("transfer", &format!("{ADDR}, {UINT}"))
            ),
        )
        .unwrap();
        let seeds = EchidnaSeeds::from_corpus_dir(dir.path()).unwrap();

        let mut generator = CorpusGenerator::new(graph(&[
            ("mint(uint256)", &[]),
            ("transfer(address,uint256)", &["mint(uint256)", "burn()"]),
            ("burn()", &[]),
        ]));
        generator.step(1);
        // mint -> transfer is templated, burn -> transfer isn't
        let written = seeds.dump_tx_sequences(&generator, dir.path()).unwrap();
        assert_eq!(written, [dir.path().join("dataflow_seed_0.txt")]);
        let records = io::read_records(&written[0]).unwrap();
        let names: Vec<_> = records
            .iter()
            .filter_map(|tx| match &tx.call {
                TxCall::SolCall(name, _) => Some(name.as_str()),
                TxCall::NoCall => None,
            })
            .collect();
        assert_eq!(names, ["mint", "transfer"]);

        // a second dump doesn't overwrite the first
        let written = seeds.dump_tx_sequences(&generator, dir.path()).unwrap();
        assert_eq!(written, [dir.path().join("dataflow_seed_1.txt")]);
    }
}
