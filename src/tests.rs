use crate::{
    abi::AbiValue,
    corpus::{CorpusGenerator, EchidnaSeeds, SeedDumper, io},
    dataflow::{AnalysisBackend, GraphFile},
    echidna::{EchidnaTx, TxCall},
    pipeline,
    symbolic::{AbstractTx, VarContext, engine::EngineError, engine::SymbolicEngine},
    translate,
};
use num_bigint::BigUint;
use std::path::Path;

struct TestCorpus {
    dir: tempfile::TempDir,
}

impl TestCorpus {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn add(&self, name: &str, records: &[serde_json::Value]) -> std::path::PathBuf {
        let file = self.path().join(name);
        std::fs::write(&file, serde_json::Value::from(records.to_vec()).to_string()).unwrap();
        file
    }
}

fn call(func: &str, args: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "_call": {"tag": "SolCall", "contents": [func, args]},
        "_src": "0x0000000000000000000000000000000000010000",
        "_dst": "0x00a329c0648769a73afac7f9381e08fb43dbea72",
        "_gas'": "0xffffffff",
        "_gasprice'": "0x0",
        "_value": "0x0",
        "_delay": ["0x0", "0x0"],
    })
}

fn transfer(to: &str, amount: &str) -> serde_json::Value {
    call(
        "transfer",
        serde_json::json!([
            {"tag": "AbiAddress", "contents": to},
            {"tag": "AbiUInt", "contents": [256, amount]},
        ]),
    )
}

fn nested_call() -> serde_json::Value {
    call(
        "submit",
        serde_json::json!([
            {"tag": "AbiTuple", "contents": [
                {"tag": "AbiInt", "contents": [8, "-3"]},
                {"tag": "AbiArrayDynamic", "contents": [
                    {"tag": "AbiBytesDynamicType"},
                    [
                        {"tag": "AbiBytesDynamic", "contents": "ab"},
                        {"tag": "AbiBytesDynamic", "contents": "xyz"},
                    ]
                ]},
            ]},
            {"tag": "AbiString", "contents": "hi"},
            {"tag": "AbiBool", "contents": false},
        ]),
    )
}

fn model(vars: &[(&str, u64)]) -> VarContext {
    let mut ctx = VarContext::new();
    for (name, val) in vars {
        ctx.set_name((*name).to_owned(), &BigUint::from(*val), 256);
    }
    ctx
}

fn record(value: serde_json::Value) -> EchidnaTx {
    serde_json::from_value(value).unwrap()
}

#[test]
fn empty_model_leaves_records_unchanged() {
    let records = [
        record(transfer("0x00000000000000000000000000000000000000aa", "5")),
        record(nested_call()),
    ];
    for (i, tx) in records.iter().enumerate() {
        let updated = translate::update_tx(tx, &VarContext::new(), &io::tx_name(i)).unwrap();
        assert_eq!(&updated, tx);
    }
}

#[test]
fn sender_model_is_padded_to_an_address() {
    let tx = record(transfer("0x00000000000000000000000000000000000000aa", "5"));
    let updated = translate::update_tx(&tx, &model(&[("tx0_sender", 0x42)]), "tx0").unwrap();
    let hex = updated.src.strip_prefix("0x").unwrap();
    assert_eq!(hex.len(), 40);
    assert_eq!(hex, format!("{:040x}", 0x42));
}

#[test]
fn symbolic_calldata_matches_reference_encoding() {
    let tx = record(transfer("0x00000000000000000000000000000000000000aa", "1000"));
    let abs = translate::load_tx(&tx, "tx0").unwrap();
    let data = abs.tx.as_ref().unwrap().data.concretize(&abs.ctx).unwrap();
    let expected = format!("a9059cbb{:0>64}{:0>64}", "aa", "3e8");
    assert_eq!(hex::encode(data), expected);
}

#[test]
fn solved_model_changes_only_assigned_fields() {
    let tx = record(nested_call());
    let abs = translate::load_tx(&tx, "tx0").unwrap();
    // every leaf of the nested argument is a variable of the seed context
    for name in [
        "tx0_arg0_0",
        "tx0_arg0_1_0_1",
        "tx0_arg0_1_1_2",
        "tx0_arg1_0",
        "tx0_arg2",
    ] {
        assert!(abs.ctx.names().any(|n| n == name), "{name} missing");
    }

    let m = model(&[("tx0_arg0_0", 0xfe), ("tx0_arg0_1_1_2", u64::from(b'Z')), ("tx0_arg2", 1)]);
    let updated = translate::update_tx(&tx, &m, "tx0").unwrap();
    let TxCall::SolCall(_, args) = updated.call else {
        panic!("expected a call");
    };
    assert_eq!(
        args,
        vec![
            AbiValue::AbiTuple(vec![
                AbiValue::AbiInt(8, "-2".to_owned()),
                AbiValue::AbiArrayDynamic(
                    crate::abi::AbiType::AbiBytesDynamicType,
                    vec![
                        AbiValue::AbiBytesDynamic("ab".to_owned()),
                        AbiValue::AbiBytesDynamic("xyZ".to_owned()),
                    ]
                ),
            ]),
            AbiValue::AbiString("hi".to_owned()),
            AbiValue::AbiBool(true),
        ]
    );
}

struct ModelFor {
    vars: Vec<(&'static str, u64)>,
}

impl SymbolicEngine for ModelFor {
    fn solve(&mut self, seq: &[AbstractTx]) -> Result<Option<VarContext>, EngineError> {
        // only answer for sequences that declare the requested variables
        let declared = self
            .vars
            .iter()
            .all(|(name, _)| seq.iter().any(|abs| abs.ctx.names().any(|n| n == *name)));
        Ok(declared.then(|| model(&self.vars)))
    }
}

#[test]
fn pipeline_writes_sibling_and_keeps_original() {
    let corpus = TestCorpus::new();
    let original = corpus.add(
        "entry.txt",
        &[
            transfer("0x00000000000000000000000000000000000000aa", "5"),
            transfer("0x00000000000000000000000000000000000000bb", "6"),
        ],
    );
    let before = std::fs::read(&original).unwrap();

    let mut engine = ModelFor {
        vars: vec![("tx1_arg1", 77), ("tx1_sender", 0x30000)],
    };
    let new_file = pipeline::solve_entry(&original, &mut engine).unwrap().unwrap();
    assert_eq!(new_file.parent(), original.parent());
    assert_eq!(std::fs::read(&original).unwrap(), before);

    let old = io::read_records(&original).unwrap();
    let new = io::read_records(&new_file).unwrap();
    assert_eq!(old[0], new[0]);
    assert_eq!(
        new[1].call,
        TxCall::SolCall(
            "transfer".to_owned(),
            vec![
                AbiValue::AbiAddress("0x00000000000000000000000000000000000000bb".to_owned()),
                AbiValue::AbiUInt(256, "77".to_owned()),
            ]
        )
    );
    assert_eq!(new[1].src, "0x0000000000000000000000000000000000030000");

    // the same original can be solved again without clobbering
    let again = pipeline::solve_entry(&original, &mut engine).unwrap().unwrap();
    assert_ne!(again, new_file);
}

#[test]
fn dataflow_seeds_end_to_end() {
    let corpus = TestCorpus::new();
    std::fs::create_dir(corpus.path().join("coverage")).unwrap();
    corpus.add("covered.1700000000.txt", &[]);
    corpus.add(
        "coverage/7301.txt",
        &[
            call("mint", serde_json::json!([{"tag": "AbiUInt", "contents": [256, "10"]}])),
            transfer("0x00000000000000000000000000000000000000aa", "5"),
        ],
    );
    let graph_file = corpus.path().join("dataflow.json");
    std::fs::write(
        &graph_file,
        r#"{"Token": {
            "mint(uint256)": [],
            "transfer(address,uint256)": ["mint(uint256)", "transfer(address,uint256)"]
        }}"#,
    )
    .unwrap();

    let graph = GraphFile::new(&graph_file)
        .dataflow_graph("Token")
        .unwrap()
        .unwrap();
    let mut generator = CorpusGenerator::new(graph);
    generator.step(2);
    assert_eq!(generator.current_seq_len(), 3);

    let entries = io::entry_dir(corpus.path());
    assert_eq!(entries, corpus.path().join("coverage"));
    let seeds = EchidnaSeeds::from_corpus_dir(&entries).unwrap();
    let written = seeds.dump_tx_sequences(&generator, &entries).unwrap();
    assert_eq!(written.len(), generator.sequences().len());
    // seeds sit with the entries the fuzzer reloads
    assert!(written.iter().all(|file| file.parent() == Some(entries.as_path())));

    // seeds are regular corpus entries: they load into abstract sequences
    for file in &written {
        let seq = io::load_sequence(file).unwrap();
        assert_eq!(seq.len(), 3);
        assert!(seq[2].ctx.names().any(|n| n == "tx2_arg1"));
    }
}
