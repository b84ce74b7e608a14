//! Fuzzer corpus: dataflow-guided seed synthesis and corpus file handling.

pub(crate) mod generator;
pub(crate) mod io;
pub(crate) mod seeds;

pub(crate) use generator::CorpusGenerator;
pub(crate) use seeds::{EchidnaSeeds, SeedDumper};
