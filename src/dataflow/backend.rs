use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use super::DataflowGraph;
use crate::error::Result;

/// Static analysis collaborator producing the dataflow graph of a contract.
/// An unknown contract is not an error: it's logged and yields `None`.
pub(crate) trait AnalysisBackend {
    fn dataflow_graph(&mut self, contract: &str) -> Result<Option<DataflowGraph>>;
}

/// Graphs precomputed by an analysis tool and stored as JSON:
/// `{contract: {signature: [parent signatures]}}`.
#[derive(Debug, Clone)]
pub(crate) struct GraphFile {
    path: PathBuf,
}

type GraphFileContents = BTreeMap<String, BTreeMap<String, Vec<String>>>;

impl GraphFile {
    pub(crate) fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    fn read(&self) -> Result<GraphFileContents> {
        let text = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&text)?)
    }
}

impl AnalysisBackend for GraphFile {
    fn dataflow_graph(&mut self, contract: &str) -> Result<Option<DataflowGraph>> {
        let mut contracts = self.read()?;
        let Some(functions) = contracts.remove(contract) else {
            let available: Vec<&str> = contracts.keys().map(String::as_str).collect();
            tracing::error!(
                "Contract {contract} not found in {:?}. Available contracts: {}",
                self.path,
                available.join(",")
            );
            return Ok(None);
        };
        let graph = DataflowGraph::from_dependencies(contract, functions)?;
        tracing::debug!(
            "Loaded dataflow graph for {contract} with {} functions",
            graph.len()
        );
        Ok(Some(graph))
    }
}
