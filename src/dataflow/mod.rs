//! Function-level state dependencies of one contract.
//!
//! An edge `parent -> child` means executing `parent` can change state that
//! `child` reads, so calling `parent` first may change `child`'s outcome.

use std::{collections::BTreeSet, fmt};

use crate::{
    HashMap,
    error::{Error, Result},
};

pub(crate) mod backend;

pub(crate) use backend::{AnalysisBackend, GraphFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DataflowNode {
    signature: String,
    parents: BTreeSet<NodeId>,
}

impl DataflowNode {
    /// Canonical signature, `name(type,...)`.
    pub(crate) fn signature(&self) -> &str {
        &self.signature
    }

    pub(crate) fn name(&self) -> &str {
        self.signature
            .split_once('(')
            .map_or(self.signature.as_str(), |(name, _)| name)
    }

    pub(crate) fn parents(&self) -> &BTreeSet<NodeId> {
        &self.parents
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DataflowGraph {
    contract: String,
    nodes: Vec<DataflowNode>,
}

impl DataflowGraph {
    /// Build the graph from `(signature, parent signatures)` pairs. Node ids
    /// follow the order of `deps`. Every parent must be one of the listed
    /// functions.
    pub(crate) fn from_dependencies<I, P>(contract: &str, deps: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, P)>,
        P: IntoIterator<Item = String>,
    {
        let deps: Vec<(String, P)> = deps.into_iter().collect();
        let mut ids = HashMap::default();
        for (i, (signature, _)) in deps.iter().enumerate() {
            let id = u32::try_from(i)
                .map_err(|_| Error::Graph(format!("too many functions in {contract}")))?;
            if ids.insert(signature.clone(), NodeId(id)).is_some() {
                return Err(Error::Graph(format!(
                    "function {signature} listed twice for {contract}"
                )));
            }
        }

        let mut nodes = Vec::with_capacity(deps.len());
        for (signature, parents) in deps {
            let parents = parents
                .into_iter()
                .map(|parent| {
                    ids.get(&parent).copied().ok_or_else(|| {
                        Error::Graph(format!(
                            "{signature} depends on unknown function {parent} in {contract}"
                        ))
                    })
                })
                .collect::<Result<_>>()?;
            nodes.push(DataflowNode { signature, parents });
        }
        Ok(Self {
            contract: contract.to_owned(),
            nodes,
        })
    }

    pub(crate) fn contract(&self) -> &str {
        &self.contract
    }

    pub(crate) fn node(&self, id: NodeId) -> &DataflowNode {
        &self.nodes[id.idx()]
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(|i| NodeId(i as u32))
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for DataflowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.contract)?;
        for node in &self.nodes {
            let parents: Vec<&str> = node
                .parents
                .iter()
                .map(|id| self.node(*id).name())
                .collect();
            writeln!(f, "  {} <- [{}]", node.signature, parents.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn graph(deps: &[(&str, &[&str])]) -> DataflowGraph {
    DataflowGraph::from_dependencies(
        "Test",
        deps.iter().map(|(sig, parents)| {
            (
                (*sig).to_owned(),
                parents.iter().map(|p| (*p).to_owned()).collect::<Vec<_>>(),
            )
        }),
    )
    .unwrap()
}
