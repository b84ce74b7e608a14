use std::{collections::BTreeSet, fmt};

use crate::dataflow::{DataflowGraph, NodeId};

/// Function calls in execution order.
pub(crate) type TxSequence = Vec<NodeId>;

/// Grows call sequences backwards along dataflow edges: each round prepends,
/// to every sequence, each function that may write state read by any call
/// already in it.
pub(crate) struct CorpusGenerator {
    graph: DataflowGraph,
    sequences: Vec<TxSequence>,
}

impl CorpusGenerator {
    /// Starts from one single-call sequence per function.
    pub(crate) fn new(graph: DataflowGraph) -> Self {
        let sequences = graph.ids().map(|id| vec![id]).collect();
        Self { graph, sequences }
    }

    pub(crate) fn graph(&self) -> &DataflowGraph {
        &self.graph
    }

    pub(crate) fn sequences(&self) -> &[TxSequence] {
        &self.sequences
    }

    /// All live sequences share this length; 0 once none are left.
    pub(crate) fn current_seq_len(&self) -> usize {
        self.sequences.first().map_or(0, Vec::len)
    }

    /// Run `n` rounds. A sequence none of whose calls has a parent has no
    /// successor and is dropped.
    pub(crate) fn step(&mut self, n: usize) {
        for _ in 0..n {
            let next: Vec<TxSequence> = self
                .sequences
                .iter()
                .flat_map(|seq| successors(&self.graph, seq))
                .collect();
            tracing::debug!(
                "{} sequences of length {} -> {} of length {}",
                self.sequences.len(),
                self.current_seq_len(),
                next.len(),
                self.current_seq_len() + 1
            );
            self.sequences = next;
        }
    }

    pub(crate) fn render_sequence(&self, seq: &[NodeId]) -> String {
        seq.iter()
            .map(|id| self.graph.node(*id).name())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

fn successors(graph: &DataflowGraph, seq: &[NodeId]) -> Vec<TxSequence> {
    let impacting: BTreeSet<NodeId> = seq
        .iter()
        .flat_map(|id| graph.node(*id).parents().iter().copied())
        .collect();
    impacting
        .into_iter()
        .map(|prev| {
            let mut new_seq = Vec::with_capacity(seq.len() + 1);
            new_seq.push(prev);
            new_seq.extend_from_slice(seq);
            new_seq
        })
        .collect()
}

impl fmt::Display for CorpusGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataflow graph:")?;
        write!(f, "{}", self.graph)?;
        writeln!(f, "Current tx sequences:")?;
        for (i, seq) in self.sequences.iter().enumerate() {
            writeln!(f, "{i}: {}", self.render_sequence(seq))?;
        }
        Ok(())
    }
}
