use serde::Deserialize;

use crate::{HashMap, HashSet, error::Result};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FuzzReport {
    #[serde(default)]
    tests: Vec<TestReport>,
    #[serde(default)]
    coverage: HashMap<String, Vec<Vec<serde_json::Value>>>,
}

#[derive(Debug, Deserialize)]
struct TestReport {
    status: String,
    #[serde(default)]
    transactions: Vec<ReportTx>,
}

#[derive(Debug, Deserialize)]
struct ReportTx {
    function: String,
    #[serde(default)]
    arguments: Vec<String>,
}

/// Skip diagnostics printed before the JSON document, such as
/// "Loaded total of 500 transactions from /tmp/c4/coverage".
fn strip_preamble(output: &str) -> &str {
    let mut rest = output;
    while !rest.is_empty() && !rest.trim_start().starts_with(['{', '[']) {
        match rest.split_once('\n') {
            Some((_, tail)) => rest = tail,
            None => return "",
        }
    }
    rest
}

impl FuzzReport {
    pub(crate) fn parse(output: &str) -> Result<Self> {
        let body = strip_preamble(output);
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(body)?)
    }

    /// Solved test cases, each as the list of calls leading to it, e.g.
    /// `[["f()", "g(1,2)"], ["h(12343,-1)"]]`.
    pub(crate) fn cases(&self) -> Vec<Vec<String>> {
        self.tests
            .iter()
            .filter(|test| test.status == "solved")
            .map(|test| {
                test.transactions
                    .iter()
                    .map(|tx| format!("{}({})", tx.function, tx.arguments.join(",")))
                    .collect()
            })
            .collect()
    }

    /// Number of distinct program counters executed, summed over contracts.
    pub(crate) fn unique_pcs(&self) -> usize {
        self.coverage
            .values()
            .map(|records| {
                records
                    .iter()
                    .filter_map(|rec| rec.first())
                    .map(|pc| pc.to_string())
                    .collect::<HashSet<_>>()
                    .len()
            })
            .sum()
    }
}

pub(crate) fn extract_cases(output: &str) -> Result<Vec<Vec<String>>> {
    Ok(FuzzReport::parse(output)?.cases())
}

pub(crate) fn count_unique_pc(output: &str) -> Result<usize> {
    Ok(FuzzReport::parse(output)?.unique_pcs())
}
