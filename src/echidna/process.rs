use std::{
    path::PathBuf,
    process::{Command, Stdio},
    time::Duration,
};

use super::report::FuzzReport;
use crate::symbolic::engine::{EngineError, wait_with_timeout};

#[derive(Debug, Clone)]
pub(crate) struct FuzzRequest {
    pub target: PathBuf,
    pub contract: Option<String>,
    pub config: Option<PathBuf>,
    pub corpus_dir: PathBuf,
    pub test_limit: Option<u64>,
}

/// Coverage-guided fuzzer collaborator.
pub(crate) trait FuzzerEngine {
    fn run(&mut self, req: &FuzzRequest) -> Result<FuzzReport, EngineError>;
}

pub(crate) struct EchidnaProcess {
    pub binary: PathBuf,
    pub timeout: Duration,
}

impl EchidnaProcess {
    fn command(&self, req: &FuzzRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(&req.target)
            .args(["--format", "json"])
            .arg("--corpus-dir")
            .arg(&req.corpus_dir);
        if let Some(contract) = &req.contract {
            cmd.args(["--contract", contract]);
        }
        if let Some(config) = &req.config {
            cmd.arg("--config").arg(config);
        }
        if let Some(limit) = req.test_limit {
            cmd.args(["--test-limit", &limit.to_string()]);
        }
        cmd
    }
}

impl FuzzerEngine for EchidnaProcess {
    fn run(&mut self, req: &FuzzRequest) -> Result<FuzzReport, EngineError> {
        let engine = self.binary.display().to_string();
        tracing::debug!("running {engine} on {:?}", req.target);
        let mut child = self
            .command(req)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| EngineError::Crashed {
                engine: engine.clone(),
                reason: err.to_string(),
            })?;
        // failing properties give a non-zero exit status along with a valid report
        let (status, output) = wait_with_timeout(&mut child, self.timeout, &engine)?;
        if !status.success() && output.trim().is_empty() {
            return Err(EngineError::Crashed {
                engine,
                reason: format!("exited with {status} and no report"),
            });
        }
        FuzzReport::parse(&output).map_err(|err| {
            if status.success() {
                EngineError::MalformedOutput {
                    engine,
                    reason: err.to_string(),
                }
            } else {
                EngineError::Crashed {
                    engine,
                    reason: format!("exited with {status}"),
                }
            }
        })
    }
}
