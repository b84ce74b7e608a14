use std::{
    io::{Read, Write},
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

use super::{AbstractTx, VarContext};

#[derive(Debug, thiserror::Error)]
pub(crate) enum EngineError {
    #[error("{engine} timed out after {timeout:?}")]
    Timeout {
        engine: String,
        timeout: Duration,
    },
    #[error("{engine} crashed: {reason}")]
    Crashed { engine: String, reason: String },
    #[error("{engine} produced malformed output: {reason}")]
    MalformedOutput { engine: String, reason: String },
}

/// Symbolic execution collaborator. Given a transaction sequence (each with
/// its seed context), either finds a model reaching new states or `None`.
pub(crate) trait SymbolicEngine {
    fn solve(&mut self, seq: &[AbstractTx]) -> Result<Option<VarContext>, EngineError>;
}

/// Solver run as a child process: the sequence goes to stdin as JSON, the
/// assignment (or `null`) comes back on stdout.
pub(crate) struct ExternalSolver {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ExternalSolver {
    fn name(&self) -> String {
        self.program.display().to_string()
    }
}

impl SymbolicEngine for ExternalSolver {
    fn solve(&mut self, seq: &[AbstractTx]) -> Result<Option<VarContext>, EngineError> {
        let request = serde_json::to_vec(seq).map_err(|err| EngineError::Crashed {
            engine: self.name(),
            reason: format!("couldn't serialize request: {err}"),
        })?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| EngineError::Crashed {
                engine: self.name(),
                reason: err.to_string(),
            })?;
        // stdin is fed while stdout is drained
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || {
                // a solver that exits early closes the pipe; its status tells why
                let _ = stdin.write_all(&request);
            })
        });
        let (status, stdout) = wait_with_timeout(&mut child, self.timeout, &self.name())?;
        if let Some(writer) = writer {
            let _ = writer.join();
        }
        if !status.success() {
            return Err(EngineError::Crashed {
                engine: self.name(),
                reason: format!("exited with {status}"),
            });
        }
        VarContext::from_assignment_json(&stdout).map_err(|err| EngineError::MalformedOutput {
            engine: self.name(),
            reason: err.to_string(),
        })
    }
}

/// Wait for `child` to exit within `timeout` and collect its stdout.
/// The child is killed on timeout.
pub(crate) fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    engine: &str,
) -> Result<(ExitStatus, String), EngineError> {
    let crashed = |reason: String| EngineError::Crashed {
        engine: engine.to_owned(),
        reason,
    };
    let mut stdout = child.stdout.take();
    let reader = std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(out) = stdout.as_mut() {
            out.read_to_string(&mut buf).map(|_| buf)
        } else {
            Ok(buf)
        }
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(|err| crashed(err.to_string()))? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::Timeout {
                    engine: engine.to_owned(),
                    timeout,
                });
            }
            None => std::thread::sleep(Duration::from_millis(20)),
        }
    };

    let output = reader
        .join()
        .map_err(|_| crashed("stdout reader panicked".to_owned()))?
        .map_err(|err| EngineError::MalformedOutput {
            engine: engine.to_owned(),
            reason: err.to_string(),
        })?;
    Ok((status, output))
}
