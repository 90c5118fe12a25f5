//! Python execution protocol wrapper: one fresh interpreter per attempt,
//! a JSON request on stdin and NDJSON back on stdout.

use std::process::ExitStatus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStderr, ChildStdout},
    time::timeout,
};
use tracing::{debug, warn};

use super::{
    Binding, CodeRunner, ExecutionAttempt, ALLOWED_BUILTINS, ALLOWED_IMPORTS, PRELUDE_NAMES,
};
use crate::{
    config::SandboxSettings, dataset::Dataset, error::SandboxError, planner::Task,
    process::start_python,
};

const HARNESS: &str = include_str!("harness.py");

#[derive(Debug, Serialize)]
struct Request<'a> {
    code: &'a str,
    dataset: serde_json::Value,
    allowed_builtins: &'a [&'a str],
    allowed_imports: &'a [&'a str],
    prelude: &'a [&'a str],
    repr_limit: usize,
    cpu_seconds: u64,
    memory_mb: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Reply {
    Result {
        success: bool,
        #[serde(default)]
        stdout: String,
        #[serde(default)]
        stderr: String,
        #[serde(default)]
        error: String,
        #[serde(default)]
        bindings: Vec<Binding>,
    },
    Fatal {
        error: String,
    },
}

/// Process-isolated executor. Nothing survives between calls: every attempt
/// gets a new interpreter, a new scratch directory and a new dataset copy.
#[derive(Debug, Clone, Default)]
pub struct PythonSandbox {
    settings: SandboxSettings,
}

impl PythonSandbox {
    pub fn new(settings: SandboxSettings) -> Self {
        Self { settings }
    }

    fn request_line(&self, code: &str, dataset: &Dataset) -> Result<String, SandboxError> {
        let payload = dataset
            .to_sandbox_payload()
            .map_err(|e| SandboxError::DatasetCopy(e.to_string()))?;
        let req = Request {
            code,
            dataset: payload,
            allowed_builtins: ALLOWED_BUILTINS,
            allowed_imports: ALLOWED_IMPORTS,
            prelude: PRELUDE_NAMES,
            repr_limit: self.settings.variable_repr_limit,
            cpu_seconds: self.settings.cpu_seconds,
            memory_mb: self.settings.memory_mb,
        };
        let mut line = serde_json::to_string(&req)?;
        line.push('\n');
        Ok(line)
    }
}

#[async_trait]
impl CodeRunner for PythonSandbox {
    async fn execute(
        &self,
        code: &str,
        dataset: &Dataset,
        task: &Task,
    ) -> Result<ExecutionAttempt, SandboxError> {
        let request = self.request_line(code, dataset)?;
        let workdir = tempfile::tempdir()?;
        let handle = start_python(&self.settings.python, HARNESS, workdir.path()).await?;
        let mut child = handle.child;
        let mut stdin = handle.stdin;

        // A child that dies before reading its request shows up in stderr below.
        if let Err(e) = stdin.write_all(request.as_bytes()).await {
            debug!(error = %e, "request write interrupted");
        }
        drop(stdin);

        let limit = self.settings.timeout;
        let collected = timeout(limit, collect(&mut child, handle.stdout, handle.stderr)).await;
        let (status, out, err) = match collected {
            Ok(res) => res?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "kill after timeout failed");
                }
                warn!(seconds = limit.as_secs(), task_type = %task.task_type, "execution timed out");
                return Ok(ExecutionAttempt::failed(
                    code,
                    format!("execution timed out after {}s", limit.as_secs()),
                    String::new(),
                ));
            }
        };

        let stderr = String::from_utf8_lossy(&err).into_owned();
        match last_reply(&String::from_utf8_lossy(&out))? {
            Some(Reply::Fatal { error }) => Err(SandboxError::Bootstrap(error)),
            Some(Reply::Result {
                success: true,
                stdout,
                bindings,
                ..
            }) => Ok(ExecutionAttempt::succeeded(
                code,
                stdout,
                bindings,
                task,
                self.settings.variable_repr_limit,
            )),
            Some(Reply::Result {
                error, stderr: captured, ..
            }) => {
                debug!(error = %error, "code execution failed");
                Ok(ExecutionAttempt::failed(code, error, captured))
            }
            None => {
                warn!(%status, "interpreter exited without a result");
                Ok(ExecutionAttempt::failed(
                    code,
                    format!("interpreter exited without a result ({status})"),
                    stderr,
                ))
            }
        }
    }
}

async fn collect(
    child: &mut Child,
    mut stdout: ChildStdout,
    mut stderr: ChildStderr,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), SandboxError> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let (o, e) = tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
    o?;
    e?;
    let status = child.wait().await?;
    Ok((status, out, err))
}

/// Last protocol line on stdout. Lines that are not protocol messages are
/// skipped; a line that claims a known type but does not parse is an error.
fn last_reply(stdout: &str) -> Result<Option<Reply>, SandboxError> {
    let mut reply = None;
    for line in stdout.lines().map(str::trim).filter(|l| l.starts_with('{')) {
        let probe: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => continue,
        };
        match probe.get("type").and_then(|t| t.as_str()) {
            Some("result") | Some("fatal") => {
                reply = Some(
                    serde_json::from_value(probe)
                        .map_err(|e| SandboxError::Protocol(e.to_string()))?,
                );
            }
            _ => continue,
        }
    }
    Ok(reply)
}
