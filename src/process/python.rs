//! Python interpreter process bootstrap and I/O glue.

use std::{path::Path, process::Stdio};

use tokio::process::{Child, Command};
use tracing::debug;

use super::{ProcessHandle, PASSTHROUGH_ENV};
use crate::error::SandboxError;

/// Spawns `program -u -c <bootstrap>` inside `workdir` with a scrubbed
/// environment. The child dies with its handle.
pub async fn start_python(
    program: &str,
    bootstrap: &str,
    workdir: &Path,
) -> Result<ProcessHandle, SandboxError> {
    let mut cmd = Command::new(program);
    cmd.arg("-u") // unbuffered
        .arg("-c")
        .arg(bootstrap)
        .current_dir(workdir)
        .env_clear()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for key in PASSTHROUGH_ENV {
        if let Ok(v) = std::env::var(key) {
            cmd.env(key, v);
        }
    }
    cmd.env("PYTHONDONTWRITEBYTECODE", "1")
        .env("PYTHONIOENCODING", "utf-8")
        .env("MPLBACKEND", "Agg")
        .env("OPENBLAS_NUM_THREADS", "1")
        .env("OMP_NUM_THREADS", "1");

    let mut child: Child = cmd.spawn().map_err(|e| SandboxError::Spawn {
        program: program.to_string(),
        reason: e.to_string(),
    })?;
    debug!(pid = ?child.id(), program, "python interpreter started");

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| SandboxError::Protocol("no stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SandboxError::Protocol("no stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SandboxError::Protocol("no stderr".into()))?;

    Ok(ProcessHandle {
        child,
        stdin,
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_interpreter_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = start_python("definitely-not-a-python-binary", "pass", dir.path())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SandboxError::Spawn { .. }));
    }
}
