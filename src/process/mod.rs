//! Interpreter process management (startup/IO/health).

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};

pub mod python;

pub use python::start_python;

/// A freshly spawned interpreter with all three pipes taken.
pub struct ProcessHandle {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Variables passed through to the child; everything else is cleared.
pub(crate) const PASSTHROUGH_ENV: &[&str] = &["PATH", "HOME", "LANG", "LC_ALL", "TMPDIR"];
