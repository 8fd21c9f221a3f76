use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Program plus arguments, resolved by the toolchain and run by an invoker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
    pub truncated: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum InvokeError {
    #[error("failed to spawn {program}: {msg}")]
    Spawn { program: String, msg: String },
    #[error("failed to wait for process: {msg}")]
    Wait { msg: String },
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessInvoker: std::fmt::Debug + Send + Sync {
    /// Runs one external process to completion or until `timeout` elapses.
    ///
    /// `stdin` is written to the child and then closed; pass an empty slice for immediate EOF.
    async fn run(
        &self,
        command: &CommandSpec,
        working_dir: &Path,
        stdin: &[u8],
        timeout: Duration,
    ) -> Result<ProcessOutput, InvokeError>;
}
