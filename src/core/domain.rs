use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::core::errors::JobError;

#[derive(Clone, Debug, Default)]
pub struct Submission {
    pub primary_source: String,
    pub auxiliary_files: Vec<AuxiliaryFile>,
    pub stdin: String,
}

impl Submission {
    pub fn new(primary_source: impl Into<String>) -> Self {
        Self {
            primary_source: primary_source.into(),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.auxiliary_files.push(AuxiliaryFile {
            name: name.into(),
            content: content.into(),
        });
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = stdin.into();
        self
    }

    /// Bytes of source and auxiliary content, stdin excluded.
    pub fn content_len(&self) -> usize {
        self.primary_source.len()
            + self
                .auxiliary_files
                .iter()
                .map(|f| f.content.len())
                .sum::<usize>()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxiliaryFile {
    pub name: String,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Compile,
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Compile => write!(f, "compile"),
            Phase::Execute => write!(f, "execute"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    Init,
    Writing,
    Compiling,
    Executing,
    CollectingArtifacts,
    Done { success: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileTask {
    pub file_name: String,
}

#[derive(Clone, Debug)]
pub struct CompileOutcome {
    pub file_name: String,
    pub exit_code: Option<i32>,
    pub stderr: String,
    pub duration: Duration,
    pub timed_out: bool,
}

impl CompileOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionStatus {
    Clean,
    NonZero(Option<i32>),
    TimedOut,
    Error(String),
}

#[derive(Clone, Debug)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    /// Either stream was cut at the output limit.
    pub truncated: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JobMetrics {
    pub compile: Duration,
    pub execute: Duration,
    pub total: Duration,
}

#[derive(Clone, Debug)]
pub struct JobResult {
    pub success: bool,
    pub output: Option<String>,
    /// `output` is only a prefix of what the program wrote.
    pub output_truncated: bool,
    pub error: Option<JobError>,
    pub artifacts: BTreeMap<String, String>,
    pub metrics: JobMetrics,
}

impl JobResult {
    pub fn succeeded(
        output: String,
        output_truncated: bool,
        artifacts: BTreeMap<String, String>,
        metrics: JobMetrics,
    ) -> Self {
        Self {
            success: true,
            output: Some(output),
            output_truncated,
            error: None,
            artifacts,
            metrics,
        }
    }

    pub fn failed(error: JobError, metrics: JobMetrics) -> Self {
        Self {
            success: false,
            output: None,
            output_truncated: false,
            error: Some(error),
            artifacts: BTreeMap::new(),
            metrics,
        }
    }
}
