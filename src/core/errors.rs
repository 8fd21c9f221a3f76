use std::time::Duration;

use thiserror::Error;

use crate::core::domain::Phase;

/// Rejections raised before any workspace is allocated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Code must be between 1 and {max} bytes")]
    EmptySource { max: usize },
    #[error("Code must be between 1 and {max} bytes, got {actual}")]
    SourceTooLarge { max: usize, actual: usize },
    #[error("Submission exceeds {max} bytes in total, got {actual}")]
    SubmissionTooLarge { max: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Compile,
    Runtime,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Compile => "compile",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum JobError {
    #[error("Compilation error: {0}")]
    Compile(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Timeout error: {phase} phase exceeded {}s", limit.as_secs_f64())]
    Timeout { phase: Phase, limit: Duration },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::Compile(_) => ErrorKind::Compile,
            JobError::Runtime(_) => ErrorKind::Runtime,
            JobError::Timeout { .. } => ErrorKind::Timeout,
            JobError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Phase the failure belongs to, if it came from user code.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            JobError::Compile(_) => Some(Phase::Compile),
            JobError::Runtime(_) => Some(Phase::Execute),
            JobError::Timeout { phase, .. } => Some(*phase),
            JobError::Internal(_) => None,
        }
    }
}
