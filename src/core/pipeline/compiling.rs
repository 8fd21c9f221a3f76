use std::path::Path;

use futures::stream::FuturesUnordered;
use tokio::time::{Duration, Instant};
use tokio_stream::StreamExt;

use crate::core::{
    domain::{AuxiliaryFile, CompileOutcome, CompileTask},
    pool::CompilePool,
    traits::{invoker::ProcessInvoker, toolchain::Toolchain},
};

#[derive(Debug, Clone, PartialEq)]
pub enum CompileFailure {
    Rejected { file_name: String, stderr: String },
    TimedOut { file_name: String },
    Internal { msg: String },
}

#[derive(Debug, Clone)]
pub struct CompileReport {
    /// Outcomes in completion order.
    pub outcomes: Vec<CompileOutcome>,
    /// Wall-clock span from first submission to last completion.
    pub span: Duration,
    /// The first failure observed, if any.
    pub failure: Option<CompileFailure>,
}

impl CompileReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Entry point first, then every auxiliary file the toolchain compiles, each name once.
pub fn plan_compile_tasks(
    toolchain: &dyn Toolchain,
    auxiliary_files: &[AuxiliaryFile],
) -> Vec<CompileTask> {
    let mut tasks = vec![CompileTask {
        file_name: toolchain.entry_point().to_string(),
    }];
    for file in auxiliary_files {
        if toolchain.is_compilable(&file.name) && !tasks.iter().any(|t| t.file_name == file.name) {
            tasks.push(CompileTask {
                file_name: file.name.clone(),
            });
        }
    }
    tasks
}

/// Compiles every task concurrently on the shared pool and waits for all of them.
///
/// `limit` bounds the whole phase: time spent waiting for a pool slot counts
/// against it. In-flight tasks are never cancelled when another one fails.
#[tracing::instrument(skip(toolchain, invoker, pool))]
pub async fn compile_all(
    tasks: &[CompileTask],
    workspace_dir: &Path,
    toolchain: &dyn Toolchain,
    invoker: &dyn ProcessInvoker,
    pool: &CompilePool,
    limit: Duration,
) -> CompileReport {
    let started = Instant::now();
    let deadline = started + limit;

    let mut futures: FuturesUnordered<_> = tasks
        .iter()
        .map(|task| compile_one(task, workspace_dir, toolchain, invoker, pool, deadline))
        .collect();

    let mut outcomes = Vec::with_capacity(tasks.len());
    let mut failure = None;
    while let Some(result) = futures.next().await {
        match result {
            Ok(outcome) => {
                tracing::debug!(
                    "Compiled {} in {:?}: exit={:?} timed_out={}",
                    outcome.file_name,
                    outcome.duration,
                    outcome.exit_code,
                    outcome.timed_out
                );
                if failure.is_none() && !outcome.succeeded() {
                    failure = Some(if outcome.timed_out {
                        CompileFailure::TimedOut {
                            file_name: outcome.file_name.clone(),
                        }
                    } else {
                        CompileFailure::Rejected {
                            file_name: outcome.file_name.clone(),
                            stderr: outcome.stderr.clone(),
                        }
                    });
                }
                outcomes.push(outcome);
            }
            Err(msg) => {
                tracing::error!("Compile task failed to run: {}", msg);
                if failure.is_none() {
                    failure = Some(CompileFailure::Internal { msg });
                }
            }
        }
    }

    CompileReport {
        outcomes,
        span: started.elapsed(),
        failure,
    }
}

async fn compile_one(
    task: &CompileTask,
    workspace_dir: &Path,
    toolchain: &dyn Toolchain,
    invoker: &dyn ProcessInvoker,
    pool: &CompilePool,
    deadline: Instant,
) -> Result<CompileOutcome, String> {
    let _permit = pool
        .acquire()
        .await
        .map_err(|e| format!("compile pool closed: {}", e))?;

    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Ok(CompileOutcome {
            file_name: task.file_name.clone(),
            exit_code: None,
            stderr: String::new(),
            duration: Duration::ZERO,
            timed_out: true,
        });
    }

    let command = toolchain.compile_command(&task.file_name);
    let output = invoker
        .run(&command, workspace_dir, b"", remaining)
        .await
        .map_err(|e| e.to_string())?;

    Ok(CompileOutcome {
        file_name: task.file_name.clone(),
        exit_code: output.exit_code,
        stderr: output.stderr,
        duration: output.duration,
        timed_out: output.timed_out,
    })
}
