use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::time::Instant;
use uuid::Uuid;

use crate::core::{
    config::Config,
    domain::{ExecutionStatus, JobMetrics, JobResult, JobState, Phase, Submission},
    errors::{JobError, ValidationError},
    pipeline::{
        compiling::{CompileFailure, compile_all, plan_compile_tasks},
        running::{collect_artifacts, execute},
    },
    pool::CompilePool,
    traits::{invoker::ProcessInvoker, toolchain::Toolchain},
    workspace::{Workspace, WorkspaceManager},
};

/// Drives one submission through write, compile, execute and artifact
/// collection, always removing its workspace afterwards.
///
/// Cheap to clone; clones share the compile pool.
#[derive(Clone, Debug)]
pub struct JobOrchestrator {
    config: Arc<Config>,
    toolchain: Arc<dyn Toolchain>,
    invoker: Arc<dyn ProcessInvoker>,
    pool: CompilePool,
    workspaces: WorkspaceManager,
}

struct JobSuccess {
    output: String,
    output_truncated: bool,
    artifacts: BTreeMap<String, String>,
}

impl JobOrchestrator {
    pub fn new(
        config: Config,
        toolchain: Arc<dyn Toolchain>,
        invoker: Arc<dyn ProcessInvoker>,
        pool: CompilePool,
    ) -> Self {
        let workspaces = WorkspaceManager::new(&config.workspace_root);
        Self {
            config: Arc::new(config),
            toolchain,
            invoker,
            pool,
            workspaces,
        }
    }

    pub fn validate(&self, submission: &Submission) -> Result<(), ValidationError> {
        let max = self.config.max_source_bytes;
        let source_len = submission.primary_source.len();
        if source_len == 0 {
            return Err(ValidationError::EmptySource { max });
        }
        if source_len > max {
            return Err(ValidationError::SourceTooLarge {
                max,
                actual: source_len,
            });
        }
        let total = submission.content_len();
        if total > max {
            return Err(ValidationError::SubmissionTooLarge { max, actual: total });
        }
        Ok(())
    }

    /// Runs a whole job. Only validation failures are returned as `Err`;
    /// everything after that ends up inside the `JobResult`.
    #[tracing::instrument(skip_all, fields(job = tracing::field::Empty))]
    pub async fn run(&self, submission: Submission) -> Result<JobResult, ValidationError> {
        self.validate(&submission)?;

        let job_id = Uuid::new_v4();
        tracing::Span::current().record("job", tracing::field::display(job_id));
        let started = Instant::now();
        let mut metrics = JobMetrics::default();
        transition(job_id, JobState::Init);

        let outcome = match self.workspaces.create().await {
            Ok(workspace) => {
                let outcome = self.drive(job_id, &workspace, &submission, &mut metrics).await;
                workspace.destroy().await;
                outcome
            }
            Err(e) => Err(JobError::Internal(e.to_string())),
        };
        metrics.total = started.elapsed();

        let result = match outcome {
            Ok(JobSuccess {
                output,
                output_truncated,
                artifacts,
            }) => JobResult::succeeded(output, output_truncated, artifacts, metrics),
            Err(error) => {
                tracing::info!("Job {} failed: {}", job_id, error);
                JobResult::failed(error, metrics)
            }
        };
        transition(job_id, JobState::Done {
            success: result.success,
        });
        Ok(result)
    }

    async fn drive(
        &self,
        job_id: Uuid,
        workspace: &Workspace,
        submission: &Submission,
        metrics: &mut JobMetrics,
    ) -> Result<JobSuccess, JobError> {
        transition(job_id, JobState::Writing);
        workspace
            .write(self.toolchain.entry_point(), &submission.primary_source)
            .await
            .map_err(|e| JobError::Internal(e.to_string()))?;
        for file in &submission.auxiliary_files {
            workspace
                .write(&file.name, &file.content)
                .await
                .map_err(|e| JobError::Internal(e.to_string()))?;
        }

        transition(job_id, JobState::Compiling);
        let tasks = plan_compile_tasks(self.toolchain.as_ref(), &submission.auxiliary_files);
        let report = compile_all(
            &tasks,
            workspace.dir(),
            self.toolchain.as_ref(),
            self.invoker.as_ref(),
            &self.pool,
            self.config.compile_timeout,
        )
        .await;
        metrics.compile = report.span;
        match report.failure {
            None => {}
            Some(CompileFailure::Rejected { stderr, .. }) => return Err(JobError::Compile(stderr)),
            Some(CompileFailure::TimedOut { .. }) => {
                return Err(JobError::Timeout {
                    phase: Phase::Compile,
                    limit: self.config.compile_timeout,
                });
            }
            Some(CompileFailure::Internal { msg }) => return Err(JobError::Internal(msg)),
        }

        transition(job_id, JobState::Executing);
        let execution = execute(
            workspace,
            self.toolchain.as_ref(),
            self.invoker.as_ref(),
            submission.stdin.as_bytes(),
            self.config.execute_timeout,
        )
        .await;
        metrics.execute = execution.duration;
        match execution.status {
            ExecutionStatus::Clean => {}
            // stdout of a failed run is discarded
            ExecutionStatus::NonZero(_) => return Err(JobError::Runtime(execution.stderr)),
            ExecutionStatus::TimedOut => {
                return Err(JobError::Timeout {
                    phase: Phase::Execute,
                    limit: self.config.execute_timeout,
                });
            }
            ExecutionStatus::Error(msg) => return Err(JobError::Internal(msg)),
        }

        transition(job_id, JobState::CollectingArtifacts);
        let artifacts = collect_artifacts(workspace, &self.config.artifact_suffixes)
            .await
            .map_err(|e| JobError::Internal(e.to_string()))?;

        if execution.truncated {
            tracing::warn!(
                "Job {} output exceeded {} bytes and was truncated",
                job_id,
                self.config.max_output_bytes
            );
        }

        Ok(JobSuccess {
            output: execution.stdout,
            output_truncated: execution.truncated,
            artifacts,
        })
    }
}

fn transition(job_id: Uuid, state: JobState) {
    tracing::debug!("Job {} -> {:?}", job_id, state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            domain::AuxiliaryFile,
            errors::ErrorKind,
            traits::invoker::{MockProcessInvoker, ProcessOutput},
        },
        native::toolchains::ShellToolchain,
    };
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    fn orchestrator(invoker: MockProcessInvoker) -> (JobOrchestrator, TempDir) {
        let root = tempdir().unwrap();
        let config = Config {
            workspace_root: root.path().to_path_buf(),
            max_source_bytes: 64,
            ..Config::default()
        };
        let orchestrator = JobOrchestrator::new(
            config,
            Arc::new(ShellToolchain::new("sh")),
            Arc::new(invoker),
            CompilePool::new(2),
        );
        (orchestrator, root)
    }

    fn is_compile(args: &[std::ffi::OsString]) -> bool {
        args.first().is_some_and(|a| a == "-n")
    }

    fn exited(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn assert_no_workspaces(root: &TempDir) {
        let leftovers: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "workspaces left behind: {:?}", leftovers);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_any_workspace() {
        let (orchestrator, root) = orchestrator(MockProcessInvoker::new());

        let empty = orchestrator.run(Submission::new("")).await;
        assert_eq!(empty.unwrap_err(), ValidationError::EmptySource { max: 64 });

        let oversized = orchestrator.run(Submission::new("x".repeat(65))).await;
        assert!(matches!(
            oversized,
            Err(ValidationError::SourceTooLarge { actual: 65, .. })
        ));

        let bulky = Submission::new("echo hi").with_file("data.in", "y".repeat(60));
        assert!(matches!(
            orchestrator.run(bulky).await,
            Err(ValidationError::SubmissionTooLarge { .. })
        ));

        assert_no_workspaces(&root);
    }

    #[tokio::test]
    async fn test_success_returns_stdout_and_metrics() {
        let mut invoker = MockProcessInvoker::new();
        invoker.expect_run().returning(|command, _, stdin, _| {
            if is_compile(&command.args) {
                Ok(exited(0, "", ""))
            } else {
                assert_eq!(stdin, b"in");
                Ok(exited(0, "X", ""))
            }
        });
        let (orchestrator, root) = orchestrator(invoker);

        let result = orchestrator
            .run(Submission::new("printf X").with_stdin("in"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("X"));
        assert!(!result.output_truncated);
        assert!(result.error.is_none());
        assert_eq!(result.metrics.execute, Duration::from_millis(5));
        assert!(result.metrics.total >= result.metrics.compile);
        assert_no_workspaces(&root);
    }

    #[tokio::test]
    async fn test_truncated_output_is_flagged() {
        let mut invoker = MockProcessInvoker::new();
        invoker.expect_run().returning(|command, _, _, _| {
            if is_compile(&command.args) {
                Ok(exited(0, "", ""))
            } else {
                Ok(ProcessOutput {
                    truncated: true,
                    ..exited(0, "1234", "")
                })
            }
        });
        let (orchestrator, root) = orchestrator(invoker);

        let result = orchestrator.run(Submission::new("printf 123456789")).await.unwrap();

        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("1234"));
        assert!(result.output_truncated);
        assert_no_workspaces(&root);
    }

    #[tokio::test]
    async fn test_compile_failure_skips_execution() {
        let mut invoker = MockProcessInvoker::new();
        invoker
            .expect_run()
            .times(1)
            .returning(|_, _, _, _| Ok(exited(2, "", "main.sh: 1: Syntax error")));
        let (orchestrator, root) = orchestrator(invoker);

        let result = orchestrator.run(Submission::new("if then")).await.unwrap();

        assert!(!result.success);
        assert!(result.output.is_none());
        let error = result.error.unwrap();
        assert_eq!(error, JobError::Compile("main.sh: 1: Syntax error".to_string()));
        assert_eq!(error.phase(), Some(Phase::Compile));
        assert_no_workspaces(&root);
    }

    #[tokio::test]
    async fn test_runtime_failure_discards_stdout() {
        let mut invoker = MockProcessInvoker::new();
        invoker.expect_run().returning(|command, _, _, _| {
            if is_compile(&command.args) {
                Ok(exited(0, "", ""))
            } else {
                Ok(exited(1, "half done", "boom"))
            }
        });
        let (orchestrator, root) = orchestrator(invoker);

        let result = orchestrator.run(Submission::new("exit 1")).await.unwrap();

        assert!(!result.success);
        assert!(result.output.is_none());
        assert!(result.artifacts.is_empty());
        assert_eq!(result.error.unwrap(), JobError::Runtime("boom".to_string()));
        assert_no_workspaces(&root);
    }

    #[tokio::test]
    async fn test_execute_timeout_is_tagged_execute() {
        let mut invoker = MockProcessInvoker::new();
        invoker.expect_run().returning(|command, _, _, _| {
            Ok(ProcessOutput {
                exit_code: if is_compile(&command.args) { Some(0) } else { None },
                timed_out: !is_compile(&command.args),
                ..Default::default()
            })
        });
        let (orchestrator, root) = orchestrator(invoker);

        let result = orchestrator.run(Submission::new("while :; do :; done")).await.unwrap();

        let error = result.error.unwrap();
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert_eq!(error.phase(), Some(Phase::Execute));
        assert_no_workspaces(&root);
    }

    #[tokio::test]
    async fn test_compile_timeout_is_tagged_compile() {
        let mut invoker = MockProcessInvoker::new();
        invoker.expect_run().times(1).returning(|_, _, _, _| {
            Ok(ProcessOutput {
                timed_out: true,
                ..Default::default()
            })
        });
        let (orchestrator, root) = orchestrator(invoker);

        let result = orchestrator.run(Submission::new("echo")).await.unwrap();

        let error = result.error.unwrap();
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert_eq!(error.phase(), Some(Phase::Compile));
        assert_no_workspaces(&root);
    }

    #[tokio::test]
    async fn test_invalid_file_name_is_internal_error() {
        let (orchestrator, root) = orchestrator(MockProcessInvoker::new());

        let result = orchestrator
            .run(Submission::new("echo hi").with_file("../escape.txt", "x"))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind(), ErrorKind::Internal);
        assert!(!root.path().join("escape.txt").exists());
        assert_no_workspaces(&root);
    }

    #[tokio::test]
    async fn test_auxiliary_sources_are_compiled() {
        let mut invoker = MockProcessInvoker::new();
        invoker
            .expect_run()
            .withf(|command, _, _, _| command.args.first().is_some_and(|a| a == "-n"))
            .times(2)
            .returning(|_, _, _, _| Ok(exited(0, "", "")));
        invoker
            .expect_run()
            .withf(|command, _, _, _| command.args.first().is_some_and(|a| a == "main.sh"))
            .times(1)
            .returning(|_, _, _, _| Ok(exited(0, "ok", "")));
        let (orchestrator, _root) = orchestrator(invoker);

        let mut submission = Submission::new(". ./lib.sh");
        submission.auxiliary_files = vec![
            AuxiliaryFile {
                name: "lib.sh".to_string(),
                content: "greet() { echo hi; }".to_string(),
            },
            AuxiliaryFile {
                name: "input.in".to_string(),
                content: "1 2".to_string(),
            },
        ];
        let result = orchestrator.run(submission).await.unwrap();

        assert!(result.success);
    }
}
