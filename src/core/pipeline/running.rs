use std::collections::BTreeMap;

use tokio::time::Duration;

use crate::core::{
    domain::{ExecutionResult, ExecutionStatus},
    traits::{invoker::ProcessInvoker, toolchain::Toolchain},
    workspace::{Workspace, WorkspaceError},
};

/// Runs the compiled entry point once, feeding `stdin` exactly as given.
#[tracing::instrument(skip(workspace, toolchain, invoker, stdin), fields(workspace = %workspace.id()))]
pub async fn execute(
    workspace: &Workspace,
    toolchain: &dyn Toolchain,
    invoker: &dyn ProcessInvoker,
    stdin: &[u8],
    limit: Duration,
) -> ExecutionResult {
    let command = toolchain.run_command();
    match invoker.run(&command, workspace.dir(), stdin, limit).await {
        Ok(output) => {
            let status = if output.timed_out {
                ExecutionStatus::TimedOut
            } else if output.exit_code == Some(0) {
                ExecutionStatus::Clean
            } else {
                ExecutionStatus::NonZero(output.exit_code)
            };
            tracing::debug!("Execution finished: {:?} in {:?}", status, output.duration);
            ExecutionResult {
                status,
                stdout: output.stdout,
                stderr: output.stderr,
                duration: output.duration,
                truncated: output.truncated,
            }
        }
        Err(e) => {
            tracing::error!("Failed to run entry point: {}", e);
            ExecutionResult {
                status: ExecutionStatus::Error(e.to_string()),
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::ZERO,
                truncated: false,
            }
        }
    }
}

/// Reads every top-level file whose name ends with one of `suffixes`.
pub async fn collect_artifacts(
    workspace: &Workspace,
    suffixes: &[String],
) -> Result<BTreeMap<String, String>, WorkspaceError> {
    let mut artifacts = BTreeMap::new();
    for name in workspace.list_top_level().await? {
        if suffixes.iter().any(|suffix| name.ends_with(suffix.as_str())) {
            let content = workspace.read_lossy(&name).await?;
            artifacts.insert(name, content);
        }
    }
    Ok(artifacts)
}
