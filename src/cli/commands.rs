use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::{
    cli::{
        args::FilesAction,
        models::{FilesResponse, JobResponse, StoredFileEntry, SubmitRequest},
    },
    core::{domain::Submission, orchestrator::JobOrchestrator},
    storage::files::{FileStore, StoreError},
};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

async fn read_source(file: Option<PathBuf>) -> Result<String, CommandError> {
    match file {
        Some(path) => Ok(tokio::fs::read_to_string(path).await?),
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            Ok(buf)
        }
    }
}

pub async fn run_submission(
    orchestrator: &JobOrchestrator,
    file: Option<PathBuf>,
) -> Result<ExitCode, CommandError> {
    let raw = read_source(file).await?;
    let request: SubmitRequest = serde_json::from_str(&raw)?;
    let submission: Submission = request.into();

    match orchestrator.run(submission).await {
        Ok(result) => {
            let response = JobResponse::from(result);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(rejection) => {
            tracing::info!("Submission rejected: {}", rejection);
            let body = serde_json::json!({
                "success": false,
                "error": rejection.to_string(),
                "output": null,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::from(2))
        }
    }
}

pub async fn manage_files(
    store: &dyn FileStore,
    action: FilesAction,
) -> Result<ExitCode, CommandError> {
    match action {
        FilesAction::List => {
            let files = store.list().await?.into_iter().map(StoredFileEntry::from).collect();
            println!("{}", serde_json::to_string_pretty(&FilesResponse { files })?);
        }
        FilesAction::Put { name, file } => {
            let content = read_source(file).await?;
            let stored = store.create(&name, &content).await?;
            println!("{}", serde_json::json!({ "success": true, "name": stored }));
        }
        FilesAction::Update { name, file } => {
            let content = read_source(file).await?;
            let stored = store.update(&name, &content).await?;
            println!("{}", serde_json::json!({ "success": true, "name": stored }));
        }
        FilesAction::Rm { name } => {
            store.delete(&name).await?;
            println!("{}", serde_json::json!({ "success": true }));
        }
    }
    Ok(ExitCode::SUCCESS)
}
