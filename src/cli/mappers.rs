use crate::{
    cli::models::{JobResponse, MetricsResponse, StoredFileEntry, SubmitRequest},
    core::domain::{AuxiliaryFile, JobMetrics, JobResult, Submission},
    storage::files::StoredFile,
};

impl From<SubmitRequest> for Submission {
    fn from(request: SubmitRequest) -> Self {
        Submission {
            primary_source: request.code,
            auxiliary_files: request
                .files
                .into_iter()
                .map(|f| AuxiliaryFile {
                    name: f.name,
                    content: f.content,
                })
                .collect(),
            stdin: request.input.unwrap_or_default(),
        }
    }
}

impl From<JobMetrics> for MetricsResponse {
    fn from(metrics: JobMetrics) -> Self {
        MetricsResponse {
            compile_duration_seconds: metrics.compile.as_secs_f64(),
            execute_duration_seconds: metrics.execute.as_secs_f64(),
            total_duration_seconds: metrics.total.as_secs_f64(),
        }
    }
}

impl From<JobResult> for JobResponse {
    fn from(result: JobResult) -> Self {
        JobResponse {
            success: result.success,
            output: result.output,
            output_truncated: result.output_truncated,
            error_kind: result.error.as_ref().map(|e| e.kind().as_str().to_string()),
            error: result.error.map(|e| e.to_string()),
            artifacts: result.artifacts,
            metrics: result.metrics.into(),
        }
    }
}

impl From<StoredFile> for StoredFileEntry {
    fn from(file: StoredFile) -> Self {
        StoredFileEntry {
            name: file.name,
            path: file.path,
            content: file.content,
        }
    }
}
