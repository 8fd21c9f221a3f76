use std::panic;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Cli, CliCommand};
use crate::cli::commands::{manage_files, run_submission};
use crate::core::config::Config;
use crate::core::orchestrator::JobOrchestrator;
use crate::core::pool::CompilePool;
use crate::native::invoker::NativeInvoker;
use crate::native::toolchains;
use crate::storage::files::FsFileStore;

mod cli;
mod constants;
mod core;
mod native;
mod storage;
#[cfg(test)]
mod stubs;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    set_panic_hook();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let code = match cli.command {
        CliCommand::Run { file } => {
            let orchestrator = JobOrchestrator::new(
                config.clone(),
                toolchains::from_config(&config),
                Arc::new(NativeInvoker::new(config.max_output_bytes)),
                CompilePool::new(config.compile_pool_size),
            );
            tracing::info!(
                "Running submission with {:?} toolchain, pool of {}",
                config.toolchain,
                config.compile_pool_size
            );
            run_submission(&orchestrator, file).await?
        }
        CliCommand::Files { action } => {
            let store = FsFileStore::new(&config.store_dir);
            manage_files(&store, action).await?
        }
    };

    Ok(code)
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
