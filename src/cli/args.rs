use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "coderunner-jobs", about = "Compile and run untrusted submissions in throwaway workspaces")]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run one submission read as JSON and print the result as JSON
    Run {
        /// Submission file; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Manage stored reference files
    Files {
        #[command(subcommand)]
        action: FilesAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum FilesAction {
    List,
    Put {
        name: String,
        /// Content source; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Update {
        name: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Rm {
        name: String,
    },
}
