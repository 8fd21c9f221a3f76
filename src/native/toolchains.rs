use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::config::{Config, ToolchainKind};
use crate::core::traits::invoker::CommandSpec;
use crate::core::traits::toolchain::Toolchain;

/// `javac` per source file, `java -cp . Main` to run.
///
/// Files compile concurrently in one directory, so each `javac` only emits the
/// classes of its own file (`-implicit:none`) and resolves the others from
/// source (`-Xprefer:source`), never from a half-written `.class`.
#[derive(Clone, Debug)]
pub struct JavaToolchain {
    javac_path: PathBuf,
    java_path: PathBuf,
}

impl JavaToolchain {
    pub fn new<T, U>(javac_path: T, java_path: U) -> Self
    where
        T: AsRef<Path>,
        U: AsRef<Path>,
    {
        JavaToolchain {
            javac_path: javac_path.as_ref().into(),
            java_path: java_path.as_ref().into(),
        }
    }
}

impl Toolchain for JavaToolchain {
    fn entry_point(&self) -> &str {
        "Main.java"
    }

    fn source_extensions(&self) -> &[&str] {
        &["java"]
    }

    fn compile_command(&self, source_file: &str) -> CommandSpec {
        CommandSpec::new(&self.javac_path)
            .arg("-implicit:none")
            .arg("-Xprefer:source")
            .arg("-sourcepath")
            .arg(".")
            .arg(source_file)
    }

    fn run_command(&self) -> CommandSpec {
        CommandSpec::new(&self.java_path)
            .arg("-cp")
            .arg(".")
            .arg("Main")
    }
}

/// POSIX shell scripts. "Compiling" is a syntax check with `sh -n`.
#[derive(Clone, Debug)]
pub struct ShellToolchain {
    sh_path: PathBuf,
}

impl ShellToolchain {
    pub fn new<T: AsRef<Path>>(sh_path: T) -> Self {
        ShellToolchain {
            sh_path: sh_path.as_ref().into(),
        }
    }
}

impl Toolchain for ShellToolchain {
    fn entry_point(&self) -> &str {
        "main.sh"
    }

    fn source_extensions(&self) -> &[&str] {
        &["sh"]
    }

    fn compile_command(&self, source_file: &str) -> CommandSpec {
        CommandSpec::new(&self.sh_path).arg("-n").arg(source_file)
    }

    fn run_command(&self) -> CommandSpec {
        CommandSpec::new(&self.sh_path).arg(self.entry_point())
    }
}

pub fn from_config(config: &Config) -> Arc<dyn Toolchain> {
    match config.toolchain {
        ToolchainKind::Java => Arc::new(JavaToolchain::new(&config.javac_path, &config.java_path)),
        ToolchainKind::Shell => Arc::new(ShellToolchain::new(&config.sh_path)),
    }
}
