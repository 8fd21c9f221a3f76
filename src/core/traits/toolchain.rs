use std::path::Path;

use crate::core::traits::invoker::CommandSpec;

/// The external compiler/runtime pair, treated as a black box.
pub trait Toolchain: std::fmt::Debug + Send + Sync {
    /// Canonical name the primary source is written under.
    fn entry_point(&self) -> &str;

    /// Extensions (without the dot) of files that get their own compile task.
    fn source_extensions(&self) -> &[&str];

    fn compile_command(&self, source_file: &str) -> CommandSpec;

    fn run_command(&self) -> CommandSpec;

    fn is_compilable(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.source_extensions().contains(&ext))
    }
}
