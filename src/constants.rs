use std::time::Duration;

pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_EXECUTE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_COMPILE_POOL_SIZE: usize = 4;
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 512 * 1024 * 1024;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_ARTIFACT_SUFFIXES: [&str; 2] = [".out", ".txt"];
pub const DEFAULT_STORE_DIR: &str = "workspace";

pub const WORKSPACE_DIR_NAME: &str = "coderunner";

/// How long output readers may linger after the process group was killed.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);
