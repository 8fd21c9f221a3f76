use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    DEFAULT_ARTIFACT_SUFFIXES, DEFAULT_COMPILE_POOL_SIZE, DEFAULT_COMPILE_TIMEOUT,
    DEFAULT_EXECUTE_TIMEOUT, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_MAX_SOURCE_BYTES,
    DEFAULT_STORE_DIR, WORKSPACE_DIR_NAME,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolchainKind {
    Java,
    Shell,
}

impl FromStr for ToolchainKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "java" => Ok(ToolchainKind::Java),
            "sh" | "shell" => Ok(ToolchainKind::Shell),
            _ => Err(format!("unsupported toolchain: {}", s)),
        }
    }
}

/// Process-wide settings, fixed at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub compile_timeout: Duration,
    pub execute_timeout: Duration,
    pub compile_pool_size: usize,
    pub max_source_bytes: usize,
    pub max_output_bytes: usize,
    pub artifact_suffixes: Vec<String>,
    pub workspace_root: PathBuf,
    pub toolchain: ToolchainKind,
    pub javac_path: PathBuf,
    pub java_path: PathBuf,
    pub sh_path: PathBuf,
    pub store_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compile_timeout: DEFAULT_COMPILE_TIMEOUT,
            execute_timeout: DEFAULT_EXECUTE_TIMEOUT,
            compile_pool_size: DEFAULT_COMPILE_POOL_SIZE,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            artifact_suffixes: DEFAULT_ARTIFACT_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            workspace_root: std::env::temp_dir().join(WORKSPACE_DIR_NAME),
            toolchain: ToolchainKind::Java,
            javac_path: PathBuf::from("javac"),
            java_path: PathBuf::from("java"),
            sh_path: PathBuf::from("sh"),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(ms) = parse_var::<u64>(&lookup, "CODERUNNER_COMPILE_TIMEOUT_MS")? {
            config.compile_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "CODERUNNER_EXECUTE_TIMEOUT_MS")? {
            config.execute_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var::<usize>(&lookup, "CODERUNNER_COMPILE_POOL_SIZE")? {
            if size == 0 {
                return Err(ConfigError::Invalid {
                    var: "CODERUNNER_COMPILE_POOL_SIZE",
                    value: size.to_string(),
                    reason: "pool size must be at least 1".to_string(),
                });
            }
            config.compile_pool_size = size;
        }
        if let Some(bytes) = parse_var(&lookup, "CODERUNNER_MAX_SOURCE_BYTES")? {
            config.max_source_bytes = bytes;
        }
        if let Some(bytes) = parse_var(&lookup, "CODERUNNER_MAX_OUTPUT_BYTES")? {
            config.max_output_bytes = bytes;
        }
        if let Some(suffixes) = lookup("CODERUNNER_ARTIFACT_SUFFIXES") {
            config.artifact_suffixes = suffixes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(toolchain) = parse_var(&lookup, "CODERUNNER_TOOLCHAIN")? {
            config.toolchain = toolchain;
        }
        if let Some(root) = lookup("CODERUNNER_WORKSPACE_ROOT") {
            config.workspace_root = PathBuf::from(root);
        }
        if let Some(path) = lookup("JAVAC_PATH") {
            config.javac_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("JAVA_PATH") {
            config.java_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("SH_PATH") {
            config.sh_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("CODERUNNER_STORE_DIR") {
            config.store_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                var,
                value,
                reason: e.to_string(),
            }),
    }
}
