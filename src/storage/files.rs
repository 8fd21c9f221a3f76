use std::path::{Component, Path, PathBuf};

use itertools::Itertools;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid file name {0:?}")]
    InvalidName(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    /// Location relative to the store root, `/`-separated.
    pub path: String,
    pub content: String,
}

/// Named text files kept outside any job workspace.
#[async_trait::async_trait]
pub trait FileStore: std::fmt::Debug + Send + Sync {
    async fn list(&self) -> Result<Vec<StoredFile>, StoreError>;

    /// Creates or overwrites `name`. Returns the sanitized name actually used.
    async fn create(&self, name: &str, content: &str) -> Result<String, StoreError>;

    /// Replaces the content of `name`, creating it when missing.
    async fn update(&self, name: &str, content: &str) -> Result<String, StoreError>;

    async fn delete(&self, name: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Debug)]
pub struct FsFileStore {
    dir: PathBuf,
}

impl FsFileStore {
    pub fn new<T: AsRef<Path>>(dir: T) -> Self {
        Self {
            dir: dir.as_ref().into(),
        }
    }

    fn path_for(&self, name: &str) -> Result<(String, PathBuf), StoreError> {
        let safe = secure_filename(name);
        if safe.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let path = self.dir.join(&safe);
        Ok((safe, path))
    }
}

#[async_trait::async_trait]
impl FileStore for FsFileStore {
    /// Every regular file under the store, subdirectories included, sorted by path.
    async fn list(&self) -> Result<Vec<StoredFile>, StoreError> {
        let mut files = Vec::new();
        let mut pending = vec![self.dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let Some(path) = relative_path(&self.dir, &entry.path()) else {
                    continue;
                };
                let bytes = fs::read(entry.path()).await?;
                files.push(StoredFile {
                    name,
                    path,
                    content: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
        }

        Ok(files
            .into_iter()
            .sorted_by(|a, b| a.path.cmp(&b.path))
            .collect())
    }

    async fn create(&self, name: &str, content: &str) -> Result<String, StoreError> {
        let (safe, path) = self.path_for(name)?;
        fs::create_dir_all(&self.dir).await?;
        fs::write(&path, content).await?;
        tracing::debug!("Stored {}", path.display());
        Ok(safe)
    }

    async fn update(&self, name: &str, content: &str) -> Result<String, StoreError> {
        let (safe, path) = self.path_for(name)?;
        let existed = fs::try_exists(&path).await?;
        fs::create_dir_all(&self.dir).await?;
        fs::write(&path, content).await?;
        tracing::debug!("Updated {} (existed: {})", path.display(), existed);
        Ok(safe)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let (safe, path) = self.path_for(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(safe)),
            Err(e) => Err(e.into()),
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = path
        .strip_prefix(root)
        .ok()?
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    Some(parts?.join("/"))
}

/// Flattens an untrusted name into a single safe file name:
/// separators become `_`, whitespace runs become `_`, anything outside
/// `[A-Za-z0-9._-]` is dropped and leading/trailing `.`/`_` are trimmed.
pub fn secure_filename(name: &str) -> String {
    let flattened = name.replace(['/', '\\'], " ");
    let joined = flattened.split_whitespace().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}
