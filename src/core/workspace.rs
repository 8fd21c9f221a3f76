use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("invalid file name {0:?}")]
    InvalidFileName(String),
    #[error("failed to create workspace {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Allocates per-job scratch directories under a common root.
#[derive(Clone, Debug)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new<T: AsRef<Path>>(root: T) -> Self {
        Self {
            root: root.as_ref().into(),
        }
    }

    pub async fn create(&self) -> Result<Workspace, WorkspaceError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: self.root.clone(),
                source,
            })?;

        let id = Uuid::new_v4();
        let dir = self.root.join(id.to_string());
        // create_dir, not create_dir_all: an existing directory must never be reused
        fs::create_dir(&dir)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: dir.clone(),
                source,
            })?;

        tracing::debug!("Created workspace {}", dir.display());
        Ok(Workspace {
            id,
            dir,
            destroyed: false,
        })
    }
}

/// A private directory owned by exactly one job.
///
/// The directory is removed by [`Workspace::destroy`]; if the owner never gets
/// there (panic, dropped future) the `Drop` impl removes it synchronously.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    dir: PathBuf,
    destroyed: bool,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves `name` inside the workspace, refusing anything but a single plain file name.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        if !is_plain_file_name(name) {
            return Err(WorkspaceError::InvalidFileName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }

    pub async fn write(&self, name: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
        let path = self.resolve(name)?;
        fs::write(&path, content)
            .await
            .map_err(|source| WorkspaceError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Regular files directly inside the workspace, sorted by name.
    pub async fn list_top_level(&self) -> Result<Vec<String>, WorkspaceError> {
        let read_err = |source| WorkspaceError::Read {
            path: self.dir.clone(),
            source,
        };

        let mut entries = fs::read_dir(&self.dir).await.map_err(read_err)?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let file_type = entry.file_type().await.map_err(read_err)?;
            if !file_type.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn read_lossy(&self, name: &str) -> Result<String, WorkspaceError> {
        let path = self.resolve(name)?;
        let bytes = fs::read(&path)
            .await
            .map_err(|source| WorkspaceError::Read { path, source })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Best-effort recursive removal. Never fails; problems are logged.
    pub async fn destroy(mut self) {
        self.destroyed = true;
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => tracing::debug!("Removed workspace {}", self.dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Workspace {} was already gone", self.dir.display())
            }
            Err(e) => tracing::warn!("Failed to remove workspace {}: {}", self.dir.display(), e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove workspace {}: {}", self.dir.display(), e);
            }
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.contains('\0') || name.contains('/') || name.contains('\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
