//! Atomic file output for reports and manifests.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Output errors.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("IO error writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes run outputs into one directory.
///
/// Every write goes to a temp file first and is renamed into place, so a
/// reader never sees a half-written file.
pub struct OutputWriter {
    /// Base directory for output files.
    base_dir: PathBuf,
}

impl OutputWriter {
    /// Create a writer for a directory.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Ensure the base directory exists.
    pub async fn init(&self) -> Result<(), OutputError> {
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|source| OutputError::Io {
                path: self.base_dir.clone(),
                source,
            })
    }

    /// Write text to `name` inside the base directory.
    pub async fn write_text(&self, name: &str, text: &str) -> Result<PathBuf, OutputError> {
        let path = self.base_dir.join(name);
        write_atomic(&path, text).await?;
        Ok(path)
    }

    /// Write a value as pretty JSON to `name` inside the base directory.
    pub async fn write_json<T: Serialize>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<PathBuf, OutputError> {
        let json = serde_json::to_string_pretty(value)?;
        self.write_text(name, &json).await
    }
}

/// Write `text` to `path` through a sibling temp file.
pub async fn write_atomic(path: &Path, text: &str) -> Result<(), OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let mut file = fs::File::create(&temp_path).await.map_err(io_err)?;
    file.write_all(text.as_bytes()).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    fs::rename(&temp_path, path).await.map_err(io_err)?;

    tracing::debug!("Wrote {}", path.display());
    Ok(())
}
