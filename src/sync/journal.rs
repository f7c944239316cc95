//! JSON journal that makes the sync queue survive restarts.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, WorkerError};
use crate::sync::QueuedWrite;

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every persisted record. A missing file is an empty queue.
    pub async fn load(&self) -> Result<Vec<QueuedWrite>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                WorkerError::Storage(format!("Corrupt journal {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }

    /// Replaces the journal contents with `records`.
    ///
    /// Written to a sibling temp file then renamed, so readers see either the
    /// old or the new queue, never a torn one.
    pub async fn persist<'a>(&self, records: impl IntoIterator<Item = &'a QueuedWrite>) -> Result<()> {
        let records: Vec<&QueuedWrite> = records.into_iter().collect();
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| WorkerError::Internal(format!("Journal encode: {}", e)))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| storage_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error(&self.path, e))?;

        debug!("Journal {} holds {} record(s)", self.path.display(), records.len());
        Ok(())
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> WorkerError {
    WorkerError::Storage(format!("{}: {}", path.display(), err))
}
