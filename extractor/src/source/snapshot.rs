//! Directory of serialized block snapshots named by height

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::MessageSource;
use crate::error::{ExtractorError, Result};
use crate::models::BlockMessage;

/// Reads `0.json`, `1.json`, ... in numeric order.
pub struct SnapshotDir {
    dir: PathBuf,
    count: usize,
    next: usize,
    closed: bool,
}

impl SnapshotDir {
    /// Every index below the number of directory entries must be present.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut count = 0usize;
        while entries.next_entry().await?.is_some() {
            count += 1;
        }

        for index in 0..count {
            let path = Self::path_for(&dir, index);
            if !tokio::fs::try_exists(&path).await? {
                return Err(ExtractorError::MissingSnapshot(path));
            }
        }

        info!(dir = %dir.display(), count, "Opened snapshot directory");
        Ok(Self {
            dir,
            count,
            next: 0,
            closed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn path_for(dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("{}.json", index))
    }
}

#[async_trait]
impl MessageSource for SnapshotDir {
    fn describe(&self) -> String {
        format!("snapshots in {}", self.dir.display())
    }

    async fn next_message(&mut self) -> Result<Option<BlockMessage>> {
        if self.closed || self.next >= self.count {
            return Ok(None);
        }

        let path = Self::path_for(&self.dir, self.next);
        debug!(path = %path.display(), "Loading snapshot");
        let raw = tokio::fs::read(&path).await?;
        let message = serde_json::from_slice(&raw).map_err(|e| {
            ExtractorError::InvalidMessage(format!("{}: {}", path.display(), e))
        })?;
        self.next += 1;
        Ok(Some(message))
    }

    async fn acknowledge(&mut self, message: &BlockMessage) -> Result<()> {
        debug!(height = message.block.height, remaining = self.count - self.next, "Snapshot done");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
