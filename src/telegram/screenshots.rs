//! Flat directory of submitted screenshots.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::store::{TaskId, UserId};

/// Writes screenshots to `<dir>/<user>_<task>.jpg`.
///
/// A resubmission for the same task replaces the previous file.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the files go to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic location of a user's screenshot for a task.
    #[must_use]
    pub fn path_for(&self, user_id: UserId, task_id: TaskId) -> PathBuf {
        self.dir.join(format!("{user_id}_{task_id}.jpg"))
    }

    /// Stores the image and returns where it was written.
    pub async fn save(
        &self,
        user_id: UserId,
        task_id: TaskId,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(user_id, task_id);
        tokio::fs::write(&path, bytes).await?;
        debug!("Saved screenshot {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}
