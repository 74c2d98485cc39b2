use crate::error::{SyncError, SyncResult};
use crate::remote::model::Attachment;
use crate::remote::TestManagementApi;
use async_trait::async_trait;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A page handle able to write a screenshot to `path`.
#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    async fn screenshot(&self, path: &Path) -> SyncResult<()>;
}

/// Uploads files and in-memory content as attachments of the active run.
#[derive(Clone)]
pub struct ArtifactUploader {
    api: Arc<dyn TestManagementApi>,
    run_id: u64,
    artifacts_dir: PathBuf,
}

impl ArtifactUploader {
    pub fn new(api: Arc<dyn TestManagementApi>, run_id: u64, artifacts_dir: PathBuf) -> Self {
        Self {
            api,
            run_id,
            artifacts_dir,
        }
    }

    pub async fn capture_screenshot(
        &self,
        source: &dyn ScreenshotSource,
        case_id: &str,
        result_id: u64,
    ) -> SyncResult<PathBuf> {
        tokio::fs::create_dir_all(&self.artifacts_dir)
            .await
            .map_err(|err| SyncError::Artifact(format!("{}: {}", self.artifacts_dir.display(), err)))?;
        let file_name = format!(
            "{}_failure_{}.png",
            case_id,
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.artifacts_dir.join(file_name);
        source.screenshot(&path).await?;
        self.attach_file(result_id, &path, "Failure screenshot").await?;
        Ok(path)
    }

    pub async fn attach_file(&self, result_id: u64, path: &Path, comment: &str) -> SyncResult<()> {
        let (content, file_name) = read_artifact(path).await?;
        self.attach_bytes(result_id, &content, &file_name, comment).await
    }

    pub async fn attach_bytes(
        &self,
        result_id: u64,
        content: &[u8],
        file_name: &str,
        comment: &str,
    ) -> SyncResult<()> {
        let attachment = Attachment::general(content, file_name, comment);
        self.api
            .attach_to_result(self.run_id, result_id, &attachment)
            .await?;
        info!(run_id = self.run_id, result_id, file_name, "attached to result");
        Ok(())
    }

    pub async fn attach_to_run(&self, content: &[u8], file_name: &str, comment: &str) -> SyncResult<()> {
        let attachment = Attachment::general(content, file_name, comment);
        self.api.attach_to_run(self.run_id, &attachment).await?;
        info!(run_id = self.run_id, file_name, "attached to run");
        Ok(())
    }

    pub async fn attach_file_to_run(&self, path: &Path, comment: &str) -> SyncResult<()> {
        let (content, file_name) = read_artifact(path).await?;
        self.attach_to_run(&content, &file_name, comment).await
    }
}

async fn read_artifact(path: &Path) -> SyncResult<(Vec<u8>, String)> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|err| SyncError::Artifact(format!("{}: {}", path.display(), err)))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| SyncError::Artifact(format!("{} has no file name", path.display())))?;
    Ok((content, file_name))
}
