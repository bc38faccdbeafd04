use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::api::FileInfo;
use crate::model::error::file_errors::{ChunkUploadError, CreateFolderError, DownloadFileError};
use crate::model::upload::UploadFile;
use crate::model::view::FileItem;
use crate::service::chunk_upload::ChunkUploader;
use crate::service::feedback::{report_api_error, Feedback, Opener};
use crate::service::file_api::FileApi;
use crate::service::file_management::FileManagement;
use crate::util::{Observers, SubscriptionId};

/// path separators, or a name that is nothing but `.` / `..`
static INVALID_FOLDER_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"[/\\]|^\.{1,2}$").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Success,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionEvent {
    /// the file at `index` of the batch finished
    FileStatus { index: usize, status: UploadStatus },
    UploadProgress { completed: usize, total: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// there was nothing to upload
    Nothing,
    AllSucceeded(usize),
    AllFailed(usize),
    Mixed { succeeded: usize, failed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub outcome: UploadOutcome,
    /// ids of the files the server created, in upload order
    pub uploaded_ids: Vec<String>,
    /// positions in the submitted batch that failed, see [`UploadReport::failed_files`]
    pub failed_indices: Vec<usize>,
}

impl UploadReport {
    fn nothing() -> Self {
        Self {
            outcome: UploadOutcome::Nothing,
            uploaded_ids: Vec::new(),
            failed_indices: Vec::new(),
        }
    }

    /// picks the failed files out of the batch that produced this report, ready for a retry
    pub fn failed_files(&self, batch: &[UploadFile]) -> Vec<UploadFile> {
        self.failed_indices
            .iter()
            .filter_map(|index| batch.get(*index).cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// the mutating operations on the current folder. Every successful change refreshes the listing
pub struct FileActions {
    api: FileApi,
    feedback: Arc<dyn Feedback>,
    opener: Arc<dyn Opener>,
    chunk_uploader: ChunkUploader,
    upload_progress: f64,
    new_uploaded_file_ids: Vec<String>,
    observers: Observers<ActionEvent>,
}

impl FileActions {
    pub fn new(
        api: FileApi,
        feedback: Arc<dyn Feedback>,
        opener: Arc<dyn Opener>,
        chunk_size: u64,
    ) -> Self {
        Self {
            chunk_uploader: ChunkUploader::new(api.clone(), chunk_size),
            api,
            feedback,
            opener,
            upload_progress: 0.0,
            new_uploaded_file_ids: Vec::new(),
            observers: Observers::new(),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&ActionEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn chunk_uploader(&self) -> &ChunkUploader {
        &self.chunk_uploader
    }

    /// fraction of the current (or last) upload batch that is done, 0 to 1
    pub fn upload_progress(&self) -> f64 {
        self.upload_progress
    }

    /// ids created by the last upload, for highlighting them in the listing
    pub fn new_uploaded_file_ids(&self) -> &[String] {
        &self.new_uploaded_file_ids
    }

    pub async fn create_folder(&mut self, listing: &mut FileManagement, name: &str) -> bool {
        let parent_id = listing.current_parent_id().to_string();
        match self.try_create_folder(&parent_id, name).await {
            Ok(_) => {
                self.feedback.success("Folder created");
                listing.refresh().await.ok();
                true
            }
            Err(CreateFolderError::BlankName) => {
                self.feedback.warning("Folder name cannot be empty");
                false
            }
            Err(CreateFolderError::InvalidName) => {
                self.feedback.warning("Folder name cannot contain slashes or be \".\" or \"..\"");
                false
            }
            Err(CreateFolderError::Api(e)) => {
                log::error!("Failed to create folder {name:?}: {e}");
                report_api_error(self.feedback.as_ref(), "Failed to create folder", &e);
                false
            }
        }
    }

    async fn try_create_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> Result<FileInfo, CreateFolderError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CreateFolderError::BlankName);
        }
        if INVALID_FOLDER_NAME
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(name))
        {
            return Err(CreateFolderError::InvalidName);
        }
        self.api
            .create_folder(parent_id, name)
            .await
            .map_err(CreateFolderError::Api)
    }

    /// a blank name, the unchanged name, or a file without an id sends nothing
    pub async fn rename_file(
        &mut self,
        listing: &mut FileManagement,
        file: &FileItem,
        new_name: &str,
    ) -> bool {
        if !file.has_id() || new_name.trim().is_empty() || new_name == file.name {
            return false;
        }
        match self.api.rename_file(&file.id, new_name).await {
            Ok(()) => {
                self.feedback.success("Renamed");
                listing.refresh().await.ok();
                true
            }
            Err(e) => {
                log::error!("Failed to rename {} to {new_name:?}: {e}", file.id);
                report_api_error(self.feedback.as_ref(), "Rename failed", &e);
                false
            }
        }
    }

    pub async fn delete_file(&mut self, listing: &mut FileManagement, file: &FileItem) -> bool {
        if !file.has_id() {
            return false;
        }
        match self.api.delete_file(&file.id).await {
            Ok(()) => {
                self.feedback.success("Deleted");
                listing.refresh().await.ok();
                true
            }
            Err(e) => {
                log::error!("Failed to delete {}: {e}", file.id);
                report_api_error(self.feedback.as_ref(), "Delete failed", &e);
                false
            }
        }
    }

    /// deletes one at a time. Files without an id count as failures. The listing is refreshed
    /// afterwards no matter what
    pub async fn delete_files(
        &mut self,
        listing: &mut FileManagement,
        files: &[FileItem],
    ) -> DeleteSummary {
        if files.is_empty() {
            self.feedback.warning("No files selected for deletion");
            return DeleteSummary::default();
        }
        let mut summary = DeleteSummary::default();
        for file in files {
            if !file.has_id() {
                summary.failed += 1;
                continue;
            }
            match self.api.delete_file(&file.id).await {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    log::error!("Failed to delete {}: {e}", file.id);
                    summary.failed += 1;
                }
            }
        }
        if summary.succeeded > 0 {
            self.feedback.success(&format!("Deleted {} files", summary.succeeded));
        }
        if summary.failed > 0 {
            self.feedback.warning(&format!("{} files could not be deleted", summary.failed));
        }
        listing.refresh().await.ok();
        summary
    }

    /// hands the file's download link to the opener
    pub fn download_file(&self, file: &FileItem) -> bool {
        match self.download_url(file) {
            Ok(url) => {
                self.opener.open(&url);
                true
            }
            Err(DownloadFileError::IsFolder) => {
                self.feedback.warning("Folders cannot be downloaded");
                false
            }
            Err(DownloadFileError::MissingId) => {
                self.feedback.warning("This file cannot be downloaded");
                false
            }
        }
    }

    pub fn download_url(&self, file: &FileItem) -> Result<String, DownloadFileError> {
        if file.is_folder() {
            Err(DownloadFileError::IsFolder)
        } else if !file.has_id() {
            Err(DownloadFileError::MissingId)
        } else {
            Ok(self.api.download_url(&file.id))
        }
    }

    /// uploads the batch into the current folder, one request per file. A failure doesn't stop the
    /// rest. Each file's status and the running progress are published as they happen
    pub async fn upload_files(
        &mut self,
        listing: &mut FileManagement,
        files: &[UploadFile],
    ) -> UploadReport {
        if files.is_empty() {
            return UploadReport::nothing();
        }
        let parent_id = listing.current_parent_id().to_string();
        let total = files.len();
        self.new_uploaded_file_ids.clear();
        self.upload_progress = 0.0;
        let mut failed_indices = Vec::new();
        for (index, file) in files.iter().enumerate() {
            let status = match self.api.upload_file(&parent_id, file).await {
                Ok(created) => {
                    if !created.id.is_empty() {
                        self.new_uploaded_file_ids.push(created.id);
                    }
                    UploadStatus::Success
                }
                Err(e) => {
                    log::error!("Failed to upload {}: {e}", file.name);
                    failed_indices.push(index);
                    UploadStatus::Error(e.to_string())
                }
            };
            self.observers.notify(&ActionEvent::FileStatus { index, status });
            self.upload_progress = (index + 1) as f64 / total as f64;
            self.observers.notify(&ActionEvent::UploadProgress {
                completed: index + 1,
                total,
            });
        }

        let failed = failed_indices.len();
        let succeeded = total - failed;
        let outcome = if failed == 0 {
            self.feedback.success(&format!("All {succeeded} files uploaded"));
            UploadOutcome::AllSucceeded(succeeded)
        } else if succeeded == 0 {
            self.feedback.error(&format!("All {failed} files failed to upload"));
            UploadOutcome::AllFailed(failed)
        } else {
            self.feedback.warning(&format!(
                "Upload finished: {succeeded} succeeded, {failed} failed"
            ));
            UploadOutcome::Mixed { succeeded, failed }
        };
        listing.refresh().await.ok();
        UploadReport {
            outcome,
            uploaded_ids: self.new_uploaded_file_ids.clone(),
            failed_indices,
        }
    }

    /// runs [`FileActions::upload_files`] over just the files that failed last time
    pub async fn retry_upload(
        &mut self,
        listing: &mut FileManagement,
        failed: &[UploadFile],
    ) -> UploadReport {
        if failed.is_empty() {
            return UploadReport::nothing();
        }
        self.upload_files(listing, failed).await
    }

    /// sends a large local file in resumable chunks. Calling it again for the same file and folder
    /// continues where the last attempt stopped
    pub async fn upload_large_file(
        &mut self,
        listing: &mut FileManagement,
        path: &Path,
    ) -> Result<FileInfo, ChunkUploadError> {
        let parent_id = listing.current_parent_id().to_string();
        match self.chunk_uploader.upload(path, &parent_id).await {
            Ok(created) => {
                self.new_uploaded_file_ids = vec![created.id.clone()];
                self.feedback.success(&format!("Uploaded {}", created.name));
                listing.refresh().await.ok();
                Ok(created)
            }
            Err(e) => {
                let message = match e.upload_id() {
                    Some(id) => format!("Upload failed: {e} (resume with upload id {id})"),
                    None => format!("Upload failed: {e}"),
                };
                log::error!("{message}");
                if !e.is_auth() {
                    self.feedback.error(&message);
                }
                Err(e)
            }
        }
    }
}
