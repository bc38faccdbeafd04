use std::io::SeekFrom;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::model::api::FileInfo;
use crate::model::chunk::{ChunkInitRequest, ChunkUploadSession, DEFAULT_CHUNK_SIZE};
use crate::model::error::file_errors::ChunkUploadError;
use crate::model::error::ApiError;
use crate::model::upload::file_name_of;
use crate::service::file_api::FileApi;
use crate::util::{Observers, SubscriptionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkEvent {
    /// the server knows about the session. `already_received` chunks won't be sent again
    SessionStarted {
        upload_id: String,
        total_chunks: u64,
        already_received: u64,
    },
    ChunkSent {
        index: u64,
        received: u64,
        total_chunks: u64,
    },
    Completed {
        upload_id: String,
        file_id: String,
    },
}

/// sends one local file to the server in chunks. Sessions survive failures: running the same
/// upload again picks up from the first chunk the server doesn't have
pub struct ChunkUploader {
    api: FileApi,
    chunk_size: u64,
    observers: Observers<ChunkEvent>,
}

impl ChunkUploader {
    /// a `chunk_size` of 0 uses [`DEFAULT_CHUNK_SIZE`]
    pub fn new(api: FileApi, chunk_size: u64) -> Self {
        Self {
            api,
            chunk_size: if chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                chunk_size
            },
            observers: Observers::new(),
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&ChunkEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    /// the session id used for an upload of this file into this folder, so that a retry lands
    /// in the same server-side session. The chunk size is part of the key: the server keeps
    /// stored chunks across a re-init, and chunks cut at another size can't be merged
    pub fn resume_key(
        parent_id: &str,
        file_name: &str,
        file_size: u64,
        chunk_size: u64,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(parent_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(file_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(file_size.to_be_bytes());
        hasher.update(chunk_size.to_be_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// uploads `path` into `parent_id`, resuming a previous attempt at the same upload if the
    /// server still has it
    pub async fn upload(&self, path: &Path, parent_id: &str) -> Result<FileInfo, ChunkUploadError> {
        self.upload_with_id(path, parent_id, None).await
    }

    /// like [`ChunkUploader::upload`], but with an explicit session id. `None` derives one
    /// with [`ChunkUploader::resume_key`]. An explicit id must only be reused with the chunk
    /// size it was started with
    pub async fn upload_with_id(
        &self,
        path: &Path,
        parent_id: &str,
        upload_id: Option<String>,
    ) -> Result<FileInfo, ChunkUploadError> {
        let mut file = File::open(path).await?;
        let file_size = file.metadata().await?.len();
        if file_size == 0 {
            return Err(ChunkUploadError::EmptyFile);
        }
        let file_name = file_name_of(path);
        let upload_id = match upload_id {
            Some(id) => id,
            None => Self::resume_key(parent_id, &file_name, file_size, self.chunk_size),
        };
        let init = self
            .api
            .init_chunk_upload(&ChunkInitRequest {
                file_name: file_name.clone(),
                file_size,
                chunk_size: self.chunk_size,
                parent_id: parent_id.to_string(),
                upload_id: Some(upload_id),
            })
            .await
            .map_err(|error| {
                log::error!("Failed to start a chunked upload for {file_name}: {error}");
                ChunkUploadError::Api {
                    upload_id: None,
                    error,
                }
            })?;
        let mut session = ChunkUploadSession::from_init(init);
        let uploaded = self
            .api
            .uploaded_chunks(&session.upload_id)
            .await
            .map_err(|error| session_error(&session, error))?;
        session.sync_received(&uploaded);
        log::info!(
            "Uploading {} in {} chunks ({} already on the server)",
            session.file_name,
            session.total_chunks,
            session.received.len()
        );
        self.observers.notify(&ChunkEvent::SessionStarted {
            upload_id: session.upload_id.clone(),
            total_chunks: session.total_chunks,
            already_received: session.received.len() as u64,
        });

        for index in session.missing_chunks() {
            let (offset, length) = session.chunk_range(index);
            let data = read_chunk(&mut file, offset, length).await?;
            self.api
                .upload_chunk(&session.upload_id, index, data)
                .await
                .map_err(|error| {
                    log::error!(
                        "Chunk {index} of upload {} failed: {error}",
                        session.upload_id
                    );
                    session_error(&session, error)
                })?;
            session.mark_received(index);
            self.observers.notify(&ChunkEvent::ChunkSent {
                index,
                received: session.received.len() as u64,
                total_chunks: session.total_chunks,
            });
        }

        let created = self
            .api
            .complete_chunk_upload(&session.upload_id)
            .await
            .map_err(|error| {
                log::error!(
                    "Failed to complete upload {}: {error}",
                    session.upload_id
                );
                session_error(&session, error)
            })?;
        self.observers.notify(&ChunkEvent::Completed {
            upload_id: session.upload_id.clone(),
            file_id: created.id.clone(),
        });
        Ok(created)
    }

    /// drops a session and everything uploaded for it so far
    pub async fn cancel(&self, upload_id: &str) -> Result<(), ApiError> {
        self.api.cancel_chunk_upload(upload_id).await.map_err(|e| {
            log::error!("Failed to cancel upload {upload_id}: {e}");
            e
        })
    }
}

fn session_error(session: &ChunkUploadSession, error: ApiError) -> ChunkUploadError {
    ChunkUploadError::Api {
        upload_id: Some(session.upload_id.clone()),
        error,
    }
}

async fn read_chunk(file: &mut File, offset: u64, length: u64) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buffer = vec![0u8; length as usize];
    file.read_exact(&mut buffer).await?;
    Ok(buffer)
}
