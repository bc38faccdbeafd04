use thiserror::Error;

use crate::model::error::ApiError;

#[derive(PartialEq, Debug)]
pub enum CreateFolderError {
    /// the name was empty or only whitespace
    BlankName,
    /// the name has path separators in it or tries to walk up the tree
    InvalidName,
    Api(ApiError),
}

#[derive(PartialEq, Debug)]
pub enum DownloadFileError {
    /// folders can't be downloaded
    IsFolder,
    /// the listing entry came back without an id
    MissingId,
}

#[derive(Error, Debug)]
pub enum ChunkUploadError {
    /// the local file couldn't be opened or read
    #[error("could not read local file: {0}")]
    Io(#[from] std::io::Error),
    /// the file is empty, the server refuses those
    #[error("cannot upload an empty file")]
    EmptyFile,
    /// a call to the server failed. `upload_id` is present once a session exists, so the
    /// upload can be resumed or cancelled later
    #[error("{error}")]
    Api {
        upload_id: Option<String>,
        error: ApiError,
    },
}

impl ChunkUploadError {
    pub fn upload_id(&self) -> Option<&str> {
        match self {
            Self::Api { upload_id, .. } => upload_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Api { error, .. } if error.is_auth())
    }
}
