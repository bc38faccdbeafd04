use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::api::deserialize_id;

/// used when neither the caller nor the config picks a chunk size
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInitRequest {
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u64,
    pub parent_id: String,
    /// reusing an id lets the server pick an interrupted session back up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInitResponse {
    pub upload_id: String,
    pub chunk_size: u64,
    pub total_chunks: u64,
    pub file_name: String,
    pub file_size: u64,
    #[serde(default, deserialize_with = "deserialize_id")]
    pub parent_id: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedChunks {
    /// the api sends `null` when nothing has arrived yet
    #[serde(default, deserialize_with = "deserialize_chunk_list")]
    pub chunks: Vec<u64>,
    #[serde(default)]
    pub total_chunks: u64,
    pub upload_id: String,
}

fn deserialize_chunk_list<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let chunks: Option<Vec<u64>> = Option::deserialize(deserializer)?;
    Ok(chunks.unwrap_or_default())
}

/// a resumable upload tracked by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUploadSession {
    pub upload_id: String,
    pub parent_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u64,
    /// chunk indices the server has confirmed
    pub received: BTreeSet<u64>,
}

impl ChunkUploadSession {
    pub fn from_init(init: ChunkInitResponse) -> Self {
        Self {
            upload_id: init.upload_id,
            parent_id: init.parent_id,
            file_name: init.file_name,
            file_size: init.file_size,
            chunk_size: init.chunk_size,
            total_chunks: init.total_chunks,
            received: BTreeSet::new(),
        }
    }

    /// replaces what we think the server has with what it actually reports. Indices past the
    /// end of the file are ignored
    pub fn sync_received(&mut self, uploaded: &UploadedChunks) {
        self.received = uploaded
            .chunks
            .iter()
            .copied()
            .filter(|index| *index < self.total_chunks)
            .collect();
    }

    pub fn mark_received(&mut self, index: u64) {
        self.received.insert(index);
    }

    /// the chunk indices that still need to be sent, ascending
    pub fn missing_chunks(&self) -> Vec<u64> {
        (0..self.total_chunks)
            .filter(|index| !self.received.contains(index))
            .collect()
    }

    pub fn first_missing(&self) -> Option<u64> {
        (0..self.total_chunks).find(|index| !self.received.contains(index))
    }

    pub fn is_complete(&self) -> bool {
        self.received.len() as u64 == self.total_chunks
    }

    /// byte offset and length of chunk `index`. The last chunk may be short
    pub fn chunk_range(&self, index: u64) -> (u64, u64) {
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.file_size);
        (start, end.saturating_sub(start))
    }
}

/// how many chunks a file of `file_size` splits into
pub fn chunk_count(file_size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    file_size.div_ceil(chunk_size)
}
