use std::sync::Arc;

use serde_json::json;

use crate::http::{ApiClient, ApiRequest, FormPart};
use crate::model::api::FileInfo;
use crate::model::chunk::{ChunkInitRequest, ChunkInitResponse, UploadedChunks};
use crate::model::error::ApiError;
use crate::model::upload::UploadFile;

/// thin, stateless wrappers around the `/files` endpoints. Every method is exactly one request
#[derive(Clone)]
pub struct FileApi {
    client: Arc<ApiClient>,
}

impl FileApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// the direct children of `parent_id`. An empty id lists the root
    pub async fn list_files(&self, parent_id: &str) -> Result<Vec<FileInfo>, ApiError> {
        let mut request = ApiRequest::get("/files/list");
        if !parent_id.is_empty() {
            request = request.query("parentId", parent_id);
        }
        // an empty directory can come back as null
        let files: Option<Vec<FileInfo>> = self.client.call(request).await?;
        Ok(files.unwrap_or_default())
    }

    pub async fn create_folder(
        &self,
        parent_id: &str,
        folder_name: &str,
    ) -> Result<FileInfo, ApiError> {
        let request = ApiRequest::post("/files/folder").json(&json!({
            "parentId": parent_id,
            "folderName": folder_name,
        }))?;
        self.client.call(request).await
    }

    pub async fn upload_file(
        &self,
        parent_id: &str,
        file: &UploadFile,
    ) -> Result<FileInfo, ApiError> {
        let request = ApiRequest::post("/files/upload").multipart(vec![
            FormPart::File {
                name: "file".to_string(),
                file_name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                data: file.data.clone(),
            },
            FormPart::text("parentId", parent_id),
        ]);
        self.client.call(request).await
    }

    pub async fn rename_file(&self, file_id: &str, new_name: &str) -> Result<(), ApiError> {
        let request = ApiRequest::put(format!("/files/rename/{}", urlencoding::encode(file_id)))
            .json(&json!({ "newName": new_name }))?;
        self.client.call::<serde_json::Value>(request).await?;
        Ok(())
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        let request = ApiRequest::delete(format!("/files/{}", urlencoding::encode(file_id)));
        self.client.call::<serde_json::Value>(request).await?;
        Ok(())
    }

    /// a link the browser (or anything else) can fetch directly. The token rides in the query
    /// string since there's no way to set headers on a plain navigation
    pub fn download_url(&self, file_id: &str) -> String {
        let token = self.client.session().query_token();
        self.client.url_for(
            &format!("/files/download/{}", urlencoding::encode(file_id)),
            &[("token", token.as_str())],
        )
    }

    // ---------------------------- chunked uploads

    pub async fn init_chunk_upload(
        &self,
        request: &ChunkInitRequest,
    ) -> Result<ChunkInitResponse, ApiError> {
        let request = ApiRequest::post("/files/upload/chunk/init").json(request)?;
        self.client.call(request).await
    }

    pub async fn upload_chunk(
        &self,
        upload_id: &str,
        chunk_index: u64,
        data: Vec<u8>,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::post("/files/upload/chunk").multipart(vec![
            FormPart::text("uploadId", upload_id),
            FormPart::text("chunkIndex", chunk_index.to_string()),
            FormPart::File {
                name: "chunk".to_string(),
                file_name: format!("chunk_{chunk_index}"),
                mime_type: Some("application/octet-stream".to_string()),
                data,
            },
        ]);
        self.client.call::<serde_json::Value>(request).await?;
        Ok(())
    }

    /// which chunks the server already has. An unknown session reports none
    pub async fn uploaded_chunks(&self, upload_id: &str) -> Result<UploadedChunks, ApiError> {
        let request = ApiRequest::get(format!(
            "/files/upload/chunk/{}/chunks",
            urlencoding::encode(upload_id)
        ));
        self.client.call(request).await
    }

    /// asks the server to stitch the chunks together. Returns the new file
    pub async fn complete_chunk_upload(&self, upload_id: &str) -> Result<FileInfo, ApiError> {
        let request = ApiRequest::post("/files/upload/chunk/complete")
            .json(&json!({ "uploadId": upload_id }))?;
        self.client.call(request).await
    }

    pub async fn cancel_chunk_upload(&self, upload_id: &str) -> Result<(), ApiError> {
        let request = ApiRequest::delete(format!(
            "/files/upload/chunk/{}",
            urlencoding::encode(upload_id)
        ));
        self.client.call::<serde_json::Value>(request).await?;
        Ok(())
    }
}
