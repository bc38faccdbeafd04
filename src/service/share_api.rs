use std::sync::Arc;

use serde_json::json;

use crate::http::{ApiClient, ApiRequest};
use crate::model::error::share_errors::ShareAccessError;
use crate::model::error::ApiError;
use crate::model::share::{
    CreateShareRequest, PageResult, PublicShareInfo, ShareAccessLog, ShareInfo,
    VerifyPasswordResponse,
};

/// the share endpoints. The `/files/share` ones need a logged-in owner, the `/share` ones are
/// public
#[derive(Clone)]
pub struct ShareApi {
    client: Arc<ApiClient>,
}

impl ShareApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub async fn create_share(&self, request: &CreateShareRequest) -> Result<ShareInfo, ApiError> {
        let request = ApiRequest::post("/files/share").json(request)?;
        self.client.call(request).await
    }

    pub async fn list_shares(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<PageResult<ShareInfo>, ApiError> {
        let request = ApiRequest::get("/files/share")
            .query("page", page)
            .query("pageSize", page_size);
        self.client.call(request).await
    }

    pub async fn share_detail(&self, id: u64) -> Result<ShareInfo, ApiError> {
        self.client
            .call(ApiRequest::get(format!("/files/share/{id}")))
            .await
    }

    pub async fn delete_share(&self, id: u64) -> Result<(), ApiError> {
        self.client
            .call::<serde_json::Value>(ApiRequest::delete(format!("/files/share/{id}")))
            .await?;
        Ok(())
    }

    pub async fn access_logs(
        &self,
        id: u64,
        page: u32,
        page_size: u32,
    ) -> Result<PageResult<ShareAccessLog>, ApiError> {
        let request = ApiRequest::get(format!("/files/share/{id}/logs"))
            .query("page", page)
            .query("pageSize", page_size);
        self.client.call(request).await
    }

    // ---------------------------- public

    /// what a visitor sees. Counts as a view on the server
    pub async fn share_info(&self, share_id: &str) -> Result<PublicShareInfo, ApiError> {
        let request = ApiRequest::get(format!("/share/{}", urlencoding::encode(share_id)));
        self.client.call(request).await
    }

    /// a wrong password is not an error, it comes back with `valid: false`
    pub async fn verify_password(
        &self,
        share_id: &str,
        password: &str,
    ) -> Result<VerifyPasswordResponse, ApiError> {
        let request = ApiRequest::post(format!("/share/{}/verify", urlencoding::encode(share_id)))
            .json(&json!({ "password": password }))?;
        self.client.call(request).await
    }

    pub fn download_url(&self, share_id: &str, token: &str) -> String {
        self.client.url_for(
            &format!("/share/{}/download", urlencoding::encode(share_id)),
            &[("token", token)],
        )
    }

    /// walks a visitor through a share: checks it's still live, verifies the password if it has
    /// one, and returns a download link carrying the issued token
    pub async fn open_share(
        &self,
        share_id: &str,
        password: Option<&str>,
    ) -> Result<String, ShareAccessError> {
        let info = self.share_info(share_id).await?;
        if info.is_expired {
            log::info!("Share {share_id} has expired");
            return Err(ShareAccessError::Expired);
        }
        let password = match (info.has_password, password) {
            (true, None) => return Err(ShareAccessError::PasswordRequired),
            (true, Some(p)) if p.is_empty() => return Err(ShareAccessError::PasswordRequired),
            (_, p) => p.unwrap_or_default(),
        };
        let verified = self.verify_password(share_id, password).await?;
        if !verified.valid {
            log::warn!("Wrong password given for share {share_id}");
            return Err(ShareAccessError::WrongPassword);
        }
        match verified.download_token {
            Some(token) if !token.is_empty() => Ok(self.download_url(share_id, &token)),
            _ => {
                log::error!("Share {share_id} accepted the password but sent no download token");
                Err(ShareAccessError::MissingToken)
            }
        }
    }
}
