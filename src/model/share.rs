use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::api::api_time;

/// a share as the owner sees it
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ShareInfo {
    pub id: u64,
    pub share_id: String,
    /// id of the shared file
    pub file_key: String,
    /// only ever present on the owner's view, and then only as a hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, with = "api_time", skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_download_count: Option<u64>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default, with = "api_time")]
    pub create_time: Option<NaiveDateTime>,
    #[serde(default, with = "api_time")]
    pub update_time: Option<NaiveDateTime>,
}

impl ShareInfo {
    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expire_at.is_some_and(|expiry| now > expiry)
    }

    pub fn is_download_limit_reached(&self) -> bool {
        self.max_download_count
            .is_some_and(|max| self.download_count >= max)
    }

    /// a share stops working once it expires or its download limit is used up
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        !self.is_expired(now) && !self.is_download_limit_reached()
    }
}

/// what anyone holding the link gets to see
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicShareInfo {
    pub share_id: String,
    pub file_name: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub has_password: bool,
    #[serde(default, with = "api_time", skip_serializing_if = "Option::is_none")]
    pub expire_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub is_expired: bool,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default, with = "api_time")]
    pub create_time: Option<NaiveDateTime>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateShareRequest {
    pub file_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_download_count: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct VerifyPasswordResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_token: Option<String>,
    /// seconds until the token stops working
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShareAction {
    View,
    Download,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ShareAccessLog {
    pub id: u64,
    pub share_id: String,
    pub action_type: ShareAction,
    #[serde(default)]
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, with = "api_time")]
    pub create_time: Option<NaiveDateTime>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PageResult<T> {
    pub total: u64,
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
}
