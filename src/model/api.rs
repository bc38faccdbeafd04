use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// the `code` the api sends back when a call succeeded
pub const SUCCESS_CODE: i64 = 1;

/// every api response is wrapped in one of these. Only `data` is interesting to callers when
/// `code` is [`SUCCESS_CODE`], otherwise `msg` explains what went wrong
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// a file or folder as the api reports it
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// the api sends numeric ids, but string ids are accepted too. Always normalized to a string
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_folder: bool,
    /// meaningless for folders
    #[serde(default)]
    pub size: u64,
    #[serde(
        rename = "mime_type",
        alias = "mimeType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub user_id: u64,
    /// `None` means the file lives in the root directory
    #[serde(
        default,
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<String>,
    #[serde(rename = "createTime", default, with = "api_time")]
    pub create_time: Option<NaiveDateTime>,
    #[serde(rename = "updateTime", default, with = "api_time")]
    pub update_time: Option<NaiveDateTime>,
    #[serde(
        rename = "deletedAt",
        default,
        with = "api_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub deleted_at: Option<NaiveDateTime>,
}

impl FileInfo {
    #[cfg(test)]
    pub fn new(id: &str, name: &str, is_folder: bool) -> FileInfo {
        FileInfo {
            id: id.to_string(),
            name: name.to_string(),
            is_folder,
            size: 0,
            mime_type: None,
            user_id: 1,
            parent_id: None,
            create_time: None,
            update_time: None,
            deleted_at: None,
        }
    }

    pub fn is_root_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

fn id_from_value(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(id_from_value(value).unwrap_or_default())
}

pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(id_from_value(value))
}

/// (de)serializes timestamps the way the api writes them (`2006-01-02 15:04:05`).
/// RFC 3339 is also accepted since soft-delete timestamps come through in that format.
/// Anything unparseable becomes `None` instead of failing the whole response
pub(crate) mod api_time {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        if raw.is_empty() {
            return None;
        }
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, FORMAT) {
            return Some(parsed);
        }
        match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Some(parsed.naive_local()),
            Err(_) => {
                log::warn!("Could not parse timestamp {raw} from the api, ignoring it");
                None
            }
        }
    }

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => serializer.serialize_str(&time.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }
}
