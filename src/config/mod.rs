use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use log::LevelFilter;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::model::chunk::DEFAULT_CHUNK_SIZE;
use crate::service::selection::DEFAULT_DOWNLOAD_DELAY;

pub static CONFIG_FILE: &str = "./FileClient.toml";
/// `FILE_CLIENT_SERVER__URL` overrides `server.url`, and so on
pub static ENV_PREFIX: &str = "FILE_CLIENT";

/// where the api lives and how long to wait for it
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
    /// humantime format, e.g. `30s`
    pub timeout: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    #[serde(rename = "chunksize")]
    pub chunk_size: u64,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    /// pause between files in a batch download, humantime format
    #[serde(rename = "downloaddelay")]
    pub download_delay: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

/// config properties for the whole client
#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct FileClientConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub upload: UploadConfig,
    pub selection: SelectionConfig,
    pub log: LogConfig,
}

static CONFIG_DEFAULT: Lazy<FileClientConfig> = Lazy::new(|| FileClientConfig {
    server: ServerConfig {
        url: "http://localhost:8080/api".to_string(),
        timeout: "30s".to_string(),
    },
    auth: AuthConfig { token: None },
    upload: UploadConfig {
        chunk_size: DEFAULT_CHUNK_SIZE,
    },
    selection: SelectionConfig {
        download_delay: humantime::format_duration(DEFAULT_DOWNLOAD_DELAY).to_string(),
    },
    log: LogConfig {
        level: "info".to_string(),
    },
});

impl Default for ServerConfig {
    fn default() -> Self {
        CONFIG_DEFAULT.server.clone()
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        CONFIG_DEFAULT.upload.clone()
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        CONFIG_DEFAULT.selection.clone()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        CONFIG_DEFAULT.log.clone()
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        parse_duration_or(&self.timeout, Duration::from_secs(30), "server.timeout")
    }
}

impl SelectionConfig {
    pub fn download_delay(&self) -> Duration {
        parse_duration_or(
            &self.download_delay,
            DEFAULT_DOWNLOAD_DELAY,
            "selection.downloaddelay",
        )
    }
}

impl LogConfig {
    /// unknown levels fall back to info
    pub fn level_filter(&self) -> LevelFilter {
        self.level.parse().unwrap_or_else(|_| {
            log::warn!("Unknown log level {}, using info", self.level);
            LevelFilter::Info
        })
    }
}

fn parse_duration_or(raw: &str, fallback: Duration, key: &str) -> Duration {
    humantime::parse_duration(raw.trim()).unwrap_or_else(|e| {
        log::warn!("Invalid duration {raw:?} for {key} ({e}), using {fallback:?}");
        fallback
    })
}

/// Parses the config file at `path` if it exists, with `FILE_CLIENT_*` environment variables
/// layered on top. A missing file is fine, anything else wrong with it is an error
pub fn parse_config(path: &str) -> Result<FileClientConfig, ConfigError> {
    let mut builder = Config::builder();
    if Path::new(path).exists() {
        builder = builder.add_source(config::File::from(Path::new(path)));
    } else {
        log::warn!("No config file found at {path}. Continuing with defaults...");
    }
    let settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| {
            log::error!("Failed to parse config file. Exception is {e}");
            e
        })?;
    settings.try_deserialize()
}
