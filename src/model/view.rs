use chrono::NaiveDateTime;

use crate::model::api::FileInfo;
use crate::model::file_types::FileCategory;

/// shown instead of a byte count for folders
pub const FOLDER_SIZE_MARKER: &str = "Folder";

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// a listing entry prepared for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    /// empty if the api didn't send one
    pub id: String,
    pub name: String,
    pub category: FileCategory,
    pub size: String,
    pub modified: String,
    pub original: FileInfo,
}

impl FileItem {
    pub fn is_folder(&self) -> bool {
        self.category.is_folder()
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

impl From<&FileInfo> for FileItem {
    fn from(file: &FileInfo) -> Self {
        Self {
            id: file.id.clone(),
            name: file.name.clone(),
            category: FileCategory::classify(&file.name, file.mime_type.as_deref(), file.is_folder),
            size: format_size(file.size, file.is_folder),
            modified: format_date(file.update_time.as_ref()),
            original: file.clone(),
        }
    }
}

/// human-readable size with one decimal place, binary units
pub fn format_size(size: u64, is_folder: bool) -> String {
    if is_folder {
        return FOLDER_SIZE_MARKER.to_string();
    }
    let bytes = size as f64;
    if bytes < KIB {
        format!("{size} B")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes / KIB)
    } else if bytes < GIB {
        format!("{:.1} MB", bytes / MIB)
    } else {
        format!("{:.1} GB", bytes / GIB)
    }
}

/// `-` for a missing date
pub fn format_date(date: Option<&NaiveDateTime>) -> String {
    match date {
        Some(date) => date.format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}
