use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// what a listing entry is presented as. Every entry resolves to exactly one of these
#[derive(Deserialize, Serialize, Debug, Eq, PartialEq, PartialOrd, Ord, Hash, Copy, Clone)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Folder,
    Image,
    Video,
    Audio,
    Pdf,
    Archive,
    Spreadsheet,
    Presentation,
    Code,
    Text,
    /// anything we couldn't classify
    File,
}

/// how a mime type is matched against a rule
enum MimeMatch {
    Prefix(&'static str),
    Contains(&'static str),
}

/// checked top to bottom, first match wins. Order matters: `text/csv` must land on
/// spreadsheet before the generic `text/` rule sees it
static MIME_RULES: &[(MimeMatch, FileCategory)] = &[
    (MimeMatch::Prefix("image/"), FileCategory::Image),
    (MimeMatch::Prefix("video/"), FileCategory::Video),
    (MimeMatch::Prefix("audio/"), FileCategory::Audio),
    (MimeMatch::Prefix("application/pdf"), FileCategory::Pdf),
    (MimeMatch::Contains("zip"), FileCategory::Archive),
    (MimeMatch::Contains("compressed"), FileCategory::Archive),
    (MimeMatch::Contains("archive"), FileCategory::Archive),
    (MimeMatch::Contains("x-tar"), FileCategory::Archive),
    (MimeMatch::Contains("x-rar"), FileCategory::Archive),
    (MimeMatch::Contains("excel"), FileCategory::Spreadsheet),
    (MimeMatch::Contains("spreadsheet"), FileCategory::Spreadsheet),
    (MimeMatch::Contains("csv"), FileCategory::Spreadsheet),
    (MimeMatch::Contains("powerpoint"), FileCategory::Presentation),
    (MimeMatch::Contains("presentation"), FileCategory::Presentation),
    (MimeMatch::Contains("javascript"), FileCategory::Code),
    (MimeMatch::Contains("json"), FileCategory::Code),
    (MimeMatch::Contains("html"), FileCategory::Code),
    (MimeMatch::Contains("css"), FileCategory::Code),
    (MimeMatch::Contains("xml"), FileCategory::Code),
    (MimeMatch::Prefix("text/"), FileCategory::Text),
];

static EXTENSIONS: Lazy<HashMap<&'static str, FileCategory>> = Lazy::new(|| {
    let groups: [(&[&str], FileCategory); 9] = [
        (
            &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg"],
            FileCategory::Image,
        ),
        (
            &["mp4", "webm", "avi", "mov", "wmv", "flv", "mkv"],
            FileCategory::Video,
        ),
        (
            &["mp3", "wav", "ogg", "flac", "aac", "m4a"],
            FileCategory::Audio,
        ),
        (&["pdf"], FileCategory::Pdf),
        (
            &["zip", "rar", "7z", "tar", "gz", "bz2"],
            FileCategory::Archive,
        ),
        (&["xls", "xlsx", "csv", "ods"], FileCategory::Spreadsheet),
        (&["ppt", "pptx", "odp"], FileCategory::Presentation),
        (
            &[
                "js", "ts", "html", "css", "xml", "json", "py", "java", "c", "cpp", "go", "php",
                "rb", "sh", "sql", "yaml", "yml", "rs",
            ],
            FileCategory::Code,
        ),
        (
            &[
                "txt", "md", "markdown", "text", "log", "rtf", "bat", "ps1", "toml", "ini",
                "conf", "config",
            ],
            FileCategory::Text,
        ),
    ];
    groups
        .iter()
        .flat_map(|(extensions, category)| extensions.iter().map(move |ext| (*ext, *category)))
        .collect()
});

impl FileCategory {
    /// classifies a listing entry. The mime type wins if there is one, otherwise the
    /// extension of `name` is used. Never fails, unknown things are [`FileCategory::File`]
    pub fn classify(name: &str, mime_type: Option<&str>, is_folder: bool) -> Self {
        if is_folder {
            return Self::Folder;
        }
        match mime_type.map(str::trim).filter(|m| !m.is_empty()) {
            Some(mime) => Self::from_mime(mime),
            None => Self::from_file_name(name),
        }
    }

    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        MIME_RULES
            .iter()
            .find(|(rule, _)| match rule {
                MimeMatch::Prefix(prefix) => mime.starts_with(prefix),
                MimeMatch::Contains(fragment) => mime.contains(fragment),
            })
            .map(|(_, category)| *category)
            .unwrap_or(Self::File)
    }

    pub fn from_file_name(name: &str) -> Self {
        let Some((_, extension)) = name.rsplit_once('.') else {
            return Self::File;
        };
        EXTENSIONS
            .get(extension.to_ascii_lowercase().as_str())
            .copied()
            .unwrap_or(Self::File)
    }

    pub fn is_folder(&self) -> bool {
        *self == Self::Folder
    }
}

impl From<&str> for FileCategory {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "folder" => Self::Folder,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "pdf" => Self::Pdf,
            "archive" => Self::Archive,
            "spreadsheet" => Self::Spreadsheet,
            "presentation" => Self::Presentation,
            "code" => Self::Code,
            "text" => Self::Text,
            "file" => Self::File,
            _ => {
                log::warn!("file category {value} does not match any branch of FileCategory");
                Self::File
            }
        }
    }
}

impl Display for FileCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Folder => "folder",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Pdf => "pdf",
            Self::Archive => "archive",
            Self::Spreadsheet => "spreadsheet",
            Self::Presentation => "presentation",
            Self::Code => "code",
            Self::Text => "text",
            Self::File => "file",
        };
        write!(f, "{name}")
    }
}

impl Default for FileCategory {
    fn default() -> Self {
        Self::File
    }
}

#[cfg(test)]
mod classify_tests {
    use crate::model::file_types::FileCategory;

    #[test]
    fn folders_are_always_folders() {
        assert_eq!(
            FileCategory::Folder,
            FileCategory::classify("photos.png", Some("image/png"), true)
        );
    }

    #[test]
    fn mime_type_takes_priority_over_extension() {
        assert_eq!(
            FileCategory::Video,
            FileCategory::classify("clip.txt", Some("video/mp4"), false)
        );
    }

    #[test]
    fn mime_rules() {
        let cases = [
            ("image/jpeg", FileCategory::Image),
            ("audio/mpeg", FileCategory::Audio),
            ("application/pdf", FileCategory::Pdf),
            ("application/x-7z-compressed", FileCategory::Archive),
            ("application/vnd.ms-excel", FileCategory::Spreadsheet),
            ("text/csv", FileCategory::Spreadsheet),
            (
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
                FileCategory::Presentation,
            ),
            ("application/json", FileCategory::Code),
            ("text/markdown", FileCategory::Text),
            ("application/octet-stream", FileCategory::File),
        ];
        for (mime, expected) in cases {
            assert_eq!(expected, FileCategory::from_mime(mime), "{mime}");
        }
    }

    #[test]
    fn falls_back_to_extension_when_mime_missing_or_blank() {
        assert_eq!(
            FileCategory::Archive,
            FileCategory::classify("backup.TAR", None, false)
        );
        assert_eq!(
            FileCategory::Code,
            FileCategory::classify("main.rs", Some("  "), false)
        );
        assert_eq!(
            FileCategory::Text,
            FileCategory::classify("notes.md", None, false)
        );
    }

    #[test]
    fn unknown_and_extensionless_names_are_generic_files() {
        assert_eq!(FileCategory::File, FileCategory::from_file_name("Makefile"));
        assert_eq!(FileCategory::File, FileCategory::from_file_name("data.bin"));
        assert_eq!(FileCategory::File, FileCategory::from_file_name("trailing."));
    }

    #[test]
    fn round_trips_through_names() {
        assert_eq!(FileCategory::Spreadsheet, FileCategory::from("SPREADSHEET"));
        assert_eq!("presentation", FileCategory::Presentation.to_string());
        assert_eq!(FileCategory::File, FileCategory::from("nonsense"));
    }
}
