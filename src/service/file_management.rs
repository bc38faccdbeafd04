use std::sync::Arc;

use crate::model::api::FileInfo;
use crate::model::error::ApiError;
use crate::model::view::FileItem;
use crate::service::feedback::{report_api_error, Feedback};
use crate::service::file_api::FileApi;
use crate::util::{Observers, SubscriptionId};

/// one folder in the breadcrumb trail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingEvent {
    LoadingChanged(bool),
    ListingChanged,
    PathChanged,
    SearchChanged,
}

/// the folder the user is looking at: its contents, the breadcrumb trail that led to it, and the
/// search filter on top
pub struct FileManagement {
    api: FileApi,
    feedback: Arc<dyn Feedback>,
    files: Vec<FileInfo>,
    /// empty for the root
    current_parent_id: String,
    path_segments: Vec<PathSegment>,
    search_query: String,
    loading: bool,
    observers: Observers<ListingEvent>,
}

impl FileManagement {
    pub fn new(api: FileApi, feedback: Arc<dyn Feedback>) -> Self {
        Self {
            api,
            feedback,
            files: Vec::new(),
            current_parent_id: String::new(),
            path_segments: Vec::new(),
            search_query: String::new(),
            loading: false,
            observers: Observers::new(),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&ListingEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn files(&self) -> &[FileInfo] {
        &self.files
    }

    pub fn current_parent_id(&self) -> &str {
        &self.current_parent_id
    }

    pub fn path_segments(&self) -> &[PathSegment] {
        &self.path_segments
    }

    /// `/`-joined segment names, empty at the root
    pub fn current_path(&self) -> String {
        self.path_segments
            .iter()
            .map(|segment| segment.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.observers.notify(&ListingEvent::SearchChanged);
    }

    /// the whole listing, ready for display
    pub fn items(&self) -> Vec<FileItem> {
        self.files.iter().map(FileItem::from).collect()
    }

    /// the listing narrowed down by the search query (case-insensitive substring on the name).
    /// Row positions on screen line up with this list
    pub fn filtered_items(&self) -> Vec<FileItem> {
        let query = self.search_query.to_lowercase();
        self.files
            .iter()
            .filter(|file| query.is_empty() || file.name.to_lowercase().contains(&query))
            .map(FileItem::from)
            .collect()
    }

    /// loads the children of `parent_id`. On failure the previous listing stays, and the user is
    /// told
    pub async fn fetch_files(&mut self, parent_id: &str) -> Result<(), ApiError> {
        self.set_loading(true);
        let result = self.api.list_files(parent_id).await;
        self.set_loading(false);
        match result {
            Ok(files) => {
                self.files = files;
                self.observers.notify(&ListingEvent::ListingChanged);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to list folder {parent_id:?}: {e}");
                report_api_error(self.feedback.as_ref(), "Failed to load files", &e);
                Err(e)
            }
        }
    }

    /// reloads whatever folder is current
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let parent_id = self.current_parent_id.clone();
        self.fetch_files(&parent_id).await
    }

    pub async fn navigate_to_root(&mut self) -> Result<(), ApiError> {
        self.current_parent_id.clear();
        self.path_segments.clear();
        self.observers.notify(&ListingEvent::PathChanged);
        self.fetch_files("").await
    }

    /// jumps back to the breadcrumb at `index`, dropping everything after it. Out of range does
    /// nothing
    pub async fn navigate_to_path_segment(&mut self, index: usize) -> Result<(), ApiError> {
        let Some(segment) = self.path_segments.get(index) else {
            log::warn!(
                "Ignoring navigation to path segment {index}, only {} exist",
                self.path_segments.len()
            );
            return Ok(());
        };
        self.current_parent_id = segment.id.clone();
        self.path_segments.truncate(index + 1);
        self.observers.notify(&ListingEvent::PathChanged);
        self.refresh().await
    }

    /// one level up. From a top-level folder, or the root itself, that's the root
    pub async fn navigate_to_parent(&mut self) -> Result<(), ApiError> {
        match self.path_segments.len() {
            0 | 1 => self.navigate_to_root().await,
            len => self.navigate_to_path_segment(len - 2).await,
        }
    }

    /// descends into `item` if it's a folder with an id, otherwise does nothing
    pub async fn handle_folder_click(&mut self, item: &FileItem) -> Result<(), ApiError> {
        if !item.is_folder() || !item.has_id() {
            return Ok(());
        }
        self.path_segments.push(PathSegment {
            id: item.id.clone(),
            name: item.name.clone(),
        });
        self.current_parent_id = item.id.clone();
        self.observers.notify(&ListingEvent::PathChanged);
        self.refresh().await
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        self.observers.notify(&ListingEvent::LoadingChanged(loading));
    }
}
