use std::sync::Arc;
use std::time::Duration;

use crate::model::geometry::{Point, Rect};
use crate::model::view::FileItem;
use crate::service::feedback::{Confirm, Feedback};
use crate::service::file_actions::{DeleteSummary, FileActions};
use crate::service::file_management::FileManagement;
use crate::util::{Observers, SubscriptionId};

/// how long batch downloads wait between files unless told otherwise
pub const DEFAULT_DOWNLOAD_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        meta: false,
        shift: false,
    };

    /// ctrl or cmd adds to the selection instead of replacing it
    pub fn is_additive(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// window coordinates
    pub position: Point,
    pub button: PointerButton,
    pub modifiers: Modifiers,
    /// whether the pointer went down on a file row rather than empty space
    pub on_row: bool,
}

/// where things are on screen, in window coordinates
pub trait RowLayout {
    /// the scrollable area the rows live in, `None` if it isn't rendered
    fn container(&self) -> Option<Rect>;
    /// one box per row, in the same order as [`FileManagement::filtered_items`]
    fn rows(&self) -> Vec<Rect>;
}

#[derive(Debug, Clone, PartialEq)]
enum DragState {
    Idle,
    Dragging {
        /// both relative to the container
        start: Point,
        current: Point,
        /// what was selected when an additive drag began. Hits are added on top of this
        base: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    Changed,
    DragStarted,
    DragEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// right clicks are left to the context menu
    Ignored,
    OpenedFolder,
    /// ctrl/cmd click flipped the file in or out of the selection
    Toggled,
    /// the file is already part of a selection, so the click shouldn't open it
    Suppressed,
    /// the file is now the only one selected and should be opened
    Activated,
}

/// multi-selection over the current listing: rubber-band dragging, modifier clicks, and the batch
/// actions that run over whatever is selected
pub struct Selection {
    feedback: Arc<dyn Feedback>,
    download_delay: Duration,
    /// in selection order
    selected: Vec<String>,
    drag: DragState,
    processing: bool,
    observers: Observers<SelectionEvent>,
}

impl Selection {
    pub fn new(feedback: Arc<dyn Feedback>, download_delay: Duration) -> Self {
        Self {
            feedback,
            download_delay,
            selected: Vec::new(),
            drag: DragState::Idle,
            processing: false,
            observers: Observers::new(),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&SelectionEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|selected| selected == id)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    /// true while a batch download or delete is running
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// the rubber band, relative to the container. `None` when not dragging
    pub fn selection_box(&self) -> Option<Rect> {
        match &self.drag {
            DragState::Dragging { start, current, .. } => {
                Some(Rect::from_corners(*start, *current))
            }
            DragState::Idle => None,
        }
    }

    /// the selected entries of `items`, in listing order. Ids that aren't in `items` are skipped
    pub fn selected_items(&self, items: &[FileItem]) -> Vec<FileItem> {
        items
            .iter()
            .filter(|item| item.has_id() && self.is_selected(&item.id))
            .cloned()
            .collect()
    }

    /// starts a drag on a primary press over empty space. Returns whether a drag started
    pub fn pointer_down(&mut self, event: &PointerEvent, layout: &dyn RowLayout) -> bool {
        if event.button != PointerButton::Primary || event.on_row {
            return false;
        }
        let Some(container) = layout.container() else {
            return false;
        };
        let additive = event.modifiers.is_additive();
        if !additive && !self.selected.is_empty() {
            self.selected.clear();
            self.observers.notify(&SelectionEvent::Changed);
        }
        let start = container.clamp_relative(Point::new(
            event.position.x - container.left,
            event.position.y - container.top,
        ));
        self.drag = DragState::Dragging {
            start,
            current: start,
            base: if additive {
                self.selected.clone()
            } else {
                Vec::new()
            },
        };
        self.observers.notify(&SelectionEvent::DragStarted);
        true
    }

    /// grows the rubber band to `position` and reselects. Folders and rows without an id are never
    /// picked up
    pub fn pointer_move(&mut self, position: Point, layout: &dyn RowLayout, items: &[FileItem]) {
        let Some(container) = layout.container() else {
            return;
        };
        let DragState::Dragging {
            start,
            current,
            base,
        } = &mut self.drag
        else {
            return;
        };
        *current = container.clamp_relative(Point::new(
            position.x - container.left,
            position.y - container.top,
        ));
        let band = Rect::from_corners(*start, *current);
        let origin = container.origin();
        let mut selected = base.clone();
        for (row, item) in layout.rows().iter().zip(items) {
            if item.is_folder() || !item.has_id() {
                continue;
            }
            if band.intersects(&row.relative_to(origin)) && !selected.contains(&item.id) {
                selected.push(item.id.clone());
            }
        }
        if selected != self.selected {
            self.selected = selected;
            self.observers.notify(&SelectionEvent::Changed);
        }
    }

    pub fn pointer_up(&mut self) {
        if self.is_dragging() {
            self.drag = DragState::Idle;
            self.observers.notify(&SelectionEvent::DragEnded);
        }
    }

    /// a click on a row. Folders open, ctrl/cmd toggles, and a plain click on an unselected file
    /// makes it the only selection
    pub async fn handle_row_click(
        &mut self,
        listing: &mut FileManagement,
        item: &FileItem,
        button: PointerButton,
        modifiers: Modifiers,
    ) -> ClickOutcome {
        if button == PointerButton::Secondary {
            return ClickOutcome::Ignored;
        }
        if item.is_folder() {
            // the listing reports its own failures
            listing.handle_folder_click(item).await.ok();
            return ClickOutcome::OpenedFolder;
        }
        if modifiers.is_additive() {
            if !item.has_id() {
                return ClickOutcome::Ignored;
            }
            if self.is_selected(&item.id) {
                self.selected.retain(|id| *id != item.id);
            } else {
                self.selected.push(item.id.clone());
            }
            self.observers.notify(&SelectionEvent::Changed);
            return ClickOutcome::Toggled;
        }
        if item.has_id() && self.is_selected(&item.id) {
            return ClickOutcome::Suppressed;
        }
        self.selected.clear();
        if item.has_id() {
            self.selected.push(item.id.clone());
        }
        self.observers.notify(&SelectionEvent::Changed);
        ClickOutcome::Activated
    }

    pub fn cancel_selection(&mut self) {
        self.drag = DragState::Idle;
        if !self.selected.is_empty() {
            self.selected.clear();
            self.observers.notify(&SelectionEvent::Changed);
        }
    }

    /// downloads every selected file from the current listing, pausing between each so the
    /// browser (or whatever opens the links) isn't flooded. Returns how many were started
    pub async fn batch_download(
        &mut self,
        listing: &FileManagement,
        actions: &FileActions,
    ) -> usize {
        if self.processing {
            return 0;
        }
        let files: Vec<FileItem> = self
            .selected_items(&listing.filtered_items())
            .into_iter()
            .filter(|item| !item.is_folder())
            .collect();
        if files.is_empty() {
            self.feedback.warning("No files selected for download");
            return 0;
        }
        self.processing = true;
        let mut started = 0;
        for file in &files {
            if actions.download_file(file) {
                started += 1;
                tokio::time::sleep(self.download_delay).await;
            }
        }
        self.processing = false;
        if started > 0 {
            self.feedback.success(&format!("Started {started} downloads"));
        }
        started
    }

    /// deletes the selected files after asking. Declining leaves the selection untouched.
    /// `None` means nothing was deleted
    pub async fn batch_delete(
        &mut self,
        listing: &mut FileManagement,
        actions: &mut FileActions,
        confirm: &dyn Confirm,
    ) -> Option<DeleteSummary> {
        if self.processing {
            return None;
        }
        let files = self.selected_items(&listing.filtered_items());
        if files.is_empty() {
            self.feedback.warning("No files selected for deletion");
            return None;
        }
        let prompt = format!("Delete {} selected files? This cannot be undone.", files.len());
        if !confirm.confirm(&prompt).await {
            return None;
        }
        self.processing = true;
        let summary = actions.delete_files(listing, &files).await;
        self.processing = false;
        self.selected.clear();
        self.observers.notify(&SelectionEvent::Changed);
        Some(summary)
    }
}
