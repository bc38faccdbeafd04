pub mod chunk_upload;
pub mod feedback;
pub mod file_actions;
pub mod file_api;
pub mod file_management;
pub mod selection;
pub mod share_api;
