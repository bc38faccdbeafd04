pub mod api;
pub mod chunk;
pub mod error;
pub mod file_types;
pub mod geometry;
pub mod share;
pub mod upload;
pub mod view;
