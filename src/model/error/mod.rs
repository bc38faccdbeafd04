pub mod api_errors;
pub mod file_errors;
pub mod share_errors;

pub use api_errors::ApiError;
