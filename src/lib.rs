// Library interface for comic_capture
// The binary and the integration tests both build on these modules

pub mod browser;
pub mod capture;
pub mod config;
pub mod document;
pub mod helpers;
pub mod models;
pub mod prompt;
