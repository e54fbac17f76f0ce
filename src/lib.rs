//! OCR-backed full-text search over a folder of screenshots.
//!
//! A scan walks the screenshots tree, runs every image it has not seen before through OCR and
//! stores the text in an SQLite FTS5 index. Searches run against that index concurrently with
//! a scan and can be narrowed by date window and subfolder.

pub mod commands;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod scope_path;
pub mod services;
pub mod state;

pub use error::AppError;
pub use state::{AppState, ScanHandle};
