use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::data::repository;
use crate::error::AppError;
use crate::models::scan::{IndexStats, ScanProgressState};
use crate::scope_path;
use crate::services::ocr_service::TextRecognizer;
use crate::state::{AppState, ScanHandle};

/// The explicit root if given, otherwise the configured screenshots folder.
pub fn resolve_scan_root(state: &AppState, root: Option<&str>) -> Result<PathBuf, AppError> {
    let root = match root.map(str::trim).filter(|r| !r.is_empty()) {
        Some(root) => PathBuf::from(root),
        None => state.config().screenshots_root().ok_or_else(|| {
            AppError::Config("no screenshots folder configured".to_string())
        })?,
    };
    Ok(scope_path::absolute_root(&root))
}

pub fn start_indexing<F>(
    state: &AppState,
    root: Option<&str>,
    recognizer: Arc<dyn TextRecognizer>,
    on_progress: F,
) -> Result<ScanHandle, AppError>
where
    F: FnMut(usize, usize, &str) + Send + 'static,
{
    let root = resolve_scan_root(state, root)?;
    state.start_scan(root, recognizer, on_progress)
}

pub fn get_indexing_status(state: &AppState) -> ScanProgressState {
    state.scan_status()
}

pub fn get_index_stats(state: &AppState) -> Result<IndexStats, AppError> {
    let total_indexed = repository::count_screenshots(&state.db())?;
    Ok(IndexStats { total_indexed })
}

/// Drops index rows whose screenshot file no longer exists.
pub fn remove_missing_files(state: &AppState) -> Result<usize, AppError> {
    let removed = repository::delete_missing_files(&state.db())?;
    info!(removed, "removed index entries for missing files");
    Ok(removed)
}

pub fn check_ocr_available(recognizer: &dyn TextRecognizer) -> bool {
    recognizer.is_available()
}
