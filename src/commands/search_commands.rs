use crate::data::repository;
use crate::error::AppError;
use crate::models::screenshot::IndexState;
use crate::models::search::{DateFilter, SearchOptions, SearchResult, DEFAULT_SEARCH_LIMIT};
use crate::services::folder_service::{self, NestedDirLabeler};
use crate::services::search_service;
use crate::state::AppState;

pub fn search(
    state: &AppState,
    query: &str,
    limit: Option<usize>,
    date_filter: Option<&str>,
    folder_filter: Option<&str>,
) -> Result<Vec<SearchResult>, AppError> {
    let date_filter = match date_filter {
        Some(raw) => DateFilter::parse_optional(raw).map_err(AppError::General)?,
        None => None,
    };
    let options = SearchOptions {
        limit: limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        date_filter,
        folder_filter: folder_filter.map(str::to_string),
    };

    let conn = state.db();
    search_service::search(&conn, query, &options)
}

pub fn get_screenshot_text(state: &AppState, file_path: &str) -> Result<String, AppError> {
    repository::get_screenshot_text(&state.db(), file_path)
}

pub fn get_index_state(state: &AppState, file_path: &str) -> Result<IndexState, AppError> {
    repository::lookup_state(&state.db(), file_path)
}

pub fn list_folders(state: &AppState) -> Vec<String> {
    let root = state.config().screenshots_root();
    folder_service::list_folders(root.as_deref(), &NestedDirLabeler::default())
}
