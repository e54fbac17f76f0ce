use chrono::{Duration, Local, NaiveDateTime};
use rusqlite::Connection;

use crate::data::repository;
use crate::error::AppError;
use crate::models::screenshot::{parse_indexed_date, ScreenshotHit};
use crate::models::search::{DateFilter, SearchOptions, SearchResult};
use crate::scope_path;
use crate::services::folder_service::ALL_FOLDERS_LABEL;

/// Candidates fetched per requested result, leaving room for date/folder filtering.
pub const OVERFETCH_FACTOR: usize = 10;

pub const MATCH_OPEN: &str = ">>>";
pub const MATCH_CLOSE: &str = "<<<";

fn derive_file_name(path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
}

/// Earliest `indexed_date` admitted by `filter`, relative to `now`.
pub fn date_threshold(filter: Option<DateFilter>, now: NaiveDateTime) -> Option<NaiveDateTime> {
    match filter? {
        DateFilter::Today => now.date().and_hms_opt(0, 0, 0),
        DateFilter::Week => Some(now - Duration::days(7)),
        DateFilter::Month => Some(now - Duration::days(30)),
        DateFilter::Year => Some(now - Duration::days(365)),
    }
}

/// Empty strings and the synthetic "All Folders" label mean no folder filter.
fn effective_folder_filter(folder_filter: Option<&str>) -> Option<String> {
    folder_filter
        .map(str::trim)
        .filter(|f| !f.is_empty() && *f != ALL_FOLDERS_LABEL)
        .map(scope_path::normalize)
}

/// Drops candidates outside the folder or date window and caps the list at `limit`.
///
/// Relevance order is kept. An `indexed_date` that does not parse keeps the candidate.
pub fn filter_hits(
    hits: Vec<ScreenshotHit>,
    threshold: Option<NaiveDateTime>,
    folder_filter: Option<&str>,
    limit: usize,
) -> Vec<SearchResult> {
    let folder = effective_folder_filter(folder_filter);
    let mut results = Vec::new();

    for hit in hits {
        if results.len() >= limit {
            break;
        }

        if let Some(folder) = &folder {
            if !scope_path::normalize_separators(&hit.file_path).contains(folder.as_str()) {
                continue;
            }
        }

        if let Some(threshold) = threshold {
            if let Some(indexed_at) = parse_indexed_date(&hit.indexed_date) {
                if indexed_at < threshold {
                    continue;
                }
            }
        }

        results.push(SearchResult {
            file_name: derive_file_name(&hit.file_path),
            file_path: hit.file_path,
            extracted_text: hit.extracted_text,
            snippet: hit.snippet,
            indexed_date: hit.indexed_date,
        });
    }

    results
}

pub fn search(
    conn: &Connection,
    query: &str,
    options: &SearchOptions,
) -> Result<Vec<SearchResult>, AppError> {
    search_at(conn, query, options, Local::now().naive_local())
}

/// [`search`] with an explicit clock, so date windows can be pinned.
pub fn search_at(
    conn: &Connection,
    query: &str,
    options: &SearchOptions,
    now: NaiveDateTime,
) -> Result<Vec<SearchResult>, AppError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(AppError::EmptyQuery);
    }
    if options.limit == 0 {
        return Ok(Vec::new());
    }

    let fetch_limit = options.limit.saturating_mul(OVERFETCH_FACTOR);
    let candidates = repository::search_screenshots(conn, trimmed, fetch_limit)?;
    let threshold = date_threshold(options.date_filter, now);

    Ok(filter_hits(
        candidates,
        threshold,
        options.folder_filter.as_deref(),
        options.limit,
    ))
}

/// The snippet with the match markers removed.
pub fn strip_markers(snippet: &str) -> String {
    snippet.replace(MATCH_OPEN, "").replace(MATCH_CLOSE, "")
}

/// Byte ranges of the highlighted spans in [`strip_markers`]'s output.
pub fn highlight_ranges(snippet: &str) -> Vec<std::ops::Range<usize>> {
    let mut ranges = Vec::new();
    let mut plain_len = 0;
    let mut rest = snippet;

    while let Some(open) = rest.find(MATCH_OPEN) {
        plain_len += open;
        let after_open = &rest[open + MATCH_OPEN.len()..];
        let Some(close) = after_open.find(MATCH_CLOSE) else {
            break;
        };
        ranges.push(plain_len..plain_len + close);
        plain_len += close;
        rest = &after_open[close + MATCH_CLOSE.len()..];
    }

    ranges
}
