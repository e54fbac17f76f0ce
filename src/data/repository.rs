use std::collections::HashSet;
use std::path::Path;

use rusqlite::{params, Connection, Transaction, TransactionBehavior};

use crate::error::AppError;
use crate::models::screenshot::{now_indexed_date, IndexState, ScreenshotHit};

const SNIPPET_OPEN: &str = ">>>";
const SNIPPET_CLOSE: &str = "<<<";
const SNIPPET_ELLIPSIS: &str = "...";
const SNIPPET_TOKENS: i64 = 30;

pub fn lookup_state(conn: &Connection, file_path: &str) -> Result<IndexState, AppError> {
    let mut stmt = conn.prepare(
        "SELECT extracted_text, indexed_date FROM screenshots WHERE file_path = ?1 LIMIT 1",
    )?;

    let state = stmt
        .query_row(params![file_path], |row| {
            Ok(IndexState::Indexed {
                text: row.get(0)?,
                indexed_date: row.get(1)?,
            })
        })
        .optional()?;

    Ok(state.unwrap_or(IndexState::Unseen))
}

pub fn is_indexed(conn: &Connection, file_path: &str) -> Result<bool, AppError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM screenshots WHERE file_path = ?1 LIMIT 1",
            params![file_path],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Every indexed path, for checking a whole scan pass against one read.
pub fn indexed_paths(conn: &Connection) -> Result<HashSet<String>, AppError> {
    let mut stmt = conn.prepare("SELECT file_path FROM screenshots")?;
    let paths = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(paths)
}

/// Adds a row stamped with the current local time.
///
/// Callers must check [`is_indexed`] first; the table does not deduplicate paths.
pub fn insert_screenshot(conn: &Connection, file_path: &str, text: &str) -> Result<(), AppError> {
    insert_screenshot_at(conn, file_path, text, &now_indexed_date())
}

pub fn insert_screenshot_at(
    conn: &Connection,
    file_path: &str,
    text: &str,
    indexed_date: &str,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO screenshots (file_path, extracted_text, indexed_date) VALUES (?1, ?2, ?3)",
        params![file_path, text, indexed_date],
    )?;
    Ok(())
}

/// Full-text match ordered by bm25 rank, best first, at most `fetch_limit` rows.
///
/// The query uses FTS5 syntax (terms, `"phrases"`, `OR`, prefix `*`). If the engine rejects it
/// as malformed, it is retried once with every whitespace-separated token quoted literally.
pub fn search_screenshots(
    conn: &Connection,
    query: &str,
    fetch_limit: usize,
) -> Result<Vec<ScreenshotHit>, AppError> {
    match run_match(conn, query, fetch_limit) {
        Err(err) if is_query_syntax_error(&err) => {
            let literal = quote_terms(query);
            run_match(conn, &literal, fetch_limit).map_err(|retry_err| {
                if is_query_syntax_error(&retry_err) {
                    AppError::InvalidQuery(err.to_string())
                } else {
                    AppError::Database(retry_err)
                }
            })
        }
        other => other.map_err(AppError::from),
    }
}

fn run_match(
    conn: &Connection,
    query: &str,
    fetch_limit: usize,
) -> Result<Vec<ScreenshotHit>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT file_path, extracted_text,
                snippet(screenshots, 1, ?3, ?4, ?5, ?6),
                indexed_date
         FROM screenshots
         WHERE screenshots MATCH ?1
         ORDER BY rank
         LIMIT ?2",
    )?;

    let limit = i64::try_from(fetch_limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(
        params![
            query,
            limit,
            SNIPPET_OPEN,
            SNIPPET_CLOSE,
            SNIPPET_ELLIPSIS,
            SNIPPET_TOKENS
        ],
        |row| {
            Ok(ScreenshotHit {
                file_path: row.get(0)?,
                extracted_text: row.get(1)?,
                snippet: row.get(2)?,
                indexed_date: row.get(3)?,
            })
        },
    )?;

    let hits = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(hits)
}

fn is_query_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => {
            msg.starts_with("fts5:")
                || msg.starts_with("no such column")
                || msg.contains("unterminated string")
        }
        _ => false,
    }
}

fn quote_terms(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn count_screenshots(conn: &Connection) -> Result<usize, AppError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM screenshots", [], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Stored OCR text for `file_path`, or an empty string when the path is not indexed.
pub fn get_screenshot_text(conn: &Connection, file_path: &str) -> Result<String, AppError> {
    let text = conn
        .query_row(
            "SELECT extracted_text FROM screenshots WHERE file_path = ?1 LIMIT 1",
            params![file_path],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(text.unwrap_or_default())
}

/// Removes every row whose file is gone from disk. Returns the number of rows removed.
///
/// Existence is checked outside the write transaction, which is taken `IMMEDIATE` so a
/// concurrent scan commit waits on the busy timeout instead of failing the snapshot upgrade.
pub fn delete_missing_files(conn: &Connection) -> Result<usize, AppError> {
    let missing: Vec<(i64, String)> = {
        let mut stmt = conn.prepare("SELECT rowid, file_path FROM screenshots")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        let mut missing = Vec::new();
        for row in rows {
            let (rowid, file_path) = row?;
            if !Path::new(&file_path).exists() {
                missing.push((rowid, file_path));
            }
        }
        missing
    };

    if missing.is_empty() {
        return Ok(0);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let mut removed = 0;
    for (rowid, file_path) in &missing {
        removed += tx.execute(
            "DELETE FROM screenshots WHERE rowid = ?1 AND file_path = ?2",
            params![rowid, file_path],
        )?;
    }
    tx.commit()?;

    Ok(removed)
}

// Needed for rusqlite optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
