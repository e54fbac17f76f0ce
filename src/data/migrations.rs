use rusqlite::Connection;

use crate::error::AppError;

// Rows are keyed by file_path; uniqueness is upheld by the scanner checking
// presence before every insert, FTS5 tables cannot carry UNIQUE constraints.
const SCHEMA_V1: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS screenshots USING fts5(
    file_path,
    extracted_text,
    indexed_date
);
";

pub fn run_migrations(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch(SCHEMA_V1)?;
    Ok(())
}
