pub mod migrations;
pub mod repository;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::AppError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (creating if needed) the index database and brings the schema up to date.
///
/// Every thread that touches the index opens its own connection through here; WAL mode lets
/// the scan worker write while readers keep seeing the last committed rows.
pub fn open(db_path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    migrations::run_migrations(&conn)?;
    Ok(conn)
}
