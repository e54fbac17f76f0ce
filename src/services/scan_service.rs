use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::data::repository;
use crate::error::AppError;
use crate::models::scan::ScanStats;
use crate::services::ocr_service::{self, TextRecognizer};

/// Filesystems that fold case by default. On these, `a.PNG` and `a.png` name the same file.
pub const CASE_INSENSITIVE_FS: bool = cfg!(any(windows, target_os = "macos"));

/// All image files under `root`, newest modification first.
///
/// Symlinked files count; symlinked directories are not descended into. Paths that are not
/// valid UTF-8 are skipped with a warning, since the index stores paths as text.
/// A missing or non-directory root yields an empty list.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    if !root.is_dir() {
        warn!(root = %root.display(), "scan root is not a directory");
        return Vec::new();
    }

    let candidates: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file() && ocr_service::is_ocr_candidate(e.path()))
        .map(|e| e.into_path())
        .filter(|path| {
            if path.to_str().is_none() {
                warn!(path = %path.display(), "skipping image with non UTF-8 path");
                return false;
            }
            true
        })
        .collect();

    sort_newest_first(dedupe_paths(candidates, CASE_INSENSITIVE_FS))
}

/// Keeps the first occurrence of each path. With `case_insensitive`, paths equal up to case
/// count as the same file.
pub fn dedupe_paths(paths: Vec<PathBuf>, case_insensitive: bool) -> Vec<PathBuf> {
    let mut seen: HashSet<OsString> = HashSet::new();
    paths
        .into_iter()
        .filter(|path| {
            let key = match path.to_str() {
                Some(text) if case_insensitive => OsString::from(text.to_lowercase()),
                _ => path.as_os_str().to_os_string(),
            };
            seen.insert(key)
        })
        .collect()
}

fn sort_newest_first(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut keyed: Vec<(SystemTime, PathBuf)> = paths
        .into_iter()
        .map(|path| {
            let modified = path
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();

    keyed.sort_by(|(a_time, a_path), (b_time, b_path)| {
        b_time.cmp(a_time).then_with(|| a_path.cmp(b_path))
    });
    keyed.into_iter().map(|(_, path)| path).collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// OCRs and indexes every image under `root` that is not in the index yet.
///
/// `on_progress(current, total, file_name)` fires once per discovered file, 1-based, before the
/// file is looked at. A file whose OCR yields nothing is stored with empty text so it is never
/// retried. Setting `stop_flag` stops the pass between files; rows already written stay.
///
/// The set of indexed paths is read once up front, so an unreadable index fails the whole pass.
pub fn scan_and_index<F>(
    conn: &Connection,
    recognizer: &dyn TextRecognizer,
    root: &Path,
    stop_flag: Option<&AtomicBool>,
    mut on_progress: F,
) -> Result<ScanStats, AppError>
where
    F: FnMut(usize, usize, &str),
{
    let images = discover(root);
    let total = images.len();
    let mut indexed_paths = repository::indexed_paths(conn)?;
    let mut stats = ScanStats {
        total,
        ..ScanStats::default()
    };

    info!(root = %root.display(), total, "scan started");

    for (i, image_path) in images.iter().enumerate() {
        if stop_flag.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            stats.cancelled = true;
            break;
        }

        on_progress(i + 1, total, &display_name(image_path));

        let Some(file_path) = image_path.to_str() else {
            stats.failed += 1;
            continue;
        };
        if indexed_paths.contains(file_path) {
            stats.skipped += 1;
            continue;
        }

        let text = ocr_service::extract_text(recognizer, image_path);

        if let Err(err) = repository::insert_screenshot(conn, file_path, &text) {
            warn!(path = %file_path, error = %err, "failed to store OCR result");
            stats.failed += 1;
            continue;
        }
        indexed_paths.insert(file_path.to_string());

        if text.is_empty() {
            debug!(path = %file_path, "no text recognized");
            stats.failed += 1;
        } else {
            stats.indexed += 1;
        }
    }

    info!(
        indexed = stats.indexed,
        skipped = stats.skipped,
        failed = stats.failed,
        cancelled = stats.cancelled,
        "scan finished"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::migrations;
    use crate::services::ocr_service::tests::FakeRecognizer;
    use image::{Rgb, RgbImage};
    use std::fs;
    use std::time::Duration;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run_migrations(&conn).unwrap();
        conn
    }

    fn write_png(path: &Path) {
        RgbImage::from_pixel(3, 3, Rgb([200, 200, 200]))
            .save(path)
            .unwrap();
    }

    fn set_mtime(path: &Path, secs_after_epoch: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs_after_epoch))
            .unwrap();
    }

    #[test]
    fn test_discover_filters_extensions_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("2024/03")).unwrap();
        fs::write(dir.path().join("a.png"), b"x").unwrap();
        fs::write(dir.path().join("2024/b.JPG"), b"x").unwrap();
        fs::write(dir.path().join("2024/03/c.webp"), b"x").unwrap();
        fs::write(dir.path().join("2024/03/notes.txt"), b"x").unwrap();
        fs::create_dir_all(dir.path().join("folder.png")).unwrap();

        let found = discover(dir.path());
        let mut names: Vec<String> = found.iter().map(|p| display_name(p)).collect();
        names.sort();
        assert_eq!(names, vec!["a.png", "b.JPG", "c.webp"]);
    }

    #[test]
    fn test_discover_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for (name, mtime) in [("old.png", 1_000), ("new.png", 3_000), ("mid.png", 2_000)] {
            let path = dir.path().join(name);
            fs::write(&path, b"x").unwrap();
            set_mtime(&path, mtime);
        }

        let names: Vec<String> = discover(dir.path()).iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["new.png", "mid.png", "old.png"]);
    }

    #[test]
    fn test_discover_missing_root_is_empty() {
        assert!(discover(Path::new("/no/such/screenshots/root")).is_empty());
    }

    #[test]
    fn test_dedupe_case_insensitive_keeps_one() {
        let paths = vec![
            PathBuf::from("/shots/a.PNG"),
            PathBuf::from("/shots/a.png"),
            PathBuf::from("/shots/b.png"),
        ];

        let folded = dedupe_paths(paths.clone(), true);
        assert_eq!(
            folded,
            vec![PathBuf::from("/shots/a.PNG"), PathBuf::from("/shots/b.png")]
        );

        let exact = dedupe_paths(paths, false);
        assert_eq!(exact.len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_includes_symlinked_images() {
        let dir = tempfile::tempdir().unwrap();
        let shots = dir.path().join("shots");
        fs::create_dir_all(&shots).unwrap();
        fs::write(shots.join("plain.png"), b"x").unwrap();
        fs::write(dir.path().join("real.png"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.png"), shots.join("link.png")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.png"), shots.join("dangling.png"))
            .unwrap();

        let mut names: Vec<String> = discover(&shots).iter().map(|p| display_name(p)).collect();
        names.sort();
        assert_eq!(names, vec!["link.png", "plain.png"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_dedupe_keeps_distinct_non_utf8_paths() {
        use std::os::unix::ffi::OsStrExt;

        let a = PathBuf::from(std::ffi::OsStr::from_bytes(b"/shots/a\xff.png"));
        let b = PathBuf::from(std::ffi::OsStr::from_bytes(b"/shots/a\xfe.png"));

        assert_eq!(dedupe_paths(vec![a.clone(), b.clone()], false).len(), 2);
        assert_eq!(dedupe_paths(vec![a.clone(), b, a], true).len(), 2);
    }

    // Linux filesystems accept arbitrary bytes in names; APFS does not.
    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_left_out_of_the_index() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("ok.png"));
        write_png(&dir.path().join(std::ffi::OsStr::from_bytes(b"a\xff.png")));
        write_png(&dir.path().join(std::ffi::OsStr::from_bytes(b"a\xfe.png")));

        let found = discover(dir.path());
        assert_eq!(found, vec![dir.path().join("ok.png")]);

        let conn = test_conn();
        let recognizer = FakeRecognizer::replying("text");
        let stats = scan_and_index(&conn, &recognizer, dir.path(), None, |_, _, _| {}).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.indexed, 1);
        assert_eq!(repository::delete_missing_files(&conn).unwrap(), 0);

        let again = scan_and_index(&conn, &recognizer, dir.path(), None, |_, _, _| {}).unwrap();
        assert_eq!(again.skipped, 1);
    }

    #[test]
    fn test_scan_counts_and_progress() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("good.png"));
        fs::write(dir.path().join("corrupt.png"), b"not an image").unwrap();

        let conn = test_conn();
        let recognizer = FakeRecognizer::replying("invoice total");
        let mut progress = Vec::new();

        let stats = scan_and_index(&conn, &recognizer, dir.path(), None, |cur, total, name| {
            progress.push((cur, total, name.to_string()))
        })
        .unwrap();

        assert_eq!(stats.total, 2);
        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.processed(), stats.total);
        assert!(!stats.cancelled);

        assert_eq!(progress.len(), 2);
        assert_eq!(progress[0].0, 1);
        assert_eq!(progress[1].0, 2);
        assert!(progress.iter().all(|(_, total, _)| *total == 2));

        let corrupt = dir.path().join("corrupt.png").to_string_lossy().to_string();
        assert!(repository::is_indexed(&conn, &corrupt).unwrap());
        assert_eq!(repository::get_screenshot_text(&conn, &corrupt).unwrap(), "");
    }

    #[test]
    fn test_rescan_skips_everything_already_seen() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("one.png"));
        fs::write(dir.path().join("blank.png"), b"garbage").unwrap();

        let conn = test_conn();
        let recognizer = FakeRecognizer::replying("meeting notes");

        scan_and_index(&conn, &recognizer, dir.path(), None, |_, _, _| {}).unwrap();
        let calls_after_first = recognizer.seen.lock().unwrap().len();

        let mut progress_calls = 0;
        let second = scan_and_index(&conn, &recognizer, dir.path(), None, |_, _, _| {
            progress_calls += 1
        })
        .unwrap();

        assert_eq!(second.skipped, 2);
        assert_eq!(second.indexed + second.failed, 0);
        assert_eq!(progress_calls, 2);
        assert_eq!(recognizer.seen.lock().unwrap().len(), calls_after_first);
        assert_eq!(repository::count_screenshots(&conn).unwrap(), 2);
    }

    #[test]
    fn test_rescan_picks_up_new_files_only() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("first.png"));

        let conn = test_conn();
        let recognizer = FakeRecognizer::replying("hello");
        scan_and_index(&conn, &recognizer, dir.path(), None, |_, _, _| {}).unwrap();

        write_png(&dir.path().join("second.png"));
        let stats = scan_and_index(&conn, &recognizer, dir.path(), None, |_, _, _| {}).unwrap();

        assert_eq!(stats.total, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.indexed, 1);
        assert_eq!(repository::count_screenshots(&conn).unwrap(), 2);
    }

    #[test]
    fn test_stop_flag_halts_before_next_file() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"));
        write_png(&dir.path().join("b.png"));

        let conn = test_conn();
        let recognizer = FakeRecognizer::replying("text");
        let stop = AtomicBool::new(true);

        let stats = scan_and_index(&conn, &recognizer, dir.path(), Some(&stop), |_, _, _| {}).unwrap();

        assert!(stats.cancelled);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.processed(), 0);
        assert_eq!(repository::count_screenshots(&conn).unwrap(), 0);
    }
}
