//! Integration tests for the full pipeline.
//!
//! Tests the complete flow: discover → OCR → index → search, through the public API.

use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;

use image::{DynamicImage, Rgba, RgbaImage};
use screenshot_search_lib::commands::{indexing_commands, search_commands};
use screenshot_search_lib::data::repository;
use screenshot_search_lib::models::screenshot::format_indexed_date;
use screenshot_search_lib::services::ocr_service::TextRecognizer;
use screenshot_search_lib::{AppError, AppState};
use tempfile::tempdir;

/// Mock OCR keyed on image width, so each fixture "contains" different text.
struct WidthRecognizer {
    texts: HashMap<u32, &'static str>,
}

impl WidthRecognizer {
    fn new() -> Self {
        Self {
            texts: HashMap::from([
                (1, "invoice total"),
                (2, "meeting notes"),
                (3, "invoice draft"),
            ]),
        }
    }
}

impl TextRecognizer for WidthRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<String, AppError> {
        Ok(self.texts.get(&image.width()).copied().unwrap_or("").to_string())
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn write_image(path: &Path, width: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(width, 1, Rgba([255, 255, 255, 255]))
        .save(path)
        .unwrap();
}

fn open_state(dir: &Path) -> AppState {
    AppState::open(&dir.join("data/index.db"), &dir.join("config/config.json")).unwrap()
}

fn scan(state: &AppState, root: &Path) -> screenshot_search_lib::models::scan::ScanStats {
    indexing_commands::start_indexing(
        state,
        Some(&root.to_string_lossy()),
        Arc::new(WidthRecognizer::new()),
        |_, _, _| {},
    )
    .unwrap()
    .join()
    .unwrap()
}

#[test]
fn test_scan_then_search_with_filters() {
    let temp = tempdir().unwrap();
    let shots = temp.path().join("shots");
    write_image(&shots.join("2024/03/a.png"), 1);
    write_image(&shots.join("2024/03/b.png"), 2);
    write_image(&shots.join("2023/12/c.png"), 3);
    write_image(&shots.join("2023/12/blank.png"), 9);

    let state = open_state(temp.path());
    let stats = scan(&state, &shots);
    assert_eq!(stats.total, 4);
    assert_eq!(stats.indexed, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.indexed + stats.skipped + stats.failed, stats.total);

    let all = search_commands::search(&state, "invoice", None, None, None).unwrap();
    assert_eq!(all.len(), 2);

    let march = search_commands::search(&state, "invoice", None, None, Some("2024/03")).unwrap();
    assert_eq!(march.len(), 1);
    assert_eq!(march[0].file_name, "a.png");
    assert!(march[0].snippet.contains(">>>invoice<<<"));

    let today = search_commands::search(&state, "invoice", None, Some("today"), None).unwrap();
    assert_eq!(today.len(), 2);

    let folders = search_commands::list_folders(&state);
    assert_eq!(folders, vec!["All Folders"]); // no folder configured yet
}

#[test]
fn test_rescan_is_idempotent() {
    let temp = tempdir().unwrap();
    let shots = temp.path().join("shots");
    write_image(&shots.join("a.png"), 1);
    write_image(&shots.join("blank.png"), 7);

    let state = open_state(temp.path());
    scan(&state, &shots);
    let before = indexing_commands::get_index_stats(&state).unwrap().total_indexed;

    let second = scan(&state, &shots);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.indexed, 0);
    assert_eq!(second.failed, 0);
    assert_eq!(
        indexing_commands::get_index_stats(&state).unwrap().total_indexed,
        before
    );
}

#[test]
fn test_old_entries_drop_out_of_month_window() {
    let temp = tempdir().unwrap();
    let state = open_state(temp.path());
    let now = chrono::Local::now().naive_local();

    {
        let conn = state.db();
        let fresh = format_indexed_date(now);
        let old = format_indexed_date(now - chrono::Duration::days(40));
        repository::insert_screenshot_at(&conn, "/shots/2024/03/a.png", "invoice total", &fresh)
            .unwrap();
        repository::insert_screenshot_at(&conn, "/shots/2024/03/b.png", "invoice old", &old)
            .unwrap();
        repository::insert_screenshot_at(&conn, "/shots/2024/03/c.png", "invoice draft", &fresh)
            .unwrap();
    }

    let results = search_commands::search(&state, "invoice", None, Some("month"), None).unwrap();
    let mut names: Vec<&str> = results.iter().map(|r| r.file_name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["a.png", "c.png"]);

    let year = search_commands::search(&state, "invoice", None, Some("year"), None).unwrap();
    assert_eq!(year.len(), 3);
}

#[test]
fn test_gc_after_file_deleted() {
    let temp = tempdir().unwrap();
    let shots = temp.path().join("shots");
    write_image(&shots.join("a.png"), 1);
    write_image(&shots.join("b.png"), 2);

    let state = open_state(temp.path());
    scan(&state, &shots);
    std::fs::remove_file(shots.join("b.png")).unwrap();

    // Stale rows are still searchable until collected.
    assert_eq!(
        search_commands::search(&state, "meeting", None, None, None)
            .unwrap()
            .len(),
        1
    );

    assert_eq!(indexing_commands::remove_missing_files(&state).unwrap(), 1);
    assert_eq!(
        indexing_commands::get_index_stats(&state).unwrap().total_indexed,
        1
    );
    assert!(search_commands::search(&state, "meeting", None, None, None)
        .unwrap()
        .is_empty());
}

#[test]
fn test_search_does_not_block_on_running_scan() {
    let temp = tempdir().unwrap();
    let shots = temp.path().join("shots");
    write_image(&shots.join("a.png"), 1);
    write_image(&shots.join("b.png"), 3);

    let state = open_state(temp.path());
    let (reached_tx, reached_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let handle = indexing_commands::start_indexing(
        &state,
        Some(&shots.to_string_lossy()),
        Arc::new(WidthRecognizer::new()),
        move |current, _, _| {
            if current == 2 {
                let _ = reached_tx.send(());
                let _ = release_rx.recv();
            }
        },
    )
    .unwrap();

    // The worker is parked before its second file: one row committed, one pending.
    reached_rx.recv().unwrap();
    assert!(state.is_scanning());
    let mid_scan = search_commands::search(&state, "invoice", None, None, None).unwrap();
    assert_eq!(mid_scan.len(), 1);

    release_tx.send(()).unwrap();
    let stats = handle.join().unwrap();
    assert_eq!(stats.indexed, 2);

    let after = search_commands::search(&state, "invoice", None, None, None).unwrap();
    assert_eq!(after.len(), 2);
}
