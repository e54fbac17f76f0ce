use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::JoinHandle;

use rusqlite::Connection;
use tracing::error;

use crate::config::AppConfig;
use crate::data;
use crate::error::AppError;
use crate::models::scan::{ScanProgressState, ScanStats, ScanStatus};
use crate::services::ocr_service::TextRecognizer;
use crate::services::scan_service;

pub struct AppState {
    /// Reader connection for searches and status queries. The scan worker uses its own.
    pub db: Mutex<Connection>,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub config: RwLock<AppConfig>,
    scan_running: Arc<AtomicBool>,
    scan_status: Arc<Mutex<ScanProgressState>>,
}

/// A scan running on its worker thread. Only one exists per [`AppState`] at a time.
pub struct ScanHandle {
    stop_flag: Arc<AtomicBool>,
    worker: JoinHandle<Result<ScanStats, AppError>>,
}

impl ScanHandle {
    /// Asks the worker to stop before its next file.
    pub fn cancel(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    pub fn join(self) -> Result<ScanStats, AppError> {
        self.worker
            .join()
            .unwrap_or_else(|_| Err(AppError::General("scan worker panicked".to_string())))
    }
}

/// Frees the scan slot when the worker exits, including by panic.
struct ScanSlotGuard {
    running: Arc<AtomicBool>,
    status: Arc<Mutex<ScanProgressState>>,
}

impl Drop for ScanSlotGuard {
    fn drop(&mut self) {
        let mut status = lock_status(&self.status);
        status.status = ScanStatus::Done;
        drop(status);
        self.running.store(false, Ordering::Release);
    }
}

fn lock_status(status: &Mutex<ScanProgressState>) -> MutexGuard<'_, ScanProgressState> {
    status
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AppState {
    /// Opens the index (fatal on failure) and loads the config (never fatal).
    pub fn open(db_path: &Path, config_path: &Path) -> Result<Self, AppError> {
        let conn = data::open(db_path)?;
        Ok(Self {
            db: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
            config_path: config_path.to_path_buf(),
            config: RwLock::new(AppConfig::load(config_path)),
            scan_running: Arc::new(AtomicBool::new(false)),
            scan_status: Arc::new(Mutex::new(ScanProgressState::idle())),
        })
    }

    pub fn db(&self) -> MutexGuard<'_, Connection> {
        self.db
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> AppConfig {
        self.config
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Applies `update` to the config and persists it.
    pub fn update_config<F>(&self, update: F) -> Result<AppConfig, AppError>
    where
        F: FnOnce(&mut AppConfig) -> Result<(), AppError>,
    {
        let mut guard = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = guard.clone();
        update(&mut next)?;
        next.save(&self.config_path)?;
        *guard = next.clone();
        Ok(next)
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_running.load(Ordering::Acquire)
    }

    pub fn scan_status(&self) -> ScanProgressState {
        lock_status(&self.scan_status).clone()
    }

    /// Starts a scan of `root` on a background thread.
    ///
    /// Fails with [`AppError::ScanInProgress`] while another scan holds the slot. The
    /// `on_progress` callback runs on the worker thread.
    pub fn start_scan<F>(
        &self,
        root: PathBuf,
        recognizer: Arc<dyn TextRecognizer>,
        mut on_progress: F,
    ) -> Result<ScanHandle, AppError>
    where
        F: FnMut(usize, usize, &str) + Send + 'static,
    {
        if self
            .scan_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::ScanInProgress);
        }

        *lock_status(&self.scan_status) = ScanProgressState {
            current: 0,
            total: 0,
            file_name: String::new(),
            status: ScanStatus::Discovering,
        };

        let guard = ScanSlotGuard {
            running: self.scan_running.clone(),
            status: self.scan_status.clone(),
        };
        let status = self.scan_status.clone();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let worker_stop = stop_flag.clone();
        let db_path = self.db_path.clone();

        let spawned = std::thread::Builder::new()
            .name("screenshot-scan".to_string())
            .spawn(move || {
                let _guard = guard;
                let conn = data::open(&db_path).inspect_err(|e| {
                    error!(error = %e, "scan worker could not open the index");
                })?;

                scan_service::scan_and_index(
                    &conn,
                    recognizer.as_ref(),
                    &root,
                    Some(worker_stop.as_ref()),
                    |current, total, file_name| {
                        *lock_status(&status) = ScanProgressState {
                            current,
                            total,
                            file_name: file_name.to_string(),
                            status: ScanStatus::Active,
                        };
                        on_progress(current, total, file_name);
                    },
                )
            });

        match spawned {
            Ok(worker) => Ok(ScanHandle { stop_flag, worker }),
            // The closure (and the slot guard inside it) is dropped on spawn failure.
            Err(e) => Err(AppError::Io(e)),
        }
    }
}
