use serde::{Deserialize, Serialize};

/// Outcome counters for one scan pass.
///
/// `indexed + skipped + failed == total` unless the scan was cancelled, in which case the files
/// never reached are left out of all three counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl ScanStats {
    pub fn processed(&self) -> usize {
        self.indexed + self.skipped + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Idle,
    Discovering,
    Active,
    Done,
}

/// Last progress notification seen by the scan worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgressState {
    pub current: usize,
    pub total: usize,
    pub file_name: String,
    pub status: ScanStatus,
}

impl ScanProgressState {
    pub fn idle() -> Self {
        Self {
            current: 0,
            total: 0,
            file_name: String::new(),
            status: ScanStatus::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_indexed: usize,
}
