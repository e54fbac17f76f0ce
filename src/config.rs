//! Persisted user configuration.
//!
//! Stored as pretty JSON next to the other per-user config files. A missing or unreadable file
//! is never an error: defaults are used and the problem is logged.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;

const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "screenshots.db";

pub const KEY_SCREENSHOTS_FOLDER: &str = "screenshots_folder";
pub const KEY_TESSERACT_CMD: &str = "tesseract_cmd";
pub const KEY_OCR_TIMEOUT_SECS: &str = "ocr_timeout_secs";
pub const KEY_OCR_LANGUAGE: &str = "ocr_language";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the screenshots tree; empty until the user picks one.
    pub screenshots_folder: String,
    pub tesseract_cmd: String,
    pub ocr_timeout_secs: u64,
    /// Tesseract language pack(s), e.g. `eng` or `eng+deu`.
    pub ocr_language: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            screenshots_folder: String::new(),
            tesseract_cmd: "tesseract".to_string(),
            ocr_timeout_secs: 60,
            ocr_language: "eng".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `path`, merging whatever keys it has over the defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                return Self::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "config is not valid JSON, using defaults");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<String, AppError> {
        match key {
            KEY_SCREENSHOTS_FOLDER => Ok(self.screenshots_folder.clone()),
            KEY_TESSERACT_CMD => Ok(self.tesseract_cmd.clone()),
            KEY_OCR_TIMEOUT_SECS => Ok(self.ocr_timeout_secs.to_string()),
            KEY_OCR_LANGUAGE => Ok(self.ocr_language.clone()),
            _ => Err(AppError::Config(format!("unknown setting: {key}"))),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), AppError> {
        match key {
            KEY_SCREENSHOTS_FOLDER => self.screenshots_folder = value.trim().to_string(),
            KEY_TESSERACT_CMD => self.tesseract_cmd = value.trim().to_string(),
            KEY_OCR_TIMEOUT_SECS => {
                self.ocr_timeout_secs = value.trim().parse().map_err(|_| {
                    AppError::Config(format!("{key} must be a whole number of seconds"))
                })?
            }
            KEY_OCR_LANGUAGE => {
                let language = value.trim();
                if language.is_empty() {
                    return Err(AppError::Config(format!("{key} cannot be empty")));
                }
                self.ocr_language = language.to_string();
            }
            _ => return Err(AppError::Config(format!("unknown setting: {key}"))),
        }
        Ok(())
    }

    /// The configured root, or `None` when no folder has been chosen yet.
    pub fn screenshots_root(&self) -> Option<PathBuf> {
        let folder = self.screenshots_folder.trim();
        (!folder.is_empty()).then(|| PathBuf::from(folder))
    }

    pub fn is_configured(&self) -> bool {
        self.screenshots_root().is_some_and(|root| root.exists())
    }
}

fn project_dirs() -> Result<ProjectDirs, AppError> {
    ProjectDirs::from("", "", "screenshot-search")
        .ok_or_else(|| AppError::Config("could not resolve a home directory".to_string()))
}

pub fn default_config_path() -> Result<PathBuf, AppError> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE_NAME))
}

pub fn default_db_path() -> Result<PathBuf, AppError> {
    Ok(project_dirs()?.data_dir().join(DB_FILE_NAME))
}
