use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat, ImageReader};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::AppError;

const OCR_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// The OCR capability: recognized text for an already-decoded image.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String, AppError>;

    /// Best-effort probe; only used to warn the user once.
    fn is_available(&self) -> bool;
}

pub fn is_ocr_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| OCR_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Drops the alpha channel so the backend always sees plain RGB.
/// Palette images are expanded to RGB(A) by the decoders, so they land here as well.
pub fn normalize_color(image: DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image
    }
}

pub fn load_image(path: &Path) -> Result<DynamicImage, AppError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(normalize_color(image))
}

/// Runs OCR on `path` and returns the trimmed text.
///
/// Never fails: an unreadable file, a corrupt image or a backend error all come back as `""`,
/// which the scanner records as "processed, nothing recognized".
pub fn extract_text(recognizer: &dyn TextRecognizer, path: &Path) -> String {
    match try_extract_text(recognizer, path) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "OCR failed");
            String::new()
        }
    }
}

fn try_extract_text(recognizer: &dyn TextRecognizer, path: &Path) -> Result<String, AppError> {
    let image = load_image(path)?;
    let text = recognizer.recognize(&image)?;
    Ok(text.trim().to_string())
}

/// Shells out to the `tesseract` executable.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: String,
    language: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.tesseract_cmd.clone(),
            config.ocr_language.clone(),
            Duration::from_secs(config.ocr_timeout_secs),
        )
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, image: &DynamicImage) -> Result<String, AppError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.png");
        image.save_with_format(&input, ImageFormat::Png)?;
        let out_base = workdir.path().join("output");

        let mut child = Command::new(&self.command)
            .arg(&input)
            .arg(&out_base)
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AppError::Ocr(format!("failed to start {}: {e}", self.command)))?;

        let status = wait_with_timeout(&mut child, self.timeout)?;
        if !status.success() {
            return Err(AppError::Ocr(format!("{} exited with {status}", self.command)));
        }

        let text = std::fs::read_to_string(out_base.with_extension("txt"))?;
        debug!(chars = text.len(), "tesseract finished");
        Ok(text)
    }

    fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, AppError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AppError::Ocr(format!(
                "timed out after {}ms",
                timeout.as_millis()
            )));
        }
        std::thread::sleep(WAIT_POLL_INTERVAL);
    }
}
