#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    General(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Please enter a search term")]
    EmptyQuery,

    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    #[error("A scan is already running")]
    ScanInProgress,

    #[error("Config error: {0}")]
    Config(String),
}
