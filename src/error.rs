use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeydrillError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("invalid practice text: {0}")]
    Text(String),
}

pub type Result<T> = std::result::Result<T, KeydrillError>;
