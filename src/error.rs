use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("dataset provider authentication failed: {0}")]
    Authentication(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to coerce column '{column}' to {target}: {message}")]
    Coercion {
        column: String,
        target: String,
        message: String,
    },

    #[error("dataset transfer failed: {0}")]
    Transport(String),

    #[error("warehouse error: {0}")]
    Warehouse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataframe operation failed: {0}")]
    DataFrame(#[from] polars::error::PolarsError),

    #[error("archive extraction failed: {0}")]
    Archive(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
