//! Error types for the GIOŚ air-quality service

/// Errors that can occur in the GIOŚ service
#[derive(Debug, thiserror::Error)]
pub enum GiosError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Station {0} not found")]
    NoStation(u32),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Entity registry error: {0}")]
    Registry(String),

    #[error("Dashboard error: {0}")]
    Dashboard(String),
}

/// Result type alias for GIOŚ operations
pub type Result<T> = std::result::Result<T, GiosError>;
