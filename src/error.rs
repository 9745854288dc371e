//! Error types for the slide rendering pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating, rendering or uploading slides
#[derive(Error, Debug)]
pub enum Error {
    /// Client input was malformed
    #[error("{0}")]
    Validation(String),

    /// No template is mapped for the (family, slide type) pair
    #[error("Unknown template/type: {family}/{slide_type}")]
    UnknownTemplate { family: String, slide_type: String },

    /// A mapped template file could not be read
    #[error("Failed to read template {}: {source}", .path.display())]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to launch or attach to the browser
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// The page did not reach network idle in time
    #[error("Render timed out after {0}ms")]
    RenderTimeout(u64),

    /// The browser could not open a new tab
    #[error("Failed to create tab: {0}")]
    TabUnavailable(String),

    /// Failed to render content
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The image host rejected the upload
    #[error("Cloudinary upload failed: {status} - {body}")]
    Upload { status: u16, body: String },

    /// The image host could not be reached
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Request body over the configured limit
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),
}

impl Error {
    /// HTTP status the request handler answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::PayloadTooLarge(_) => 413,
            _ => 500,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}
